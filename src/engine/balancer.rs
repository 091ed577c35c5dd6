use std::collections::BTreeMap;

use itertools::Itertools;

use super::types::Scenario;

/// Relative cost of a CEX quote compared to a DEX quote.
const CEX_WEIGHT: f64 = 0.5;

/// Expected request cost of one pass over `scenario`.
///
/// `(dex_buy + dex_sell + steps) * amounts + 0.5 * cex`, rounded, never
/// below 1.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scenario_weight(scenario: &Scenario) -> u64 {
    let dex = scenario.dex_venue_count() + scenario.step_swaps.len();
    let raw = (dex * scenario.amounts.len()) as f64 + CEX_WEIGHT * scenario.cex_venue_count() as f64;
    (raw.round() as u64).max(1)
}

/// Scenario names grouped per identity slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    /// Scenario names per slot, in assignment order
    pub slots: Vec<Vec<String>>,
    /// Summed weight per slot
    pub loads: Vec<u64>,
}

impl Assignment {
    /// Number of slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over `(slot, scenario name)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .flat_map(|(slot, names)| names.iter().map(move |name| (slot, name.as_str())))
    }
}

/// Spreads scenarios over `identity_count` slots.
///
/// Scenarios are taken in name order and each goes to the slot with the
/// smallest accumulated load, lowest index on ties. With no identities
/// everything lands on one slot.
///
/// # Arguments
///
/// * `scenarios` - scenarios by name
/// * `identity_count` - pool size
///
/// # Returns
///
/// One entry per slot; every scenario appears exactly once
#[must_use]
pub fn assign(scenarios: &BTreeMap<String, Scenario>, identity_count: usize) -> Assignment {
    let slot_count = identity_count.max(1);
    let mut assignment = Assignment {
        slots: vec![Vec::new(); slot_count],
        loads: vec![0; slot_count],
    };

    for (name, scenario) in scenarios {
        let weight = scenario_weight(scenario);
        let Some(slot) = assignment.loads.iter().position_min() else {
            continue;
        };
        assignment.loads[slot] += weight;
        assignment.slots[slot].push(name.clone());
    }

    assignment
}
