use async_trait::async_trait;
use eyre::{bail, Result};

use super::VenueAdapter;
use crate::engine::types::VenueRef;

/// Converts at a fixed ratio, for contract migrations and redenominations.
/// Needs no network, so the identity is ignored.
///
/// The ratio comes from the descriptor's `multiplier`, falling back to the
/// adapter default (1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Migration {
    /// Ratio used when the descriptor has none
    default_multiplier: f64,
}

impl Default for Migration {
    fn default() -> Self {
        Self::new()
    }
}

impl Migration {
    /// One-to-one migration
    #[must_use]
    pub const fn new() -> Self {
        Self::with_default_multiplier(1.0)
    }

    /// Migration with a custom fallback ratio
    #[must_use]
    pub const fn with_default_multiplier(default_multiplier: f64) -> Self {
        Self { default_multiplier }
    }

    fn convert(&self, amount_in: f64, venue: &VenueRef) -> Result<f64> {
        let multiplier = match venue {
            VenueRef::Dex(dex) => dex.multiplier.unwrap_or(self.default_multiplier),
            VenueRef::Cex(_) => self.default_multiplier,
        };
        if !multiplier.is_finite() || multiplier < 0.0 {
            bail!("Invalid migration multiplier {multiplier}");
        }
        Ok(amount_in * multiplier)
    }
}

#[async_trait]
impl VenueAdapter for Migration {
    fn set_identity(&mut self, _identity: Option<&str>) {}

    async fn quote_buy(&self, amount_in: f64, venue: &VenueRef) -> Result<f64> {
        self.convert(amount_in, venue)
    }

    async fn quote_sell(&self, amount_in: f64, venue: &VenueRef) -> Result<f64> {
        self.convert(amount_in, venue)
    }
}
