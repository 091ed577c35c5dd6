//! Drives one scenario tier through BUY -> STEP* -> SELL -> EVALUATE -> CONFIRM
//! and reports confirmed spreads. Every tier is independent: a failure only
//! drops that tier.

use eyre::{Report, Result};
use log::{debug, error, info};

use super::cycle_quote::CycleQuote;
use super::errors::EngineError;
use super::search::Side;
use super::types::{AmountTier, CycleOutcome, Scenario, StepTrace, VenueRef};
use super::Engine;
use crate::notify::{format, LogBatch, NotificationSink};

/// Why a pass stopped before producing a quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassFailure {
    /// No buy venue returned anything
    Buy,
    /// A step swap returned nothing
    Step {
        /// 1-based index of the failing step
        step: usize,
        /// Its venue
        venue: String,
    },
    /// No sell venue returned anything
    Sell,
}

/// What happened to one (scenario, amount) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    /// Confirmed and sent to the sink
    Reported(Box<CycleOutcome>),
    /// Buy leg failed on every venue
    BuyFailed,
    /// A step swap produced nothing
    StepChainBroken {
        /// 1-based index of the failing step
        step: usize,
        /// Its venue
        venue: String,
    },
    /// Sell leg failed on every venue
    SellFailed,
    /// Profit below the tier threshold on the first pass
    BelowThreshold(Box<CycleQuote>),
    /// First pass cleared the threshold, the confirmation pass did not
    PhantomSpread {
        /// The first pass
        first: Box<CycleQuote>,
        /// Confirmation percent, `None` when the confirmation pass failed outright
        confirm_percent: Option<f64>,
    },
}

impl TierOutcome {
    /// Whether the tier ended in a report
    #[must_use]
    pub const fn is_reported(&self) -> bool {
        matches!(self, Self::Reported(_))
    }
}

impl From<PassFailure> for TierOutcome {
    fn from(failure: PassFailure) -> Self {
        match failure {
            PassFailure::Buy => Self::BuyFailed,
            PassFailure::Step { step, venue } => Self::StepChainBroken { step, venue },
            PassFailure::Sell => Self::SellFailed,
        }
    }
}

fn step_trace(step: &VenueRef, qty_in: f64, qty_out: f64) -> StepTrace {
    match step {
        VenueRef::Dex(dex) => StepTrace {
            venue: dex.name.clone(),
            network: dex.network.clone(),
            qty_in,
            symbol_in: dex.input_token.label().to_string(),
            qty_out,
            symbol_out: dex.output_token.label().to_string(),
            out_contract: dex.output_token.address.clone(),
        },
        VenueRef::Cex(name) => StepTrace {
            venue: name.clone(),
            network: String::new(),
            qty_in,
            symbol_in: String::new(),
            qty_out,
            symbol_out: String::new(),
            out_contract: String::new(),
        },
    }
}

impl Engine {
    /// Runs the step swaps strictly in order, each one fed the previous
    /// output.
    ///
    /// # Returns
    /// The final quantity and the trace of every step
    ///
    /// # Errors
    /// * `EngineError::StepChainBroken` at the first step that fails or
    ///   returns nothing; later steps are not called
    pub async fn run_step_chain(&self, steps: &[VenueRef], start: f64) -> Result<(f64, Vec<StepTrace>)> {
        let mut qty = start;
        let mut trace = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            let qty_out = match self.quote_venue(Side::Buy, step, qty).await {
                Ok(quote) => quote.amount_out,
                Err(err) => {
                    debug!("cycle: step {} on {} failed: {err}", index + 1, step.label());
                    0.0
                }
            };
            if qty_out <= 0.0 {
                return Err(Report::new(EngineError::StepChainBroken {
                    step: index + 1,
                    venue: step.label(),
                }));
            }
            trace.push(step_trace(step, qty, qty_out));
            qty = qty_out;
        }

        Ok((qty, trace))
    }

    /// One BUY -> STEP* -> SELL pass with fresh quotes and fresh identities.
    ///
    /// # Errors
    /// The leg that failed
    pub async fn run_pass(&self, scenario: &Scenario, amount: f64) -> Result<CycleQuote, PassFailure> {
        let buy = self
            .best_execution(Side::Buy, &scenario.buy_venues, amount)
            .await
            .ok_or(PassFailure::Buy)?;

        let (tokens_after_steps, trace) = if scenario.step_swaps.is_empty() {
            (buy.amount_out, Vec::new())
        } else {
            self.run_step_chain(&scenario.step_swaps, buy.amount_out)
                .await
                .map_err(|err| match err.downcast::<EngineError>() {
                    Ok(EngineError::StepChainBroken { step, venue }) => PassFailure::Step { step, venue },
                    _ => PassFailure::Step {
                        step: 0,
                        venue: String::new(),
                    },
                })?
        };

        let sell = self
            .best_execution(Side::Sell, &scenario.sell_venues, tokens_after_steps)
            .await
            .ok_or(PassFailure::Sell)?;

        Ok(CycleQuote::new(amount, buy, trace, tokens_after_steps, sell))
    }

    /// Evaluates one amount tier, confirming a profitable first pass with a
    /// second, independent pass after `confirm_delay`.
    pub async fn run_tier(&self, scenario_name: &str, scenario: &Scenario, tier: AmountTier, slot: usize) -> TierOutcome {
        info!("[P{slot}] {scenario_name}: amount {} USDT", tier.amount);

        let first = match self.run_pass(scenario, tier.amount).await {
            Ok(pass) => pass,
            Err(failure) => {
                info!("[P{slot}] {scenario_name}: pass failed: {failure:?}");
                return failure.into();
            }
        };

        info!(
            "[P{slot}] {scenario_name}: bought {:.4} on {}, sold for {:.4} USDT on {}, profit {:.4} ({:.2}%)",
            first.tokens_acquired(),
            first.buy().venue,
            first.usdt_received(),
            first.sell().venue,
            first.profit(),
            first.profit_percent()
        );

        if !first.clears(tier.threshold_percent) {
            return TierOutcome::BelowThreshold(Box::new(first));
        }

        tokio::time::sleep(self.settings.confirm_delay).await;

        let confirm = match self.run_pass(scenario, tier.amount).await {
            Ok(pass) => pass,
            Err(failure) => {
                info!("[P{slot}] {scenario_name}: phantom spread, confirmation pass failed ({failure:?})");
                return TierOutcome::PhantomSpread {
                    first: Box::new(first),
                    confirm_percent: None,
                };
            }
        };

        if !confirm.clears(tier.threshold_percent) {
            info!(
                "[P{slot}] {scenario_name}: phantom spread, was {:.2}% now {:.2}%",
                first.profit_percent(),
                confirm.profit_percent()
            );
            return TierOutcome::PhantomSpread {
                confirm_percent: Some(confirm.profit_percent()),
                first: Box::new(first),
            };
        }

        TierOutcome::Reported(Box::new(CycleOutcome {
            scenario: scenario_name.to_string(),
            token: scenario.token.clone(),
            network: scenario.network.clone(),
            amount_in: confirm.amount_in(),
            tokens_acquired: confirm.tokens_acquired(),
            tokens_after_steps: confirm.tokens_after_steps(),
            usdt_received: confirm.usdt_received(),
            profit: confirm.profit(),
            profit_percent: confirm.profit_percent(),
            first_pass_percent: first.profit_percent(),
            buy_venue: confirm.buy().venue.clone(),
            sell_venue: confirm.sell().venue.clone(),
            bridge: scenario.bridge.clone(),
            check: scenario.check.clone(),
            step_trace: confirm.into_step_trace(),
        }))
    }

    /// Runs every tier of a scenario in order, pushes confirmed outcomes to
    /// `sink` and one summary line per tier to `batch`.
    pub async fn run_scenario(
        &self,
        scenario_name: &str,
        scenario: &Scenario,
        slot: usize,
        sink: &dyn NotificationSink,
        batch: &LogBatch,
    ) -> Vec<TierOutcome> {
        info!("[P{slot}] === Start processing {scenario_name} (token {}) ===", scenario.token);
        let mut outcomes = Vec::with_capacity(scenario.amounts.len());

        for tier in &scenario.amounts {
            let outcome = self.run_tier(scenario_name, scenario, *tier, slot).await;

            if let TierOutcome::Reported(report) = &outcome {
                if let Err(err) = sink.report_cycle(report).await {
                    error!("[P{slot}] {scenario_name}: failed to deliver report: {err}");
                }
            }
            batch.push(format::tier_line(scenario_name, tier.amount, &scenario.token, &outcome));
            outcomes.push(outcome);
        }

        info!("[P{slot}] === Finished processing {scenario_name} ===");
        outcomes
    }
}
