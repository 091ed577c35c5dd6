//! Best-execution search: quote one leg on every candidate venue at once and
//! keep the largest output.

use std::fmt::{self, Display};

use eyre::{Report, Result};
use futures_util::future::join_all;
use log::{debug, warn};

use super::errors::EngineError;
use super::resilience::{with_retry, with_timeout};
use super::types::{QuoteResult, VenueRef};
use super::Engine;
use crate::venues::VenueAdapter;

/// Which quote a venue is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// USDT (or step input) in, tokens out
    Buy,
    /// Tokens in, USDT out
    Sell,
}

impl Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Output of a single venue call.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueQuote {
    /// Amount returned, `0.0` when the venue has no liquidity
    pub amount_out: f64,
    /// Identity the returned amount came through
    pub identity: Option<String>,
}

async fn quote(adapter: &dyn VenueAdapter, side: Side, amount_in: f64, venue: &VenueRef) -> Result<f64> {
    match side {
        Side::Buy => adapter.quote_buy(amount_in, venue).await,
        Side::Sell => adapter.quote_sell(amount_in, venue).await,
    }
}

/// Non-finite and negative outputs count as no liquidity.
fn usable(amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

impl Engine {
    /// Quotes `venue` once through the scheduler and the resilience wrapper.
    ///
    /// The venue's fee is taken off `amount_in` first. If the call fails or
    /// returns nothing while routed through an identity, it is retried once
    /// more directly, so a dead proxy is not mistaken for a dead venue.
    ///
    /// # Errors
    /// * `EngineError::VenueUnavailable` if no adapter is registered or every
    ///   attempt failed
    pub async fn quote_venue(&self, side: Side, venue: &VenueRef, amount_in: f64) -> Result<VenueQuote> {
        let name = venue.name();
        let Some(mut adapter) = self.registry.create(name) else {
            return Err(Report::new(EngineError::VenueUnavailable {
                venue: name.to_string(),
                reason: "no adapter registered".to_string(),
            }));
        };

        let identity = match self
            .scheduler
            .acquire(venue.class(), name, self.settings.acquire_timeout)
            .await
        {
            Ok(identity) => identity,
            Err(err) => {
                debug!("search: {err}, calling {name} directly");
                None
            }
        };
        adapter.set_identity(identity.as_deref());

        let funds = amount_in * (1.0 - venue.fee_rate());
        let op_name = format!("{side}-{name}");
        let settings = &self.settings;

        let routed = with_retry(&settings.retry, &op_name, || {
            with_timeout(quote(adapter.as_ref(), side, funds, venue), settings.call_timeout)
        })
        .await;

        match (routed, identity) {
            (Ok(amount), identity) if usable(amount) > 0.0 => Ok(VenueQuote {
                amount_out: amount,
                identity,
            }),
            (routed, Some(proxy)) => {
                match &routed {
                    Ok(_) => debug!("search: {name} returned nothing via {proxy}, retrying direct"),
                    Err(err) => warn!("search: {name} failed via {proxy} ({err}), retrying direct"),
                }
                adapter.set_identity(None);
                let direct = with_retry(&settings.retry, &op_name, || {
                    with_timeout(quote(adapter.as_ref(), side, funds, venue), settings.call_timeout)
                })
                .await;
                Self::finish(name, direct)
            }
            (routed, None) => Self::finish(name, routed),
        }
    }

    fn finish(name: &str, result: Result<f64>) -> Result<VenueQuote> {
        match result {
            Ok(amount) => Ok(VenueQuote {
                amount_out: usable(amount),
                identity: None,
            }),
            Err(err) => Err(Report::new(EngineError::VenueUnavailable {
                venue: name.to_string(),
                reason: err.to_string(),
            })),
        }
    }

    /// Quotes `amount_in` on every venue concurrently and returns the venue
    /// with the strictly greatest output; ties keep the earlier venue in the
    /// list. `None` when no venue returned anything.
    pub async fn best_execution(&self, side: Side, venues: &[VenueRef], amount_in: f64) -> Option<QuoteResult> {
        let tasks = venues.iter().map(|venue| async move {
            match self.quote_venue(side, venue, amount_in).await {
                Ok(quote) => Some(quote),
                Err(err) => {
                    warn!("search: final failure on {side} {}: {err}", venue.label());
                    None
                }
            }
        });
        let quotes = join_all(tasks).await;

        select_best(venues, quotes)
    }
}

/// Max selection over quotes aligned with `venues`. Depends only on the
/// set of results, never on completion order.
fn select_best(venues: &[VenueRef], quotes: Vec<Option<VenueQuote>>) -> Option<QuoteResult> {
    let mut best: Option<QuoteResult> = None;
    for (venue, quote) in venues.iter().zip(quotes) {
        let Some(quote) = quote else { continue };
        let amount_out = usable(quote.amount_out);
        if amount_out <= 0.0 {
            continue;
        }
        if best.as_ref().map_or(true, |b| amount_out > b.amount_out) {
            best = Some(QuoteResult {
                venue: venue.clone(),
                amount_out,
                identity_used: quote.identity,
            });
        }
    }
    best
}
