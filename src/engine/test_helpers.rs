#![allow(dead_code)]
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{bail, Result};
use parking_lot::Mutex;

use super::resilience::RetryPolicy;
use super::scheduler::{IdentityScheduler, RateLimits};
use super::search::Side;
use super::types::{AmountTier, CycleOutcome, DexVenue, Scenario, TokenInfo, VenueRef};
use super::{Engine, EngineSettings};
use crate::notify::{LogBatch, NotificationSink};
use crate::venues::{VenueAdapter, VenueRegistry};

pub fn cex(name: &str) -> VenueRef {
    VenueRef::Cex(name.to_string())
}

pub fn dex(name: &str, symbol_in: &str, symbol_out: &str) -> VenueRef {
    VenueRef::Dex(DexVenue {
        name: name.to_string(),
        network: "base".to_string(),
        input_token: token(symbol_in),
        output_token: token(symbol_out),
        fee: 0.0,
        multiplier: None,
    })
}

pub fn token(symbol: &str) -> TokenInfo {
    TokenInfo {
        symbol: Some(symbol.to_string()),
        address: format!("0x{}", symbol.to_lowercase()),
        decimals: 18,
    }
}

pub fn tier(amount: f64, threshold_percent: f64) -> AmountTier {
    AmountTier {
        amount,
        threshold_percent,
    }
}

pub fn scenario(buy: &[VenueRef], sell: &[VenueRef], tiers: &[AmountTier]) -> Scenario {
    Scenario {
        token: "TKN".to_string(),
        buy_venues: buy.to_vec(),
        sell_venues: sell.to_vec(),
        amounts: tiers.to_vec(),
        step_swaps: Vec::new(),
        network: Some("base".to_string()),
        bridge: Vec::new(),
        check: Vec::new(),
    }
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        acquire_timeout: Duration::from_millis(100),
        call_timeout: Duration::from_secs(1),
        retry: RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
        },
        confirm_delay: Duration::from_millis(600),
    }
}

/// One recorded adapter call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub side: Side,
    pub amount_in: f64,
    pub identity: Option<String>,
}

#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<Call>>,
}

impl CallLog {
    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn count_side(&self, side: Side) -> usize {
        self.calls.lock().iter().filter(|c| c.side == side).count()
    }

    pub fn inputs(&self) -> Vec<f64> {
        self.calls.lock().iter().map(|c| c.amount_in).collect()
    }

    pub fn identities(&self) -> Vec<Option<String>> {
        self.calls.lock().iter().map(|c| c.identity.clone()).collect()
    }
}

/// Scripted venue. Each side walks its sequence one call at a time and
/// repeats the last value once exhausted.
#[derive(Debug, Clone)]
pub struct MockVenue {
    buy: Arc<Vec<f64>>,
    sell: Arc<Vec<f64>>,
    buy_cursor: Arc<AtomicUsize>,
    sell_cursor: Arc<AtomicUsize>,
    attempts: Arc<AtomicU32>,
    fail_first: u32,
    fail_always: bool,
    fail_via_identity: bool,
    echo: bool,
    delay: Duration,
    identity: Option<String>,
    calls: Arc<CallLog>,
}

impl MockVenue {
    pub fn sequence(buy: &[f64], sell: &[f64]) -> Self {
        Self {
            buy: Arc::new(buy.to_vec()),
            sell: Arc::new(sell.to_vec()),
            buy_cursor: Arc::default(),
            sell_cursor: Arc::default(),
            attempts: Arc::default(),
            fail_first: 0,
            fail_always: false,
            fail_via_identity: false,
            echo: false,
            delay: Duration::ZERO,
            identity: None,
            calls: Arc::default(),
        }
    }

    pub fn fixed(buy: f64, sell: f64) -> Self {
        Self::sequence(&[buy], &[sell])
    }

    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::fixed(0.0, 0.0)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_always: true,
            ..Self::fixed(0.0, 0.0)
        }
    }

    pub fn failing_first(mut self, attempts: u32) -> Self {
        self.fail_first = attempts;
        self
    }

    pub fn failing_via_identity(mut self) -> Self {
        self.fail_via_identity = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Arc<CallLog> {
        Arc::clone(&self.calls)
    }

    async fn answer(&self, side: Side, amount_in: f64) -> Result<f64> {
        self.calls.calls.lock().push(Call {
            side,
            amount_in,
            identity: self.identity.clone(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_always || attempt < self.fail_first {
            bail!("scripted failure");
        }
        if self.fail_via_identity && self.identity.is_some() {
            bail!("proxy refused connection");
        }
        if self.echo {
            return Ok(amount_in);
        }

        let (values, cursor) = match side {
            Side::Buy => (&self.buy, &self.buy_cursor),
            Side::Sell => (&self.sell, &self.sell_cursor),
        };
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        Ok(values
            .get(index)
            .or_else(|| values.last())
            .copied()
            .unwrap_or(0.0))
    }
}

#[async_trait]
impl VenueAdapter for MockVenue {
    fn set_identity(&mut self, identity: Option<&str>) {
        self.identity = identity.map(str::to_string);
    }

    async fn quote_buy(&self, amount_in: f64, _venue: &VenueRef) -> Result<f64> {
        self.answer(Side::Buy, amount_in).await
    }

    async fn quote_sell(&self, amount_in: f64, _venue: &VenueRef) -> Result<f64> {
        self.answer(Side::Sell, amount_in).await
    }
}

/// Registry of scripted venues.
#[derive(Debug, Default)]
pub struct MockVenues {
    registry: VenueRegistry,
}

impl MockVenues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, venue: MockVenue) {
        self.registry.register(name, move || Box::new(venue.clone()));
    }

    pub fn engine(&self, identities: &[String]) -> Engine {
        Engine::new(
            Arc::new(self.registry.clone()),
            Arc::new(IdentityScheduler::new(identities, RateLimits::default())),
            test_settings(),
        )
    }
}

/// Sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub cycles: Mutex<Vec<CycleOutcome>>,
    pub logs: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn report_cycle(&self, outcome: &CycleOutcome) -> Result<()> {
        self.cycles.lock().push(outcome.clone());
        Ok(())
    }

    async fn report_log(&self, text: &str) -> Result<()> {
        self.logs.lock().push(text.to_string());
        Ok(())
    }

    async fn report_error(&self, text: &str) -> Result<()> {
        self.errors.lock().push(text.to_string());
        Ok(())
    }
}

pub fn new_log() -> LogBatch {
    LogBatch::default()
}
