//! Identity pool and per-venue quota scheduler.
//!
//! Each identity (a proxy endpoint, or `None` for direct traffic) keeps one
//! request counter per venue class inside a fixed window. `acquire` hands out
//! the least-loaded identity still below the effective limit, and waits when
//! every identity is saturated.

use std::collections::HashMap;
use std::time::Duration;

use eyre::{Report, Result};
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::errors::EngineError;
use super::types::VenueClass;

/// Per-window request limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
    /// Window length after which counters reset
    pub window: Duration,
    /// Limit for CEX venues without an override
    pub cex_default: u32,
    /// Limit for DEX venues without an override
    pub dex_default: u32,
    /// Per-venue overrides, keyed by venue name
    pub per_venue: HashMap<String, u32>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            cex_default: 5,
            dex_default: 2,
            per_venue: default_venue_limits(),
        }
    }
}

impl RateLimits {
    /// The override for `venue` if configured, else the class default.
    #[must_use]
    pub fn effective(&self, class: VenueClass, venue: &str) -> u32 {
        self.per_venue
            .get(venue)
            .copied()
            .unwrap_or(match class {
                VenueClass::Cex => self.cex_default,
                VenueClass::Dex => self.dex_default,
            })
    }
}

/// Known venue limits in requests per second.
#[must_use]
pub fn default_venue_limits() -> HashMap<String, u32> {
    [
        // CEX
        ("Binance", 100),
        ("Bybit", 120),
        ("Gate", 20),
        ("Mexc", 10),
        ("Kucoin", 20),
        ("Btse", 15),
        ("Bitget", 20),
        ("CryptoCom", 10),
        ("Bitmart", 30),
        ("Kraken", 2),
        ("Okx", 30),
        ("Coinex", 30),
        // DEX / aggregators
        ("Odos", 2),
        ("Jupiter", 10),
        ("OpenOcean", 5),
        ("CoWSwap", 10),
        ("Magpie", 5),
        ("SushiSwap", 10),
        ("Raydium", 10),
        ("Relay", 3),
        ("KyberSwap", 10),
    ]
    .into_iter()
    .map(|(name, limit)| (name.to_string(), limit))
    .collect()
}

/// One pool member. Only the scheduler touches it.
#[derive(Debug, Clone)]
struct Identity {
    /// Proxy endpoint, `None` for direct
    token: Option<String>,
    /// Requests granted in the current window
    cex: u32,
    /// Requests granted in the current window
    dex: u32,
    /// Start of the current window
    window_start: Instant,
}

impl Identity {
    fn new(token: Option<String>, now: Instant) -> Self {
        Self {
            token,
            cex: 0,
            dex: 0,
            window_start: now,
        }
    }

    /// Resets the counters once `window` has fully elapsed. Repeating it
    /// without grants in between changes nothing.
    fn roll_over(&mut self, now: Instant, window: Duration) {
        if now.saturating_duration_since(self.window_start) >= window {
            self.cex = 0;
            self.dex = 0;
            self.window_start = now;
        }
    }

    const fn count(&self, class: VenueClass) -> u32 {
        match class {
            VenueClass::Cex => self.cex,
            VenueClass::Dex => self.dex,
        }
    }

    fn charge(&mut self, class: VenueClass) {
        match class {
            VenueClass::Cex => self.cex += 1,
            VenueClass::Dex => self.dex += 1,
        }
    }
}

/// Counter view of one identity, for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityLoad {
    /// Identity token, `None` for direct
    pub token: Option<String>,
    /// CEX requests in the current window
    pub cex: u32,
    /// DEX requests in the current window
    pub dex: u32,
}

/// Hands out identities under per-venue quotas.
///
/// Rebuilt at the start of every scan cycle from the healthy identities.
#[derive(Debug)]
pub struct IdentityScheduler {
    /// Pool state. Held only for the select-and-charge step, never across an await.
    pool: Mutex<Vec<Identity>>,
    /// Limits and window length
    limits: RateLimits,
    /// Sleep between scans while every identity is saturated
    poll_interval: Duration,
    /// Set when the pool was built empty: grants are then never refused
    unrestricted: bool,
}

impl IdentityScheduler {
    /// Default sleep while waiting for quota
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(30);

    /// Builds a pool from identity tokens. An empty list yields one direct
    /// identity without quota enforcement.
    #[must_use]
    pub fn new(tokens: &[String], limits: RateLimits) -> Self {
        let now = Instant::now();
        let unrestricted = tokens.is_empty();
        let pool = if unrestricted {
            vec![Identity::new(None, now)]
        } else {
            tokens
                .iter()
                .map(|token| Identity::new(Some(token.clone()), now))
                .collect()
        };

        Self {
            pool: Mutex::new(pool),
            limits,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            unrestricted,
        }
    }

    /// Overrides the wait-loop poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Limits in force
    #[must_use]
    pub const fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// Number of identities in the pool, the synthesized direct one included
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.lock().len()
    }

    /// Never true: an empty pool is replaced by the direct identity
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.lock().is_empty()
    }

    /// Whether quotas are enforced at all
    #[must_use]
    pub const fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    /// Waits for an identity with quota left for `venue` and charges it.
    ///
    /// # Arguments
    /// * `class` - counter to charge, selects the default limit
    /// * `venue` - looked up for a per-venue limit
    /// * `timeout` - how long to wait for quota
    ///
    /// # Returns
    /// The identity token, `None` meaning direct
    ///
    /// # Errors
    /// * `EngineError::AcquireTimeout` if no identity frees up in time
    pub async fn acquire(
        &self,
        class: VenueClass,
        venue: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let limit = self.limits.effective(class, venue);
        let started = Instant::now();

        loop {
            if let Some(token) = self.try_acquire(class, limit) {
                return Ok(token);
            }

            let waited = started.elapsed();
            if waited >= timeout {
                warn!("scheduler: acquire timeout for {class}/{venue} after {}ms", waited.as_millis());
                return Err(Report::new(EngineError::AcquireTimeout {
                    class,
                    venue: venue.to_string(),
                }));
            }

            debug!("scheduler: all identities saturated for {class}/{venue}, waiting");
            tokio::time::sleep(self.poll_interval.min(timeout - waited)).await;
        }
    }

    /// One scan over the pool: roll windows, pick the least-loaded identity
    /// below `limit` (first in pool order on ties) and charge it.
    fn try_acquire(&self, class: VenueClass, limit: u32) -> Option<Option<String>> {
        let now = Instant::now();
        let mut pool = self.pool.lock();

        for identity in pool.iter_mut() {
            identity.roll_over(now, self.limits.window);
        }

        if self.unrestricted {
            let identity = pool.first_mut()?;
            identity.charge(class);
            return Some(identity.token.clone());
        }

        let best = pool
            .iter_mut()
            .filter(|identity| identity.count(class) < limit)
            .min_by_key(|identity| identity.count(class))?;
        best.charge(class);
        Some(best.token.clone())
    }

    /// Current counters, after rolling any expired windows.
    #[must_use]
    pub fn snapshot(&self) -> Vec<IdentityLoad> {
        let now = Instant::now();
        let mut pool = self.pool.lock();
        pool.iter_mut()
            .map(|identity| {
                identity.roll_over(now, self.limits.window);
                IdentityLoad {
                    token: identity.token.clone(),
                    cex: identity.cex,
                    dex: identity.dex,
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tokens(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("socks5://10.0.0.{i}:1080")).collect()
    }

    fn limits(cex: u32, dex: u32) -> RateLimits {
        RateLimits {
            window: Duration::from_secs(1),
            cex_default: cex,
            dex_default: dex,
            per_venue: HashMap::new(),
        }
    }

    #[test]
    fn test_effective_limit() {
        let limits = RateLimits::default();
        assert_eq!(limits.effective(VenueClass::Cex, "Binance"), 100);
        assert_eq!(limits.effective(VenueClass::Dex, "Odos"), 2);
        assert_eq!(limits.effective(VenueClass::Cex, "Unlisted"), 5);
        assert_eq!(limits.effective(VenueClass::Dex, "Unlisted"), 2);
    }

    #[test]
    fn test_roll_over_is_exact_and_idempotent() {
        let start = Instant::now();
        let window = Duration::from_millis(1000);
        let mut identity = Identity::new(None, start);
        identity.charge(VenueClass::Cex);
        identity.charge(VenueClass::Dex);

        identity.roll_over(start + Duration::from_millis(999), window);
        assert_eq!((identity.cex, identity.dex), (1, 1));

        let rolled_at = start + Duration::from_millis(1000);
        identity.roll_over(rolled_at, window);
        assert_eq!((identity.cex, identity.dex), (0, 0));
        assert_eq!(identity.window_start, rolled_at);

        identity.roll_over(rolled_at + Duration::from_millis(10), window);
        assert_eq!(identity.window_start, rolled_at);
        assert_eq!((identity.cex, identity.dex), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_least_loaded_first() {
        let scheduler = IdentityScheduler::new(&tokens(3), limits(5, 5));
        let mut grants = Vec::new();
        for _ in 0..6 {
            grants.push(
                scheduler
                    .acquire(VenueClass::Cex, "Any", Duration::from_millis(100))
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        let expected = tokens(3);
        assert_eq!(grants[..3], expected[..]);
        assert_eq!(grants[3..], expected[..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classes_counted_separately() {
        let scheduler = IdentityScheduler::new(&tokens(1), limits(1, 1));
        let timeout = Duration::from_millis(10);
        assert!(scheduler.acquire(VenueClass::Cex, "A", timeout).await.is_ok());
        assert!(scheduler.acquire(VenueClass::Dex, "B", timeout).await.is_ok());
        let load = &scheduler.snapshot()[0];
        assert_eq!((load.cex, load.dex), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fairness_within_window() {
        let n = 4;
        let limit = 5;
        let scheduler = IdentityScheduler::new(&tokens(n), limits(limit, limit));
        let m = 14_u32;

        for granted in 1..=m {
            scheduler
                .acquire(VenueClass::Dex, "X", Duration::from_millis(10))
                .await
                .unwrap();
            let counts: Vec<u32> = scheduler.snapshot().iter().map(|l| l.dex).collect();
            let max = *counts.iter().max().unwrap();
            let min = *counts.iter().min().unwrap();
            assert!(max - min <= 1, "unbalanced after {granted}: {counts:?}");
        }

        let counts: Vec<u32> = scheduler.snapshot().iter().map(|l| l.dex).collect();
        assert_eq!(counts.iter().sum::<u32>(), m);
        assert!(counts.iter().all(|&c| c <= m.div_ceil(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_when_saturated() {
        let scheduler = IdentityScheduler::new(&tokens(2), limits(1, 1));
        let timeout = Duration::from_millis(200);
        scheduler.acquire(VenueClass::Cex, "A", timeout).await.unwrap();
        scheduler.acquire(VenueClass::Cex, "A", timeout).await.unwrap();

        // The window is 1s, so nothing frees up within 200ms
        let err = scheduler
            .acquire(VenueClass::Cex, "A", timeout)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<EngineError>(),
            Some(&EngineError::AcquireTimeout {
                class: VenueClass::Cex,
                venue: "A".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_window_rollover() {
        let scheduler = IdentityScheduler::new(&tokens(1), limits(1, 1));
        let started = Instant::now();
        scheduler
            .acquire(VenueClass::Dex, "A", Duration::from_secs(2))
            .await
            .unwrap();
        let token = scheduler
            .acquire(VenueClass::Dex, "A", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(token, Some(tokens(1)[0].clone()));
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_pool_is_unrestricted() {
        let scheduler = IdentityScheduler::new(&[], limits(1, 1));
        assert!(scheduler.is_unrestricted());
        assert_eq!(scheduler.len(), 1);

        let started = Instant::now();
        for _ in 0..50 {
            let token = scheduler
                .acquire(VenueClass::Dex, "Odos", Duration::ZERO)
                .await
                .unwrap();
            assert_eq!(token, None);
        }
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_counters_never_exceed_limit_under_contention() {
        let limit = 3;
        let scheduler = Arc::new(IdentityScheduler::new(
            &tokens(4),
            RateLimits {
                window: Duration::from_secs(60),
                cex_default: limit,
                dex_default: limit,
                per_venue: HashMap::new(),
            },
        ));

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move {
                    scheduler
                        .acquire(VenueClass::Cex, "X", Duration::from_millis(50))
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut granted = 0;
        for task in tasks {
            if task.await.unwrap() {
                granted += 1;
            }
        }

        // 4 identities x 3 per window; the 60s window never rolls here
        assert_eq!(granted, 12);
        assert!(scheduler.snapshot().iter().all(|load| load.cex <= limit));
    }
}
