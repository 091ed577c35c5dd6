//! # Engine
//!
//! The rate-limited execution core: identity scheduling, resilient venue
//! calls, best-execution search across venues, scenario load balancing and
//! the two-phase arbitrage cycle.

/// Scenario weights and greedy assignment to identities
pub mod balancer;
/// Buy, step swaps, sell, evaluate, confirm
pub mod cycle;
/// Profit arithmetic for one pass
pub mod cycle_quote;
/// Error taxonomy
pub mod errors;
/// Timeout and retry wrappers
pub mod resilience;
/// Identity pool under per-venue quotas
pub mod scheduler;
/// Concurrent best-quote search
pub mod search;
/// Test builders and scripted venues
#[cfg(test)]
pub(crate) mod test_helpers;
/// Venues, scenarios and outcomes
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use crate::venues::VenueRegistry;
use resilience::RetryPolicy;
use scheduler::IdentityScheduler;

/// Timing knobs of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Deadline for one identity acquisition
    pub acquire_timeout: Duration,
    /// Deadline for one venue call attempt
    pub call_timeout: Duration,
    /// Attempts and backoff per venue call
    pub retry: RetryPolicy,
    /// Pause before the confirmation pass
    pub confirm_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_millis(1500),
            call_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            confirm_delay: Duration::from_millis(600),
        }
    }
}

/// Everything a scan cycle needs to quote venues. Built once per cycle
/// around that cycle's scheduler and shared by reference by all tasks.
#[derive(Debug, Clone)]
pub struct Engine {
    /// Adapter factories
    pub registry: Arc<VenueRegistry>,
    /// This cycle's identity pool
    pub scheduler: Arc<IdentityScheduler>,
    /// Timeouts and retries
    pub settings: EngineSettings,
}

impl Engine {
    /// Creates an engine
    #[must_use]
    pub const fn new(
        registry: Arc<VenueRegistry>,
        scheduler: Arc<IdentityScheduler>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry,
            scheduler,
            settings,
        }
    }
}
