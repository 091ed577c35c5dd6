use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use url::Url;

use crate::engine::resilience::RetryPolicy;
use crate::engine::scheduler::{IdentityScheduler, RateLimits};
use crate::engine::EngineSettings;
use crate::notify::slack::SlackChannels;
use crate::store::proxy_store::DEFAULT_PROBE_URL;

/// Upper bound on attempts per venue call
const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Scenario file
    pub scenarios_path: PathBuf,
    /// Proxy file
    pub proxies_path: PathBuf,
    /// Scheduler quotas
    pub limits: RateLimits,
    /// Scheduler wait-loop interval
    pub acquire_poll: Duration,
    /// Engine timeouts, retries and confirmation delay
    pub engine: EngineSettings,
    /// Wait after a cycle-fatal error
    pub cycle_error_delay: Duration,
    /// Pause between healthy cycles
    pub scan_interval: Duration,
    /// Re-probe identities every this many cycles
    pub proxy_recheck_every: u64,
    /// Liveness probe target, a valid URL
    pub probe_url: String,
    /// Liveness probe deadline
    pub probe_timeout: Duration,
    /// Max characters per flushed log message
    pub log_chunk_chars: usize,
    /// Slack token, console output when unset
    pub slack_token: Option<String>,
    /// Slack channels
    pub slack_channels: SlackChannels,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Reads the configuration from process environment variables. Missing or
    /// unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str, default: u64| Duration::from_millis(parse_or(&lookup, key, default));

        let mut limits = RateLimits {
            window: millis("RATE_WINDOW_MS", 1000),
            cex_default: parse_or(&lookup, "CEX_DEFAULT_LIMIT", 5),
            dex_default: parse_or(&lookup, "DEX_DEFAULT_LIMIT", 2),
            ..RateLimits::default()
        };
        if let Some(overrides) = lookup("VENUE_LIMITS") {
            limits.per_venue.extend(parse_venue_limits(&overrides));
        }

        let engine = EngineSettings {
            acquire_timeout: millis("ACQ_TIMEOUT_MS", 1500),
            call_timeout: millis("CALL_TIMEOUT_MS", 15_000),
            retry: RetryPolicy {
                max_attempts: parse_or::<u32, _>(&lookup, "RETRY_MAX_ATTEMPTS", 3).clamp(1, MAX_RETRY_ATTEMPTS),
                initial_delay: millis("RETRY_BASE_DELAY_MS", 300),
            },
            confirm_delay: millis("CONFIRM_DELAY_MS", 600),
        };

        let probe_url = lookup("PROBE_URL")
            .filter(|raw| match Url::parse(raw) {
                Ok(_) => true,
                Err(err) => {
                    warn!("config: invalid PROBE_URL={raw} ({err}), using default");
                    false
                }
            })
            .unwrap_or_else(|| DEFAULT_PROBE_URL.to_string());

        let defaults = SlackChannels::default();
        Self {
            scenarios_path: lookup("SCENARIOS_PATH").map_or_else(|| "config/scenarios.json".into(), PathBuf::from),
            proxies_path: lookup("PROXIES_PATH").map_or_else(|| "config/proxies.json".into(), PathBuf::from),
            limits,
            acquire_poll: millis("ACQ_POLL_MS", 30),
            engine,
            cycle_error_delay: millis("CYCLE_ERROR_DELAY_MS", 15_000),
            scan_interval: millis("SCAN_INTERVAL_MS", 0),
            proxy_recheck_every: parse_or::<u64, _>(&lookup, "PROXY_RECHECK_EVERY", 20).max(1),
            probe_url,
            probe_timeout: millis("PROBE_TIMEOUT_MS", 1000),
            log_chunk_chars: parse_or::<usize, _>(&lookup, "LOG_CHUNK_CHARS", 4000).max(1),
            slack_token: lookup("SLACK_OAUTH_TOKEN").filter(|token| !token.trim().is_empty()),
            slack_channels: SlackChannels {
                alerts: lookup("SLACK_CHANNEL").unwrap_or(defaults.alerts),
                logs: lookup("SLACK_LOG_CHANNEL").unwrap_or(defaults.logs),
                errors: lookup("SLACK_ERROR_CHANNEL").unwrap_or(defaults.errors),
            },
        }
    }

    /// A scheduler over `identities` with the configured quotas
    #[must_use]
    pub fn scheduler(&self, identities: &[String]) -> IdentityScheduler {
        IdentityScheduler::new(identities, self.limits.clone()).with_poll_interval(self.acquire_poll)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("config: invalid {key}={raw}, using default");
            default
        }),
    }
}

/// Parses `Name:limit,Name:limit`. Malformed entries are skipped.
#[must_use]
pub fn parse_venue_limits(raw: &str) -> Vec<(String, u32)> {
    raw.split(',')
        .filter_map(|entry| {
            let (name, limit) = entry.split_once(':')?;
            let name = name.trim();
            match limit.trim().parse() {
                Ok(limit) if !name.is_empty() => Some((name.to_string(), limit)),
                _ => {
                    warn!("config: skipping venue limit {entry:?}");
                    None
                }
            }
        })
        .collect()
}
