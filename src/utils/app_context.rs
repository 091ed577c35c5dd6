//! Application context for the scan loop.
//!
//! Bundles everything the bot talks to: configuration, the venue adapter
//! registry, the scenario and proxy stores, the liveness probe and the
//! notification sink. Built once at start-up and handed to the bot.

use std::sync::Arc;

use eyre::Result;
use log::info;

use crate::config::Config;
use crate::notify::{ConsoleSink, NotificationSink, SlackNotifier};
use crate::store::{HttpProbe, LivenessProbe, ProxyStore, ScenarioSource, ScenarioStore};
use crate::venues::VenueRegistry;

/// Application context holding the bot's collaborators.
pub struct AppContext {
    /// Runtime configuration
    pub config: Config,
    /// Venue adapter factories
    pub registry: Arc<VenueRegistry>,
    /// Scenario snapshots
    pub scenarios: Arc<dyn ScenarioSource>,
    /// Identity list
    pub proxies: ProxyStore,
    /// Identity health check
    pub probe: Arc<dyn LivenessProbe>,
    /// Alerts, log batches and operator errors
    pub sink: Arc<dyn NotificationSink>,
}

impl AppContext {
    /// Creates a new application context from `config` with the built-in
    /// venue adapters.
    ///
    /// # Returns
    /// * `Result<Self>` - The initialized context or an error
    ///
    /// # Errors
    /// * If the probe URL does not parse
    /// * If the Slack client cannot be built
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, VenueRegistry::with_builtin())
    }

    /// Same as [`AppContext::new`] with an explicit adapter registry.
    ///
    /// # Errors
    /// See [`AppContext::new`]
    pub fn with_registry(config: Config, registry: VenueRegistry) -> Result<Self> {
        let probe = HttpProbe::new(&config.probe_url, config.probe_timeout)?;

        Ok(Self {
            registry: Arc::new(registry),
            scenarios: Arc::new(ScenarioStore::new(config.scenarios_path.clone())),
            proxies: ProxyStore::new(config.proxies_path.clone()),
            probe: Arc::new(probe),
            sink: Self::sink(&config)?,
            config,
        })
    }

    /// Slack when a token is configured, console otherwise.
    ///
    /// # Errors
    /// * If the Slack client cannot be built
    pub fn sink(config: &Config) -> Result<Arc<dyn NotificationSink>> {
        match &config.slack_token {
            Some(token) => {
                info!("app_context: notifications go to Slack");
                Ok(Arc::new(SlackNotifier::new(
                    token.clone(),
                    config.slack_channels.clone(),
                )?))
            }
            None => {
                info!("app_context: SLACK_OAUTH_TOKEN not set, notifications go to the console");
                Ok(Arc::new(ConsoleSink))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_from_default_config() {
        let ctx = AppContext::new(Config::default()).unwrap();
        assert!(ctx.registry.contains("Migration"));
        assert_eq!(ctx.proxies.path(), Config::default().proxies_path);
    }

    #[test]
    fn test_rejects_bad_probe_url() {
        let config = Config {
            probe_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(AppContext::new(config).is_err());
    }
}
