use async_trait::async_trait;
use eyre::Result;
use log::{error, info};

use super::{format, NotificationSink};
use crate::engine::types::CycleOutcome;

/// Sink that only writes to the log. Used when no Slack token is configured
/// and by single-scenario checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn report_cycle(&self, outcome: &CycleOutcome) -> Result<()> {
        info!("notify::console: ALERT\n{}", format::alert(outcome));
        Ok(())
    }

    async fn report_log(&self, text: &str) -> Result<()> {
        info!("notify::console: log batch\n{text}");
        Ok(())
    }

    async fn report_error(&self, text: &str) -> Result<()> {
        error!("notify::console: {text}");
        Ok(())
    }
}
