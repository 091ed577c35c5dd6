use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use eyre::{eyre, Result};
use futures_util::future::join_all;
use log::{error, info, warn};
use tokio::time::Instant;

use crate::engine::balancer;
use crate::engine::cycle::TierOutcome;
use crate::engine::types::Scenario;
use crate::engine::Engine;
use crate::notify::{ConsoleSink, LogBatch, NotificationSink};
use crate::store::{probe_all, Scenarios};
use crate::utils::app_context::AppContext;

/// Tally of one scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleSummary {
    /// Scenarios run
    pub scenarios: usize,
    /// Identities the pool was built from, 0 meaning direct
    pub identities: usize,
    /// Amount tiers evaluated
    pub tiers: usize,
    /// Confirmed and reported
    pub reported: usize,
    /// Cleared once, failed confirmation
    pub phantom: usize,
    /// A leg or step failed
    pub failed: usize,
    /// Log messages delivered
    pub log_messages: usize,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl CycleSummary {
    fn count(&mut self, outcomes: &[TierOutcome]) {
        for outcome in outcomes {
            self.tiers += 1;
            match outcome {
                TierOutcome::Reported(_) => self.reported += 1,
                TierOutcome::PhantomSpread { .. } => self.phantom += 1,
                TierOutcome::BelowThreshold(_) => {}
                TierOutcome::BuyFailed | TierOutcome::StepChainBroken { .. } | TierOutcome::SellFailed => {
                    self.failed += 1;
                }
            }
        }
    }
}

/// The scan loop.
pub struct Bot {
    /// Collaborators
    ctx: AppContext,
    /// Identities that passed the last liveness check
    alive: Vec<String>,
    /// Cycles started so far
    cycle: u64,
    /// Snapshot the operator notices below refer to
    noticed_in: Option<Arc<Scenarios>>,
    /// Configuration problems already sent to the operator
    noticed: HashSet<String>,
}

impl Bot {
    /// Creates a bot. No identity is considered alive until
    /// [`Bot::refresh_identities`] runs.
    #[must_use]
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            alive: Vec::new(),
            cycle: 0,
            noticed_in: None,
            noticed: HashSet::new(),
        }
    }

    /// Identities currently considered alive
    #[must_use]
    pub fn alive(&self) -> &[String] {
        &self.alive
    }

    /// Probes the full identity list from the proxy store.
    ///
    /// # Errors
    /// * If the proxy store cannot be read
    pub async fn refresh_identities(&mut self) -> Result<()> {
        let all = self.ctx.proxies.list_identities()?;
        self.alive = probe_all(self.ctx.probe.as_ref(), &all).await;
        info!("bot: active proxies (initial): {}/{}", self.alive.len(), all.len());
        Ok(())
    }

    /// Re-probes the alive set, or the full list when nothing is alive.
    async fn recheck_identities(&mut self) -> Result<()> {
        let candidates = if self.alive.is_empty() {
            self.ctx.proxies.list_identities()?
        } else {
            self.alive.clone()
        };
        self.alive = probe_all(self.ctx.probe.as_ref(), &candidates).await;
        info!("bot: active proxies (rechecked): {}/{}", self.alive.len(), candidates.len());
        Ok(())
    }

    /// Runs forever: initial liveness check, then one scan cycle after
    /// another. A cycle-fatal error is reported to the operator and followed
    /// by a pause.
    ///
    /// # Errors
    /// * If the initial identity check cannot read the proxy store
    pub async fn run(&mut self) -> Result<()> {
        self.refresh_identities().await?;
        loop {
            self.tick().await;
        }
    }

    /// One loop iteration: a cycle and the pause after it.
    pub async fn tick(&mut self) {
        match self.run_cycle().await {
            Ok(summary) => {
                info!(
                    "bot: cycle {} done in {:.2}s: {} tiers, {} reported, {} phantom, {} failed",
                    self.cycle,
                    summary.elapsed.as_secs_f64(),
                    summary.tiers,
                    summary.reported,
                    summary.phantom,
                    summary.failed
                );
                if self.ctx.config.scan_interval.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(self.ctx.config.scan_interval).await;
                }
            }
            Err(err) => {
                error!("bot: main loop error: {err}");
                if let Err(report_err) = self.ctx.sink.report_error(&format!("Main loop error: {err}")).await {
                    warn!("bot: failed to report error: {report_err}");
                }
                tokio::time::sleep(self.ctx.config.cycle_error_delay).await;
            }
        }
    }

    /// One scan cycle: snapshot scenarios, recheck identities when due,
    /// rebuild the scheduler, balance, run every scenario concurrently and
    /// flush the log batch.
    ///
    /// # Errors
    /// * `EngineError::ConfigLoad` if the scenario snapshot cannot be read
    /// * If a due identity recheck cannot read the proxy store
    pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
        let started = Instant::now();
        let cycle = self.cycle;
        self.cycle += 1;

        let scenarios = self.ctx.scenarios.load()?;
        info!("bot: cycle {}: active scenarios: {:?}", cycle + 1, scenarios.keys().collect::<Vec<_>>());

        if cycle > 0 && cycle % self.ctx.config.proxy_recheck_every == 0 {
            self.recheck_identities().await?;
        }
        if self.alive.is_empty() {
            warn!("bot: no active proxies, running direct without quotas");
        }

        let engine = Engine::new(
            Arc::clone(&self.ctx.registry),
            Arc::new(self.ctx.config.scheduler(&self.alive)),
            self.ctx.config.engine,
        );
        let assignment = balancer::assign(&scenarios, self.alive.len());
        info!("bot: loads per identity: {:?}", assignment.loads);

        self.report_config_problems(&scenarios).await;

        let sink = self.ctx.sink.as_ref();
        let batch = LogBatch::new();
        let tasks = assignment.iter().filter_map(|(slot, name)| {
            let scenario = scenarios.get(name)?;
            Some(engine.run_scenario(name, scenario, slot + 1, sink, &batch))
        });
        let results = join_all(tasks).await;

        let mut summary = CycleSummary {
            scenarios: scenarios.len(),
            identities: self.alive.len(),
            ..CycleSummary::default()
        };
        for outcomes in &results {
            summary.count(outcomes);
        }
        summary.log_messages = batch.flush(sink, self.ctx.config.log_chunk_chars).await;
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// Tells the operator about scenario entries that were skipped and
    /// venues that have no adapter. Each problem is sent once per snapshot.
    async fn report_config_problems(&mut self, scenarios: &Arc<Scenarios>) {
        let same_snapshot = self
            .noticed_in
            .as_ref()
            .is_some_and(|noticed_in| Arc::ptr_eq(noticed_in, scenarios));
        if !same_snapshot {
            self.noticed.clear();
            self.noticed_in = Some(Arc::clone(scenarios));
        }

        let mut problems: Vec<String> = self
            .ctx
            .scenarios
            .rejected()
            .into_iter()
            .map(|rejected| format!("Scenario {}: skipped, {}", rejected.name, rejected.reason))
            .collect();
        problems.extend(
            scenarios
                .iter()
                .filter_map(|(name, scenario)| self.unknown_venues(name, scenario)),
        );

        for msg in problems {
            if !self.noticed.insert(msg.clone()) {
                continue;
            }
            warn!("bot: {msg}");
            if let Err(err) = self.ctx.sink.report_error(&msg).await {
                warn!("bot: failed to report error: {err}");
            }
        }
    }

    /// Venues of `scenario` without an adapter. The scenario still runs on
    /// the rest.
    fn unknown_venues(&self, name: &str, scenario: &Scenario) -> Option<String> {
        let unknown: Vec<&str> = scenario
            .buy_venues
            .iter()
            .chain(&scenario.sell_venues)
            .chain(&scenario.step_swaps)
            .map(|venue| venue.name())
            .filter(|venue| !self.ctx.registry.contains(venue))
            .collect();
        (!unknown.is_empty()).then(|| format!("Scenario {name}: no adapter for {}", unknown.join(", ")))
    }

    /// Runs one scenario once, direct and without quotas, with console
    /// output.
    ///
    /// # Errors
    /// * `EngineError::ConfigLoad` if the scenario snapshot cannot be read
    /// * If no scenario is called `name`
    pub async fn check_scenario(&self, name: &str) -> Result<Vec<TierOutcome>> {
        let scenarios = self.ctx.scenarios.load()?;
        let scenario = scenarios.get(name).ok_or_else(|| eyre!("No config for {name}"))?;

        let engine = Engine::new(
            Arc::clone(&self.ctx.registry),
            Arc::new(self.ctx.config.scheduler(&[])),
            self.ctx.config.engine,
        );
        let sink = ConsoleSink;
        let batch = LogBatch::new();
        let outcomes = engine.run_scenario(name, scenario, 1, &sink, &batch).await;
        batch.flush(&sink, self.ctx.config.log_chunk_chars).await;
        Ok(outcomes)
    }
}
