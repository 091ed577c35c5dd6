//! File-backed collaborators: the scenario set and the identity pool.

/// Identity list and liveness probing
pub mod proxy_store;
/// Scenario snapshots
pub mod scenario_store;

pub use proxy_store::{probe_all, HttpProbe, LivenessProbe, ProxyStore};
pub use scenario_store::{RejectedScenario, ScenarioSource, ScenarioStore, Scenarios, StaticScenarios};
