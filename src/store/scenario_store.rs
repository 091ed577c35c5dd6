use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use eyre::{Report, Result};
use log::{info, warn};
use parking_lot::Mutex;

use crate::engine::errors::EngineError;
use crate::engine::types::Scenario;

/// Scenario set keyed by scenario name.
pub type Scenarios = BTreeMap<String, Scenario>;

/// A scenario entry left out of the snapshot because it does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RejectedScenario {
    /// Scenario key
    pub name: String,
    /// Parser message
    pub reason: String,
}

/// Supplies a fresh scenario snapshot at the start of every cycle.
pub trait ScenarioSource: Send + Sync {
    /// Current scenarios
    ///
    /// # Errors
    /// `EngineError::ConfigLoad` if the scenario set cannot be read
    fn load(&self) -> Result<Arc<Scenarios>>;

    /// Entries the last [`ScenarioSource::load`] skipped
    fn rejected(&self) -> Vec<RejectedScenario> {
        Vec::new()
    }
}

fn config_error(path: &Path, err: impl std::fmt::Display) -> Report {
    Report::new(EngineError::ConfigLoad {
        reason: format!("{}: {err}", path.display()),
    })
}

/// JSON file of `{name: scenario}`, parsed again only when its modification
/// time changes.
#[derive(Debug)]
pub struct ScenarioStore {
    /// File location
    path: PathBuf,
    /// Last parsed snapshot and the mtime it was read at
    cache: Mutex<Option<Cached>>,
}

/// One parse of the file
#[derive(Debug)]
struct Cached {
    /// File mtime at read time
    modified: SystemTime,
    /// Entries that parsed
    scenarios: Arc<Scenarios>,
    /// Entries that did not
    rejected: Vec<RejectedScenario>,
}

impl ScenarioStore {
    /// Creates a store over `path`. Nothing is read until the first `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// File location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScenarioSource for ScenarioStore {
    fn load(&self) -> Result<Arc<Scenarios>> {
        let modified = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|err| config_error(&self.path, err))?;

        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref() {
            if cached.modified == modified {
                return Ok(Arc::clone(&cached.scenarios));
            }
        }

        let raw = fs::read_to_string(&self.path).map_err(|err| config_error(&self.path, err))?;
        let (scenarios, rejected) = parse_scenarios(&raw).map_err(|err| config_error(&self.path, err))?;
        info!(
            "store::scenarios: loaded {} scenarios from {} ({} rejected)",
            scenarios.len(),
            self.path.display(),
            rejected.len()
        );

        let scenarios = Arc::new(scenarios);
        *cache = Some(Cached {
            modified,
            scenarios: Arc::clone(&scenarios),
            rejected,
        });
        Ok(scenarios)
    }

    fn rejected(&self) -> Vec<RejectedScenario> {
        self.cache
            .lock()
            .as_ref()
            .map(|cached| cached.rejected.clone())
            .unwrap_or_default()
    }
}

/// Parses `{name: scenario}` entry by entry. Only a document that is not a
/// JSON object fails as a whole.
fn parse_scenarios(raw: &str) -> serde_json::Result<(Scenarios, Vec<RejectedScenario>)> {
    let entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw)?;
    let mut scenarios = Scenarios::new();
    let mut rejected = Vec::new();
    for (name, value) in entries {
        match serde_json::from_value::<Scenario>(value) {
            Ok(scenario) => {
                scenarios.insert(name, scenario);
            }
            Err(err) => {
                warn!("store::scenarios: skipping {name}: {err}");
                rejected.push(RejectedScenario {
                    name,
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok((scenarios, rejected))
}

/// Fixed scenario set, for single-scenario checks and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticScenarios(pub Arc<Scenarios>);

impl ScenarioSource for StaticScenarios {
    fn load(&self) -> Result<Arc<Scenarios>> {
        Ok(Arc::clone(&self.0))
    }
}
