//! Named scenarios and the stores that keep them.
//!
//! A scenario is a saved [`InputSnapshot`] together with the [`Metrics`]
//! computed from it at save time, so scenarios can be compared without
//! recomputation.  Each owner may keep at most
//! [`MAX_SCENARIOS_PER_OWNER`] scenarios; re-saving under an existing
//! name overwrites it and is always allowed.
//!
//! Operations for one owner are serialized behind a per-owner lock so the
//! capacity check and the insert happen atomically.  Different owners
//! never contend.
//!
//! Two backends are provided:
//! - [`MemoryScenarioStore`]: process-local, used in tests and when no
//!   scenario directory is configured.
//! - [`FileScenarioStore`]: one JSON document per owner in a directory.

use crate::engine::compute_many;
use crate::error::{PlannerError, Result};
use crate::models::{InputSnapshot, Metrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

pub const MAX_SCENARIOS_PER_OWNER: usize = 3;

/// A saved plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub input: InputSnapshot,
    /// Metrics as computed when the scenario was last saved.
    pub metrics: Metrics,
}

/// The listing view of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub name: String,
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

impl Scenario {
    pub fn summary(&self) -> ScenarioSummary {
        ScenarioSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// A per-owner scenario store.
///
/// Stores must be thread-safe (`Send + Sync`); the HTTP layer shares one
/// store across all requests.
pub trait ScenarioStore: Send + Sync {
    /// Inserts or overwrites the scenario `name` for `owner` and returns
    /// the stored value.  Fails with [`PlannerError::CapacityExceeded`]
    /// when `name` is new and the owner already has the maximum number
    /// of scenarios.
    fn save(
        &self,
        owner: &str,
        name: &str,
        description: &str,
        input: &InputSnapshot,
        metrics: &Metrics,
    ) -> Result<Scenario>;

    fn load(&self, owner: &str, name: &str) -> Result<Scenario>;

    /// Removes a scenario.  Whether the scenario is in use is the
    /// caller's concern.
    fn delete(&self, owner: &str, name: &str) -> Result<()>;

    /// Summaries in creation order.
    fn list(&self, owner: &str) -> Result<Vec<ScenarioSummary>>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Trims a scenario name.  Every store operation looks names up in this
/// form, so `" a "` and `"a"` address the same scenario.
pub fn normalize_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PlannerError::validation("scenario name must not be empty"));
    }
    Ok(name)
}

/// The scenarios of a single owner, in creation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct OwnerScenarios(Vec<Scenario>);

impl OwnerScenarios {
    fn upsert(
        &mut self,
        owner: &str,
        name: &str,
        description: &str,
        input: &InputSnapshot,
        metrics: &Metrics,
    ) -> Result<Scenario> {
        let name = normalize_name(name)?;
        input.validate_structure()?;
        metrics.ensure_finite()?;
        let now = Utc::now();
        if let Some(existing) = self.0.iter_mut().find(|s| s.name == name) {
            existing.description = description.to_string();
            existing.input = input.clone();
            existing.metrics = metrics.clone();
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        if self.0.len() >= MAX_SCENARIOS_PER_OWNER {
            debug!(owner, name, "scenario capacity reached");
            return Err(PlannerError::CapacityExceeded {
                owner: owner.to_string(),
                limit: MAX_SCENARIOS_PER_OWNER,
            });
        }
        let scenario = Scenario {
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
            input: input.clone(),
            metrics: metrics.clone(),
        };
        self.0.push(scenario.clone());
        Ok(scenario)
    }

    fn get(&self, owner: &str, name: &str) -> Result<Scenario> {
        let name = normalize_name(name)?;
        self.0
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| PlannerError::not_found(owner, name))
    }

    fn remove(&mut self, owner: &str, name: &str) -> Result<()> {
        let name = normalize_name(name)?;
        let index = self
            .0
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| PlannerError::not_found(owner, name))?;
        self.0.remove(index);
        Ok(())
    }

    fn summaries(&self) -> Vec<ScenarioSummary> {
        self.0.iter().map(Scenario::summary).collect()
    }

    /// A non-finite number would be written as JSON `null` and make the
    /// whole document unreadable.
    fn ensure_storable(&self) -> Result<()> {
        for scenario in &self.0 {
            scenario.input.validate_structure()?;
            scenario.metrics.ensure_finite()?;
        }
        Ok(())
    }
}

fn poisoned<T>(_: PoisonError<T>) -> PlannerError {
    PlannerError::store_unavailable("scenario store lock poisoned")
}

/// In-memory scenario store.
#[derive(Debug, Default)]
pub struct MemoryScenarioStore {
    owners: RwLock<HashMap<String, Arc<Mutex<OwnerScenarios>>>>,
}

impl MemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `owner`, created on first use.  Only writes create
    /// entries.
    fn owner_entry(&self, owner: &str) -> Result<Arc<Mutex<OwnerScenarios>>> {
        if let Some(entry) = self.existing(owner)? {
            return Ok(entry);
        }
        let mut owners = self.owners.write().map_err(poisoned)?;
        Ok(owners.entry(owner.to_string()).or_default().clone())
    }

    fn existing(&self, owner: &str) -> Result<Option<Arc<Mutex<OwnerScenarios>>>> {
        Ok(self.owners.read().map_err(poisoned)?.get(owner).cloned())
    }
}

impl ScenarioStore for MemoryScenarioStore {
    fn save(
        &self,
        owner: &str,
        name: &str,
        description: &str,
        input: &InputSnapshot,
        metrics: &Metrics,
    ) -> Result<Scenario> {
        let entry = self.owner_entry(owner)?;
        let mut scenarios = entry.lock().map_err(poisoned)?;
        let saved = scenarios.upsert(owner, name, description, input, metrics)?;
        info!(owner, name = %saved.name, store = self.name(), "scenario saved");
        Ok(saved)
    }

    fn load(&self, owner: &str, name: &str) -> Result<Scenario> {
        let Some(entry) = self.existing(owner)? else {
            return Err(PlannerError::not_found(owner, normalize_name(name)?));
        };
        let scenarios = entry.lock().map_err(poisoned)?;
        scenarios.get(owner, name)
    }

    fn delete(&self, owner: &str, name: &str) -> Result<()> {
        let Some(entry) = self.existing(owner)? else {
            return Err(PlannerError::not_found(owner, normalize_name(name)?));
        };
        entry.lock().map_err(poisoned)?.remove(owner, name)?;
        info!(owner, name = name.trim(), store = self.name(), "scenario deleted");
        Ok(())
    }

    fn list(&self, owner: &str) -> Result<Vec<ScenarioSummary>> {
        let Some(entry) = self.existing(owner)? else {
            return Ok(Vec::new());
        };
        let scenarios = entry.lock().map_err(poisoned)?;
        Ok(scenarios.summaries())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// File-backed scenario store.
///
/// Each owner's scenarios live in `<dir>/<owner>.json`.  Writes go to a
/// temporary file that is then renamed over the original, so readers
/// never see a partial document and need no lock.  Writers for the same
/// owner are serialized.
#[derive(Debug)]
pub struct FileScenarioStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileScenarioStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            PlannerError::store_unavailable(format!("cannot create {}: {e}", dir.display()))
        })?;
        info!(path = %dir.display(), "file scenario store opened");
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn owner_lock(&self, owner: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(poisoned)?;
        Ok(locks.entry(owner.to_string()).or_default().clone())
    }

    fn path_for(&self, owner: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_owner(owner)))
    }

    fn read_owner(&self, owner: &str) -> Result<OwnerScenarios> {
        let path = self.path_for(owner);
        match fs::read_to_string(&path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(OwnerScenarios::default()),
            Err(e) => Err(PlannerError::store_unavailable(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    fn write_owner(&self, owner: &str, scenarios: &OwnerScenarios) -> Result<()> {
        scenarios.ensure_storable()?;
        let path = self.path_for(owner);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(scenarios)?;
        fs::write(&tmp, contents)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| {
                PlannerError::store_unavailable(format!("cannot write {}: {e}", path.display()))
            })?;
        debug!(path = %path.display(), "scenario file written");
        Ok(())
    }
}

impl ScenarioStore for FileScenarioStore {
    fn save(
        &self,
        owner: &str,
        name: &str,
        description: &str,
        input: &InputSnapshot,
        metrics: &Metrics,
    ) -> Result<Scenario> {
        let lock = self.owner_lock(owner)?;
        let _guard = lock.lock().map_err(poisoned)?;
        let mut scenarios = self.read_owner(owner)?;
        let saved = scenarios.upsert(owner, name, description, input, metrics)?;
        self.write_owner(owner, &scenarios)?;
        info!(owner, name = %saved.name, store = self.name(), "scenario saved");
        Ok(saved)
    }

    fn load(&self, owner: &str, name: &str) -> Result<Scenario> {
        self.read_owner(owner)?.get(owner, name)
    }

    fn delete(&self, owner: &str, name: &str) -> Result<()> {
        // Missing scenarios are reported before a lock is taken.
        self.read_owner(owner)?.get(owner, name)?;
        let lock = self.owner_lock(owner)?;
        let _guard = lock.lock().map_err(poisoned)?;
        let mut scenarios = self.read_owner(owner)?;
        scenarios.remove(owner, name)?;
        self.write_owner(owner, &scenarios)?;
        info!(owner, name = name.trim(), store = self.name(), "scenario deleted");
        Ok(())
    }

    fn list(&self, owner: &str) -> Result<Vec<ScenarioSummary>> {
        Ok(self.read_owner(owner)?.summaries())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Maps an owner id to a file stem: ASCII alphanumerics, `-` and `_`
/// pass through, every other byte becomes `%XX`.
fn encode_owner(owner: &str) -> String {
    let mut out = String::with_capacity(owner.len());
    for byte in owner.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// The figure scenarios are compared by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMetric {
    /// Total monthly sales including additional income.
    MonthlyRevenue,
    /// Fixed plus variable costs.
    MonthlyCosts,
    MonthlyProfit,
    ProfitMargin,
}

impl ComparisonMetric {
    pub fn value(self, metrics: &Metrics) -> f64 {
        match self {
            Self::MonthlyRevenue => metrics.monthly_total_sales,
            Self::MonthlyCosts => metrics.total_costs(),
            Self::MonthlyProfit => metrics.profit,
            Self::ProfitMargin => metrics.profit_margin,
        }
    }

    /// Whether the value is a percentage rather than an amount.
    pub fn is_percentage(self) -> bool {
        matches!(self, Self::ProfitMargin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub name: String,
    pub value: f64,
    pub updated_at: DateTime<Utc>,
}

/// Compares the cached metrics of the named scenarios, in the order
/// given.
pub fn compare(
    store: &dyn ScenarioStore,
    owner: &str,
    names: &[String],
    metric: ComparisonMetric,
) -> Result<Vec<ComparisonRow>> {
    names
        .iter()
        .map(|name| {
            let scenario = store.load(owner, name)?;
            Ok(ComparisonRow {
                value: metric.value(&scenario.metrics),
                name: scenario.name,
                updated_at: scenario.updated_at,
            })
        })
        .collect()
}

/// Compares unsaved working plans, computed in parallel.  Rows are
/// stamped with the current time and follow the order of `names`, which
/// pairs with `inputs` by position.
pub fn compare_live(
    names: &[String],
    inputs: &[InputSnapshot],
    metric: ComparisonMetric,
) -> Result<Vec<ComparisonRow>> {
    if names.len() != inputs.len() {
        return Err(PlannerError::validation(format!(
            "{} names given for {} live plans",
            names.len(),
            inputs.len()
        )));
    }
    let now = Utc::now();
    let rows = compute_many(inputs)?
        .iter()
        .zip(names)
        .map(|(computation, name)| ComparisonRow {
            name: name.clone(),
            value: metric.value(&computation.metrics),
            updated_at: now,
        })
        .collect();
    Ok(rows)
}
