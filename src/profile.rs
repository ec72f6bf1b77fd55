//! Per-owner persistence of the working input snapshot.
//!
//! The snapshot is stored field by field, each field as a JSON value
//! keyed by `(owner, field)`.  Loading starts from the default snapshot
//! and replaces every field that has been stored, so owners whose data
//! predates a field still load.

use crate::error::{PlannerError, Result};
use crate::models::InputSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// The independently persisted parts of an [`InputSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotField {
    Stylists,
    RetailPercentage,
    Trainees,
    Receptionists,
    FixedCosts,
    VariableCostsPercentages,
    SalarySettings,
    AdditionalIncome,
}

impl SnapshotField {
    pub const ALL: [Self; 8] = [
        Self::Stylists,
        Self::RetailPercentage,
        Self::Trainees,
        Self::Receptionists,
        Self::FixedCosts,
        Self::VariableCostsPercentages,
        Self::SalarySettings,
        Self::AdditionalIncome,
    ];

    /// The field's key in the serialized snapshot.
    pub fn key(self) -> &'static str {
        match self {
            Self::Stylists => "stylists",
            Self::RetailPercentage => "retail_percentage",
            Self::Trainees => "trainees",
            Self::Receptionists => "receptionists",
            Self::FixedCosts => "fixed_costs",
            Self::VariableCostsPercentages => "variable_costs_percentages",
            Self::SalarySettings => "salary_settings",
            Self::AdditionalIncome => "additional_income",
        }
    }
}

pub trait ProfileStore: Send + Sync {
    fn save_field(&self, owner: &str, field: SnapshotField, value: Value) -> Result<()>;
    fn load_field(&self, owner: &str, field: SnapshotField) -> Result<Option<Value>>;
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    data: RwLock<HashMap<(String, SnapshotField), Value>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn save_field(&self, owner: &str, field: SnapshotField, value: Value) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|_| PlannerError::store_unavailable("profile store lock poisoned"))?;
        data.insert((owner.to_string(), field), value);
        Ok(())
    }

    fn load_field(&self, owner: &str, field: SnapshotField) -> Result<Option<Value>> {
        let data = self
            .data
            .read()
            .map_err(|_| PlannerError::store_unavailable("profile store lock poisoned"))?;
        Ok(data.get(&(owner.to_string(), field)).cloned())
    }
}

fn into_object(snapshot: &InputSnapshot) -> Result<Map<String, Value>> {
    match serde_json::to_value(snapshot)? {
        Value::Object(map) => Ok(map),
        _ => Err(PlannerError::validation("input snapshot did not serialize to an object")),
    }
}

/// Stores every field of `snapshot` for `owner`.
pub fn save_snapshot(
    store: &dyn ProfileStore,
    owner: &str,
    snapshot: &InputSnapshot,
) -> Result<()> {
    let mut fields = into_object(snapshot)?;
    for field in SnapshotField::ALL {
        let value = fields.remove(field.key()).unwrap_or(Value::Null);
        store.save_field(owner, field, value)?;
    }
    debug!(owner, "profile saved");
    Ok(())
}

/// Loads `owner`'s snapshot, falling back to defaults for fields that
/// were never stored.  A stored field that does not fit the snapshot is
/// a validation error.
pub fn load_snapshot(store: &dyn ProfileStore, owner: &str) -> Result<InputSnapshot> {
    let mut fields = into_object(&InputSnapshot::default())?;
    for field in SnapshotField::ALL {
        if let Some(value) = store.load_field(owner, field)? {
            fields.insert(field.key().to_string(), value);
        }
    }
    InputSnapshot::from_value(Value::Object(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncomeCategory, Stylist};
    use serde_json::json;

    #[test]
    fn unknown_owner_loads_defaults() {
        let store = MemoryProfileStore::new();
        assert_eq!(load_snapshot(&store, "new").unwrap(), InputSnapshot::default());
    }

    #[test]
    fn snapshot_round_trips_by_field() {
        let store = MemoryProfileStore::new();
        let mut snapshot = InputSnapshot::default();
        snapshot.stylists.push(Stylist::new("Bea", 750.0, 250.0));
        snapshot.retail_percentage = 12.5;
        snapshot
            .additional_income
            .insert(IncomeCategory::TrainingIncome, 300.0);
        save_snapshot(&store, "o", &snapshot).unwrap();

        assert_eq!(
            store.load_field("o", SnapshotField::RetailPercentage).unwrap(),
            Some(json!(12.5))
        );
        assert_eq!(load_snapshot(&store, "o").unwrap(), snapshot);
        assert_eq!(load_snapshot(&store, "other").unwrap(), InputSnapshot::default());
    }

    #[test]
    fn partial_profiles_fill_from_defaults() {
        let store = MemoryProfileStore::new();
        store
            .save_field(
                "o",
                SnapshotField::Trainees,
                json!([{"name": "Tia", "wage": 220.0}]),
            )
            .unwrap();
        let snapshot = load_snapshot(&store, "o").unwrap();
        assert_eq!(snapshot.trainees[0].name, "Tia");
        assert_eq!(snapshot.stylists, InputSnapshot::default().stylists);
    }

    #[test]
    fn malformed_field_is_a_validation_error() {
        let store = MemoryProfileStore::new();
        let partial = json!({"service_commission_percentage": 10});
        store
            .save_field("o", SnapshotField::SalarySettings, partial)
            .unwrap();
        assert!(matches!(
            load_snapshot(&store, "o"),
            Err(PlannerError::Validation(_))
        ));
    }

    #[test]
    fn field_keys_match_serialized_snapshot() {
        let value = serde_json::to_value(InputSnapshot::default()).unwrap();
        for field in SnapshotField::ALL {
            assert!(value.get(field.key()).is_some(), "{}", field.key());
        }
    }
}
