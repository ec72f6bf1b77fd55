//! An interactive planning session.
//!
//! A [`PlannerSession`] is the single writer of one owner's working
//! snapshot.  Every confirmed edit is validated, the previous snapshot is
//! pushed onto the undo history, and the edit is applied.  Edits that do
//! not change anything leave the history alone.

use crate::engine::compute_and_apply;
use crate::error::{PlannerError, Result};
use crate::history::HistoryBuffer;
use crate::models::{
    check_amount, FixedCostCategory, IncomeCategory, InputSnapshot, Metrics, SalarySettings,
    Stylist, VariableCostCategory, WageEarner,
};
use crate::scenario::{normalize_name, Scenario, ScenarioStore};
use tracing::info;

/// Name of the working plan before any scenario is saved or loaded.
pub const DEFAULT_SCENARIO_NAME: &str = "Current Plan";

/// Outcome of [`PlannerSession::undo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Undo {
    Restored,
    NothingToUndo,
}

/// Staff paid a flat weekly wage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WageRole {
    Trainee,
    Receptionist,
}

#[derive(Debug, Clone)]
pub struct PlannerSession {
    owner: String,
    input: InputSnapshot,
    history: HistoryBuffer,
    active_scenario: String,
}

impl PlannerSession {
    pub fn new(owner: impl Into<String>, input: InputSnapshot) -> Result<Self> {
        input.validate()?;
        Ok(Self {
            owner: owner.into(),
            input,
            history: HistoryBuffer::default(),
            active_scenario: DEFAULT_SCENARIO_NAME.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn input(&self) -> &InputSnapshot {
        &self.input
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn active_scenario(&self) -> &str {
        &self.active_scenario
    }

    /// Recomputes metrics and stores the derived variable cost
    /// percentages in the working snapshot.  Not an undoable edit.
    pub fn recompute(&mut self) -> Result<Metrics> {
        compute_and_apply(&mut self.input)
    }

    fn apply(&mut self, change: impl FnOnce(&mut InputSnapshot) -> Result<()>) -> Result<()> {
        let mut next = self.input.clone();
        change(&mut next)?;
        if next != self.input {
            let previous = std::mem::replace(&mut self.input, next);
            self.history.push(previous);
        }
        Ok(())
    }

    pub fn set_stylist_sales(&mut self, index: usize, weekly_sales: f64) -> Result<()> {
        check_amount(weekly_sales, "stylist sales", true)?;
        self.apply(|input| {
            stylist_mut(input, index)?.weekly_sales = weekly_sales;
            Ok(())
        })
    }

    pub fn set_stylist_guarantee(&mut self, index: usize, weekly_guarantee: f64) -> Result<()> {
        check_amount(weekly_guarantee, "stylist guarantee", true)?;
        self.apply(|input| {
            stylist_mut(input, index)?.weekly_guarantee = weekly_guarantee;
            Ok(())
        })
    }

    pub fn rename_stylist(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.apply(|input| {
            stylist_mut(input, index)?.name = name;
            Ok(())
        })
    }

    pub fn add_stylist(&mut self, stylist: Stylist) -> Result<()> {
        check_amount(stylist.weekly_sales, "stylist sales", true)?;
        check_amount(stylist.weekly_guarantee, "stylist guarantee", true)?;
        self.apply(|input| {
            input.stylists.push(stylist);
            Ok(())
        })
    }

    pub fn remove_stylist(&mut self, index: usize) -> Result<()> {
        self.apply(|input| {
            if index >= input.stylists.len() {
                return Err(no_such("stylist", index));
            }
            input.stylists.remove(index);
            Ok(())
        })
    }

    pub fn set_retail_percentage(&mut self, percentage: f64) -> Result<()> {
        check_amount(percentage, "retail_percentage", true)?;
        self.apply(|input| {
            input.retail_percentage = percentage;
            Ok(())
        })
    }

    pub fn add_wage_earner(&mut self, role: WageRole, earner: WageEarner) -> Result<()> {
        check_amount(earner.weekly_wage, "wage", true)?;
        self.apply(|input| {
            roster_mut(input, role).push(earner);
            Ok(())
        })
    }

    pub fn remove_wage_earner(&mut self, role: WageRole, index: usize) -> Result<()> {
        self.apply(|input| {
            let roster = roster_mut(input, role);
            if index >= roster.len() {
                return Err(no_such(role_label(role), index));
            }
            roster.remove(index);
            Ok(())
        })
    }

    pub fn set_wage(&mut self, role: WageRole, index: usize, weekly_wage: f64) -> Result<()> {
        check_amount(weekly_wage, "wage", true)?;
        self.apply(|input| {
            roster_mut(input, role)
                .get_mut(index)
                .ok_or_else(|| no_such(role_label(role), index))?
                .weekly_wage = weekly_wage;
            Ok(())
        })
    }

    pub fn set_fixed_cost(&mut self, category: FixedCostCategory, monthly: f64) -> Result<()> {
        check_amount(monthly, category, true)?;
        self.apply(|input| {
            input.fixed_costs.insert(category, monthly);
            Ok(())
        })
    }

    /// Sets a user-editable variable cost percentage.  The two
    /// payroll-derived categories are rejected.
    pub fn set_variable_cost_percentage(
        &mut self,
        category: VariableCostCategory,
        percentage: f64,
    ) -> Result<()> {
        if category.is_derived() {
            return Err(PlannerError::validation(format!(
                "{category} is derived from payroll and cannot be edited"
            )));
        }
        check_amount(percentage, category, true)?;
        self.apply(|input| {
            input.variable_cost_percentages.insert(category, percentage);
            Ok(())
        })
    }

    pub fn set_salary_settings(&mut self, settings: SalarySettings) -> Result<()> {
        self.apply(|input| {
            input.salary_settings = settings;
            input.validate()
        })
    }

    pub fn set_additional_income(&mut self, category: IncomeCategory, monthly: f64) -> Result<()> {
        check_amount(monthly, category, true)?;
        self.apply(|input| {
            input.additional_income.insert(category, monthly);
            Ok(())
        })
    }

    /// Replaces the whole snapshot, e.g. after an import.
    pub fn replace_input(&mut self, input: InputSnapshot) -> Result<()> {
        input.validate()?;
        self.apply(|current| {
            *current = input;
            Ok(())
        })
    }

    pub fn undo(&mut self) -> Undo {
        match self.history.pop() {
            Some(previous) => {
                self.input = previous;
                Undo::Restored
            }
            None => Undo::NothingToUndo,
        }
    }

    /// Saves the working snapshot under `name` and makes it the active
    /// scenario.
    pub fn save_scenario(
        &mut self,
        store: &dyn ScenarioStore,
        name: &str,
        description: &str,
    ) -> Result<Scenario> {
        let metrics = self.recompute()?;
        let scenario = store.save(&self.owner, name, description, &self.input, &metrics)?;
        self.active_scenario = scenario.name.clone();
        Ok(scenario)
    }

    /// Replaces the working snapshot with a saved scenario.  The previous
    /// snapshot goes onto the undo history.
    pub fn load_scenario(&mut self, store: &dyn ScenarioStore, name: &str) -> Result<Metrics> {
        let scenario = store.load(&self.owner, name)?;
        self.replace_input(scenario.input)?;
        self.active_scenario = scenario.name;
        info!(owner = %self.owner, scenario = %self.active_scenario, "scenario loaded");
        self.recompute()
    }

    /// Deletes a saved scenario other than the active one.
    pub fn delete_scenario(&mut self, store: &dyn ScenarioStore, name: &str) -> Result<()> {
        let name = normalize_name(name)?;
        if name == self.active_scenario {
            return Err(PlannerError::ScenarioActive(name.to_string()));
        }
        store.delete(&self.owner, name)
    }
}

fn stylist_mut(input: &mut InputSnapshot, index: usize) -> Result<&mut Stylist> {
    input
        .stylists
        .get_mut(index)
        .ok_or_else(|| no_such("stylist", index))
}

fn roster_mut(input: &mut InputSnapshot, role: WageRole) -> &mut Vec<WageEarner> {
    match role {
        WageRole::Trainee => &mut input.trainees,
        WageRole::Receptionist => &mut input.receptionists,
    }
}

fn role_label(role: WageRole) -> &'static str {
    match role {
        WageRole::Trainee => "trainee",
        WageRole::Receptionist => "receptionist",
    }
}

fn no_such(what: &str, index: usize) -> PlannerError {
    PlannerError::validation(format!("no {what} at position {index}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::MemoryScenarioStore;

    fn session() -> PlannerSession {
        PlannerSession::new("owner", InputSnapshot::default()).unwrap()
    }

    #[test]
    fn edits_push_history_and_undo_restores() {
        let mut s = session();
        s.set_stylist_sales(0, 900.0).unwrap();
        s.set_retail_percentage(15.0).unwrap();
        assert_eq!(s.history().len(), 2);

        assert_eq!(s.undo(), Undo::Restored);
        assert_eq!(s.input().retail_percentage, 0.0);
        assert_eq!(s.input().stylists[0].weekly_sales, 900.0);
        assert_eq!(s.undo(), Undo::Restored);
        assert_eq!(s.input(), &InputSnapshot::default());
        assert_eq!(s.undo(), Undo::NothingToUndo);
    }

    #[test]
    fn unchanged_values_do_not_push() {
        let mut s = session();
        s.set_retail_percentage(0.0).unwrap();
        assert!(s.history().is_empty());
    }

    #[test]
    fn invalid_edits_leave_state_untouched() {
        let mut s = session();
        assert!(s.set_stylist_sales(0, -1.0).is_err());
        assert!(s.set_stylist_sales(5, 100.0).is_err());
        assert!(s.remove_wage_earner(WageRole::Receptionist, 3).is_err());
        let mut settings = SalarySettings::default();
        settings.national_insurance_pct = -2.0;
        assert!(s.set_salary_settings(settings).is_err());
        assert!(s.history().is_empty());
        assert_eq!(s.input(), &InputSnapshot::default());
    }

    #[test]
    fn derived_percentages_are_not_editable() {
        let mut s = session();
        assert!(s
            .set_variable_cost_percentage(VariableCostCategory::Wages, 30.0)
            .is_err());
        s.set_variable_cost_percentage(VariableCostCategory::RetailStock, 50.0)
            .unwrap();
        assert_eq!(
            s.input().variable_cost_percentages[&VariableCostCategory::RetailStock],
            50.0
        );
    }

    #[test]
    fn roster_edits() {
        let mut s = session();
        s.add_stylist(Stylist::new("Bea", 600.0, 200.0)).unwrap();
        s.rename_stylist(0, "Ana").unwrap();
        s.remove_stylist(1).unwrap();
        s.add_wage_earner(WageRole::Trainee, WageEarner::new("Tom", 210.0))
            .unwrap();
        s.set_wage(WageRole::Receptionist, 0, 260.0).unwrap();
        s.set_fixed_cost(FixedCostCategory::Rent, 1200.0).unwrap();
        s.set_additional_income(IncomeCategory::RentalIncome, 400.0)
            .unwrap();

        let input = s.input();
        assert_eq!(input.stylists.len(), 1);
        assert_eq!(input.stylists[0].name, "Ana");
        assert_eq!(input.trainees.len(), 2);
        assert_eq!(input.receptionists[0].weekly_wage, 260.0);
        assert_eq!(s.history().len(), 7);
    }

    #[test]
    fn recompute_writes_derived_percentages() {
        let mut s = session();
        s.set_stylist_sales(0, 1000.0).unwrap();
        s.set_retail_percentage(20.0).unwrap();
        let mut settings = SalarySettings::default();
        settings.retail_commission_pct = 10.0;
        s.set_salary_settings(settings).unwrap();
        s.recompute().unwrap();
        let pct = s.input().variable_cost_percentages[&VariableCostCategory::RetailCommission];
        assert!((pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_lifecycle() {
        let store = MemoryScenarioStore::new();
        let mut s = session();
        s.set_stylist_sales(0, 1000.0).unwrap();
        s.save_scenario(&store, "Base", "starting point").unwrap();
        assert_eq!(s.active_scenario(), "Base");

        s.set_stylist_sales(0, 2000.0).unwrap();
        s.save_scenario(&store, "Growth", "").unwrap();

        let err = s.delete_scenario(&store, "Growth").unwrap_err();
        assert!(matches!(err, PlannerError::ScenarioActive(_)));
        let err = s.delete_scenario(&store, " Growth ").unwrap_err();
        assert!(matches!(err, PlannerError::ScenarioActive(_)));

        let metrics = s.load_scenario(&store, "Base").unwrap();
        assert_eq!(metrics.weekly_service_sales, 1000.0);
        assert_eq!(s.active_scenario(), "Base");
        s.delete_scenario(&store, "Growth").unwrap();
        assert_eq!(store.list("owner").unwrap().len(), 1);

        // Loading is undoable.
        assert_eq!(s.undo(), Undo::Restored);
        assert_eq!(s.input().stylists[0].weekly_sales, 2000.0);
    }
}
