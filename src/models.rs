//! Data models for the Salon Planner.
//!
//! The `models` module defines the serialisable input snapshot (staff
//! rosters, percentages and cost tables) and the metrics produced by the
//! derivation engine.  The input snapshot is the unit of undo, scenario
//! save/load and persistence; metrics are always recomputed from it.
//!
//! Cost and income tables are keyed by closed category enums.  Each
//! category serialises as its display label (for example `"Rent"` or
//! `"Retail Commission"`), so the JSON shape matches what the planner has
//! always persisted.

use crate::error::{PlannerError, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A closed set of named categories used as keys in a cost or income
/// table.  Every table must contain exactly the categories in
/// [`Category::ALL`].
pub trait Category: Copy + Ord + fmt::Debug + fmt::Display + 'static {
    /// All categories, in display order.
    const ALL: &'static [Self];
    /// Human-readable label, also used as the JSON key.
    fn label(self) -> &'static str;

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.label() == label)
    }
}

macro_rules! category_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl Category for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let label = String::deserialize(deserializer)?;
                Self::from_label(&label)
                    .ok_or_else(|| de::Error::unknown_variant(&label, &[$($label),+]))
            }
        }
    };
}

category_enum! {
    /// Monthly fixed cost categories.  Amounts are entered directly as
    /// monthly figures; no weekly conversion applies.
    FixedCostCategory {
        Rent => "Rent",
        Rates => "Rates, Refuse & Bid",
        Water => "Water & sewerage",
        RepairsAndRenewals => "R & R",
        Utilities => "Utilities",
        Telephone => "Telephone",
        Insurance => "Insurance",
        Cleaning => "Cleaning, laundry etc",
        CardFees => "Card fees",
        Stationery => "Stationery & printing",
        Advertising => "Advertising budget",
        Promotions => "PR & promotions budget",
        Sundries => "Sundries",
        Professional => "Legal, prof & accountancy",
        BankCharges => "Bank charges",
        Other1 => "Other 1",
        Other2 => "Other 2",
    }
}

category_enum! {
    /// Variable cost categories, each expressed as a percentage of a
    /// sales base (see [`VariableCostCategory::base`]).
    VariableCostCategory {
        Wages => "Wages/Salaries (excluding retail commission)",
        RetailCommission => "Retail Commission",
        ProfessionalStock => "Professional Stock",
        RetailStock => "Retail Stock",
        Royalties => "Royalties/Franchise Fee",
    }
}

category_enum! {
    /// Monthly income that is not service or retail sales.  Added
    /// unconditionally to revenue.
    IncomeCategory {
        MarketingSupport => "Marketing Support",
        RetroPayments => "Retro Payments",
        TrainingIncome => "Training Income",
        RentalIncome => "Rental Income",
        Other1 => "Other 1",
        Other2 => "Other 2",
    }
}

/// The sales figure a variable cost percentage is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalesBase {
    /// Monthly service + retail sales plus additional income.
    TotalSales,
    /// Monthly service sales only.
    ServiceSales,
    /// Monthly retail sales only.
    RetailSales,
}

impl VariableCostCategory {
    /// Whether the engine overwrites this percentage from payroll
    /// results on every computation.  Derived entries are not user
    /// editable.
    pub fn is_derived(self) -> bool {
        matches!(self, Self::Wages | Self::RetailCommission)
    }

    pub fn base(self) -> SalesBase {
        match self {
            Self::RetailCommission | Self::RetailStock => SalesBase::RetailSales,
            Self::ProfessionalStock => SalesBase::ServiceSales,
            Self::Wages | Self::Royalties => SalesBase::TotalSales,
        }
    }
}

/// Monthly fixed costs by category.
pub type FixedCosts = BTreeMap<FixedCostCategory, f64>;
/// Variable cost percentages by category.
pub type VariableCostPercentages = BTreeMap<VariableCostCategory, f64>;
/// Monthly additional income by category.
pub type AdditionalIncome = BTreeMap<IncomeCategory, f64>;

/// Builds a table holding every category of `K` at zero.
pub fn zeroed_table<K: Category>() -> BTreeMap<K, f64> {
    K::ALL.iter().map(|k| (*k, 0.0)).collect()
}

/// A stylist on commission.  Sales and guarantee are weekly figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stylist {
    pub name: String,
    /// Weekly service sales taken by this stylist.
    #[serde(rename = "sales")]
    pub weekly_sales: f64,
    /// Weekly minimum service earnings.  The guarantee floors service
    /// earnings only; retail commission is always paid on top.
    #[serde(rename = "guarantee")]
    pub weekly_guarantee: f64,
}

impl Stylist {
    pub fn new(name: impl Into<String>, weekly_sales: f64, weekly_guarantee: f64) -> Self {
        Self {
            name: name.into(),
            weekly_sales,
            weekly_guarantee,
        }
    }
}

/// A trainee or receptionist paid a fixed weekly wage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WageEarner {
    pub name: String,
    #[serde(rename = "wage")]
    pub weekly_wage: f64,
}

impl WageEarner {
    pub fn new(name: impl Into<String>, weekly_wage: f64) -> Self {
        Self {
            name: name.into(),
            weekly_wage,
        }
    }
}

/// Commission and employer on-cost percentages.
///
/// Values are conventionally between 0 and 100 but are never clamped:
/// a value above 100 simply produces a derived figure larger than its
/// base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SalarySettings {
    #[serde(rename = "service_commission_percentage")]
    pub service_commission_pct: f64,
    #[serde(rename = "retail_commission_percentage")]
    pub retail_commission_pct: f64,
    #[serde(rename = "national_insurance_percentage")]
    pub national_insurance_pct: f64,
    #[serde(rename = "pension_contribution_percentage")]
    pub pension_contribution_pct: f64,
}

impl SalarySettings {
    fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("service_commission_percentage", self.service_commission_pct),
            ("retail_commission_percentage", self.retail_commission_pct),
            ("national_insurance_percentage", self.national_insurance_pct),
            ("pension_contribution_percentage", self.pension_contribution_pct),
        ]
    }
}

/// The complete set of business inputs.
///
/// An `InputSnapshot` is a plain value: the caller owns it, clones it
/// into the history buffer before mutations, and stores it wholesale in
/// scenarios.  The derivation engine reads it and never keeps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSnapshot {
    /// Stylists in display order.
    pub stylists: Vec<Stylist>,
    /// Retail sales as a percentage of aggregate weekly service sales.
    pub retail_percentage: f64,
    pub trainees: Vec<WageEarner>,
    pub receptionists: Vec<WageEarner>,
    pub fixed_costs: FixedCosts,
    /// Two of these entries are derived by the engine; see
    /// [`VariableCostCategory::is_derived`].
    #[serde(rename = "variable_costs_percentages")]
    pub variable_cost_percentages: VariableCostPercentages,
    pub salary_settings: SalarySettings,
    pub additional_income: AdditionalIncome,
}

impl Default for InputSnapshot {
    /// The starting plan for a new owner: one placeholder of each staff
    /// type and every table at zero.
    fn default() -> Self {
        Self {
            stylists: vec![Stylist::new("Stylist 1", 0.0, 0.0)],
            retail_percentage: 0.0,
            trainees: vec![WageEarner::new("Trainee 1", 0.0)],
            receptionists: vec![WageEarner::new("Reception 1", 0.0)],
            fixed_costs: zeroed_table(),
            variable_cost_percentages: zeroed_table(),
            salary_settings: SalarySettings::default(),
            additional_income: zeroed_table(),
        }
    }
}

impl InputSnapshot {
    /// Parses a snapshot from an untyped JSON value.  Wrong types and
    /// unknown keys are reported as validation errors, and the result is
    /// checked with [`InputSnapshot::validate`].
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let snapshot: Self = serde_json::from_value(value)
            .map_err(|e| PlannerError::validation(format!("malformed input snapshot: {e}")))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Structural check performed by the engine: every category table is
    /// complete and every number is finite.  Negative values pass; the
    /// engine applies its formulas to them unchanged.
    pub fn validate_structure(&self) -> Result<()> {
        self.check(false)
    }

    /// Full input model check: structure plus non-negative amounts.
    pub fn validate(&self) -> Result<()> {
        self.check(true)
    }

    fn check(&self, non_negative: bool) -> Result<()> {
        for (i, stylist) in self.stylists.iter().enumerate() {
            check_amount(stylist.weekly_sales, format_args!("stylists[{i}].sales"), non_negative)?;
            check_amount(
                stylist.weekly_guarantee,
                format_args!("stylists[{i}].guarantee"),
                non_negative,
            )?;
        }
        let rosters = [
            ("trainees", &self.trainees),
            ("receptionists", &self.receptionists),
        ];
        for (list, earners) in rosters {
            for (i, earner) in earners.iter().enumerate() {
                check_amount(earner.weekly_wage, format_args!("{list}[{i}].wage"), non_negative)?;
            }
        }
        check_amount(self.retail_percentage, "retail_percentage", non_negative)?;
        for (key, value) in self.salary_settings.fields() {
            check_amount(value, format_args!("salary_settings.{key}"), non_negative)?;
        }
        check_table(&self.fixed_costs, "fixed_costs", non_negative)?;
        check_table(
            &self.variable_cost_percentages,
            "variable_costs_percentages",
            non_negative,
        )?;
        check_table(&self.additional_income, "additional_income", non_negative)?;
        Ok(())
    }
}

/// Checks a single amount.  Non-finite values are always rejected.
pub(crate) fn check_amount(value: f64, field: impl fmt::Display, non_negative: bool) -> Result<()> {
    if !value.is_finite() {
        return Err(PlannerError::validation(format!("{field} must be a finite number")));
    }
    if non_negative && value < 0.0 {
        return Err(PlannerError::validation(format!(
            "{field} must not be negative (got {value})"
        )));
    }
    Ok(())
}

fn check_table<K: Category>(
    table: &BTreeMap<K, f64>,
    name: &str,
    non_negative: bool,
) -> Result<()> {
    // Unknown keys are rejected when deserialising, so only missing
    // categories need checking here.
    if let Some(missing) = K::ALL.iter().find(|k| !table.contains_key(k)) {
        return Err(PlannerError::validation(format!(
            "{name} is missing category {:?}",
            missing.label()
        )));
    }
    for (key, value) in table {
        check_amount(*value, format_args!("{name}[{:?}]", key.label()), non_negative)?;
    }
    Ok(())
}

/// Weekly payroll breakdown for one stylist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylistEarnings {
    pub name: String,
    pub weekly_sales: f64,
    pub service_commission: f64,
    /// This stylist's share of aggregate retail sales, allocated by
    /// their share of service sales.
    pub retail_share: f64,
    pub retail_commission: f64,
    /// The greater of the guarantee and the service commission.
    pub service_earnings: f64,
    /// True when the guarantee exceeded the service commission.
    pub guarantee_applied: bool,
    pub weekly_total: f64,
    pub monthly_total: f64,
}

/// Output of the derivation engine.
///
/// Sales and payroll figures are available both weekly and monthly so
/// that callers can display them without recomputation.  Cost, profit
/// and ratio figures are monthly.  Percentages are expressed on a 0-100
/// scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub weekly_service_sales: f64,
    pub weekly_retail_sales: f64,
    pub weekly_total_sales: f64,

    pub weekly_stylist_salary_cost: f64,
    pub weekly_trainee_salary_cost: f64,
    pub weekly_receptionist_salary_cost: f64,
    /// Stylists + trainees + receptionists, before NI and pension.
    pub weekly_salary_cost: f64,
    pub weekly_retail_commission: f64,
    pub weekly_ni_cost: f64,
    pub weekly_pension_cost: f64,
    /// Base salary cost plus NI and pension.
    pub weekly_total_salary_cost: f64,

    pub monthly_service_sales: f64,
    pub monthly_retail_sales: f64,
    pub monthly_service_retail_sales: f64,
    pub total_additional_income: f64,
    /// Service + retail sales plus additional income.  This is the base
    /// for "percentage of total sales" costs.
    pub monthly_total_sales: f64,

    pub monthly_stylist_salary_cost: f64,
    pub monthly_trainee_salary_cost: f64,
    pub monthly_receptionist_salary_cost: f64,
    pub monthly_base_salary_cost: f64,
    pub monthly_ni_cost: f64,
    pub monthly_pension_cost: f64,
    /// Monthly salary cost including NI and pension.
    pub monthly_salary_cost: f64,
    pub monthly_retail_commission: f64,

    pub total_fixed_costs: f64,
    /// Monthly cost per variable cost category.
    pub variable_costs: BTreeMap<VariableCostCategory, f64>,
    pub total_variable_costs: f64,
    pub profit: f64,
    pub profit_margin: f64,
    pub total_wage_cost_percentage: f64,

    pub stylists: Vec<StylistEarnings>,
}

impl Metrics {
    /// Fixed plus variable costs for the month.
    pub fn total_costs(&self) -> f64 {
        self.total_fixed_costs + self.total_variable_costs
    }

    /// Fails when any figure overflowed to infinity or became NaN.  Finite
    /// inputs can still get there when amounts are near `f64::MAX`.
    pub fn ensure_finite(&self) -> Result<()> {
        let scalars = [
            ("weekly_service_sales", self.weekly_service_sales),
            ("weekly_retail_sales", self.weekly_retail_sales),
            ("weekly_total_sales", self.weekly_total_sales),
            ("weekly_stylist_salary_cost", self.weekly_stylist_salary_cost),
            ("weekly_trainee_salary_cost", self.weekly_trainee_salary_cost),
            ("weekly_receptionist_salary_cost", self.weekly_receptionist_salary_cost),
            ("weekly_salary_cost", self.weekly_salary_cost),
            ("weekly_retail_commission", self.weekly_retail_commission),
            ("weekly_ni_cost", self.weekly_ni_cost),
            ("weekly_pension_cost", self.weekly_pension_cost),
            ("weekly_total_salary_cost", self.weekly_total_salary_cost),
            ("monthly_service_sales", self.monthly_service_sales),
            ("monthly_retail_sales", self.monthly_retail_sales),
            ("monthly_service_retail_sales", self.monthly_service_retail_sales),
            ("total_additional_income", self.total_additional_income),
            ("monthly_total_sales", self.monthly_total_sales),
            ("monthly_stylist_salary_cost", self.monthly_stylist_salary_cost),
            ("monthly_trainee_salary_cost", self.monthly_trainee_salary_cost),
            ("monthly_receptionist_salary_cost", self.monthly_receptionist_salary_cost),
            ("monthly_base_salary_cost", self.monthly_base_salary_cost),
            ("monthly_ni_cost", self.monthly_ni_cost),
            ("monthly_pension_cost", self.monthly_pension_cost),
            ("monthly_salary_cost", self.monthly_salary_cost),
            ("monthly_retail_commission", self.monthly_retail_commission),
            ("total_fixed_costs", self.total_fixed_costs),
            ("total_variable_costs", self.total_variable_costs),
            ("profit", self.profit),
            ("profit_margin", self.profit_margin),
            ("total_wage_cost_percentage", self.total_wage_cost_percentage),
        ];
        for (field, value) in scalars {
            check_derived(value, field)?;
        }
        for (category, value) in &self.variable_costs {
            check_derived(*value, format_args!("variable_costs[{:?}]", category.label()))?;
        }
        for (i, row) in self.stylists.iter().enumerate() {
            let fields = [
                ("service_commission", row.service_commission),
                ("retail_share", row.retail_share),
                ("retail_commission", row.retail_commission),
                ("service_earnings", row.service_earnings),
                ("weekly_total", row.weekly_total),
                ("monthly_total", row.monthly_total),
            ];
            for (field, value) in fields {
                check_derived(value, format_args!("stylists[{i}].{field}"))?;
            }
        }
        Ok(())
    }
}

fn check_derived(value: f64, field: impl fmt::Display) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PlannerError::validation(format!(
            "amounts are too large: {field} is not a finite number"
        )))
    }
}
