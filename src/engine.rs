//! Derivation engine.
//!
//! The `engine` module turns an [`InputSnapshot`] into [`Metrics`]:
//! sales, payroll, variable and fixed costs, and profit.  It is a pure
//! function of its input.  The two payroll-derived variable cost
//! percentages are returned alongside the metrics in a [`Computation`]
//! rather than written into the caller's snapshot; use
//! [`compute_and_apply`] when the caller wants them written back.
//!
//! Per-stylist payroll rows are computed with [`rayon`] and summed
//! sequentially afterwards, so totals do not depend on thread
//! scheduling.

use crate::error::Result;
use crate::models::{
    check_amount, InputSnapshot, Metrics, SalesBase, Stylist, StylistEarnings,
    VariableCostCategory, VariableCostPercentages,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const WEEKS_PER_YEAR: f64 = 52.0;
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Converts a weekly amount to a monthly one (× 52/12).  Multiplying
/// before dividing keeps whole-number weekly figures exact.
pub fn weekly_to_monthly(weekly: f64) -> f64 {
    weekly * WEEKS_PER_YEAR / MONTHS_PER_YEAR
}

/// Converts a monthly amount to a weekly one (× 12/52).
pub fn monthly_to_weekly(monthly: f64) -> f64 {
    monthly * MONTHS_PER_YEAR / WEEKS_PER_YEAR
}

/// `numerator / denominator × 100`, or 0 when the denominator is not
/// positive.
pub(crate) fn percentage_of(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}

/// Result of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computation {
    pub metrics: Metrics,
    /// The input's variable cost percentages with the two derived
    /// entries recomputed from payroll.  A derived entry keeps its input
    /// value when its sales base is zero.
    pub variable_cost_percentages: VariableCostPercentages,
}

/// Runs the derivation engine over `input`.
///
/// Fails when the snapshot is structurally invalid, or when its amounts
/// are so large that a derived figure overflows.  Zero sales and other
/// zero denominators yield 0 for the affected ratios.
pub fn compute(input: &InputSnapshot) -> Result<Computation> {
    input.validate_structure()?;

    // Sales
    let weekly_service_sales: f64 = input.stylists.iter().map(|s| s.weekly_sales).sum();
    let weekly_retail_sales = weekly_service_sales * (input.retail_percentage / 100.0);
    let weekly_total_sales = weekly_service_sales + weekly_retail_sales;

    let monthly_service_sales = weekly_to_monthly(weekly_service_sales);
    let monthly_retail_sales = weekly_to_monthly(weekly_retail_sales);
    let total_additional_income: f64 = input.additional_income.values().sum();
    let monthly_service_retail_sales = weekly_to_monthly(weekly_total_sales);
    let monthly_total_sales = monthly_service_retail_sales + total_additional_income;

    let total_fixed_costs: f64 = input.fixed_costs.values().sum();

    // Payroll
    let settings = &input.salary_settings;
    let stylists: Vec<StylistEarnings> = input
        .stylists
        .par_iter()
        .map(|stylist| {
            stylist_earnings(
                stylist,
                weekly_service_sales,
                weekly_retail_sales,
                settings.service_commission_pct,
                settings.retail_commission_pct,
            )
        })
        .collect();
    let weekly_stylist_salary_cost: f64 = stylists.iter().map(|e| e.weekly_total).sum();
    let weekly_retail_commission: f64 = stylists.iter().map(|e| e.retail_commission).sum();

    let weekly_trainee_salary_cost: f64 = input.trainees.iter().map(|t| t.weekly_wage).sum();
    let weekly_receptionist_salary_cost: f64 =
        input.receptionists.iter().map(|r| r.weekly_wage).sum();

    let weekly_salary_cost =
        weekly_stylist_salary_cost + weekly_trainee_salary_cost + weekly_receptionist_salary_cost;
    let weekly_ni_cost = weekly_salary_cost * (settings.national_insurance_pct / 100.0);
    let weekly_pension_cost = weekly_salary_cost * (settings.pension_contribution_pct / 100.0);
    let weekly_total_salary_cost = weekly_salary_cost + weekly_ni_cost + weekly_pension_cost;

    let monthly_salary_cost = weekly_to_monthly(weekly_total_salary_cost);
    let monthly_retail_commission = weekly_to_monthly(weekly_retail_commission);

    // Payroll feeds back into the two derived variable cost percentages.
    let mut percentages = input.variable_cost_percentages.clone();
    if monthly_total_sales > 0.0 {
        percentages.insert(
            VariableCostCategory::Wages,
            (monthly_salary_cost - monthly_retail_commission) / monthly_total_sales * 100.0,
        );
    }
    if monthly_retail_sales > 0.0 {
        percentages.insert(
            VariableCostCategory::RetailCommission,
            monthly_retail_commission / monthly_retail_sales * 100.0,
        );
    }

    let mut variable_costs = BTreeMap::new();
    let mut total_variable_costs = 0.0;
    for (&category, &percentage) in &percentages {
        let base = match category.base() {
            SalesBase::RetailSales => monthly_retail_sales,
            SalesBase::ServiceSales => monthly_service_sales,
            SalesBase::TotalSales => monthly_total_sales,
        };
        let cost = base * (percentage / 100.0);
        variable_costs.insert(category, cost);
        total_variable_costs += cost;
    }

    let profit = monthly_total_sales - total_fixed_costs - total_variable_costs;
    let profit_margin = percentage_of(profit, monthly_total_sales);
    let total_wage_cost_percentage = percentage_of(monthly_salary_cost, monthly_total_sales);

    debug!(
        stylists = stylists.len(),
        monthly_total_sales, profit, "computed salon metrics"
    );

    let metrics = Metrics {
        weekly_service_sales,
        weekly_retail_sales,
        weekly_total_sales,
        weekly_stylist_salary_cost,
        weekly_trainee_salary_cost,
        weekly_receptionist_salary_cost,
        weekly_salary_cost,
        weekly_retail_commission,
        weekly_ni_cost,
        weekly_pension_cost,
        weekly_total_salary_cost,
        monthly_service_sales,
        monthly_retail_sales,
        monthly_service_retail_sales,
        total_additional_income,
        monthly_total_sales,
        monthly_stylist_salary_cost: weekly_to_monthly(weekly_stylist_salary_cost),
        monthly_trainee_salary_cost: weekly_to_monthly(weekly_trainee_salary_cost),
        monthly_receptionist_salary_cost: weekly_to_monthly(weekly_receptionist_salary_cost),
        monthly_base_salary_cost: weekly_to_monthly(weekly_salary_cost),
        monthly_ni_cost: weekly_to_monthly(weekly_ni_cost),
        monthly_pension_cost: weekly_to_monthly(weekly_pension_cost),
        monthly_salary_cost,
        monthly_retail_commission,
        total_fixed_costs,
        variable_costs,
        total_variable_costs,
        profit,
        profit_margin,
        total_wage_cost_percentage,
        stylists,
    };
    metrics.ensure_finite()?;
    for (category, percentage) in &percentages {
        check_amount(*percentage, category, false)?;
    }
    Ok(Computation {
        metrics,
        variable_cost_percentages: percentages,
    })
}

/// Runs [`compute`] and writes the recomputed variable cost percentages
/// back into `input`, as an interactive session expects.
pub fn compute_and_apply(input: &mut InputSnapshot) -> Result<Metrics> {
    let Computation {
        metrics,
        variable_cost_percentages,
    } = compute(input)?;
    input.variable_cost_percentages = variable_cost_percentages;
    Ok(metrics)
}

/// Computes several snapshots in parallel, preserving order.
pub fn compute_many(inputs: &[InputSnapshot]) -> Result<Vec<Computation>> {
    inputs.par_iter().map(compute).collect()
}

fn stylist_earnings(
    stylist: &Stylist,
    weekly_service_sales: f64,
    weekly_retail_sales: f64,
    service_commission_pct: f64,
    retail_commission_pct: f64,
) -> StylistEarnings {
    let service_commission = stylist.weekly_sales * (service_commission_pct / 100.0);
    let retail_share = if weekly_service_sales > 0.0 {
        stylist.weekly_sales / weekly_service_sales * weekly_retail_sales
    } else {
        0.0
    };
    let retail_commission = retail_share * (retail_commission_pct / 100.0);
    let service_earnings = stylist.weekly_guarantee.max(service_commission);
    let weekly_total = service_earnings + retail_commission;
    StylistEarnings {
        name: stylist.name.clone(),
        weekly_sales: stylist.weekly_sales,
        service_commission,
        retail_share,
        retail_commission,
        service_earnings,
        guarantee_applied: stylist.weekly_guarantee > service_commission,
        weekly_total,
        monthly_total: weekly_to_monthly(weekly_total),
    }
}
