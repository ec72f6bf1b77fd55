//! Profit analysis built on top of [`Metrics`].
//!
//! Period summaries restate the monthly figures weekly (× 12/52) and
//! annually (× 12).  The profit model sweeps monthly sales from half to
//! double the current level, holding fixed costs constant and scaling
//! variable costs at the current variable cost ratio, and locates the
//! break-even point on that sweep.

use crate::engine::monthly_to_weekly;
use crate::format::{format_currency, format_percentage};
use crate::models::Metrics;
use serde::{Deserialize, Serialize};

/// Number of sales points sampled by [`profit_model`].
pub const PROFIT_MODEL_POINTS: usize = 100;
const SWEEP_LOW: f64 = 0.5;
const SWEEP_HIGH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Weekly,
    Monthly,
    Annual,
}

impl Period {
    fn scale_monthly(self, monthly: f64) -> f64 {
        match self {
            Period::Weekly => monthly_to_weekly(monthly),
            Period::Monthly => monthly,
            Period::Annual => monthly * 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub total_sales: f64,
    pub fixed_costs: f64,
    pub variable_costs: f64,
    pub profit: f64,
    /// Identical for every period.
    pub profit_margin: f64,
}

pub fn period_summary(metrics: &Metrics, period: Period) -> PeriodSummary {
    PeriodSummary {
        period,
        total_sales: period.scale_monthly(metrics.monthly_total_sales),
        fixed_costs: period.scale_monthly(metrics.total_fixed_costs),
        variable_costs: period.scale_monthly(metrics.total_variable_costs),
        profit: period.scale_monthly(metrics.profit),
        profit_margin: metrics.profit_margin,
    }
}

/// Weekly, monthly and annual summaries, in that order.
pub fn period_summaries(metrics: &Metrics) -> Vec<PeriodSummary> {
    [Period::Weekly, Period::Monthly, Period::Annual]
        .into_iter()
        .map(|period| period_summary(metrics, period))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitPoint {
    pub sales: f64,
    pub fixed_costs: f64,
    pub variable_costs: f64,
    pub total_costs: f64,
    pub profit: f64,
}

/// Where current sales sit relative to break-even.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "position", rename_all = "snake_case")]
pub enum BreakEvenPosition {
    Below { increase_needed: f64 },
    AtOrAbove { safety_margin: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakEven {
    /// Monthly sales at the first sampled point with non-negative profit.
    pub sales: f64,
    /// Current monthly sales divided by break-even sales.
    pub sales_ratio: f64,
    #[serde(flatten)]
    pub position: BreakEvenPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitModel {
    pub current_sales: f64,
    pub current_profit: f64,
    /// Share of sales consumed by variable costs at the current level
    /// (0-1 scale), or 0 when there are no sales.
    pub variable_cost_ratio: f64,
    pub points: Vec<ProfitPoint>,
    /// Present only when a sampled point breaks even at positive sales.
    pub break_even: Option<BreakEven>,
}

pub fn profit_model(metrics: &Metrics) -> ProfitModel {
    let current_sales = metrics.monthly_total_sales;
    let fixed_costs = metrics.total_fixed_costs;
    let variable_cost_ratio = if current_sales > 0.0 {
        metrics.total_variable_costs / current_sales
    } else {
        0.0
    };

    let low = current_sales * SWEEP_LOW;
    let high = current_sales * SWEEP_HIGH;
    let step = (high - low) / (PROFIT_MODEL_POINTS - 1) as f64;
    let points: Vec<ProfitPoint> = (0..PROFIT_MODEL_POINTS)
        .map(|i| {
            let sales = low + step * i as f64;
            let variable_costs = sales * variable_cost_ratio;
            let total_costs = fixed_costs + variable_costs;
            ProfitPoint {
                sales,
                fixed_costs,
                variable_costs,
                total_costs,
                profit: sales - total_costs,
            }
        })
        .collect();

    let break_even = points
        .iter()
        .find(|p| p.profit >= 0.0)
        .map(|p| p.sales)
        .filter(|sales| *sales > 0.0)
        .map(|sales| BreakEven {
            sales,
            sales_ratio: current_sales / sales,
            position: if current_sales < sales {
                BreakEvenPosition::Below {
                    increase_needed: sales - current_sales,
                }
            } else {
                BreakEvenPosition::AtOrAbove {
                    safety_margin: current_sales - sales,
                }
            },
        });

    ProfitModel {
        current_sales,
        current_profit: metrics.profit,
        variable_cost_ratio,
        points,
        break_even,
    }
}

/// Plain-language highlights of the current plan and its break-even
/// position.
pub fn key_insights(metrics: &Metrics, model: &ProfitModel) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Current monthly sales: {}",
            format_currency(metrics.monthly_total_sales)
        ),
        format!(
            "Current monthly profit: {} ({})",
            format_currency(metrics.profit),
            format_percentage(metrics.profit_margin)
        ),
        format!(
            "Annual projected profit: {}",
            format_currency(period_summary(metrics, Period::Annual).profit)
        ),
    ];
    if let Some(break_even) = &model.break_even {
        lines.push(format!(
            "Break-even point: {} monthly sales",
            format_currency(break_even.sales)
        ));
        lines.push(format!(
            "Current sales-to-break-even ratio: {:.2}x",
            break_even.sales_ratio
        ));
        lines.push(match break_even.position {
            BreakEvenPosition::Below { increase_needed } => format!(
                "Increase monthly sales by {} to break even",
                format_currency(increase_needed)
            ),
            BreakEvenPosition::AtOrAbove { safety_margin } => format!(
                "Sales are {} above break-even",
                format_currency(safety_margin)
            ),
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compute;
    use crate::models::{FixedCostCategory, InputSnapshot, Stylist};

    fn metrics_with(weekly_sales: f64, rent: f64) -> Metrics {
        let mut input = InputSnapshot::default();
        input.stylists = vec![Stylist::new("A", weekly_sales, 0.0)];
        input.salary_settings.service_commission_pct = 40.0;
        input.fixed_costs.insert(FixedCostCategory::Rent, rent);
        compute(&input).unwrap().metrics
    }

    #[test]
    fn periods_scale_from_monthly() {
        let metrics = metrics_with(1200.0, 1000.0);
        let summaries = period_summaries(&metrics);
        assert_eq!(summaries.len(), 3);
        let monthly = &summaries[1];
        assert_eq!(monthly.total_sales, 5200.0);
        assert_eq!(summaries[0].total_sales, 1200.0);
        assert_eq!(summaries[2].total_sales, 62_400.0);
        assert_eq!(summaries[2].fixed_costs, 12_000.0);
        assert!(summaries.iter().all(|s| s.profit_margin == metrics.profit_margin));
    }

    #[test]
    fn model_sweeps_half_to_double() {
        let metrics = metrics_with(1200.0, 1000.0);
        let model = profit_model(&metrics);
        assert_eq!(model.points.len(), PROFIT_MODEL_POINTS);
        assert_eq!(model.points[0].sales, 2600.0);
        assert!((model.points[PROFIT_MODEL_POINTS - 1].sales - 10_400.0).abs() < 1e-9);
        assert!((model.variable_cost_ratio - 0.4).abs() < 1e-12);
        assert!(model.points.iter().all(|p| p.fixed_costs == 1000.0));
    }

    #[test]
    fn break_even_below_current_sales() {
        // 60% of sales left after wages; rent 1000 breaks even at ~1666.67,
        // under the bottom of the sweep, so the first point qualifies.
        let metrics = metrics_with(1200.0, 1000.0);
        let be = profit_model(&metrics).break_even.unwrap();
        assert_eq!(be.sales, 2600.0);
        assert!(matches!(
            be.position,
            BreakEvenPosition::AtOrAbove { safety_margin } if safety_margin == 2600.0
        ));
        assert_eq!(be.sales_ratio, 2.0);
    }

    #[test]
    fn break_even_above_current_sales() {
        let metrics = metrics_with(1200.0, 4000.0);
        let model = profit_model(&metrics);
        let be = model.break_even.unwrap();
        assert!(be.sales > metrics.monthly_total_sales);
        assert!(be.sales * 0.6 >= 4000.0 - 1e-6);
        match be.position {
            BreakEvenPosition::Below { increase_needed } => {
                assert!((increase_needed - (be.sales - 5200.0)).abs() < 1e-9)
            }
            other => panic!("unexpected position {other:?}"),
        }
    }

    #[test]
    fn no_break_even_when_costs_outrun_the_sweep() {
        let metrics = metrics_with(100.0, 50_000.0);
        assert!(profit_model(&metrics).break_even.is_none());
    }

    #[test]
    fn zero_sales_has_no_break_even() {
        let metrics = metrics_with(0.0, 0.0);
        let model = profit_model(&metrics);
        assert_eq!(model.variable_cost_ratio, 0.0);
        assert!(model.break_even.is_none());
    }

    #[test]
    fn insights_mention_break_even() {
        let metrics = metrics_with(1200.0, 4000.0);
        let model = profit_model(&metrics);
        let lines = key_insights(&metrics, &model);
        assert_eq!(lines[0], "Current monthly sales: £5,200.00");
        assert!(lines.iter().any(|l| l.starts_with("Break-even point: £")));
        assert!(lines.last().unwrap().starts_with("Increase monthly sales by"));

        let lines = key_insights(&metrics_with(0.0, 0.0), &profit_model(&metrics_with(0.0, 0.0)));
        assert_eq!(lines.len(), 3);
    }
}
