use crate::schema::MonthlyStatement;
use crate::utils::{format_money, ReportPeriod};
use log::warn;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum AlertKind {
    #[serde(rename = "receita_baixa", alias = "low_revenue")]
    #[schemars(description = "Fires when monthly revenue is below the threshold")]
    LowRevenue,

    #[serde(rename = "despesa_alta", alias = "high_expense")]
    #[schemars(description = "Fires when monthly expense is above the threshold")]
    HighExpense,

    #[serde(rename = "margem_baixa", alias = "low_margin")]
    #[schemars(description = "Fires when the net margin percentage is below the threshold")]
    LowMargin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct AlertRule {
    pub kind: AlertKind,
    pub threshold: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl AlertRule {
    pub fn new(kind: AlertKind, threshold: Decimal) -> Self {
        Self {
            kind,
            threshold,
            active: true,
        }
    }

    /// The observed value when the rule fires for `statement`.
    pub fn check(&self, statement: &MonthlyStatement) -> Option<Decimal> {
        if !self.active {
            return None;
        }
        let (value, fired) = match self.kind {
            AlertKind::LowRevenue => (statement.total_revenue, statement.total_revenue < self.threshold),
            AlertKind::HighExpense => (statement.total_expense, statement.total_expense > self.threshold),
            AlertKind::LowMargin => (
                statement.net_margin_percent,
                statement.net_margin_percent < self.threshold,
            ),
        };
        fired.then_some(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct AlertTrigger {
    pub kind: AlertKind,
    pub period: ReportPeriod,
    pub value: Decimal,
    pub threshold: Decimal,
    pub message: String,
}

pub fn evaluate_alerts(statement: &MonthlyStatement, rules: &[AlertRule]) -> Vec<AlertTrigger> {
    let period = statement.period();
    rules
        .iter()
        .filter_map(|rule| {
            let value = rule.check(statement)?;
            let message = match rule.kind {
                AlertKind::LowRevenue => format!(
                    "Revenue for {} is {}, below the {} threshold",
                    period,
                    format_money(value),
                    format_money(rule.threshold)
                ),
                AlertKind::HighExpense => format!(
                    "Expense for {} is {}, above the {} threshold",
                    period,
                    format_money(value),
                    format_money(rule.threshold)
                ),
                AlertKind::LowMargin => format!(
                    "Net margin for {} is {}%, below the {}% threshold",
                    period,
                    format_money(value),
                    format_money(rule.threshold)
                ),
            };
            warn!("{}", message);
            Some(AlertTrigger {
                kind: rule.kind,
                period,
                value,
                threshold: rule.threshold,
                message,
            })
        })
        .collect()
}
