//! # DRE Engine
//!
//! A library for turning a tenant's receivables and payables into an income
//! statement (DRE, *Demonstrativo de Resultados*): a single-month snapshot, a
//! twelve-month comparative series, and spreadsheet/PDF renderings of both.
//!
//! ## Core Concepts
//!
//! - **Ledger rows**: [`Receivable`]s and [`Payable`]s, each owned by exactly one tenant
//! - **Recognition**: only Collected receivables and Paid payables count, windowed on
//!   their expected/due date (configurable, see [`RecognitionBasis`])
//! - **Statement**: revenue, expense, gross margin and net margin %, all decimal
//! - **Store**: any [`LedgerStore`]; the engine never writes to it
//!
//! ## Example
//!
//! ```rust,ignore
//! use dre_engine::*;
//! use chrono::NaiveDate;
//! use rust_decimal::Decimal;
//!
//! let store = InMemoryLedgerStore::new();
//! let tenant = TenantId::new(1)?;
//! let march = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
//! store
//!     .insert_receivable(Receivable::collected(tenant, Decimal::new(100000, 2), march, march))
//!     .await?;
//!
//! let engine = DreEngine::new(store);
//! let statement = engine.monthly_statement(tenant, 3, 2024).await?;
//! assert_eq!(statement.total_revenue, Decimal::new(100000, 2));
//! ```

pub mod alerts;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod schema;
pub mod store;
pub mod utils;

pub use alerts::{evaluate_alerts, AlertKind, AlertRule, AlertTrigger};
pub use config::{ComparativeStrategy, EngineConfig, ExportOptions, RecognitionBasis};
pub use engine::DreEngine;
pub use error::{DreError, Result};
pub use export::{ExportedFile, ReportExporter};
pub use schema::*;
pub use store::{DateField, InMemoryLedgerStore, LedgerQuery, LedgerStore, StorageError};
pub use utils::*;

use log::info;

/// Report plus whichever alert rules fire for its month.
#[derive(Debug, Clone)]
pub struct ReviewedReport {
    pub report: DreReport,
    pub alerts: Vec<AlertTrigger>,
}

pub async fn review_month<S: LedgerStore>(
    engine: &DreEngine<S>,
    tenant_id: TenantId,
    period: ReportPeriod,
    rules: &[AlertRule],
) -> Result<ReviewedReport> {
    let report = engine.report(tenant_id, period.month, period.year).await?;
    let alerts = evaluate_alerts(&report.statement, rules);

    info!(
        "Reviewed {} for tenant {}: {} alert(s) fired",
        period,
        tenant_id,
        alerts.len()
    );

    Ok(ReviewedReport { report, alerts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_review_month_end_to_end() {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantId::new(1).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        store
            .insert_receivable(Receivable::collected(tenant, Decimal::new(100000, 2), day, day))
            .await
            .unwrap();
        store
            .insert_payable(Payable::paid(tenant, Decimal::new(120000, 2), day, day))
            .await
            .unwrap();

        let engine = DreEngine::new(store);
        let rules = vec![
            AlertRule::new(AlertKind::LowMargin, Decimal::ZERO),
            AlertRule::new(AlertKind::LowRevenue, Decimal::new(500, 0)),
        ];
        let reviewed = review_month(&engine, tenant, ReportPeriod::new(2024, 3).unwrap(), &rules)
            .await
            .unwrap();

        assert_eq!(reviewed.report.statement.gross_margin, Decimal::new(-20000, 2));
        assert_eq!(reviewed.report.statement.net_margin_percent, Decimal::new(-2000, 2));
        assert_eq!(reviewed.alerts.len(), 1);
        assert_eq!(reviewed.alerts[0].kind, AlertKind::LowMargin);
        assert_eq!(reviewed.report.comparative.as_ref().map(|c| c.len()), Some(12));
    }
}
