use crate::config::{ComparativeStrategy, EngineConfig};
use crate::error::{DreError, Result};
use crate::export::{ExportedFile, ReportExporter};
use crate::schema::{
    checked_total, ComparativeSeries, DreReport, LedgerEntry, LedgerSummary, MonthlyStatement,
    PayableStatus, ReceivableStatus, TenantId,
};
use crate::store::{DateField, LedgerQuery, LedgerStore};
use crate::utils::{year_window, DateWindow, ReportPeriod};
use chrono::Datelike;
use futures::future::try_join_all;
use log::{debug, info, warn};
use rust_decimal::Decimal;

/// Computes income statements from a tenant's receivables and payables.
///
/// Stateless: every call reads the store afresh, so results reflect whatever
/// the store returns at that moment.
pub struct DreEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: LedgerStore> DreEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(store: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hands the store back, e.g. to close it on shutdown.
    pub fn into_store(self) -> S {
        self.store
    }

    fn date_field(&self) -> DateField {
        self.config.recognition_basis.date_field()
    }

    fn revenue_query(&self, tenant_id: TenantId, window: DateWindow) -> LedgerQuery<ReceivableStatus> {
        LedgerQuery::for_tenant(tenant_id)
            .within(window, self.date_field())
            .with_status(ReceivableStatus::Collected)
    }

    fn expense_query(&self, tenant_id: TenantId, window: DateWindow) -> LedgerQuery<PayableStatus> {
        LedgerQuery::for_tenant(tenant_id)
            .within(window, self.date_field())
            .with_status(PayableStatus::Paid)
    }

    pub async fn monthly_statement(
        &self,
        tenant_id: TenantId,
        month: u32,
        year: i32,
    ) -> Result<MonthlyStatement> {
        let period = ReportPeriod::new(year, month)?;
        let window = period.window()?;

        let revenue_query = self.revenue_query(tenant_id, window);
        let expense_query = self.expense_query(tenant_id, window);
        let (receivables, payables) = futures::try_join!(
            self.store.query_receivables(&revenue_query),
            self.store.query_payables(&expense_query),
        )?;

        let revenue = sum_matching(&revenue_query, &receivables)?;
        let expense = sum_matching(&expense_query, &payables)?;
        debug!(
            "Tenant {} {}: {} receivables -> {}, {} payables -> {}",
            tenant_id,
            period,
            receivables.len(),
            revenue,
            payables.len(),
            expense
        );

        MonthlyStatement::from_totals(period, revenue, expense)
    }

    pub async fn comparative_series(&self, tenant_id: TenantId, year: i32) -> Result<ComparativeSeries> {
        info!(
            "Building comparative series for tenant {} year {} ({:?})",
            tenant_id, year, self.config.comparative_strategy
        );

        let entries = match self.config.comparative_strategy {
            ComparativeStrategy::PerMonth => {
                try_join_all((1..=12).map(|month| self.monthly_statement(tenant_id, month, year)))
                    .await?
            }
            ComparativeStrategy::SingleRangeQuery => self.bucketed_year(tenant_id, year).await?,
        };

        ComparativeSeries::from_entries(year, entries)
    }

    /// One fetch per ledger for the whole year, split into months client-side.
    async fn bucketed_year(&self, tenant_id: TenantId, year: i32) -> Result<Vec<MonthlyStatement>> {
        let window = year_window(year)?;
        let revenue_query = self.revenue_query(tenant_id, window);
        let expense_query = self.expense_query(tenant_id, window);
        let (receivables, payables) = futures::try_join!(
            self.store.query_receivables(&revenue_query),
            self.store.query_payables(&expense_query),
        )?;

        let revenue = bucket_by_month(&revenue_query, &receivables)?;
        let expense = bucket_by_month(&expense_query, &payables)?;

        (1..=12u32)
            .map(|month| {
                let idx = month as usize - 1;
                MonthlyStatement::from_totals(ReportPeriod::new(year, month)?, revenue[idx], expense[idx])
            })
            .collect()
    }

    /// Monthly statement plus, when exports want it, the year's comparative series.
    pub async fn report(&self, tenant_id: TenantId, month: u32, year: i32) -> Result<DreReport> {
        info!("Building DRE report for tenant {} {:04}-{:02}", tenant_id, year, month);

        let statement = self.monthly_statement(tenant_id, month, year).await?;
        let comparative = if self.config.export.include_comparative {
            Some(self.comparative_series(tenant_id, year).await?)
        } else {
            None
        };

        Ok(DreReport {
            tenant_id,
            statement,
            comparative,
        })
    }

    pub async fn export_to_spreadsheet(
        &self,
        tenant_id: TenantId,
        month: u32,
        year: i32,
    ) -> Result<ExportedFile> {
        let report = self.report(tenant_id, month, year).await?;
        ReportExporter::new(&self.config.export).to_spreadsheet(&report)
    }

    pub async fn export_to_pdf(&self, tenant_id: TenantId, month: u32, year: i32) -> Result<ExportedFile> {
        let report = self.report(tenant_id, month, year).await?;
        ReportExporter::new(&self.config.export).to_pdf(&report)
    }

    /// Ledger-wide totals for the dashboard. Every row counts towards the
    /// totals whatever its status; only rows marked overdue count as overdue.
    pub async fn ledger_summary(&self, tenant_id: TenantId) -> Result<LedgerSummary> {
        let receivable_query: LedgerQuery<ReceivableStatus> = LedgerQuery::for_tenant(tenant_id);
        let payable_query: LedgerQuery<PayableStatus> = LedgerQuery::for_tenant(tenant_id);
        let (receivables, payables) = futures::try_join!(
            self.store.query_receivables(&receivable_query),
            self.store.query_payables(&payable_query),
        )?;

        let (total_receivables, overdue_receivables) =
            ledger_totals(&receivable_query, &receivables, ReceivableStatus::Overdue)?;
        let (total_payables, overdue_payables) =
            ledger_totals(&payable_query, &payables, PayableStatus::Overdue)?;

        let net_projection = total_receivables
            .checked_sub(total_payables)
            .ok_or_else(|| DreError::InvalidInput("net projection is out of decimal range".to_string()))?;

        debug!(
            "Tenant {} summary: receivables {} ({} overdue), payables {} ({} overdue)",
            tenant_id, total_receivables, overdue_receivables, total_payables, overdue_payables
        );

        Ok(LedgerSummary {
            total_receivables,
            total_payables,
            net_projection,
            overdue_receivables,
            overdue_payables,
        })
    }
}

/// Sums the rows that satisfy `query`. Rows a store returns outside the query
/// (another tenant, wrong status or date) are dropped, never counted.
fn sum_matching<E: LedgerEntry>(query: &LedgerQuery<E::Status>, rows: &[E]) -> Result<Decimal> {
    let mut total = Decimal::ZERO;
    let mut dropped = 0usize;
    for row in rows {
        if query.matches(row) {
            total = checked_total(total, row.amount())?;
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        warn!(
            "Store returned {} rows outside the query for tenant {}; ignored",
            dropped, query.tenant_id
        );
    }
    Ok(total)
}

fn bucket_by_month<E: LedgerEntry>(query: &LedgerQuery<E::Status>, rows: &[E]) -> Result<[Decimal; 12]> {
    let mut buckets = [Decimal::ZERO; 12];
    for row in rows.iter().filter(|r| query.matches(*r)) {
        let date = match query.date_field {
            DateField::Scheduled => Some(row.scheduled_date()),
            DateField::Settled => row.settled_date(),
        };
        if let Some(date) = date {
            let idx = date.month0() as usize;
            buckets[idx] = checked_total(buckets[idx], row.amount())?;
        }
    }
    Ok(buckets)
}

/// Total amount of the rows matching `query`, and how many carry `overdue_status`.
fn ledger_totals<E: LedgerEntry>(
    query: &LedgerQuery<E::Status>,
    rows: &[E],
    overdue_status: E::Status,
) -> Result<(Decimal, usize)> {
    let mut total = Decimal::ZERO;
    let mut overdue = 0usize;
    for row in rows.iter().filter(|r| query.matches(*r)) {
        total = checked_total(total, row.amount())?;
        if row.status() == overdue_status {
            overdue += 1;
        }
    }
    Ok((total, overdue))
}
