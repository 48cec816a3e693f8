use crate::error::{DreError, Result};
use crate::utils::{ReportPeriod, MONEY_DECIMAL_PLACES};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the store assigns to a ledger row.
pub type RecordId = u64;

/// Tenant partition key. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TenantId(i64);

impl TenantId {
    pub fn new(id: i64) -> Result<Self> {
        if id <= 0 {
            return Err(DreError::InvalidInput(format!(
                "tenant id must be positive, got {}",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for TenantId {
    type Error = DreError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TenantId> for i64 {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl JsonSchema for TenantId {
    fn schema_name() -> String {
        "TenantId".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <i64>::json_schema(gen)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum ReceivableStatus {
    #[serde(rename = "Previsto", alias = "Forecast")]
    #[schemars(description = "Expected but not yet collected")]
    Forecast,

    #[serde(rename = "Recebido", alias = "Collected")]
    #[schemars(description = "Money has been received; received_date is set")]
    Collected,

    #[serde(rename = "Atrasado", alias = "Overdue")]
    #[schemars(description = "Past its expected date and still not collected")]
    Overdue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum PayableStatus {
    #[serde(rename = "Aberto", alias = "Open")]
    #[schemars(description = "Owed and not yet paid")]
    Open,

    #[serde(rename = "Pago", alias = "Paid")]
    #[schemars(description = "Settled; payment_date is set")]
    Paid,

    #[serde(rename = "Vencido", alias = "Overdue")]
    #[schemars(description = "Past its due date and still unpaid")]
    Overdue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum CostType {
    #[serde(rename = "FIXO", alias = "Fixed")]
    Fixed,

    #[serde(rename = "VARIÁVEL", alias = "Variable")]
    Variable,
}

/// Read access shared by receivables and payables, so filtering and summing
/// is written once.
pub trait LedgerEntry {
    type Status: Copy + PartialEq;

    fn tenant_id(&self) -> TenantId;
    fn amount(&self) -> Decimal;
    fn status(&self) -> Self::Status;
    /// Expected date for receivables, due date for payables.
    fn scheduled_date(&self) -> NaiveDate;
    /// Received date for receivables, payment date for payables.
    fn settled_date(&self) -> Option<NaiveDate>;
    /// Collected / Paid.
    fn is_settled(&self) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Receivable {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[schemars(description = "Non-negative amount with at most two fractional digits")]
    pub amount: Decimal,
    pub expected_date: NaiveDate,
    #[serde(default)]
    pub received_date: Option<NaiveDate>,
    pub status: ReceivableStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Receivable {
    pub fn forecast(tenant_id: TenantId, amount: Decimal, expected_date: NaiveDate) -> Self {
        Self {
            id: None,
            tenant_id,
            reference_id: None,
            customer_name: String::new(),
            channel: None,
            amount,
            expected_date,
            received_date: None,
            status: ReceivableStatus::Forecast,
            notes: None,
        }
    }

    pub fn collected(
        tenant_id: TenantId,
        amount: Decimal,
        expected_date: NaiveDate,
        received_date: NaiveDate,
    ) -> Self {
        Self {
            received_date: Some(received_date),
            status: ReceivableStatus::Collected,
            ..Self::forecast(tenant_id, amount, expected_date)
        }
    }

    pub fn overdue(tenant_id: TenantId, amount: Decimal, expected_date: NaiveDate) -> Self {
        Self {
            status: ReceivableStatus::Overdue,
            ..Self::forecast(tenant_id, amount, expected_date)
        }
    }

    pub fn with_customer(mut self, customer_name: impl Into<String>) -> Self {
        self.customer_name = customer_name.into();
        self
    }

    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_amount(self.amount)?;
        let collected = self.status == ReceivableStatus::Collected;
        if collected != self.received_date.is_some() {
            return Err(DreError::InvalidInput(format!(
                "receivable with status {:?} must {}have a received date",
                self.status,
                if collected { "" } else { "not " }
            )));
        }
        Ok(())
    }

    pub fn collect(&mut self, received_date: NaiveDate) -> Result<()> {
        if self.status == ReceivableStatus::Collected {
            return Err(DreError::InvalidInput(
                "receivable is already collected".to_string(),
            ));
        }
        self.status = ReceivableStatus::Collected;
        self.received_date = Some(received_date);
        Ok(())
    }

    pub fn mark_overdue(&mut self) -> Result<()> {
        match self.status {
            ReceivableStatus::Forecast => {
                self.status = ReceivableStatus::Overdue;
                Ok(())
            }
            ReceivableStatus::Overdue => Ok(()),
            ReceivableStatus::Collected => Err(DreError::InvalidInput(
                "a collected receivable cannot become overdue".to_string(),
            )),
        }
    }
}

impl LedgerEntry for Receivable {
    type Status = ReceivableStatus;

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn status(&self) -> ReceivableStatus {
        self.status
    }

    fn scheduled_date(&self) -> NaiveDate {
        self.expected_date
    }

    fn settled_date(&self) -> Option<NaiveDate> {
        self.received_date
    }

    fn is_settled(&self) -> bool {
        self.status == ReceivableStatus::Collected
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Payable {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub beneficiary: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub cost_type: Option<CostType>,
    #[schemars(description = "Non-negative amount with at most two fractional digits")]
    pub amount: Decimal,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    pub status: PayableStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Payable {
    pub fn open(tenant_id: TenantId, amount: Decimal, due_date: NaiveDate) -> Self {
        Self {
            id: None,
            tenant_id,
            reference_id: None,
            beneficiary: String::new(),
            category: String::new(),
            cost_type: None,
            amount,
            due_date,
            payment_date: None,
            status: PayableStatus::Open,
            notes: None,
        }
    }

    pub fn paid(
        tenant_id: TenantId,
        amount: Decimal,
        due_date: NaiveDate,
        payment_date: NaiveDate,
    ) -> Self {
        Self {
            payment_date: Some(payment_date),
            status: PayableStatus::Paid,
            ..Self::open(tenant_id, amount, due_date)
        }
    }

    pub fn overdue(tenant_id: TenantId, amount: Decimal, due_date: NaiveDate) -> Self {
        Self {
            status: PayableStatus::Overdue,
            ..Self::open(tenant_id, amount, due_date)
        }
    }

    pub fn with_beneficiary(mut self, beneficiary: impl Into<String>) -> Self {
        self.beneficiary = beneficiary.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>, cost_type: CostType) -> Self {
        self.category = category.into();
        self.cost_type = Some(cost_type);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_amount(self.amount)?;
        let paid = self.status == PayableStatus::Paid;
        if paid != self.payment_date.is_some() {
            return Err(DreError::InvalidInput(format!(
                "payable with status {:?} must {}have a payment date",
                self.status,
                if paid { "" } else { "not " }
            )));
        }
        Ok(())
    }

    pub fn pay(&mut self, payment_date: NaiveDate) -> Result<()> {
        if self.status == PayableStatus::Paid {
            return Err(DreError::InvalidInput("payable is already paid".to_string()));
        }
        self.status = PayableStatus::Paid;
        self.payment_date = Some(payment_date);
        Ok(())
    }

    pub fn mark_overdue(&mut self) -> Result<()> {
        match self.status {
            PayableStatus::Open => {
                self.status = PayableStatus::Overdue;
                Ok(())
            }
            PayableStatus::Overdue => Ok(()),
            PayableStatus::Paid => Err(DreError::InvalidInput(
                "a paid payable cannot become overdue".to_string(),
            )),
        }
    }
}

impl LedgerEntry for Payable {
    type Status = PayableStatus;

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn status(&self) -> PayableStatus {
        self.status
    }

    fn scheduled_date(&self) -> NaiveDate {
        self.due_date
    }

    fn settled_date(&self) -> Option<NaiveDate> {
        self.payment_date
    }

    fn is_settled(&self) -> bool {
        self.status == PayableStatus::Paid
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(DreError::InvalidInput(format!(
            "amount must be non-negative, got {}",
            amount
        )));
    }
    if amount.normalize().scale() > MONEY_DECIMAL_PLACES {
        return Err(DreError::InvalidInput(format!(
            "amount {} has more than {} fractional digits",
            amount, MONEY_DECIMAL_PLACES
        )));
    }
    Ok(())
}

/// Net margin as a percentage of revenue, at full decimal precision.
/// Zero revenue yields exactly zero, whatever the expense. Rounding to two
/// places happens only when the figure is displayed.
pub fn net_margin_percent(gross_margin: Decimal, revenue: Decimal) -> Result<Decimal> {
    if revenue <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    gross_margin
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(revenue))
        .ok_or_else(|| {
            DreError::InvalidInput(format!(
                "margin ratio {} / {} is out of decimal range",
                gross_margin, revenue
            ))
        })
}

fn gross_margin(revenue: Decimal, expense: Decimal) -> Result<Decimal> {
    revenue.checked_sub(expense).ok_or_else(|| {
        DreError::InvalidInput(format!(
            "gross margin {} - {} is out of decimal range",
            revenue, expense
        ))
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct MonthlyStatement {
    #[schemars(description = "Calendar month, 1 = January")]
    pub month: u32,
    pub year: i32,
    #[schemars(description = "Sum of collected receivables expected within the month")]
    pub total_revenue: Decimal,
    #[schemars(description = "Sum of paid payables due within the month")]
    pub total_expense: Decimal,
    #[schemars(description = "Revenue minus expense; may be negative")]
    pub gross_margin: Decimal,
    #[schemars(description = "Gross margin as a percentage of revenue, unrounded; 0 when revenue is 0")]
    pub net_margin_percent: Decimal,
}

impl MonthlyStatement {
    pub fn from_totals(period: ReportPeriod, revenue: Decimal, expense: Decimal) -> Result<Self> {
        let gross_margin = gross_margin(revenue, expense)?;
        Ok(Self {
            month: period.month,
            year: period.year,
            total_revenue: revenue,
            total_expense: expense,
            gross_margin,
            net_margin_percent: net_margin_percent(gross_margin, revenue)?,
        })
    }

    pub fn empty(period: ReportPeriod) -> Self {
        Self {
            month: period.month,
            year: period.year,
            total_revenue: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            gross_margin: Decimal::ZERO,
            net_margin_percent: Decimal::ZERO,
        }
    }

    pub fn period(&self) -> ReportPeriod {
        ReportPeriod {
            year: self.year,
            month: self.month,
        }
    }

    /// `YYYY-MM`, the tag used by the comparative chart.
    pub fn period_label(&self) -> String {
        self.period().to_string()
    }

    pub fn is_profitable(&self) -> bool {
        self.gross_margin >= Decimal::ZERO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct AnnualStatement {
    pub year: i32,
    pub total_revenue: Decimal,
    pub total_expense: Decimal,
    pub gross_margin: Decimal,
    pub net_margin_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ComparativeSeries {
    pub year: i32,
    #[schemars(description = "Exactly twelve statements, January first")]
    pub entries: Vec<MonthlyStatement>,
}

impl ComparativeSeries {
    pub fn from_entries(year: i32, entries: Vec<MonthlyStatement>) -> Result<Self> {
        if entries.len() != 12 {
            return Err(DreError::InvalidInput(format!(
                "comparative series needs 12 months, got {}",
                entries.len()
            )));
        }
        for (idx, entry) in entries.iter().enumerate() {
            let expected_month = idx as u32 + 1;
            if entry.month != expected_month || entry.year != year {
                return Err(DreError::InvalidInput(format!(
                    "entry #{} is {}, expected {:04}-{:02}",
                    idx,
                    entry.period_label(),
                    year,
                    expected_month
                )));
            }
        }
        Ok(Self { year, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MonthlyStatement> {
        self.entries.iter()
    }

    pub fn month(&self, month: u32) -> Option<&MonthlyStatement> {
        self.entries.iter().find(|e| e.month == month)
    }

    /// Whole-year totals, derived with the same margin rules as a single month.
    pub fn annual_statement(&self) -> Result<AnnualStatement> {
        let mut revenue = Decimal::ZERO;
        let mut expense = Decimal::ZERO;
        for entry in &self.entries {
            revenue = checked_total(revenue, entry.total_revenue)?;
            expense = checked_total(expense, entry.total_expense)?;
        }
        let gross_margin = gross_margin(revenue, expense)?;
        Ok(AnnualStatement {
            year: self.year,
            total_revenue: revenue,
            total_expense: expense,
            gross_margin,
            net_margin_percent: net_margin_percent(gross_margin, revenue)?,
        })
    }
}

impl<'a> IntoIterator for &'a ComparativeSeries {
    type Item = &'a MonthlyStatement;
    type IntoIter = std::slice::Iter<'a, MonthlyStatement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub(crate) fn checked_total(total: Decimal, amount: Decimal) -> Result<Decimal> {
    total.checked_add(amount).ok_or_else(|| {
        DreError::InvalidInput(format!(
            "running total {} + {} is out of decimal range",
            total, amount
        ))
    })
}

/// Balance block shown on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct LedgerSummary {
    #[schemars(description = "Sum of every receivable, whatever its status")]
    pub total_receivables: Decimal,
    #[schemars(description = "Sum of every payable, whatever its status")]
    pub total_payables: Decimal,
    pub net_projection: Decimal,
    #[schemars(description = "Receivables whose status is Atrasado")]
    pub overdue_receivables: usize,
    #[schemars(description = "Payables whose status is Vencido")]
    pub overdue_payables: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct DreReport {
    pub tenant_id: TenantId,
    pub statement: MonthlyStatement,
    #[serde(default)]
    pub comparative: Option<ComparativeSeries>,
}

impl DreReport {
    pub fn period(&self) -> ReportPeriod {
        self.statement.period()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DreReport)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
