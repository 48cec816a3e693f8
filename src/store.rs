//! Ledger storage boundary.
//!
//! The engine only reads through [`LedgerStore`]. [`InMemoryLedgerStore`] is a
//! complete implementation used by tests and embedders that keep the ledger in
//! process; database-backed stores implement the same trait.

use crate::schema::{
    LedgerEntry, Payable, PayableStatus, Receivable, ReceivableStatus, RecordId, TenantId,
};
use crate::utils::DateWindow;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("ledger store is unavailable: {0}")]
    Unavailable(String),

    #[error("{kind} #{id} not found for tenant {tenant_id}")]
    RecordNotFound {
        kind: &'static str,
        tenant_id: TenantId,
        id: RecordId,
    },

    #[error("rejected record: {0}")]
    InvalidRecord(String),
}

/// Which date of a row the query window applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DateField {
    /// Expected date (receivables) or due date (payables).
    #[default]
    Scheduled,
    /// Received date (receivables) or payment date (payables).
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerQuery<S> {
    pub tenant_id: TenantId,
    pub window: Option<DateWindow>,
    pub date_field: DateField,
    pub status: Option<S>,
}

impl<S: Copy + PartialEq> LedgerQuery<S> {
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            window: None,
            date_field: DateField::Scheduled,
            status: None,
        }
    }

    pub fn within(mut self, window: DateWindow, date_field: DateField) -> Self {
        self.window = Some(window);
        self.date_field = date_field;
        self
    }

    pub fn with_status(mut self, status: S) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches<E: LedgerEntry<Status = S>>(&self, entry: &E) -> bool {
        if entry.tenant_id() != self.tenant_id {
            return false;
        }
        if let Some(status) = self.status {
            if entry.status() != status {
                return false;
            }
        }
        match self.window {
            None => true,
            Some(window) => {
                let date = match self.date_field {
                    DateField::Scheduled => Some(entry.scheduled_date()),
                    DateField::Settled => entry.settled_date(),
                };
                date.is_some_and(|d| window.contains(d))
            }
        }
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn query_receivables(
        &self,
        query: &LedgerQuery<ReceivableStatus>,
    ) -> Result<Vec<Receivable>, StorageError>;

    async fn query_payables(
        &self,
        query: &LedgerQuery<PayableStatus>,
    ) -> Result<Vec<Payable>, StorageError>;
}

#[async_trait]
impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    async fn query_receivables(
        &self,
        query: &LedgerQuery<ReceivableStatus>,
    ) -> Result<Vec<Receivable>, StorageError> {
        (**self).query_receivables(query).await
    }

    async fn query_payables(
        &self,
        query: &LedgerQuery<PayableStatus>,
    ) -> Result<Vec<Payable>, StorageError> {
        (**self).query_payables(query).await
    }
}

#[async_trait]
impl<'a, T: LedgerStore + ?Sized> LedgerStore for &'a T {
    async fn query_receivables(
        &self,
        query: &LedgerQuery<ReceivableStatus>,
    ) -> Result<Vec<Receivable>, StorageError> {
        (**self).query_receivables(query).await
    }

    async fn query_payables(
        &self,
        query: &LedgerQuery<PayableStatus>,
    ) -> Result<Vec<Payable>, StorageError> {
        (**self).query_payables(query).await
    }
}

#[derive(Default)]
struct Tables {
    receivables: BTreeMap<RecordId, Receivable>,
    payables: BTreeMap<RecordId, Payable>,
}

pub struct InMemoryLedgerStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
    open: AtomicBool,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    /// Creates an opened, empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicU64::new(1),
            open: AtomicBool::new(true),
        }
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    /// Rejects every later operation with [`StorageError::Unavailable`] until reopened.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.is_open() {
            Ok(())
        } else {
            warn!("Ledger store accessed while closed");
            Err(StorageError::Unavailable("store is closed".to_string()))
        }
    }

    fn allocate_id(&self) -> RecordId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub async fn insert_receivable(&self, mut receivable: Receivable) -> Result<RecordId, StorageError> {
        self.ensure_open()?;
        receivable
            .validate()
            .map_err(|e| StorageError::InvalidRecord(e.to_string()))?;

        let id = self.allocate_id();
        receivable.id = Some(id);
        self.tables.write().await.receivables.insert(id, receivable);
        Ok(id)
    }

    pub async fn insert_payable(&self, mut payable: Payable) -> Result<RecordId, StorageError> {
        self.ensure_open()?;
        payable
            .validate()
            .map_err(|e| StorageError::InvalidRecord(e.to_string()))?;

        let id = self.allocate_id();
        payable.id = Some(id);
        self.tables.write().await.payables.insert(id, payable);
        Ok(id)
    }

    pub async fn collect_receivable(
        &self,
        tenant_id: TenantId,
        id: RecordId,
        received_date: NaiveDate,
    ) -> Result<(), StorageError> {
        self.update_receivable(tenant_id, id, |r| r.collect(received_date))
            .await
    }

    pub async fn mark_receivable_overdue(
        &self,
        tenant_id: TenantId,
        id: RecordId,
    ) -> Result<(), StorageError> {
        self.update_receivable(tenant_id, id, Receivable::mark_overdue)
            .await
    }

    pub async fn pay_payable(
        &self,
        tenant_id: TenantId,
        id: RecordId,
        payment_date: NaiveDate,
    ) -> Result<(), StorageError> {
        self.update_payable(tenant_id, id, |p| p.pay(payment_date))
            .await
    }

    pub async fn mark_payable_overdue(
        &self,
        tenant_id: TenantId,
        id: RecordId,
    ) -> Result<(), StorageError> {
        self.update_payable(tenant_id, id, Payable::mark_overdue)
            .await
    }

    pub async fn remove_receivable(
        &self,
        tenant_id: TenantId,
        id: RecordId,
    ) -> Result<Receivable, StorageError> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        match tables.receivables.get(&id) {
            Some(r) if r.tenant_id == tenant_id => {}
            _ => return Err(not_found("receivable", tenant_id, id)),
        }
        tables
            .receivables
            .remove(&id)
            .ok_or_else(|| not_found("receivable", tenant_id, id))
    }

    pub async fn remove_payable(
        &self,
        tenant_id: TenantId,
        id: RecordId,
    ) -> Result<Payable, StorageError> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        match tables.payables.get(&id) {
            Some(p) if p.tenant_id == tenant_id => {}
            _ => return Err(not_found("payable", tenant_id, id)),
        }
        tables
            .payables
            .remove(&id)
            .ok_or_else(|| not_found("payable", tenant_id, id))
    }

    async fn update_receivable<F>(
        &self,
        tenant_id: TenantId,
        id: RecordId,
        change: F,
    ) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Receivable) -> crate::error::Result<()>,
    {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        let receivable = tables
            .receivables
            .get_mut(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| not_found("receivable", tenant_id, id))?;

        // Work on a copy so a rejected transition leaves the row untouched.
        let mut updated = receivable.clone();
        change(&mut updated).map_err(|e| StorageError::InvalidRecord(e.to_string()))?;
        *receivable = updated;
        Ok(())
    }

    async fn update_payable<F>(
        &self,
        tenant_id: TenantId,
        id: RecordId,
        change: F,
    ) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Payable) -> crate::error::Result<()>,
    {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        let payable = tables
            .payables
            .get_mut(&id)
            .filter(|p| p.tenant_id == tenant_id)
            .ok_or_else(|| not_found("payable", tenant_id, id))?;

        let mut updated = payable.clone();
        change(&mut updated).map_err(|e| StorageError::InvalidRecord(e.to_string()))?;
        *payable = updated;
        Ok(())
    }
}

fn not_found(kind: &'static str, tenant_id: TenantId, id: RecordId) -> StorageError {
    StorageError::RecordNotFound {
        kind,
        tenant_id,
        id,
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn query_receivables(
        &self,
        query: &LedgerQuery<ReceivableStatus>,
    ) -> Result<Vec<Receivable>, StorageError> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        let rows: Vec<Receivable> = tables
            .receivables
            .values()
            .filter(|r| query.matches(*r))
            .cloned()
            .collect();
        debug!(
            "Receivable query for tenant {} matched {} rows",
            query.tenant_id,
            rows.len()
        );
        Ok(rows)
    }

    async fn query_payables(
        &self,
        query: &LedgerQuery<PayableStatus>,
    ) -> Result<Vec<Payable>, StorageError> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        let rows: Vec<Payable> = tables
            .payables
            .values()
            .filter(|p| query.matches(*p))
            .cloned()
            .collect();
        debug!(
            "Payable query for tenant {} matched {} rows",
            query.tenant_id,
            rows.len()
        );
        Ok(rows)
    }
}
