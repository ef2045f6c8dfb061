//! Typed shapes for every upstream finance API payload.
//!
//! The backend of record owns invoices, payments, leases, and bank
//! transactions; this service only reads them and submits allocation
//! instructions. Payloads are decoded into these types at the HTTP boundary
//! and a decode failure is surfaced as a deserialization error instead of
//! being papered over with empty defaults.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Partial,
    Locked,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub lease_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
    pub due_date: NaiveDate,
    pub total_amount: f64,
    /// Remaining unpaid amount. The backend guarantees
    /// `0 <= balance_due <= total_amount`; it only ever decreases via
    /// allocations applied server-side.
    pub balance_due: f64,
    pub status: InvoiceStatus,
}

impl Invoice {
    pub fn is_open(&self) -> bool {
        self.balance_due > 0.0
            && !matches!(self.status, InvoiceStatus::Cancelled | InvoiceStatus::Draft)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Overdue,
    Partial,
}

/// A manual payment or a bank-derived one. Immutable once allocated apart
/// from status transitions, all of which happen upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub method: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub transaction_fingerprint: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Unmatched,
    Partial,
    ReviewRequired,
}

/// A backend-scored candidate pairing of a bank transaction with an invoice.
/// The scoring algorithm lives upstream; we only present it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub invoice_id: String,
    pub invoice_number: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    /// 0–100.
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
    pub status: ReconciliationStatus,
    #[serde(default)]
    pub candidate_matches: Vec<CandidateMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderpaymentAlert {
    pub id: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub invoice_id: String,
    pub invoice_number: String,
    pub expected_amount: f64,
    pub actual_amount: f64,
    /// `expected - actual`; strictly positive by definition. Rows that fail
    /// that are dropped during grouping rather than shown with a zero badge.
    pub shortfall: f64,
    pub status: AlertStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementEntryKind {
    Invoice,
    Payment,
    Adjustment,
}

/// One row of the upstream lease statement. `running_balance` is computed
/// server-side and is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementEntry {
    pub kind: StatementEntryKind,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub running_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatementTotals {
    pub total_invoiced: f64,
    pub total_payments: f64,
    pub total_adjustments: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseStatement {
    pub lease_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: f64,
    pub closing_balance: f64,
    pub entries: Vec<StatementEntry>,
    pub totals: StatementTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
    pub status: String,
}

impl Lease {
    pub fn is_active(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("active")
    }
}

/// Generic `{ "data": [...] }` list envelope the upstream wraps collections in.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnmatchedPaymentsPayload {
    #[serde(default)]
    pub unmatched_transactions: Vec<BankTransaction>,
    #[serde(default)]
    pub pending_payments: Vec<Payment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnderpaymentAlertsPayload {
    pub success: bool,
    #[serde(default)]
    pub alerts: Vec<UnderpaymentAlert>,
}

/// The authoritative answer to an allocation submission. Whatever the
/// upstream says here is ground truth; nothing is marked paid locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankImportOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub imported_rows: Option<i64>,
    #[serde(default)]
    pub matched_rows: Option<i64>,
}
