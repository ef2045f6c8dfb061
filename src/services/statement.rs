//! Tenant statement view building.
//!
//! The upstream statement endpoint already computes the opening balance and
//! the per-row running balance; this module only tags, signs, and orders the
//! rows for display. The running balance is never recomputed here. The
//! summary identity is checked so the UI can flag a discrepancy, but it is
//! not enforced.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{LeaseStatement, StatementEntryKind, StatementTotals};
use crate::services::allocation::{round2, CENT_EPSILON};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementLineView {
    pub kind: StatementEntryKind,
    pub date: NaiveDate,
    pub description: String,
    /// Signed for the ledger: charges positive, payments negative,
    /// adjustments carry their own sign.
    pub signed_amount: f64,
    /// Server-computed, passed through untouched.
    pub running_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaseStatementView {
    pub lease_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: f64,
    pub closing_balance: f64,
    pub lines: Vec<StatementLineView>,
    pub totals: StatementTotals,
    /// Whether `opening + invoiced - payments + adjustments == closing`
    /// holds within a cent. Display-only.
    pub totals_consistent: bool,
}

pub fn build_statement_view(statement: LeaseStatement) -> LeaseStatementView {
    let mut lines: Vec<StatementLineView> = statement
        .entries
        .into_iter()
        .map(|entry| StatementLineView {
            kind: entry.kind,
            signed_amount: signed_amount(entry.kind, entry.amount),
            date: entry.date,
            description: entry.description,
            running_balance: entry.running_balance,
        })
        .collect();
    // Chronological ledger order; same-day rows keep the server's order.
    lines.sort_by_key(|line| line.date);

    let totals_consistent = summary_consistent(
        statement.opening_balance,
        &statement.totals,
        statement.closing_balance,
    );

    LeaseStatementView {
        lease_id: statement.lease_id,
        period_start: statement.period_start,
        period_end: statement.period_end,
        opening_balance: statement.opening_balance,
        closing_balance: statement.closing_balance,
        lines,
        totals: statement.totals,
        totals_consistent,
    }
}

fn signed_amount(kind: StatementEntryKind, amount: f64) -> f64 {
    match kind {
        StatementEntryKind::Invoice => amount.abs(),
        StatementEntryKind::Payment => -amount.abs(),
        StatementEntryKind::Adjustment => amount,
    }
}

fn summary_consistent(opening: f64, totals: &StatementTotals, closing: f64) -> bool {
    let computed = round2(
        opening + totals.total_invoiced - totals.total_payments + totals.total_adjustments,
    );
    (computed - closing).abs() <= CENT_EPSILON
}
