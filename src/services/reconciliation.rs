//! Reconciliation work-queue view.
//!
//! Matching itself happens upstream; this module only folds unmatched bank
//! transactions and pending manual payments into one work queue and bands
//! the backend-supplied confidence scores for display.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{BankTransaction, CandidateMatch, Payment, ReconciliationStatus};

/// Presentation bands over the backend's 0–100 confidence score:
/// above 80 is high, 60–80 medium, below 60 low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

pub fn confidence_band(score: f64) -> ConfidenceBand {
    if score > 80.0 {
        ConfidenceBand::High
    } else if score >= 60.0 {
        ConfidenceBand::Medium
    } else {
        ConfidenceBand::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedSource {
    BankTransaction,
    ManualPayment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateMatchView {
    pub invoice_id: String,
    pub invoice_number: String,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
    pub confidence: f64,
    pub band: ConfidenceBand,
}

impl From<CandidateMatch> for CandidateMatchView {
    fn from(candidate: CandidateMatch) -> Self {
        Self {
            band: confidence_band(candidate.confidence),
            invoice_id: candidate.invoice_id,
            invoice_number: candidate.invoice_number,
            tenant_id: candidate.tenant_id,
            tenant_name: candidate.tenant_name,
            confidence: candidate.confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedItemView {
    pub source: UnmatchedSource,
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub reference: Option<String>,
    pub status: ReconciliationStatus,
    pub tenant_id: Option<String>,
    pub candidates: Vec<CandidateMatchView>,
}

/// Fold unmatched bank transactions and pending manual payments into one
/// unmatched-payment queue, newest first. Manual payments have no candidate
/// scoring and enter the queue tagged `unmatched`.
pub fn normalize_unmatched(
    transactions: Vec<BankTransaction>,
    pending_payments: Vec<Payment>,
) -> Vec<UnmatchedItemView> {
    let mut items: Vec<UnmatchedItemView> = Vec::new();

    for transaction in transactions {
        items.push(UnmatchedItemView {
            source: UnmatchedSource::BankTransaction,
            id: transaction.id,
            date: transaction.date,
            amount: transaction.amount,
            description: transaction.description,
            reference: transaction.reference,
            status: transaction.status,
            tenant_id: None,
            candidates: transaction
                .candidate_matches
                .into_iter()
                .map(CandidateMatchView::from)
                .collect(),
        });
    }

    for payment in pending_payments {
        items.push(UnmatchedItemView {
            source: UnmatchedSource::ManualPayment,
            id: payment.id,
            date: payment.date,
            amount: payment.amount,
            description: format!("Manual payment ({})", payment.method),
            reference: payment.reference,
            status: ReconciliationStatus::Unmatched,
            tenant_id: payment.tenant_id,
            candidates: Vec::new(),
        });
    }

    items.sort_by(|a, b| b.date.cmp(&a.date));
    items
}

#[cfg(test)]
mod tests {
    use super::{confidence_band, normalize_unmatched, ConfidenceBand, UnmatchedSource};
    use crate::models::{
        BankTransaction, CandidateMatch, Payment, PaymentStatus, ReconciliationStatus,
    };
    use chrono::NaiveDate;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn transaction(id: &str, day: &str, confidence: f64) -> BankTransaction {
        BankTransaction {
            id: id.to_string(),
            date: date(day),
            amount: 4000.0,
            description: "EFT KHAYA".to_string(),
            reference: Some("REF-1".to_string()),
            status: ReconciliationStatus::ReviewRequired,
            candidate_matches: vec![CandidateMatch {
                invoice_id: "inv-1".to_string(),
                invoice_number: "INV-1".to_string(),
                tenant_id: Some("tenant-1".to_string()),
                tenant_name: Some("T. Tenant".to_string()),
                confidence,
            }],
        }
    }

    fn pending(id: &str, day: &str) -> Payment {
        Payment {
            id: id.to_string(),
            amount: 2500.0,
            date: date(day),
            method: "eft".to_string(),
            reference: None,
            transaction_fingerprint: None,
            tenant_id: Some("tenant-2".to_string()),
            tenant_name: None,
            status: PaymentStatus::Pending,
        }
    }

    #[test]
    fn bands_scores_at_boundaries() {
        assert_eq!(confidence_band(95.0), ConfidenceBand::High);
        assert_eq!(confidence_band(80.1), ConfidenceBand::High);
        assert_eq!(confidence_band(80.0), ConfidenceBand::Medium);
        assert_eq!(confidence_band(60.0), ConfidenceBand::Medium);
        assert_eq!(confidence_band(59.9), ConfidenceBand::Low);
        assert_eq!(confidence_band(0.0), ConfidenceBand::Low);
    }

    #[test]
    fn merges_sources_newest_first() {
        let items = normalize_unmatched(
            vec![transaction("tx-old", "2024-01-10", 90.0)],
            vec![pending("pay-new", "2024-02-01")],
        );

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "pay-new");
        assert_eq!(items[0].source, UnmatchedSource::ManualPayment);
        assert_eq!(items[0].status, ReconciliationStatus::Unmatched);
        assert_eq!(items[1].id, "tx-old");
        assert_eq!(items[1].status, ReconciliationStatus::ReviewRequired);
    }

    #[test]
    fn carries_candidate_bands_through() {
        let items = normalize_unmatched(vec![transaction("tx", "2024-01-10", 72.0)], vec![]);
        assert_eq!(items[0].candidates.len(), 1);
        assert_eq!(items[0].candidates[0].band, ConfidenceBand::Medium);
        assert_eq!(items[0].candidates[0].invoice_number, "INV-1");
    }
}
