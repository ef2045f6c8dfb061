//! Payment allocation engine.
//!
//! Pure, in-memory computation: nothing here touches the network. A plan is
//! proposed (auto) or assembled (manual edits), validated as a whole, and
//! only then forwarded upstream, where the allocation is applied
//! transactionally. The upstream answer is the only thing that marks an
//! invoice paid.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::Invoice;

/// Tolerance for floating point money comparisons (one cent).
pub const CENT_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedAllocation {
    pub invoice_id: String,
    pub invoice_number: String,
    pub due_date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationPlan {
    pub payment_amount: f64,
    pub allocations: Vec<PlannedAllocation>,
    /// Surplus left after every open balance is consumed, proposed as a
    /// credit (a liability to the tenant) rather than silently dropped.
    pub credit: f64,
    pub remaining: f64,
}

/// One user-assembled allocation line, as submitted for validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationEntry {
    pub invoice_id: String,
    pub amount: f64,
}

/// Distribute a payment across open invoices, oldest due date first.
///
/// Invoices are ordered ascending by due date; ties keep their original list
/// order. Each invoice receives `min(remaining, balance_due)` until the
/// payment is exhausted. Whatever is left once every balance is consumed
/// becomes the proposed credit, so value is never lost:
/// `sum(allocations) + credit == payment_amount`.
pub fn auto_allocate(payment_amount: f64, invoices: &[Invoice]) -> AllocationPlan {
    let mut ordered: Vec<&Invoice> = invoices
        .iter()
        .filter(|invoice| invoice.balance_due > 0.0)
        .collect();
    // Stable sort: equal due dates stay in original order.
    ordered.sort_by_key(|invoice| invoice.due_date);

    let payment_amount = round2(payment_amount);
    let mut remaining = payment_amount;
    let mut allocations = Vec::new();

    for invoice in ordered {
        if remaining < CENT_EPSILON {
            break;
        }
        let amount = round2(remaining.min(invoice.balance_due));
        if amount <= 0.0 {
            continue;
        }
        allocations.push(PlannedAllocation {
            invoice_id: invoice.id.clone(),
            invoice_number: invoice.invoice_number.clone(),
            due_date: invoice.due_date,
            amount,
        });
        remaining = round2(remaining - amount);
    }

    let credit = if remaining > 0.0 { remaining } else { 0.0 };
    AllocationPlan {
        payment_amount,
        allocations,
        credit,
        remaining,
    }
}

/// Clamp a user-entered amount to what the invoice and the payment can
/// actually absorb: `min(balance_due, remaining_before_edit)`, floored at 0.
pub fn clamp_manual_amount(
    requested: f64,
    invoice_balance_due: f64,
    remaining_before_edit: f64,
) -> f64 {
    round2(
        requested
            .max(0.0)
            .min(invoice_balance_due)
            .min(remaining_before_edit.max(0.0)),
    )
}

/// Apply a sequence of manual edits: each amount is clamped against its
/// invoice's balance and against the remainder left by the entries before
/// it. An entry for an invoice that is not open clamps to zero.
pub fn clamp_entries(
    payment_amount: f64,
    requested: &[AllocationEntry],
    invoices: &[Invoice],
) -> Vec<AllocationEntry> {
    let mut clamped: Vec<AllocationEntry> = Vec::with_capacity(requested.len());
    for entry in requested {
        let balance = invoices
            .iter()
            .find(|invoice| invoice.id == entry.invoice_id)
            .map(|invoice| invoice.balance_due)
            .unwrap_or(0.0);
        let remaining_before = remaining_amount(payment_amount, &clamped);
        clamped.push(AllocationEntry {
            invoice_id: entry.invoice_id.clone(),
            amount: clamp_manual_amount(entry.amount, balance, remaining_before),
        });
    }
    clamped
}

/// Unallocated remainder after the given entries: `payment - sum(entries)`.
/// Recomputed after every edit.
pub fn remaining_amount(payment_amount: f64, entries: &[AllocationEntry]) -> f64 {
    let allocated: f64 = entries.iter().map(|entry| entry.amount).sum();
    round2(payment_amount - allocated)
}

/// Validate a plan before submission. Every violation is collected so the
/// whole form can be corrected in one pass; any violation blocks submission.
pub fn validate_plan(
    payment_amount: f64,
    entries: &[AllocationEntry],
    create_credit: bool,
    open_invoices: &[Invoice],
) -> Result<(), Vec<String>> {
    let mut violations = Vec::new();

    if entries.is_empty() && !create_credit {
        violations
            .push("At least one allocation or a credit is required before submission.".to_string());
    }

    let mut seen: Vec<&str> = Vec::new();
    for entry in entries {
        if entry.amount <= 0.0 {
            violations.push(format!(
                "Allocation to invoice {} must be a positive amount.",
                entry.invoice_id
            ));
        }
        if seen.contains(&entry.invoice_id.as_str()) {
            violations.push(format!(
                "Invoice {} appears more than once in the allocation list.",
                entry.invoice_id
            ));
        }
        seen.push(entry.invoice_id.as_str());

        match open_invoices
            .iter()
            .find(|invoice| invoice.id == entry.invoice_id)
        {
            Some(invoice) => {
                if entry.amount > invoice.balance_due + CENT_EPSILON {
                    violations.push(format!(
                        "Allocation of {:.2} to invoice {} exceeds its balance due of {:.2}.",
                        entry.amount, invoice.invoice_number, invoice.balance_due
                    ));
                }
            }
            None => {
                violations.push(format!(
                    "Invoice {} is not open for allocation.",
                    entry.invoice_id
                ));
            }
        }
    }

    let allocated: f64 = entries.iter().map(|entry| entry.amount).sum();
    if allocated > payment_amount + CENT_EPSILON {
        violations.push(format!(
            "Total allocated {:.2} exceeds the payment amount {:.2}.",
            allocated, payment_amount
        ));
    }
    let remaining = round2(payment_amount - allocated);
    if remaining < -CENT_EPSILON {
        violations.push(format!("Remaining amount is negative ({remaining:.2})."));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{
        auto_allocate, clamp_entries, clamp_manual_amount, remaining_amount, validate_plan,
        AllocationEntry, CENT_EPSILON,
    };
    use crate::models::{Invoice, InvoiceStatus};
    use chrono::NaiveDate;

    fn invoice(id: &str, due: &str, balance: f64) -> Invoice {
        Invoice {
            id: id.to_string(),
            invoice_number: format!("INV-{id}"),
            lease_id: "lease-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            tenant_name: None,
            due_date: NaiveDate::parse_from_str(due, "%Y-%m-%d").expect("valid date"),
            total_amount: balance,
            balance_due: balance,
            status: InvoiceStatus::Sent,
        }
    }

    #[test]
    fn allocates_oldest_due_first_with_partial_tail() {
        let invoices = vec![
            invoice("a", "2024-01-01", 4000.0),
            invoice("b", "2024-02-01", 3000.0),
            invoice("c", "2024-03-01", 5000.0),
        ];
        let plan = auto_allocate(10_000.0, &invoices);

        let amounts: Vec<f64> = plan.allocations.iter().map(|a| a.amount).collect();
        assert_eq!(amounts, vec![4000.0, 3000.0, 3000.0]);
        assert_eq!(plan.allocations[0].invoice_id, "a");
        assert_eq!(plan.allocations[2].invoice_id, "c");
        assert_eq!(plan.credit, 0.0);
        assert_eq!(plan.remaining, 0.0);
    }

    #[test]
    fn proposes_credit_for_surplus() {
        let invoices = vec![invoice("a", "2024-01-01", 6000.0)];
        let plan = auto_allocate(10_000.0, &invoices);

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].amount, 6000.0);
        assert_eq!(plan.credit, 4000.0);
    }

    #[test]
    fn ties_on_due_date_keep_original_order() {
        let invoices = vec![
            invoice("first", "2024-05-01", 500.0),
            invoice("second", "2024-05-01", 500.0),
        ];
        let plan = auto_allocate(600.0, &invoices);

        assert_eq!(plan.allocations[0].invoice_id, "first");
        assert_eq!(plan.allocations[0].amount, 500.0);
        assert_eq!(plan.allocations[1].invoice_id, "second");
        assert_eq!(plan.allocations[1].amount, 100.0);
    }

    #[test]
    fn conserves_value_for_any_payment_amount() {
        let invoices = vec![
            invoice("a", "2024-02-01", 1234.56),
            invoice("b", "2024-01-15", 789.01),
            invoice("c", "2024-03-20", 250.75),
        ];
        let total_open: f64 = invoices.iter().map(|i| i.balance_due).sum();

        for payment in [0.0, 10.0, 789.01, 1500.0, 2274.32, 9999.99] {
            let plan = auto_allocate(payment, &invoices);
            let allocated: f64 = plan.allocations.iter().map(|a| a.amount).sum();
            assert!(
                (allocated + plan.credit - payment).abs() <= CENT_EPSILON,
                "value lost for payment {payment}: allocated {allocated}, credit {}",
                plan.credit
            );
            assert!(allocated <= total_open + CENT_EPSILON);
            for entry in &plan.allocations {
                let inv = invoices
                    .iter()
                    .find(|i| i.id == entry.invoice_id)
                    .expect("allocation targets a known invoice");
                assert!(entry.amount <= inv.balance_due + CENT_EPSILON);
            }
        }
    }

    #[test]
    fn skips_zero_balance_invoices() {
        let invoices = vec![
            invoice("settled", "2024-01-01", 0.0),
            invoice("open", "2024-02-01", 100.0),
        ];
        let plan = auto_allocate(50.0, &invoices);
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].invoice_id, "open");
    }

    #[test]
    fn clamps_manual_amount_to_balance_and_remainder() {
        // Entering 7000 against a 5000 balance is clamped to 5000.
        assert_eq!(clamp_manual_amount(7000.0, 5000.0, 10_000.0), 5000.0);
        // The payment remainder caps the entry too.
        assert_eq!(clamp_manual_amount(4000.0, 5000.0, 2500.0), 2500.0);
        assert_eq!(clamp_manual_amount(-50.0, 5000.0, 2500.0), 0.0);
    }

    #[test]
    fn clamps_each_edit_in_sequence() {
        let invoices = vec![
            invoice("a", "2024-01-01", 5000.0),
            invoice("b", "2024-02-01", 4000.0),
        ];
        let requested = vec![
            AllocationEntry {
                invoice_id: "a".to_string(),
                amount: 7000.0,
            },
            AllocationEntry {
                invoice_id: "b".to_string(),
                amount: 4000.0,
            },
            AllocationEntry {
                invoice_id: "ghost".to_string(),
                amount: 100.0,
            },
        ];
        let clamped = clamp_entries(6000.0, &requested, &invoices);

        // 7000 against a 5000 balance clamps to 5000; the 1000 left of the
        // payment caps the next entry; an unknown invoice clamps to zero.
        assert_eq!(clamped[0].amount, 5000.0);
        assert_eq!(clamped[1].amount, 1000.0);
        assert_eq!(clamped[2].amount, 0.0);
        assert_eq!(remaining_amount(6000.0, &clamped), 0.0);
    }

    #[test]
    fn recomputes_remaining_after_each_edit() {
        let entries = vec![
            AllocationEntry {
                invoice_id: "a".to_string(),
                amount: 4000.0,
            },
            AllocationEntry {
                invoice_id: "b".to_string(),
                amount: 2500.0,
            },
        ];
        assert_eq!(remaining_amount(10_000.0, &entries), 3500.0);
        assert_eq!(remaining_amount(6500.0, &entries), 0.0);
    }

    #[test]
    fn rejects_empty_plan_without_credit() {
        let err = validate_plan(1000.0, &[], false, &[]).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err[0].contains("At least one allocation"));

        // A surplus flagged as credit is a valid empty plan.
        assert!(validate_plan(1000.0, &[], true, &[]).is_ok());
    }

    #[test]
    fn rejects_over_allocation_with_all_violations() {
        let invoices = vec![invoice("a", "2024-01-01", 5000.0)];
        let entries = vec![AllocationEntry {
            invoice_id: "a".to_string(),
            amount: 7000.0,
        }];
        let err = validate_plan(6000.0, &entries, false, &invoices).unwrap_err();

        assert!(err.iter().any(|v| v.contains("exceeds its balance due")));
        assert!(err.iter().any(|v| v.contains("exceeds the payment amount")));
        assert!(err.iter().any(|v| v.contains("Remaining amount is negative")));
    }

    #[test]
    fn rejects_unknown_and_duplicate_invoices() {
        let invoices = vec![invoice("a", "2024-01-01", 5000.0)];
        let entries = vec![
            AllocationEntry {
                invoice_id: "a".to_string(),
                amount: 100.0,
            },
            AllocationEntry {
                invoice_id: "a".to_string(),
                amount: 100.0,
            },
            AllocationEntry {
                invoice_id: "ghost".to_string(),
                amount: 100.0,
            },
        ];
        let err = validate_plan(1000.0, &entries, false, &invoices).unwrap_err();

        assert!(err.iter().any(|v| v.contains("more than once")));
        assert!(err.iter().any(|v| v.contains("not open for allocation")));
    }

    #[test]
    fn accepts_exact_plan() {
        let invoices = vec![
            invoice("a", "2024-01-01", 4000.0),
            invoice("b", "2024-02-01", 3000.0),
        ];
        let entries = vec![
            AllocationEntry {
                invoice_id: "a".to_string(),
                amount: 4000.0,
            },
            AllocationEntry {
                invoice_id: "b".to_string(),
                amount: 1500.0,
            },
        ];
        assert!(validate_plan(5500.0, &entries, false, &invoices).is_ok());
    }
}
