//! Underpayment detection views.
//!
//! Two algorithms coexist deliberately: the alert-driven view (grouped
//! backend alerts, sorted by total shortfall) and the legacy months-behind
//! view (derived from open invoice ages). Product has not declared one
//! canonical, so both are exposed as named strategies instead of being
//! unified speculatively.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::UnderpaymentDefault;
use crate::models::{Invoice, UnderpaymentAlert};
use crate::services::allocation::round2;

/// Tenants this many months behind (or more) surface in the legacy view.
const MONTHS_BEHIND_THRESHOLD: i64 = 3;
const DAYS_PER_MONTH: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderpaymentStrategy {
    Alerts,
    MonthsBehind,
}

impl UnderpaymentStrategy {
    /// Resolve the strategy from the request, falling back to the configured
    /// default. Unknown values are a caller error, not a silent fallback.
    pub fn resolve(raw: Option<&str>, default: UnderpaymentDefault) -> Result<Self, String> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            None => Ok(match default {
                UnderpaymentDefault::Alerts => Self::Alerts,
                UnderpaymentDefault::MonthsBehind => Self::MonthsBehind,
            }),
            Some("alerts") => Ok(Self::Alerts),
            Some("months_behind") => Ok(Self::MonthsBehind),
            Some(other) => Err(format!(
                "Unknown underpayment strategy '{other}'. Use 'alerts' or 'months_behind'."
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantUnderpaymentSummary {
    pub tenant_id: String,
    pub tenant_name: String,
    pub alert_count: usize,
    pub total_shortfall: f64,
    pub alerts: Vec<UnderpaymentAlert>,
}

/// Group alerts per tenant, most severe first (by total shortfall).
///
/// Rows whose shortfall is not strictly positive are dropped: a zero or
/// negative shortfall is not an underpayment.
pub fn group_alerts_by_tenant(alerts: Vec<UnderpaymentAlert>) -> Vec<TenantUnderpaymentSummary> {
    let mut by_tenant: HashMap<String, TenantUnderpaymentSummary> = HashMap::new();

    for alert in alerts {
        if alert.shortfall <= 0.0 {
            continue;
        }
        let summary = by_tenant
            .entry(alert.tenant_id.clone())
            .or_insert_with(|| TenantUnderpaymentSummary {
                tenant_id: alert.tenant_id.clone(),
                tenant_name: alert.tenant_name.clone(),
                alert_count: 0,
                total_shortfall: 0.0,
                alerts: Vec::new(),
            });
        summary.alert_count += 1;
        summary.total_shortfall = round2(summary.total_shortfall + alert.shortfall);
        summary.alerts.push(alert);
    }

    let mut summaries: Vec<TenantUnderpaymentSummary> = by_tenant.into_values().collect();
    summaries.sort_by(|a, b| {
        b.total_shortfall
            .partial_cmp(&a.total_shortfall)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.tenant_name.cmp(&b.tenant_name))
    });
    summaries
}

/// Whole months since the oldest unpaid due date: `floor(days / 30)`,
/// never negative.
pub fn months_behind(oldest_unpaid_due: NaiveDate, today: NaiveDate) -> i64 {
    ((today - oldest_unpaid_due).num_days() / DAYS_PER_MONTH).max(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthsBehindEntry {
    pub tenant_id: String,
    pub tenant_name: String,
    pub months_behind: i64,
    pub outstanding_total: f64,
    pub oldest_due_date: NaiveDate,
    pub open_invoices: usize,
}

/// The legacy "problematic tenants" view: tenants at least 3 months behind
/// on their oldest unpaid invoice, worst first.
pub fn months_behind_tenants(invoices: &[Invoice], today: NaiveDate) -> Vec<MonthsBehindEntry> {
    let mut by_tenant: HashMap<String, MonthsBehindEntry> = HashMap::new();

    for invoice in invoices {
        if invoice.balance_due <= 0.0 {
            continue;
        }
        let entry = by_tenant
            .entry(invoice.tenant_id.clone())
            .or_insert_with(|| MonthsBehindEntry {
                tenant_id: invoice.tenant_id.clone(),
                tenant_name: invoice.tenant_name.clone().unwrap_or_default(),
                months_behind: 0,
                outstanding_total: 0.0,
                oldest_due_date: invoice.due_date,
                open_invoices: 0,
            });
        entry.outstanding_total = round2(entry.outstanding_total + invoice.balance_due);
        entry.open_invoices += 1;
        if invoice.due_date < entry.oldest_due_date {
            entry.oldest_due_date = invoice.due_date;
        }
        if entry.tenant_name.is_empty() {
            if let Some(name) = &invoice.tenant_name {
                entry.tenant_name = name.clone();
            }
        }
    }

    let mut entries: Vec<MonthsBehindEntry> = by_tenant
        .into_values()
        .map(|mut entry| {
            entry.months_behind = months_behind(entry.oldest_due_date, today);
            entry
        })
        .filter(|entry| entry.months_behind >= MONTHS_BEHIND_THRESHOLD)
        .collect();

    entries.sort_by(|a, b| {
        b.months_behind.cmp(&a.months_behind).then_with(|| {
            b.outstanding_total
                .partial_cmp(&a.outstanding_total)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    entries
}
