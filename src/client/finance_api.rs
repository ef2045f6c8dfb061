//! Typed client for the upstream finance API (the backend of record).
//!
//! Every call site decodes into an explicit model; a payload that does not
//! match is an `AppError::Deserialization`, not an empty list. Callers that
//! can degrade gracefully (secondary prefetches) decide that themselves.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        AllocateOutcome, BankImportOutcome, Invoice, Lease, LeaseStatement, ListEnvelope,
        UnderpaymentAlert, UnderpaymentAlertsPayload, UnmatchedPaymentsPayload,
    },
    schemas::AllocationSubmission,
    state::AppState,
};

/// Pull the caller's bearer token so it can be forwarded upstream verbatim.
/// Authentication itself is the upstream's concern.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn request(state: &AppState, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
    let url = format!(
        "{}{path}",
        state.config.upstream_base_url.trim_end_matches('/')
    );
    let builder = state.http_client.request(method, url);
    match bearer {
        Some(token) => builder.bearer_auth(token),
        None => match &state.config.upstream_service_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        },
    }
}

async fn send(builder: RequestBuilder, context: &str) -> AppResult<Response> {
    let response = builder.send().await.map_err(|error| {
        tracing::error!(error = %error, context, "Upstream request failed");
        AppError::Dependency(format!("{context}: upstream request failed."))
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(format!("{context}: not found.")));
    }
    if !status.is_success() {
        let detail = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| {
                body.get("detail")
                    .or_else(|| body.get("error"))
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
            })
            .unwrap_or_else(|| "no detail".to_string());
        return Err(AppError::Dependency(format!(
            "{context}: upstream error ({status}): {detail}"
        )));
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(response: Response, context: &str) -> AppResult<T> {
    response.json::<T>().await.map_err(|error| {
        AppError::Deserialization(format!(
            "{context}: upstream payload did not match the expected shape: {error}"
        ))
    })
}

/// Open (balance-carrying) invoices for one lease. The `open` filter is also
/// re-applied here in case the upstream returns settled rows.
pub async fn list_open_invoices(
    state: &AppState,
    bearer: Option<&str>,
    lease_id: &str,
) -> AppResult<Vec<Invoice>> {
    let response = send(
        request(state, Method::GET, "/invoices", bearer)
            .query(&[("lease_id", lease_id), ("open", "true")]),
        "list invoices",
    )
    .await?;
    let envelope: ListEnvelope<Invoice> = decode(response, "list invoices").await?;
    Ok(envelope
        .data
        .into_iter()
        .filter(Invoice::is_open)
        .collect())
}

/// Cache keys are scoped by the identity the fetch was authorized as, so an
/// entry fetched under one caller's token is never served to another (or to
/// an anonymous caller). The token itself never lands in the key.
pub fn cache_scope(state: &AppState, bearer: Option<&str>) -> String {
    match bearer.or(state.config.upstream_service_token.as_deref()) {
        Some(token) => Uuid::new_v5(&Uuid::NAMESPACE_OID, token.as_bytes()).to_string(),
        None => "anonymous".to_string(),
    }
}

fn open_invoice_cache_key(state: &AppState, bearer: Option<&str>, lease_id: &str) -> String {
    format!("{}:{lease_id}", cache_scope(state, bearer))
}

/// Read-through cached variant of [`list_open_invoices`], used by the
/// allocation prefill endpoints that dashboards hammer on every keystroke.
pub async fn open_invoices_cached(
    state: &AppState,
    bearer: Option<&str>,
    lease_id: &str,
) -> AppResult<Arc<Vec<Invoice>>> {
    let key = open_invoice_cache_key(state, bearer, lease_id);
    if let Some(hit) = state.open_invoice_cache.get(&key).await {
        return Ok(hit);
    }
    let fresh = Arc::new(list_open_invoices(state, bearer, lease_id).await?);
    state.open_invoice_cache.insert(key, fresh.clone()).await;
    Ok(fresh)
}

/// Drop this caller's cached open-invoice list for a lease, after an
/// allocation changed the balances. Other callers' entries age out via TTL.
pub async fn invalidate_open_invoices(state: &AppState, bearer: Option<&str>, lease_id: &str) {
    let key = open_invoice_cache_key(state, bearer, lease_id);
    state.open_invoice_cache.invalidate(&key).await;
}

/// All open invoices across the portfolio, for the legacy months-behind view.
pub async fn list_all_open_invoices(
    state: &AppState,
    bearer: Option<&str>,
) -> AppResult<Vec<Invoice>> {
    let response = send(
        request(state, Method::GET, "/invoices", bearer).query(&[("open", "true")]),
        "list open invoices",
    )
    .await?;
    let envelope: ListEnvelope<Invoice> = decode(response, "list open invoices").await?;
    Ok(envelope
        .data
        .into_iter()
        .filter(Invoice::is_open)
        .collect())
}

/// Locate the tenant's active lease, used when drilling into an alert or an
/// unmatched payment.
pub async fn active_lease_for_tenant(
    state: &AppState,
    bearer: Option<&str>,
    tenant_id: &str,
) -> AppResult<Lease> {
    let response = send(
        request(state, Method::GET, "/leases", bearer)
            .query(&[("tenant_id", tenant_id), ("status", "active")]),
        "list leases",
    )
    .await?;
    let envelope: ListEnvelope<Lease> = decode(response, "list leases").await?;
    envelope
        .data
        .into_iter()
        .find(Lease::is_active)
        .ok_or_else(|| {
            AppError::NotFound(format!("No active lease found for tenant {tenant_id}."))
        })
}

/// Lease and open invoices loaded for a drill-down modal. Secondary data:
/// when a fetch fails the modal still opens, with an empty list and the
/// `degraded` flag set.
pub struct LeasePrefill {
    pub lease: Option<Lease>,
    pub invoices: Arc<Vec<Invoice>>,
    pub degraded: bool,
}

/// Resolve a tenant's active lease and its open invoices for an allocation
/// drill-down. A failed prefetch degrades to an empty list with a warning
/// instead of failing the primary view.
pub async fn lease_prefill_or_degraded(
    state: &AppState,
    bearer: Option<&str>,
    tenant_id: &str,
) -> LeasePrefill {
    let lease = match active_lease_for_tenant(state, bearer, tenant_id).await {
        Ok(lease) => lease,
        Err(error) => {
            tracing::warn!(tenant_id, error = %error, "Lease prefetch failed, degrading to an empty prefill");
            return LeasePrefill {
                lease: None,
                invoices: Arc::new(Vec::new()),
                degraded: true,
            };
        }
    };

    match open_invoices_cached(state, bearer, &lease.id).await {
        Ok(invoices) => LeasePrefill {
            lease: Some(lease),
            invoices,
            degraded: false,
        },
        Err(error) => {
            tracing::warn!(tenant_id, error = %error, "Open invoice prefetch failed, degrading to an empty list");
            LeasePrefill {
                lease: Some(lease),
                invoices: Arc::new(Vec::new()),
                degraded: true,
            }
        }
    }
}

pub async fn lease_statement(
    state: &AppState,
    bearer: Option<&str>,
    lease_id: &str,
    start: &str,
    end: &str,
) -> AppResult<LeaseStatement> {
    let path = format!("/finance/lease-statement/{lease_id}/");
    let response = send(
        request(state, Method::GET, &path, bearer).query(&[("start", start), ("end", end)]),
        "lease statement",
    )
    .await?;
    decode(response, "lease statement").await
}

pub async fn unmatched_payments(
    state: &AppState,
    bearer: Option<&str>,
) -> AppResult<UnmatchedPaymentsPayload> {
    let response = send(
        request(
            state,
            Method::GET,
            "/finance/payment-reconciliation/unmatched-payments",
            bearer,
        ),
        "unmatched payments",
    )
    .await?;
    decode(response, "unmatched payments").await
}

pub async fn underpayment_alerts(
    state: &AppState,
    bearer: Option<&str>,
) -> AppResult<Vec<UnderpaymentAlert>> {
    let response = send(
        request(state, Method::GET, "/finance/underpayment-alerts", bearer),
        "underpayment alerts",
    )
    .await?;
    let payload: UnderpaymentAlertsPayload = decode(response, "underpayment alerts").await?;
    if !payload.success {
        return Err(AppError::Dependency(
            "underpayment alerts: upstream reported failure.".to_string(),
        ));
    }
    Ok(payload.alerts)
}

/// Submit an allocation instruction. The upstream applies it transactionally
/// and its `{success, error}` answer is returned to the caller verbatim.
pub async fn allocate_payment(
    state: &AppState,
    bearer: Option<&str>,
    submission: &AllocationSubmission,
) -> AppResult<AllocateOutcome> {
    let response = send(
        request(
            state,
            Method::POST,
            "/finance/payment-reconciliation/allocate-payment",
            bearer,
        )
        .json(submission),
        "allocate payment",
    )
    .await?;
    decode(response, "allocate payment").await
}

/// Forward a raw bank CSV for authoritative parsing and reconciliation. The
/// local parse is preview-only; the upstream re-parses the original bytes.
pub async fn submit_bank_import(
    state: &AppState,
    bearer: Option<&str>,
    bank_name: &str,
    mapping_json: Option<String>,
    file_name: &str,
    file_bytes: Vec<u8>,
) -> AppResult<BankImportOutcome> {
    let part = reqwest::multipart::Part::bytes(file_bytes)
        .file_name(file_name.to_string())
        .mime_str("text/csv")
        .map_err(|error| AppError::Internal(format!("Could not build upload part: {error}")))?;
    let mut form = reqwest::multipart::Form::new()
        .text("bank_name", bank_name.to_string())
        .part("file", part);
    if let Some(mapping) = mapping_json {
        form = form.text("mapping", mapping);
    }

    let response = send(
        request(state, Method::POST, "/finance/bank-imports", bearer).multipart(form),
        "bank import",
    )
    .await?;
    decode(response, "bank import").await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{cache_scope, lease_prefill_or_degraded, open_invoices_cached};
    use crate::config::AppConfig;
    use crate::state::AppState;

    // Nothing listens on the discard port, so every upstream call fails fast.
    fn test_state(service_token: Option<&str>) -> AppState {
        let mut config = AppConfig::from_env();
        config.upstream_base_url = "http://127.0.0.1:9".to_string();
        config.upstream_timeout_seconds = 1;
        config.upstream_service_token = service_token.map(str::to_string);
        AppState::build(config).expect("state builds")
    }

    #[test]
    fn scopes_cache_keys_by_caller_identity() {
        let state = test_state(Some("svc-token"));
        let caller_a = cache_scope(&state, Some("token-a"));
        let caller_b = cache_scope(&state, Some("token-b"));
        let service = cache_scope(&state, None);

        assert_ne!(caller_a, caller_b);
        assert_ne!(caller_a, service);
        assert_eq!(cache_scope(&state, Some("token-a")), caller_a);

        let anonymous = cache_scope(&test_state(None), None);
        assert_eq!(anonymous, "anonymous");
        assert_ne!(anonymous, service);
    }

    #[tokio::test]
    async fn cached_invoices_are_not_shared_across_callers() {
        let state = test_state(None);
        let key = format!("{}:lease-1", cache_scope(&state, Some("token-a")));
        state
            .open_invoice_cache
            .insert(key, Arc::new(Vec::new()))
            .await;

        // The caller that warmed the entry hits it; a different caller goes
        // upstream (unreachable here) instead of reading someone else's data.
        let same_caller = open_invoices_cached(&state, Some("token-a"), "lease-1").await;
        assert!(same_caller.expect("cache hit").is_empty());
        let other_caller = open_invoices_cached(&state, Some("token-b"), "lease-1").await;
        assert!(other_caller.is_err());
        let anonymous = open_invoices_cached(&state, None, "lease-1").await;
        assert!(anonymous.is_err());
    }

    #[tokio::test]
    async fn drill_down_prefetch_degrades_instead_of_failing() {
        let state = test_state(None);
        let prefill = lease_prefill_or_degraded(&state, None, "tenant-1").await;

        assert!(prefill.degraded);
        assert!(prefill.lease.is_none());
        assert!(prefill.invoices.is_empty());
    }
}
