use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::client::finance_api::{self, bearer_token};
use crate::error::{AppError, AppResult};
use crate::schemas::ReconciliationPrefillQuery;
use crate::services::allocation::auto_allocate;
use crate::services::reconciliation::normalize_unmatched;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/payment-reconciliation/unmatched-payments",
            get(list_unmatched),
        )
        .route(
            "/payment-reconciliation/allocation-prefill",
            get(prefill_for_tenant),
        )
}

/// The reconciliation work queue: unmatched bank transactions and pending
/// manual payments folded together, newest first, candidate scores banded.
async fn list_unmatched(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let bearer = bearer_token(&headers);
    let payload = finance_api::unmatched_payments(&state, bearer.as_deref()).await?;
    let items = normalize_unmatched(payload.unmatched_transactions, payload.pending_payments);
    let count = items.len();

    Ok(Json(json!({
        "data": items,
        "count": count,
    })))
}

/// Drill from an unmatched item into allocation: resolve the tenant's active
/// lease, load its open invoices, and propose a plan for the item's amount.
async fn prefill_for_tenant(
    State(state): State<AppState>,
    Query(query): Query<ReconciliationPrefillQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    if query.amount <= 0.0 {
        return Err(AppError::BadRequest(
            "amount must be greater than zero.".to_string(),
        ));
    }

    let bearer = bearer_token(&headers);
    let prefill =
        finance_api::lease_prefill_or_degraded(&state, bearer.as_deref(), &query.tenant_id).await;
    let plan = auto_allocate(query.amount, &prefill.invoices);

    Ok(Json(json!({
        "lease": prefill.lease,
        "plan": plan,
        "open_invoices": &*prefill.invoices,
        "degraded": prefill.degraded,
    })))
}
