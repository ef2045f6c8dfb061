use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::client::finance_api::{self, bearer_token};
use crate::error::{AppError, AppResult};
use crate::models::AllocateOutcome;
use crate::schemas::{
    validate_input, AllocatePaymentInput, AllocationPrefillQuery, AllocationPreviewInput,
    AllocationSubmission,
};
use crate::services::allocation::{
    auto_allocate, clamp_entries, remaining_amount, validate_plan, AllocationEntry,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/allocations/prefill", get(prefill_allocation))
        .route("/allocations/preview", post(preview_allocation))
        .route("/allocations", post(submit_allocation))
}

/// Propose an oldest-due-first allocation of `amount` across the lease's
/// open invoices. Pure preview: nothing is written until submission.
async fn prefill_allocation(
    State(state): State<AppState>,
    Query(query): Query<AllocationPrefillQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    if query.amount <= 0.0 {
        return Err(AppError::BadRequest(
            "amount must be greater than zero.".to_string(),
        ));
    }

    let bearer = bearer_token(&headers);
    let invoices =
        finance_api::open_invoices_cached(&state, bearer.as_deref(), &query.lease_id).await?;
    let plan = auto_allocate(query.amount, &invoices);

    Ok(Json(json!({
        "plan": plan,
        "open_invoices": &*invoices,
    })))
}

/// Echo a manually edited plan back with each amount clamped to its
/// invoice's balance and the payment remainder, plus the recomputed
/// remaining. Pure preview for the edit form; nothing is validated or
/// submitted here.
async fn preview_allocation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AllocationPreviewInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;

    let bearer = bearer_token(&headers);
    let invoices =
        finance_api::open_invoices_cached(&state, bearer.as_deref(), &payload.lease_id).await?;
    let requested: Vec<AllocationEntry> = payload
        .allocations
        .iter()
        .map(|line| AllocationEntry {
            invoice_id: line.invoice_id.clone(),
            amount: line.amount,
        })
        .collect();
    let clamped = clamp_entries(payload.payment_amount, &requested, &invoices);
    let remaining = remaining_amount(payload.payment_amount, &clamped);

    Ok(Json(json!({
        "allocations": clamped,
        "remaining": remaining,
    })))
}

/// Validate a user-assembled plan and forward it to the backend of record.
///
/// Validation runs against a fresh invoice fetch, never the prefill cache,
/// and every violation is reported together as a 422. The upstream's
/// `{success, error}` answer is returned verbatim; on success the cached
/// invoice list for the lease is dropped so the next prefill re-fetches.
async fn submit_allocation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AllocatePaymentInput>,
) -> AppResult<Json<AllocateOutcome>> {
    validate_input(&payload)?;
    if payload.payment_id.is_some() == payload.bank_transaction_id.is_some() {
        return Err(AppError::BadRequest(
            "Provide exactly one of payment_id or bank_transaction_id.".to_string(),
        ));
    }

    let bearer = bearer_token(&headers);
    let invoices =
        finance_api::list_open_invoices(&state, bearer.as_deref(), &payload.lease_id).await?;
    let entries: Vec<AllocationEntry> = payload
        .allocations
        .iter()
        .map(|line| AllocationEntry {
            invoice_id: line.invoice_id.clone(),
            amount: line.amount,
        })
        .collect();
    validate_plan(
        payload.payment_amount,
        &entries,
        payload.create_credit,
        &invoices,
    )
    .map_err(AppError::Validation)?;

    let submission = AllocationSubmission {
        payment_id: payload.payment_id.clone(),
        bank_transaction_id: payload.bank_transaction_id.clone(),
        allocations: payload.allocations.clone(),
        create_credit: payload.create_credit,
        notes: payload.notes.clone(),
    };
    let outcome = finance_api::allocate_payment(&state, bearer.as_deref(), &submission).await?;

    if outcome.success {
        finance_api::invalidate_open_invoices(&state, bearer.as_deref(), &payload.lease_id).await;
    } else {
        tracing::warn!(
            lease_id = %payload.lease_id,
            error = ?outcome.error,
            "Upstream rejected allocation"
        );
    }

    Ok(Json(outcome))
}
