use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::client::finance_api::{self, bearer_token};
use crate::error::{AppError, AppResult};
use crate::schemas::{AlertPath, UnderpaymentAlertsQuery};
use crate::services::allocation::{auto_allocate, round2};
use crate::services::underpayment::{
    group_alerts_by_tenant, months_behind_tenants, UnderpaymentStrategy,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/underpayment-alerts", get(list_underpayments))
        .route(
            "/underpayment-alerts/{alert_id}/allocation-prefill",
            get(alert_allocation_prefill),
        )
}

/// Tenants behind on rent, under the requested strategy.
///
/// `?strategy=alerts` groups backend underpayment alerts per tenant, worst
/// shortfall first. `?strategy=months_behind` is the legacy view derived
/// from open invoice ages. Omitting the parameter uses the configured
/// default.
async fn list_underpayments(
    State(state): State<AppState>,
    Query(query): Query<UnderpaymentAlertsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let strategy =
        UnderpaymentStrategy::resolve(query.strategy.as_deref(), state.config.underpayment_default)
            .map_err(AppError::BadRequest)?;
    let bearer = bearer_token(&headers);

    match strategy {
        UnderpaymentStrategy::Alerts => {
            let alerts = finance_api::underpayment_alerts(&state, bearer.as_deref()).await?;
            let grouped = group_alerts_by_tenant(alerts);
            let total_shortfall = round2(
                grouped
                    .iter()
                    .map(|summary| summary.total_shortfall)
                    .sum::<f64>(),
            );
            let tenant_count = grouped.len();

            Ok(Json(json!({
                "strategy": "alerts",
                "data": grouped,
                "tenant_count": tenant_count,
                "total_shortfall": total_shortfall,
            })))
        }
        UnderpaymentStrategy::MonthsBehind => {
            let invoices = finance_api::list_all_open_invoices(&state, bearer.as_deref()).await?;
            let entries = months_behind_tenants(&invoices, Utc::now().date_naive());
            let tenant_count = entries.len();

            Ok(Json(json!({
                "strategy": "months_behind",
                "data": entries,
                "tenant_count": tenant_count,
            })))
        }
    }
}

/// Drill from an alert into allocation, seeded with what the tenant actually
/// paid: resolve the active lease and propose a plan for the actual amount.
async fn alert_allocation_prefill(
    State(state): State<AppState>,
    Path(path): Path<AlertPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let bearer = bearer_token(&headers);
    let alerts = finance_api::underpayment_alerts(&state, bearer.as_deref()).await?;
    let alert = alerts
        .into_iter()
        .find(|alert| alert.id == path.alert_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("Underpayment alert {} not found.", path.alert_id))
        })?;

    // The alert is the primary resource; the lease/invoice prefetch is
    // secondary and degrades instead of failing the drill-down.
    let prefill =
        finance_api::lease_prefill_or_degraded(&state, bearer.as_deref(), &alert.tenant_id).await;
    let plan = auto_allocate(alert.actual_amount, &prefill.invoices);

    Ok(Json(json!({
        "alert": alert,
        "lease": prefill.lease,
        "plan": plan,
        "open_invoices": &*prefill.invoices,
        "degraded": prefill.degraded,
    })))
}
