use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;

use crate::client::finance_api::{self, bearer_token};
use crate::error::{AppError, AppResult};
use crate::schemas::{StatementPath, StatementQuery};
use crate::services::statement::{build_statement_view, LeaseStatementView};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/lease-statement/{lease_id}", get(get_lease_statement))
}

fn parse_date(raw: &str, name: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::BadRequest(format!("Invalid {name} date '{raw}'. Expected YYYY-MM-DD."))
    })
}

/// Tenant-facing statement for one lease over a period. The upstream owns
/// the ledger and the running balances; this endpoint orders and signs the
/// rows for display and flags a summary that does not reconcile.
async fn get_lease_statement(
    State(state): State<AppState>,
    Path(path): Path<StatementPath>,
    Query(query): Query<StatementQuery>,
    headers: HeaderMap,
) -> AppResult<Json<LeaseStatementView>> {
    let start = parse_date(&query.start, "start")?;
    let end = parse_date(&query.end, "end")?;
    if end < start {
        return Err(AppError::BadRequest(
            "end date is before start date.".to_string(),
        ));
    }

    let bearer = bearer_token(&headers);
    let cache_key = format!(
        "{}:{}:{start}:{end}",
        finance_api::cache_scope(&state, bearer.as_deref()),
        path.lease_id
    );
    if let Some(hit) = state.statement_cache.get(&cache_key).await {
        return Ok(Json(hit.as_ref().clone()));
    }

    let statement = finance_api::lease_statement(
        &state,
        bearer.as_deref(),
        &path.lease_id,
        &start.to_string(),
        &end.to_string(),
    )
    .await?;
    let view = Arc::new(build_statement_view(statement));

    if !view.totals_consistent {
        tracing::warn!(
            lease_id = %path.lease_id,
            opening = view.opening_balance,
            closing = view.closing_balance,
            "Statement summary does not reconcile with the closing balance"
        );
    }

    state.statement_cache.insert(cache_key, view.clone()).await;
    Ok(Json(view.as_ref().clone()))
}

#[cfg(test)]
mod tests {
    use super::parse_date;

    #[test]
    fn parses_iso_dates_only() {
        assert!(parse_date("2024-03-01", "start").is_ok());
        assert!(parse_date(" 2024-03-01 ", "start").is_ok());
        assert!(parse_date("01/03/2024", "start").is_err());
        assert!(parse_date("", "end").is_err());
    }
}
