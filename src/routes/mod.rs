use axum::{routing::get, Router};

use crate::state::AppState;

pub mod allocations;
pub mod health;
pub mod imports;
pub mod reconciliation;
pub mod statements;
pub mod underpayments;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(allocations::router())
        .merge(reconciliation::router())
        .merge(statements::router())
        .merge(underpayments::router())
        .merge(imports::router())
}
