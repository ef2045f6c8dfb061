use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// Liveness plus a shallow upstream probe. A slow or unreachable finance
/// backend degrades the status but never fails the endpoint.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let url = format!(
        "{}/health",
        state.config.upstream_base_url.trim_end_matches('/')
    );
    let probe = state.http_client.get(url).send();
    let upstream_ok = match tokio::time::timeout(Duration::from_secs(3), probe).await {
        Ok(Ok(response)) => response.status().is_success(),
        Ok(Err(error)) => {
            tracing::warn!(error = %error, "Upstream health probe failed");
            false
        }
        Err(_) => {
            tracing::warn!("Upstream health probe timed out after 3s");
            false
        }
    };

    Json(json!({
        "status": if upstream_ok { "ok" } else { "degraded" },
        "app": state.config.app_name,
        "environment": state.config.environment,
        "upstream_ok": upstream_ok,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
