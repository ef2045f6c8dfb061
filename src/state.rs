use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use url::Url;

use crate::config::AppConfig;
use crate::models::Invoice;
use crate::services::statement::LeaseStatementView;

/// Shared application state: config, the upstream HTTP client, and short-TTL
/// read-through caches for the hot list endpoints. The caches exist to absorb
/// dashboard refresh bursts; TTLs are short because the upstream is the
/// source of truth and the UI re-fetches after every mutation.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http_client: reqwest::Client,
    /// Keyed by lease id.
    pub open_invoice_cache: Cache<String, Arc<Vec<Invoice>>>,
    /// Keyed by `{lease_id}:{start}:{end}`.
    pub statement_cache: Cache<String, Arc<LeaseStatementView>>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        // Fail fast on a malformed upstream URL instead of erroring on the
        // first request.
        Url::parse(&config.upstream_base_url)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_seconds))
            .user_agent(format!("{}/0.1", config.app_name.replace(' ', "-")))
            .build()?;

        let open_invoice_cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.open_invoice_cache_ttl_seconds))
            .max_capacity(config.open_invoice_cache_max_entries)
            .build();
        let statement_cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.statement_cache_ttl_seconds))
            .max_capacity(config.statement_cache_max_entries)
            .build();

        Ok(Self {
            config: Arc::new(config),
            http_client,
            open_invoice_cache,
            statement_cache,
        })
    }
}
