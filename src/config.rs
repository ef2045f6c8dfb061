#![allow(dead_code)]

use std::env;

/// Which underpayment surface is the default when the caller does not pick
/// one explicitly. Two algorithms coexist on purpose (alert-driven and the
/// legacy months-behind view); product has not yet declared one canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderpaymentDefault {
    Alerts,
    MonthsBehind,
}

impl UnderpaymentDefault {
    fn from_env(value: Option<String>) -> Self {
        match value
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "months_behind" => Self::MonthsBehind,
            _ => Self::Alerts,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alerts => "alerts",
            Self::MonthsBehind => "months_behind",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub upstream_base_url: String,
    pub upstream_service_token: Option<String>,
    pub upstream_timeout_seconds: u64,
    pub open_invoice_cache_ttl_seconds: u64,
    pub open_invoice_cache_max_entries: u64,
    pub statement_cache_ttl_seconds: u64,
    pub statement_cache_max_entries: u64,
    pub underpayment_default: UnderpaymentDefault,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Khaya Finance API"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/v1")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            rate_limit_enabled: env_parse_bool_or("RATE_LIMIT_ENABLED", true),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            upstream_base_url: env_or("FINANCE_API_BASE_URL", "http://localhost:9000/api"),
            upstream_service_token: env_opt("FINANCE_API_SERVICE_TOKEN"),
            upstream_timeout_seconds: env_parse_or("FINANCE_API_TIMEOUT_SECONDS", 30),
            open_invoice_cache_ttl_seconds: env_parse_or("OPEN_INVOICE_CACHE_TTL_SECONDS", 15),
            open_invoice_cache_max_entries: env_parse_or("OPEN_INVOICE_CACHE_MAX_ENTRIES", 2000),
            statement_cache_ttl_seconds: env_parse_or("STATEMENT_CACHE_TTL_SECONDS", 20),
            statement_cache_max_entries: env_parse_or("STATEMENT_CACHE_MAX_ENTRIES", 2000),
            underpayment_default: UnderpaymentDefault::from_env(env_opt(
                "UNDERPAYMENT_DEFAULT_STRATEGY",
            )),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    match env_opt(key).as_deref().map(str::to_ascii_lowercase) {
        Some(value) if value == "1" || value == "true" || value == "yes" || value == "on" => true,
        Some(value) if value == "0" || value == "false" || value == "no" || value == "off" => false,
        Some(_) => default,
        None => default,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}
