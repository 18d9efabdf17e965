use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub api_token_salt: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub supplier_request_timeout_secs: u64,
    pub supplier_user_agent: String,
    pub supplier_max_retries: u32,
    pub supplier_retry_backoff_base_ms: u64,
    pub sync_max_concurrent_suppliers: usize,
    pub sync_max_concurrent_fetches: usize,
    pub scheduler_enabled: bool,
    pub scheduler_cron: String,
    pub cors_allowed_origins: Vec<String>,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("api_token_salt", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "supplier_request_timeout_secs",
                &self.supplier_request_timeout_secs,
            )
            .field("supplier_user_agent", &self.supplier_user_agent)
            .field("supplier_max_retries", &self.supplier_max_retries)
            .field(
                "supplier_retry_backoff_base_ms",
                &self.supplier_retry_backoff_base_ms,
            )
            .field(
                "sync_max_concurrent_suppliers",
                &self.sync_max_concurrent_suppliers,
            )
            .field(
                "sync_max_concurrent_fetches",
                &self.sync_max_concurrent_fetches,
            )
            .field("scheduler_enabled", &self.scheduler_enabled)
            .field("scheduler_cron", &self.scheduler_cron)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("rate_limit_max_requests", &self.rate_limit_max_requests)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .finish()
    }
}
