use anyhow::Context;

#[derive(Debug)]
pub struct Config {
    /// Remote sync endpoint base, e.g. "http://localhost:4000". Unset means
    /// no backend: pending changes are dropped instead of accumulated.
    pub backend_url: Option<String>,
    pub db_connection_string: String,
    pub bind_addr: String,
    pub sync_interval_ms: u64,
    pub http_timeout_ms: u64,
}

const DEFAULT_DB_CONNECTION_STRING: &str = "sqlite://vidsync.sqlite?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4170";
const DEFAULT_SYNC_INTERVAL_MS: u64 = 5000;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let backend_url = std::env::var("BACKEND_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let db_connection_string =
            std::env::var("DB_CONNECTION_STRING").unwrap_or(DEFAULT_DB_CONNECTION_STRING.into());
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.into());
        let sync_interval_ms = env_u64("SYNC_INTERVAL_MS", DEFAULT_SYNC_INTERVAL_MS)?;
        let http_timeout_ms = env_u64("HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?;
        Ok(Config {
            backend_url,
            db_connection_string,
            bind_addr,
            sync_interval_ms,
            http_timeout_ms,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sync_interval_ms == 0 {
            return Err("SYNC_INTERVAL_MS must be positive".into());
        }
        if let Some(url) = &self.backend_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("BACKEND_URL is not an http(s) URL: {}", url));
            }
        }
        Ok(())
    }
}

fn env_u64(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Invalid {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
