use tracing::warn;

pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub data_dir: String,
    pub preview_concurrency: usize,
    pub preview_max_edge: u32,
    pub preview_cache_max_entries: Option<u64>,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
    /// Largest accepted original upload body
    pub max_upload_bytes: usize,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8080;
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_PREVIEW_CONCURRENCY: usize = 2;
    const DEFAULT_PREVIEW_MAX_EDGE: u32 = 1024;
    const DEFAULT_LOG_LEVEL: &str = "info";
    const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let preview_concurrency = parse_or(
            &lookup,
            "FILMLOG_PREVIEW_CONCURRENCY",
            Self::DEFAULT_PREVIEW_CONCURRENCY,
        );
        let preview_concurrency = if preview_concurrency == 0 {
            warn!("FILMLOG_PREVIEW_CONCURRENCY must be at least 1, using 1");
            1
        } else {
            preview_concurrency
        };

        let preview_cache_max_entries = lookup("FILMLOG_PREVIEW_CACHE_MAX_ENTRIES").and_then(|raw| {
            match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(max) => Some(max),
                Err(_) => {
                    warn!(
                        "Invalid FILMLOG_PREVIEW_CACHE_MAX_ENTRIES '{}', preview cache stays unbounded",
                        raw
                    );
                    None
                }
            }
        });

        Self {
            host: lookup("FILMLOG_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            http_port: parse_or(&lookup, "FILMLOG_HTTP_PORT", Self::DEFAULT_HTTP_PORT),
            data_dir: lookup("FILMLOG_DATA_DIR")
                .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string()),
            preview_concurrency,
            preview_max_edge: parse_or(
                &lookup,
                "FILMLOG_PREVIEW_MAX_EDGE",
                Self::DEFAULT_PREVIEW_MAX_EDGE,
            ),
            preview_cache_max_entries,
            allowed_origins: lookup("FILMLOG_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            log_level: lookup("FILMLOG_LOG_LEVEL")
                .unwrap_or_else(|| Self::DEFAULT_LOG_LEVEL.to_string()),
            max_upload_bytes: parse_or(
                &lookup,
                "FILMLOG_MAX_UPLOAD_BYTES",
                Self::DEFAULT_MAX_UPLOAD_BYTES,
            ),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid {} '{}', falling back to {}", key, raw, default);
            default
        }),
        None => default,
    }
}
