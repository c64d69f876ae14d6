use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// Presence selects Redis as the preferred counter store.
    pub redis_url: Option<String>,
    pub redis_prefix: String,
    /// Honor `X-Forwarded-For` when resolving the client address.
    pub trust_proxy: bool,
    pub geoip_path: String,
    pub static_dir: String,
    pub cors_origins: Vec<String>,
    /// Requests per minute per client on API routes. `0` disables the limit.
    pub rate_limit_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("WHOAMI_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("WHOAMI_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            redis_url: std::env::var("WHOAMI_REDIS_URL")
                .or_else(|_| std::env::var("REDIS_URL"))
                .ok()
                .filter(|url| !url.trim().is_empty()),
            redis_prefix: std::env::var("WHOAMI_REDIS_PREFIX")
                .unwrap_or_else(|_| "visits".to_string()),
            trust_proxy: std::env::var("WHOAMI_TRUST_PROXY")
                .map(|v| matches!(v.as_str(), "true" | "1"))
                .unwrap_or(false),
            geoip_path: std::env::var("WHOAMI_GEOIP_PATH")
                .unwrap_or_else(|_| "./GeoLite2-City.mmdb".to_string()),
            static_dir: std::env::var("WHOAMI_STATIC_DIR")
                .unwrap_or_else(|_| "./public".to_string()),
            cors_origins: std::env::var("WHOAMI_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_per_minute: std::env::var("WHOAMI_RATE_LIMIT")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
        })
    }

    /// Location of the file-backed visit ledger.
    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("visits.json")
    }
}
