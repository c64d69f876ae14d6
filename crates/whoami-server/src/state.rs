use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Extensions, HeaderMap};
use tokio::sync::Mutex;
use tokio::time::Instant;

use whoami_core::{resolve_client_id, ClientId};

use crate::{
    accounting::VisitAccounting,
    config::Config,
    enrich::{geo, GeoResolver},
};

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Request timestamps per client key within the last [`RATE_LIMIT_WINDOW`].
///
/// Clients that stop calling leave a stale window behind; those are swept at
/// most once per window length so the map only holds recently active keys.
struct RateLimiter {
    windows: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            windows: HashMap::new(),
            last_sweep: Instant::now(),
        }
    }

    fn admit(&mut self, key: &str, limit: usize, now: Instant) -> bool {
        if now.duration_since(self.last_sweep) >= RATE_LIMIT_WINDOW {
            self.windows.retain(|_, window| {
                window
                    .back()
                    .is_some_and(|t| now.duration_since(*t) < RATE_LIMIT_WINDOW)
            });
            self.last_sweep = now;
        }

        let window = self.windows.entry(key.to_string()).or_default();
        // Drop timestamps older than the window.
        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= RATE_LIMIT_WINDOW)
        {
            window.pop_front();
        }
        if window.len() >= limit {
            return false;
        }
        window.push_back(now);
        true
    }
}

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// Process-wide singletons live here: the accounting service (and through
/// it the Redis connection and the file-store lock), the GeoIP reader and
/// the rate limiter.
pub struct AppState {
    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    pub accounting: Arc<VisitAccounting>,

    /// Location resolver. [`geo::NoGeo`] when the database is absent.
    pub geo: Arc<dyn GeoResolver>,

    /// Per-client sliding-window rate limiter for the API routes.
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl AppState {
    /// Construct a new `AppState`. Opens the GeoIP database named in
    /// `config`, falling back to empty locations when it is missing.
    pub fn new(accounting: VisitAccounting, config: Config) -> Self {
        let geo = geo::open_resolver(&config.geoip_path);
        Self {
            config: Arc::new(config),
            accounting: Arc::new(accounting),
            geo,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
        }
    }

    /// Resolve the client key for a request from `X-Forwarded-For` (when
    /// proxy trust is enabled) or the connection's peer address.
    pub fn client_id(&self, headers: &HeaderMap, extensions: &Extensions) -> ClientId {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok());
        let peer = extensions
            .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
            .map(|info| info.0.ip().to_string());
        resolve_client_id(forwarded, peer.as_deref(), self.config.trust_proxy)
    }

    /// Check whether `client` is within the per-minute rate limit.
    ///
    /// Returns `true` if the request should proceed, `false` if it should be
    /// rejected with 429. Slides the window on every call. A limit of `0`
    /// disables the check.
    pub async fn check_rate_limit(&self, client: &ClientId) -> bool {
        let limit = self.config.rate_limit_per_minute as usize;
        if limit == 0 {
            return true;
        }

        self.rate_limiter
            .lock()
            .await
            .admit(client.as_str(), limit, Instant::now())
    }

    /// Number of client keys the rate limiter is currently tracking.
    pub async fn rate_limited_clients(&self) -> usize {
        self.rate_limiter.lock().await.windows.len()
    }
}
