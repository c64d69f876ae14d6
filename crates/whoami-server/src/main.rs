use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use whoami_core::CounterStore;
use whoami_server::{accounting::VisitAccounting, config::Config, state::AppState};
use whoami_store::{FileStore, RedisConfig, RedisStore};

/// `whoami health` — liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$WHOAMI_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("WHOAMI_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }

    // Structured JSON logging. Level controlled via RUST_LOG env var.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("whoami=info".parse()?),
        )
        .json()
        .init();

    let cfg = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // The file store never creates directories itself.
    std::fs::create_dir_all(&cfg.data_dir)?;
    let file: Arc<dyn CounterStore> = Arc::new(FileStore::new(cfg.ledger_path()));

    let external: Option<Arc<dyn CounterStore>> = match &cfg.redis_url {
        Some(url) => {
            let store: Arc<dyn CounterStore> =
                RedisStore::start(RedisConfig::new(url.as_str(), cfg.redis_prefix.as_str()))?;
            info!(prefix = %cfg.redis_prefix, "Redis visit store configured, connecting in background");
            Some(store)
        }
        None => {
            info!("WHOAMI_REDIS_URL not set, counting visits in the file store only");
            None
        }
    };

    let accounting = VisitAccounting::new(external, file);
    let state = Arc::new(AppState::new(accounting, cfg.clone()));

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = whoami_server::app::build_app(state);

    info!(
        port = cfg.port,
        trust_proxy = cfg.trust_proxy,
        "whoami listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;

    Ok(())
}
