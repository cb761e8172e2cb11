use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use tanq_realtime::config::{generate_config_template, Config};
use tanq_realtime::{routes, state};

const DEFAULT_LOG_FILTER: &str = "tanq_realtime=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(env_filter).init();
    }

    tracing::info!("tanq realtime server v{} starting", env!("CARGO_PKG_VERSION"));

    if config.uses_dev_secret() {
        tracing::warn!("Using the development JWT secret; set TANQ_JWT_SECRET in production");
    }

    tracing::info!(
        heartbeat_secs = config.realtime.heartbeat_interval().as_secs(),
        ping_secs = config.realtime.ping_interval().as_secs(),
        pong_timeout_secs = config.realtime.pong_timeout().as_secs(),
        "Keep-alive timing"
    );

    // One hub and one registry for the whole process
    let app_state = state::AppState::new(config.jwt_secret.clone(), config.realtime.clone());

    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
