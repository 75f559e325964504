use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use cc_gateway::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, config_path) = cli::load_server_config()?;
            tracing::info!(path = %config_path.display(), "config loaded");
            run_server(Arc::new(config)).await
        }
        Some(command) => {
            let exit_code = cli::run_client_command(command).await;
            std::process::exit(exit_code);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cc_gateway=debug")))
        .json()
        .init();
}

/// Assembles [`cc_gateway::state::AppState`], builds the router, and serves
/// it.
async fn run_server(config: Arc<cc_domain::Config>) -> anyhow::Result<()> {
    tracing::info!("contextcache starting");

    let state = cc_gateway::bootstrap::build_app_state(config.clone()).await?;

    // No CORS section in `cc_domain::Config` yet; non-production allows any
    // origin for local client development, production locks to same-origin
    // only until a config knob for allowed origins exists.
    let cors = if config.server.production {
        CorsLayer::new()
    } else {
        CorsLayer::permissive()
    };

    let app = cc_gateway::api::router().with_state(state).layer(cors).layer(ConcurrencyLimitLayer::new(256));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
