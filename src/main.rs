use std::{net::SocketAddr, sync::Arc};

use blog_front::{
    config::Config,
    content_loader::load_templates,
    hot_reload::start_content_watcher,
    routes::build_router,
    source::source_for,
    state::{AppState, RouterState},
};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::load()?);
    info!("RUST_ENV is set to development: {}", config.is_development);

    let templates = load_templates(&config.content_dir).await.map_err(|e| {
        format!(
            "Failed to load templates from {}: {}",
            config.content_dir.display(),
            e
        )
    })?;
    let source = source_for(&config.source)?;
    info!(source = %source.describe(), theme = ?config.theme, "content source ready");

    let state = Arc::new(AppState::new(config.clone(), templates, source));

    // Hot-reload setup
    let (tx, _rx) = broadcast::channel(1);
    if config.is_development {
        info!("Hot reload enabled. Check logs for file change events.");
        start_content_watcher(tx.clone(), state.clone());
    }

    let router_state = RouterState {
        app_state: state,
        broadcaster: tx,
    };
    let app = build_router(router_state, &config.content_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
