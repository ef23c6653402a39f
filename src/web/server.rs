//! Web server for report preview
//!
//! Provides an HTTP server using Axum that serves one report file and the
//! embedded assets.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use log::{info, warn};
use tokio::net::TcpListener;

use super::routes;

/// Shared application state
pub struct AppState {
    pub report_path: PathBuf,
}

/// Configuration for the preview server
pub struct ServeConfig {
    pub port: u16,
    pub open_browser: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            open_browser: true,
        }
    }
}

/// Build the router for a report
pub fn app(report_path: PathBuf) -> Router {
    let state = Arc::new(AppState { report_path });
    Router::new()
        .merge(routes::api_routes())
        .merge(routes::static_routes())
        .with_state(state)
}

/// Serve `report_path` on localhost until interrupted
pub async fn start_server(
    report_path: PathBuf,
    config: ServeConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;

    let url = format!("http://localhost:{}", config.port);
    info!("Serving {} at {}", report_path.display(), url);

    if config.open_browser {
        info!("Opening browser...");
        if let Err(e) = open::that(&url) {
            warn!("Could not open browser: {}", e);
            warn!("Please open {} manually", url);
        }
    }

    info!("Press Ctrl+C to stop the server");

    axum::serve(listener, app(report_path)).await?;

    Ok(())
}
