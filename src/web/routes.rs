//! HTTP routes for the report preview
//!
//! The report itself is re-read on every request so a rebuilt file shows
//! up on refresh.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use super::server::AppState;

/// Report file details
#[derive(Serialize)]
struct ReportInfo {
    path: String,
    bytes: u64,
}

/// Create API routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/report", get(report_info))
}

/// Create the report route. Reports inline all their assets, so nothing
/// else is served.
pub fn static_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(report_html))
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// GET /api/report - Path and size of the served report
async fn report_info(State(state): State<Arc<AppState>>) -> Response {
    match tokio::fs::metadata(&state.report_path).await {
        Ok(meta) => Json(ReportInfo {
            path: state.report_path.display().to_string(),
            bytes: meta.len(),
        })
        .into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("Report not readable: {}", e)})),
        )
            .into_response(),
    }
}

/// GET / - Serve the report
async fn report_html(State(state): State<Arc<AppState>>) -> Response {
    match tokio::fs::read_to_string(&state.report_path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            format!("Report {} not readable: {}", state.report_path.display(), e),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::web::server::app;

    async fn spawn(report: PathBuf) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app(report)).await.unwrap();
        });
        port
    }

    async fn get(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request =
            format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_report_and_api() {
        let dir = TempDir::new().unwrap();
        let report = dir.path().join("tree.html");
        std::fs::write(&report, "<!DOCTYPE html><p>tree</p>").unwrap();
        let port = spawn(report).await;

        let page = get(port, "/").await;
        assert!(page.starts_with("HTTP/1.1 200"));
        assert!(page.contains("<p>tree</p>"));

        let health = get(port, "/api/health").await;
        assert!(health.starts_with("HTTP/1.1 200"));
        assert!(health.ends_with("ok"));

        let info = get(port, "/api/report").await;
        assert!(info.contains(r#""bytes":26"#));

        assert!(get(port, "/assets/main.js").await.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn test_missing_report_is_not_found() {
        let dir = TempDir::new().unwrap();
        let port = spawn(dir.path().join("gone.html")).await;

        assert!(get(port, "/").await.starts_with("HTTP/1.1 404"));
        assert!(get(port, "/api/report").await.starts_with("HTTP/1.1 404"));
    }
}
