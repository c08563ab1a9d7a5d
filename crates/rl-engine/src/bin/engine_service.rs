use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use rl_data::{FmpProvider, PriceService, SyntheticProvider};
use rl_engine::RiskEngine;
use rl_types::{OptimizeRequest, RiskRequest, RlError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let addr = std::env::var("RISKLINE_ENGINE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

    let mut prices = PriceService::new();
    match std::env::var("RISKLINE_FMP_KEY") {
        Ok(key) if !key.is_empty() => {
            prices.add_provider(Box::new(FmpProvider::new(key)));
        }
        _ => {
            tracing::warn!("RISKLINE_FMP_KEY not set; serving synthetic price history");
            prices.add_provider(Box::new(SyntheticProvider::new()));
        }
    }
    let engine = Arc::new(RiskEngine::new(prices));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Riskline engine service listening on {addr}");

    loop {
        let (mut socket, _) = listener.accept().await?;
        let engine = Arc::clone(&engine);

        tokio::spawn(async move {
            let mut buffer = vec![0u8; 64 * 1024];
            let read = match socket.read(&mut buffer).await {
                Ok(read) => read,
                Err(_) => return,
            };
            let raw = String::from_utf8_lossy(&buffer[..read]);

            let (status, body) = route(&engine, &raw).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                status,
                body.len(),
                body
            );

            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
    }
}

/// Minimal request routing over the raw HTTP text.
async fn route(engine: &RiskEngine, raw: &str) -> (&'static str, String) {
    let request_line = raw.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default();
    let body = raw.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or_default();

    match (method, path) {
        ("GET", "/health") => (
            "200 OK",
            r#"{"status":"ok","service":"engine"}"#.to_string(),
        ),
        ("POST", "/calculate_var") => {
            let request: RiskRequest = match serde_json::from_str(body) {
                Ok(request) => request,
                Err(e) => return ("400 Bad Request", error_body("invalid_request", &e.to_string())),
            };
            match engine.calculate(&request).await {
                Ok(response) => ok_json(&response),
                Err(e) => error_response(e),
            }
        }
        ("POST", "/optimize") => {
            let request: OptimizeRequest = match serde_json::from_str(body) {
                Ok(request) => request,
                Err(e) => return ("400 Bad Request", error_body("invalid_request", &e.to_string())),
            };
            match engine.optimize(&request).await {
                Ok(response) => ok_json(&response),
                Err(e) => error_response(e),
            }
        }
        ("GET", path) if path.starts_with("/analytics/") => {
            let symbol = path.trim_start_matches("/analytics/");
            if symbol.is_empty() {
                return ("400 Bad Request", error_body("invalid_request", "missing symbol"));
            }
            match engine.analytics(symbol).await {
                Ok(analytics) => ok_json(&analytics),
                Err(e) => error_response(e),
            }
        }
        _ => ("404 Not Found", error_body("not_found", path)),
    }
}

fn ok_json<T: serde::Serialize>(value: &T) -> (&'static str, String) {
    match serde_json::to_string(value) {
        Ok(json) => ("200 OK", json),
        Err(e) => (
            "500 Internal Server Error",
            error_body("serialization_failed", &e.to_string()),
        ),
    }
}

/// Map engine failures to status codes: user-correctable shapes are 400,
/// data/optimizer outcomes are 422, everything else is a 500.
fn error_response(error: RlError) -> (&'static str, String) {
    match &error {
        RlError::Request(e) => ("400 Bad Request", error_body("invalid_request", &e.to_string())),
        RlError::Serialization(e) => {
            ("400 Bad Request", error_body("invalid_request", &e.to_string()))
        }
        RlError::Data(e) => (
            "422 Unprocessable Entity",
            error_body("insufficient_data", &e.to_string()),
        ),
        RlError::Optimize(e) => (
            "422 Unprocessable Entity",
            error_body("optimization_failed", &e.to_string()),
        ),
        other => (
            "500 Internal Server Error",
            error_body("internal_error", &other.to_string()),
        ),
    }
}

fn error_body(error: &str, reason: &str) -> String {
    serde_json::json!({ "error": error, "reason": reason }).to_string()
}
