use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use sheet_cutter::config::PackingConfig;
use sheet_cutter::error::InputError;
use sheet_cutter::input::{parse_mode, validate_board, validate_kerf, validate_requests};
use sheet_cutter::solver::Solver;
use sheet_cutter::types::{Board, PackingResult, PartRequest};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

const DEFAULT_SOLVE_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone)]
struct AppState {
    solve_timeout: Duration,
}

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    board: Board,
    parts: Vec<PartRequest>,
    #[serde(default)]
    kerf: f64,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    config: Option<PackingConfig>,
}

#[derive(Serialize)]
struct OptimizeResponse {
    board: Board,
    sheet_count: usize,
    total_cuts: usize,
    #[serde(flatten)]
    result: PackingResult,
}

async fn optimize(
    State(state): State<AppState>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    let bad_request = |e: InputError| (StatusCode::BAD_REQUEST, e.to_string());
    validate_board(&req.board).map_err(bad_request)?;
    let kerf = validate_kerf(req.kerf).map_err(bad_request)?;
    validate_requests(&req.parts).map_err(bad_request)?;
    let mode = match req.mode.as_deref() {
        Some(m) => parse_mode(m).map_err(bad_request)?,
        None => Default::default(),
    };

    let solver = Solver::new(req.board, kerf, req.parts)
        .with_config(req.config.unwrap_or_default());
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let mut task = tokio::task::spawn_blocking(move || solver.solve_with_cancel(mode, &flag));

    let joined = match tokio::time::timeout(state.solve_timeout, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::warn!(
                timeout_ms = state.solve_timeout.as_millis() as u64,
                "solve timed out, cancelling"
            );
            cancel.store(true, Ordering::Relaxed);
            task.await
        }
    };
    let result = joined.map_err(|e| {
        let msg = format!("packing failed: {e}");
        tracing::error!("{msg}");
        sentry::capture_message(&msg, sentry::Level::Error);
        (StatusCode::INTERNAL_SERVER_ERROR, msg)
    })?;

    Ok(Json(OptimizeResponse {
        board: req.board,
        sheet_count: result.sheet_count(),
        total_cuts: result.total_cuts(),
        result,
    }))
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

async fn serve() -> std::io::Result<()> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");
    let solve_timeout = std::env::var("SOLVE_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_SOLVE_TIMEOUT_MS);

    let state = AppState {
        solve_timeout: Duration::from_millis(solve_timeout),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("Listening on {addr}");
    axum::serve(listener, app(state)).await
}

fn main() -> std::io::Result<()> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    // Must outlive the runtime so queued events get flushed on shutdown
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve())
}
