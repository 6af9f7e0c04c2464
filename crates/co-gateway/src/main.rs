use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use co_agents::{DefaultStudentAgent, DefaultTeacherAgent, DeterministicMockLlm, RegexSafetyFilter};
use co_orchestrator::{FixtureClassroomLoader, Orchestrator};
use co_sessions::{SessionLockMap, SessionStore};

use co_gateway::api;
use co_gateway::config::{Config, ConfigSeverity};
use co_gateway::realtime::BroadcastRealtimeSink;
use co_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env();
    run_server(config).await
}

/// Structured JSON logging, following the workspace model's `init_tracing`.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,co_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("classroom orchestrator gateway starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Collaborators (spec.md §1's "out of scope, interfaces only" list) ──
    let llm = Arc::new(DeterministicMockLlm);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(SessionStore::new()),
        Arc::new(SessionLockMap::new()),
        Arc::new(FixtureClassroomLoader::fractions_demo()),
        Arc::new(RegexSafetyFilter::default()),
        Arc::new(DefaultStudentAgent::new(llm.clone())),
        Arc::new(DefaultTeacherAgent::new(llm.clone())),
        llm,
    ));

    let state = AppState {
        orchestrator,
        realtime: Arc::new(BroadcastRealtimeSink::default()),
        started_at: Instant::now(),
    };

    let cors_layer = build_cors_layer(&config.cors_origins);

    let app = api::router(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "gateway listening");

    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}

/// Builds a [`CorsLayer`] from `CORS_ORIGIN`. A literal `"*"` allows any
/// origin; otherwise each configured origin must parse as a header value.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [header::CONTENT_TYPE];

    if origins.len() == 1 && origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %o, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(methods)
        .allow_headers(headers)
}
