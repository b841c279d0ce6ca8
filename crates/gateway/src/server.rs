//! Router assembly and the HTTP listener.

use std::sync::Arc;

use {
    anyhow::{Context, Result},
    axum::{
        Router,
        http::HeaderValue,
        routing::{get, post},
    },
    tower_http::cors::{AllowOrigin, Any, CorsLayer},
    tracing::{info, warn},
};

use wagate_sessions::SessionRegistry;

use crate::routes;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

/// Build the CORS layer from the configured origin list.
///
/// An empty list keeps the permissive behavior the single-tenant
/// deployments relied on; a non-empty list restricts to exactly those
/// origins.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin, error = %e, "ignoring unparseable CORS origin");
                None
            },
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Assemble the application router.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(routes::health))
        .route("/api/session/start", post(routes::start_session))
        .route("/api/qr/{user_id}", get(routes::qr_status))
        .route("/api/status/{user_id}", get(routes::status))
        .route("/api/send", post(routes::send))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(router: Router, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(bind, "http server listening");
    axum::serve(listener, router)
        .await
        .context("http server terminated")
}
