//! HTTP exposition of aggregated server metrics.
//!
//! Two routes hang off the configured base path:
//!
//! - `GET {path}` runs one aggregation cycle and returns the tree.
//! - `GET {path}/doc` returns the description of every metric.
//!
//! Basic authentication, when enabled, guards the tree only. The description
//! route stays public.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::Mutex;

use serverinfo_core::{AggregatedTree, Aggregator, Descriptions, Settings};

/// Realm announced in `WWW-Authenticate` challenges.
pub const AUTH_REALM: &str = "serverinfo";

/// Shared server state.
struct AppState {
    aggregator: Mutex<Aggregator>,
    descriptions: Descriptions,
    user: String,
    pass: String,
}

async fn handle_info(State(state): State<Arc<AppState>>) -> Json<AggregatedTree> {
    let aggregator = state.aggregator.lock().await;
    Json(aggregator.collect())
}

async fn handle_doc(State(state): State<Arc<AppState>>) -> Json<Descriptions> {
    Json(state.descriptions.clone())
}

async fn basic_auth(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if credentials_match(req.headers(), &state.user, &state.pass) {
        return next.run(req).await;
    }
    log::debug!("rejected unauthenticated request to {}", req.uri().path());
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            format!("Basic realm=\"{AUTH_REALM}\""),
        )],
        "Unauthorized",
    )
        .into_response()
}

fn credentials_match(headers: &HeaderMap, user: &str, pass: &str) -> bool {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    match decoded.split_once(':') {
        Some((u, p)) => u == user && p == pass,
        None => false,
    }
}

/// Build the axum router.
///
/// `settings` must already be validated; its path is used verbatim as the
/// route.
pub fn build_router(aggregator: Aggregator, settings: &Settings, require_auth: bool) -> Router {
    let descriptions = aggregator.describe();
    let state = Arc::new(AppState {
        aggregator: Mutex::new(aggregator),
        descriptions,
        user: settings.user.clone(),
        pass: settings.pass.clone(),
    });

    let mut info = Router::new().route(&settings.path, get(handle_info));
    if require_auth {
        info = info.route_layer(middleware::from_fn_with_state(state.clone(), basic_auth));
    }

    Router::new()
        .route(&settings.doc_path(), get(handle_doc))
        .merge(info)
        .with_state(state)
}

/// Run the HTTP metrics server until Ctrl-C.
pub async fn run_server(
    aggregator: Aggregator,
    settings: &Settings,
    host: &str,
    port: u16,
    require_auth: bool,
) -> std::io::Result<()> {
    let app = build_router(aggregator, settings, require_auth);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!(
        "serving metrics on http://{}{} (auth {})",
        listener.local_addr()?,
        settings.path,
        if require_auth { "on" } else { "off" }
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("cannot listen for Ctrl-C, serving until killed: {e}");
        std::future::pending::<()>().await;
    }
}
