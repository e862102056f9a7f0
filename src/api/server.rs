//! Axum server setup and routing.

use axum::http::HeaderValue;
use axum::{middleware, routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{docs::ApiDoc, handlers, middleware as api_middleware};
use crate::app_state::AppState;
use crate::error::{IndexerError, IndexerResult};

/// Server settings taken from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Port to bind on all interfaces
    pub port: u16,
    /// Requests per minute across all clients
    pub rate_limit_rpm: u32,
    /// Allowed CORS origins; empty or `*` allows any
    pub cors_origins: Vec<String>,
}

/// Build the application router.
pub fn router(state: AppState, rate_limit_rpm: u32, cors_origins: Vec<String>) -> Router {
    let limiter = api_middleware::rate_limit::create_rate_limiter(rate_limit_rpm);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/stats/global", get(handlers::stats::get_global_stats))
        .route("/players", get(handlers::players::list_players))
        .route("/players/:wallet", get(handlers::players::get_player))
        .route("/weeks", get(handlers::weeks::list_weeks))
        .route("/weeks/:week", get(handlers::weeks::get_week))
        .route("/weeks/:week/players", get(handlers::weeks::list_week_players))
        .route(
            "/weeks/:week/players/:wallet",
            get(handlers::weeks::get_player_week),
        )
        .route("/jackpots/:nonce", get(handlers::jackpots::get_jackpot));

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(cors_origins))
        .layer(middleware::from_fn(api_middleware::logging::log_requests))
        .layer(middleware::from_fn(move |req, next| {
            api_middleware::rate_limit::rate_limit(limiter.clone(), req, next)
        }));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_routes)
        .layer(middleware_stack)
        .with_state(state)
}

/// Run the Axum API server until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn run_server(
    state: AppState,
    options: ServerOptions,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> IndexerResult<()> {
    let app = router(state, options.rate_limit_rpm, options.cors_origins);
    let addr = SocketAddr::from(([0, 0, 0, 0], options.port));

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        IndexerError::config(format!("Failed to bind API port {}", options.port), Some(Box::new(e)))
    })?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| IndexerError::http("API server failed", None, Some(Box::new(e))))?;

    info!("API server stopped");
    Ok(())
}

fn build_cors_layer(origins: Vec<String>) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any);
    }

    let headers: Vec<HeaderValue> = origins
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(header) => Some(header),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(headers))
}
