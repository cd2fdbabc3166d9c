pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware,
    tracing::{request_id, request_id_middleware},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::services::{
    IdentityProvider, RequestOrchestrator, ResourceStore, SecretCipher, SecurityAuditService,
    ServiceError, SessionService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub store: Arc<dyn ResourceStore>,
    pub orchestrator: RequestOrchestrator,
    pub sessions: SessionService,
    pub identity: Arc<dyn IdentityProvider>,
    pub audit: SecurityAuditService,
}

impl AppState {
    /// Wire the services together. Fails if the configured secret key is
    /// not a hex-encoded 32-byte key.
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn ResourceStore>,
        identity: Arc<dyn IdentityProvider>,
        audit: SecurityAuditService,
    ) -> Result<Self, AppError> {
        let cipher = SecretCipher::from_hex_key(&config.security.secret_key)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("SECRET_KEY: {}", e)))?;

        Ok(Self {
            orchestrator: RequestOrchestrator::new(store.clone(), cipher, audit.clone()),
            sessions: SessionService::new(store.clone()),
            config,
            store,
            identity,
            audit,
        })
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let allowed_origins = state
        .config
        .security
        .allowed_origins
        .iter()
        .map(|o| {
            if o == "*" {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin cannot be combined with credentials"
                )));
            }
            o.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
        })
        .collect::<Result<Vec<HeaderValue>, AppError>>()?;

    let project_routes = Router::new()
        .route(
            "/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/projects/:project_id",
            delete(handlers::projects::delete_project),
        )
        .route(
            "/projects/:project_id/configs",
            post(handlers::configs::create_config),
        )
        .route(
            "/projects/:project_id/configs/:config_id",
            delete(handlers::configs::delete_config),
        )
        .route(
            "/projects/:project_id/configs/:config_id/connection",
            get(handlers::configs::connection),
        )
        .route(
            "/projects/:project_id/configs/:config_id/headers",
            post(handlers::headers::create_header),
        )
        .route(
            "/projects/:project_id/configs/:config_id/headers/:header_id",
            delete(handlers::headers::delete_header),
        )
        .route(
            "/projects/:project_id/configs/:config_id/headers/:header_id/value",
            get(handlers::headers::reveal_header_value),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/auth/github/login", get(handlers::auth::github_login))
        .route("/auth/github/callback", get(handlers::auth::github_callback))
        .route("/auth/logout", post(handlers::auth::logout))
        .merge(project_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    request_id = %request_id(request),
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        );

    Ok(app)
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(ServiceError::from(e))
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment).to_lowercase(),
        "checks": {
            "store": "up"
        }
    })))
}
