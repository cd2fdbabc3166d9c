use axum::{
    extract::{Path, State},
    http::StatusCode,
    Form, Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::projects::{ConnectionResponse, CreateConfigForm};
use crate::middleware::AuthPrincipal;
use crate::models::ConfigResponse;
use crate::AppState;

/// POST /projects/:project_id/configs
///
/// Creates the config and its first header replacement.
#[tracing::instrument(skip(state, principal, form))]
pub async fn create_config(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(project_id): Path<Uuid>,
    Form(form): Form<CreateConfigForm>,
) -> Result<(StatusCode, Json<ConfigResponse>), AppError> {
    let config = state
        .orchestrator
        .create_config(principal, project_id, &form)
        .await?;
    Ok((StatusCode::CREATED, Json(config)))
}

/// DELETE /projects/:project_id/configs/:config_id
#[tracing::instrument(skip(state, principal))]
pub async fn delete_config(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((project_id, config_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .orchestrator
        .delete_config(principal, project_id, config_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/:project_id/configs/:config_id/connection
#[tracing::instrument(skip(state, principal))]
pub async fn connection(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((project_id, config_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ConnectionResponse>, AppError> {
    let credential = state
        .orchestrator
        .connection_credential(principal, project_id, config_id)
        .await?;

    Ok(Json(ConnectionResponse {
        url: credential.url(&state.config.proxy_host),
        credential: credential.to_string(),
    }))
}
