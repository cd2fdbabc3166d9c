use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::projects::CreateHeaderForm;
use crate::middleware::AuthPrincipal;
use crate::models::HeaderReplacementSummary;
use crate::AppState;

/// POST /projects/:project_id/configs/:config_id/headers
#[tracing::instrument(skip(state, principal, form))]
pub async fn create_header(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((project_id, config_id)): Path<(Uuid, Uuid)>,
    Form(form): Form<CreateHeaderForm>,
) -> Result<(StatusCode, Json<HeaderReplacementSummary>), AppError> {
    let header = state
        .orchestrator
        .create_header(principal, project_id, config_id, &form)
        .await?;
    Ok((StatusCode::CREATED, Json(header)))
}

/// DELETE /projects/:project_id/configs/:config_id/headers/:header_id
#[tracing::instrument(skip(state, principal))]
pub async fn delete_header(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((project_id, config_id, header_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .orchestrator
        .delete_header(principal, project_id, config_id, header_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/:project_id/configs/:config_id/headers/:header_id/value
///
/// Plain text, never cached.
#[tracing::instrument(skip(state, principal))]
pub async fn reveal_header_value(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((project_id, config_id, header_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let value = state
        .orchestrator
        .reveal_header_value(principal, project_id, config_id, header_id)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        value.expose_secret().clone(),
    ))
}
