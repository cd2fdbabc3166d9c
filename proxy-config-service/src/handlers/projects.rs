use axum::{
    extract::{Path, State},
    http::StatusCode,
    Form, Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::projects::{CreateProjectForm, ProjectListResponse};
use crate::middleware::AuthPrincipal;
use crate::models::{ProjectResponse, UserResponse};
use crate::AppState;

/// GET /projects
#[tracing::instrument(skip_all)]
pub async fn list_projects(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<ProjectListResponse>, AppError> {
    let user = state.sessions.current_user(principal).await?;
    let projects = state.orchestrator.list_projects(principal).await?;

    Ok(Json(ProjectListResponse {
        user: UserResponse::from(user),
        projects,
    }))
}

/// POST /projects
#[tracing::instrument(skip_all)]
pub async fn create_project(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Form(form): Form<CreateProjectForm>,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    let project = state.orchestrator.create_project(principal, &form).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// DELETE /projects/:project_id
#[tracing::instrument(skip(state, principal))]
pub async fn delete_project(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(project_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .orchestrator
        .delete_project(principal, project_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
