use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::services::{Principal, ServiceError, SessionResolver};
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Require a live session. The resolved principal is stored in request
/// extensions for [`AuthPrincipal`].
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let principal = match token {
        Some(token) => match state.sessions.principal_for_session(&token).await {
            Ok(principal) => principal,
            Err(e) => return AppError::from(e).into_response(),
        },
        None => None,
    };

    let Some(principal) = principal else {
        tracing::debug!("Request without a valid session");
        return AppError::from(ServiceError::Unauthenticated).into_response();
    };

    req.extensions_mut().insert(principal);
    next.run(req).await
}

/// Extractor for the principal resolved by [`session_middleware`].
pub struct AuthPrincipal(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .map(AuthPrincipal)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Principal missing from request extensions"
                ))
            })
    }
}
