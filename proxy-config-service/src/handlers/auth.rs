use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::dtos::auth::OAuthCallbackQuery;
use crate::middleware::SESSION_COOKIE;
use crate::services::security_audit::{SecurityAuditLog, SecurityEventType, Severity};
use crate::services::{tokens, ServiceError};
use crate::AppState;

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const OAUTH_STATE_MAX_AGE_MINUTES: i64 = 10;

/// Where the browser lands after a successful login.
const POST_LOGIN_REDIRECT: &str = "/projects";

fn oauth_state_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, value))
        .http_only(true)
        .secure(state.config.session.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::minutes(OAUTH_STATE_MAX_AGE_MINUTES))
        .build()
}

fn session_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .secure(state.config.session.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::days(state.config.session.max_age_days))
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// GET /auth/github/login
#[tracing::instrument(skip_all)]
pub async fn github_login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let oauth_state = tokens::generate_oauth_state();
    let url = state.identity.authorization_url(&oauth_state);

    (
        jar.add(oauth_state_cookie(&state, oauth_state)),
        Redirect::to(&url),
    )
}

/// GET /auth/github/callback
///
/// The `state` query parameter must match the cookie set by [`github_login`].
#[tracing::instrument(skip_all)]
pub async fn github_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<(CookieJar, Redirect), AppError> {
    if let Some(error) = query.error {
        tracing::warn!(error = %error, "Identity provider returned an error");
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Login was not completed"
        )));
    }

    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let state_matches = matches!(
        (&expected, &query.state),
        (Some(expected), Some(received)) if !expected.is_empty() && expected == received
    );
    if !state_matches {
        state.audit.log(SecurityAuditLog::new(
            SecurityEventType::OAuthStateMismatch,
            Severity::Warning,
            None,
            "OAuth callback state did not match the login cookie",
        ));
        return Err(ServiceError::InvalidOAuthState.into());
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing authorization code")))?;

    let identity = state.identity.exchange_code(&code).await?;
    let (_user, session) = state.sessions.start_session(&identity).await?;

    let jar = jar
        .remove(removal(OAUTH_STATE_COOKIE))
        .add(session_cookie(&state, session.session_id.to_string()));

    Ok((jar, Redirect::to(POST_LOGIN_REDIRECT)))
}

/// POST /auth/logout
///
/// Idempotent: succeeds without a session cookie.
#[tracing::instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.end_session(cookie.value()).await?;
    }

    Ok((jar.remove(removal(SESSION_COOKIE)), StatusCode::NO_CONTENT))
}
