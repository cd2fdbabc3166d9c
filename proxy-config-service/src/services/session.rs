//! Session lifecycle: opaque session token <-> principal.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::context::Principal;
use super::error::ServiceError;
use super::store::ResourceStore;
use crate::models::{ExternalIdentity, User, UserSession};

#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `None` for malformed, unknown or deleted sessions.
    async fn principal_for_session(&self, token: &str) -> Result<Option<Principal>, ServiceError>;
}

/// Sessions persisted in the resource store. Never expired here.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn ResourceStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Upsert the user behind `identity` and open a session for them.
    #[tracing::instrument(skip_all, fields(provider_id = identity.provider_id))]
    pub async fn start_session(
        &self,
        identity: &ExternalIdentity,
    ) -> Result<(User, UserSession), ServiceError> {
        let user = self.store.upsert_user(identity).await?;
        let session = UserSession::new(user.user_id);
        self.store.create_session(&session).await?;

        tracing::info!(user_id = %user.user_id, "Session started");
        Ok((user, session))
    }

    pub async fn end_session(&self, token: &str) -> Result<(), ServiceError> {
        if let Ok(session_id) = Uuid::parse_str(token) {
            self.store.delete_session(session_id).await?;
            tracing::info!(session_id = %session_id, "Session ended");
        }
        Ok(())
    }

    pub async fn current_user(&self, principal: Principal) -> Result<User, ServiceError> {
        self.store
            .find_user(principal.user_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)
    }
}

#[async_trait]
impl SessionResolver for SessionService {
    async fn principal_for_session(&self, token: &str) -> Result<Option<Principal>, ServiceError> {
        let Ok(session_id) = Uuid::parse_str(token) else {
            return Ok(None);
        };
        let session = self.store.find_session(session_id).await?;
        Ok(session.map(|s| Principal::new(s.user_id)))
    }
}
