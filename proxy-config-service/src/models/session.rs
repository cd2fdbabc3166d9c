//! Session model - opaque login sessions bound to one user.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A login session. The id is the only thing handed to the browser.
#[derive(Debug, Clone, FromRow)]
pub struct UserSession {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            created_utc: Utc::now(),
        }
    }
}
