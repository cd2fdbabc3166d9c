//! User model - principals created from the external identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity as reported by the provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalIdentity {
    pub provider_id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// User entity. Keyed by `provider_id` for upserts; never deleted.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub provider_id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user from a provider identity.
    pub fn new(identity: ExternalIdentity) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            provider_id: identity.provider_id,
            display_name: identity.display_name,
            avatar_url: identity.avatar_url,
            created_utc: Utc::now(),
        }
    }
}

/// User response for API.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            display_name: u.display_name,
            avatar_url: u.avatar_url,
        }
    }
}
