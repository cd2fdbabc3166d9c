//! Project model - top-level, single-owner resource carrying the proxy credential.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::ConfigResponse;

/// Proxy credential of a project. Generated once, never rotated.
///
/// Only serialized into responses addressed to the owning user; `Debug` is redacted
/// so the key cannot end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AccessKey(String);

impl AccessKey {
    pub fn new(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessKey(<redacted>)")
    }
}

/// Project entity.
#[derive(Debug, Clone, FromRow)]
pub struct Project {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub access_key: AccessKey,
    pub created_utc: DateTime<Utc>,
}

impl Project {
    /// Create a new project owned by `user_id`.
    pub fn new(
        user_id: Uuid,
        name: String,
        description: Option<String>,
        access_key: AccessKey,
    ) -> Self {
        Self {
            project_id: Uuid::new_v4(),
            user_id,
            name,
            description,
            access_key,
            created_utc: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// Project as shown to its owner, configs nested in creation order.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectResponse {
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub access_key: AccessKey,
    pub created_utc: DateTime<Utc>,
    pub configs: Vec<ConfigResponse>,
}

impl ProjectResponse {
    pub fn new(project: Project, configs: Vec<ConfigResponse>) -> Self {
        Self {
            project_id: project.project_id,
            name: project.name,
            description: project.description,
            access_key: project.access_key,
            created_utc: project.created_utc,
            configs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_key_debug_is_redacted() {
        let key = AccessKey::new("deadbeef".to_string());
        assert_eq!(format!("{:?}", key), "AccessKey(<redacted>)");
    }

    #[test]
    fn ownership_is_by_user_id() {
        let owner = Uuid::new_v4();
        let project = Project::new(owner, "demo".into(), None, AccessKey::new("k".into()));
        assert!(project.is_owned_by(owner));
        assert!(!project.is_owned_by(Uuid::new_v4()));
    }
}
