//! Resource store contract and an in-process implementation.
//!
//! The store only persists rows and answers lookups by id. Ownership is never
//! inferred from a successful lookup; that is the job of the ownership chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ExternalIdentity, HeaderReplacement, Project, ProjectConfig, User, UserSession};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The call did not complete in time. Transient, never retried here.
    #[error("store call timed out: {0}")]
    Timeout(&'static str),

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),

    /// A row could not be mapped back into a model.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Insert or refresh the user keyed by the provider id.
    async fn upsert_user(&self, identity: &ExternalIdentity) -> Result<User, StoreError>;
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn create_session(&self, session: &UserSession) -> Result<(), StoreError>;
    async fn find_session(&self, session_id: Uuid) -> Result<Option<UserSession>, StoreError>;
    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError>;

    /// Projects of `user_id`, newest first.
    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError>;
    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, StoreError>;
    async fn create_project(&self, project: &Project) -> Result<(), StoreError>;
    /// Returns whether a row owned by `user_id` was removed.
    async fn delete_project(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, StoreError>;

    /// Configs of `project_id`, oldest first.
    async fn list_configs(&self, project_id: Uuid) -> Result<Vec<ProjectConfig>, StoreError>;
    async fn get_config(&self, config_id: Uuid) -> Result<Option<ProjectConfig>, StoreError>;
    async fn create_config(&self, config: &ProjectConfig) -> Result<(), StoreError>;
    async fn delete_config(&self, project_id: Uuid, config_id: Uuid) -> Result<bool, StoreError>;

    /// Headers of every config in the project, oldest first, in one call.
    async fn list_headers_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<HeaderReplacement>, StoreError>;
    async fn get_header(&self, header_id: Uuid) -> Result<Option<HeaderReplacement>, StoreError>;
    async fn create_header(&self, header: &HeaderReplacement) -> Result<(), StoreError>;
    async fn delete_header(&self, config_id: Uuid, header_id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<UserSession>,
    projects: Vec<Project>,
    configs: Vec<ProjectConfig>,
    headers: Vec<HeaderReplacement>,
}

/// Mutex-guarded tables kept in insertion order.
///
/// Deletes never cascade, so tests can observe orphaned children. The `fail_*`
/// switches inject backend errors into specific writes.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_header_inserts: AtomicBool,
    fail_config_deletes: AtomicBool,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_header_inserts(&self, fail: bool) {
        self.fail_header_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_config_deletes(&self, fail: bool) {
        self.fail_config_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Raw header rows, for asserting on what is actually at rest.
    pub fn stored_headers(&self) -> Vec<HeaderReplacement> {
        self.tables
            .lock()
            .map(|t| t.headers.clone())
            .unwrap_or_default()
    }

    pub fn config_count(&self) -> usize {
        self.tables.lock().map(|t| t.configs.len()).unwrap_or(0)
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("in-memory store unavailable")));
        }
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| anyhow::anyhow!("In-memory store mutex poisoned: {}", e))?;
        Ok(f(&mut tables))
    }
}

fn remove_where<T>(rows: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> bool {
    let before = rows.len();
    rows.retain(|row| !pred(row));
    rows.len() != before
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.with_tables(|_| ())
    }

    async fn upsert_user(&self, identity: &ExternalIdentity) -> Result<User, StoreError> {
        self.with_tables(|t| {
            if let Some(user) = t
                .users
                .iter_mut()
                .find(|u| u.provider_id == identity.provider_id)
            {
                user.display_name = identity.display_name.clone();
                user.avatar_url = identity.avatar_url.clone();
                return user.clone();
            }
            let user = User::new(identity.clone());
            t.users.push(user.clone());
            user
        })
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.with_tables(|t| t.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn create_session(&self, session: &UserSession) -> Result<(), StoreError> {
        self.with_tables(|t| t.sessions.push(session.clone()))
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<UserSession>, StoreError> {
        self.with_tables(|t| {
            t.sessions
                .iter()
                .find(|s| s.session_id == session_id)
                .cloned()
        })
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        self.with_tables(|t| {
            remove_where(&mut t.sessions, |s| s.session_id == session_id);
        })
    }

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError> {
        self.with_tables(|t| {
            let mut projects: Vec<Project> = t
                .projects
                .iter()
                .rev()
                .filter(|p| p.user_id == user_id)
                .cloned()
                .collect();
            projects.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
            projects
        })
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, StoreError> {
        self.with_tables(|t| {
            t.projects
                .iter()
                .find(|p| p.project_id == project_id)
                .cloned()
        })
    }

    async fn create_project(&self, project: &Project) -> Result<(), StoreError> {
        self.with_tables(|t| t.projects.push(project.clone()))
    }

    async fn delete_project(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, StoreError> {
        self.with_tables(|t| {
            remove_where(&mut t.projects, |p| {
                p.project_id == project_id && p.user_id == user_id
            })
        })
    }

    async fn list_configs(&self, project_id: Uuid) -> Result<Vec<ProjectConfig>, StoreError> {
        self.with_tables(|t| {
            let mut configs: Vec<ProjectConfig> = t
                .configs
                .iter()
                .filter(|c| c.project_id == project_id)
                .cloned()
                .collect();
            configs.sort_by(|a, b| a.created_utc.cmp(&b.created_utc));
            configs
        })
    }

    async fn get_config(&self, config_id: Uuid) -> Result<Option<ProjectConfig>, StoreError> {
        self.with_tables(|t| t.configs.iter().find(|c| c.config_id == config_id).cloned())
    }

    async fn create_config(&self, config: &ProjectConfig) -> Result<(), StoreError> {
        self.with_tables(|t| t.configs.push(config.clone()))
    }

    async fn delete_config(&self, project_id: Uuid, config_id: Uuid) -> Result<bool, StoreError> {
        if self.fail_config_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("injected config delete failure")));
        }
        self.with_tables(|t| {
            remove_where(&mut t.configs, |c| {
                c.config_id == config_id && c.project_id == project_id
            })
        })
    }

    async fn list_headers_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<HeaderReplacement>, StoreError> {
        self.with_tables(|t| {
            let config_ids: Vec<Uuid> = t
                .configs
                .iter()
                .filter(|c| c.project_id == project_id)
                .map(|c| c.config_id)
                .collect();
            t.headers
                .iter()
                .filter(|h| config_ids.contains(&h.config_id))
                .cloned()
                .collect()
        })
    }

    async fn get_header(&self, header_id: Uuid) -> Result<Option<HeaderReplacement>, StoreError> {
        self.with_tables(|t| t.headers.iter().find(|h| h.header_id == header_id).cloned())
    }

    async fn create_header(&self, header: &HeaderReplacement) -> Result<(), StoreError> {
        if self.fail_header_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("injected header insert failure")));
        }
        self.with_tables(|t| t.headers.push(header.clone()))
    }

    async fn delete_header(&self, config_id: Uuid, header_id: Uuid) -> Result<bool, StoreError> {
        self.with_tables(|t| {
            remove_where(&mut t.headers, |h| {
                h.header_id == header_id && h.config_id == config_id
            })
        })
    }
}
