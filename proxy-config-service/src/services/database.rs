//! PostgreSQL implementation of the resource store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::store::{ResourceStore, StoreError};
use crate::models::{
    ExternalIdentity, HeaderReplacement, LimitPeriod, Project, ProjectConfig, RateLimitPolicy,
    User, UserSession,
};

/// PostgreSQL store. Every statement is bounded by `timeout`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

#[derive(FromRow)]
struct ConfigRow {
    config_id: Uuid,
    project_id: Uuid,
    name: String,
    limit_requests_count: i64,
    limit_period: String,
    created_utc: DateTime<Utc>,
}

impl TryFrom<ConfigRow> for ProjectConfig {
    type Error = StoreError;

    fn try_from(row: ConfigRow) -> Result<Self, Self::Error> {
        let period: LimitPeriod = row.limit_period.parse().map_err(|e: String| {
            StoreError::Corrupt(format!("config {}: {}", row.config_id, e))
        })?;
        Ok(ProjectConfig {
            config_id: row.config_id,
            project_id: row.project_id,
            name: row.name,
            policy: RateLimitPolicy {
                requests: row.limit_requests_count,
                period,
            },
            created_utc: row.created_utc,
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(operation = op, error = %e, "Database call failed");
                Err(StoreError::Backend(anyhow::anyhow!(e)))
            }
            Err(_) => {
                tracing::warn!(
                    operation = op,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Database call timed out"
                );
                Err(StoreError::Timeout(op))
            }
        }
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.bounded("health_check", sqlx::query("SELECT 1").execute(&self.pool))
            .await?;
        Ok(())
    }

    // ==================== User Operations ====================

    async fn upsert_user(&self, identity: &ExternalIdentity) -> Result<User, StoreError> {
        let candidate = User::new(identity.clone());
        self.bounded(
            "upsert_user",
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (user_id, provider_id, display_name, avatar_url, created_utc)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (provider_id) DO UPDATE
                    SET display_name = EXCLUDED.display_name,
                        avatar_url = EXCLUDED.avatar_url
                RETURNING *
                "#,
            )
            .bind(candidate.user_id)
            .bind(candidate.provider_id)
            .bind(&candidate.display_name)
            .bind(&candidate.avatar_url)
            .bind(candidate.created_utc)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.bounded(
            "find_user",
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    // ==================== Session Operations ====================

    async fn create_session(&self, session: &UserSession) -> Result<(), StoreError> {
        self.bounded(
            "create_session",
            sqlx::query(
                "INSERT INTO user_sessions (session_id, user_id, created_utc) VALUES ($1, $2, $3)",
            )
            .bind(session.session_id)
            .bind(session.user_id)
            .bind(session.created_utc)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<UserSession>, StoreError> {
        self.bounded(
            "find_session",
            sqlx::query_as::<_, UserSession>("SELECT * FROM user_sessions WHERE session_id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        self.bounded(
            "delete_session",
            sqlx::query("DELETE FROM user_sessions WHERE session_id = $1")
                .bind(session_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    // ==================== Project Operations ====================

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError> {
        self.bounded(
            "list_projects",
            sqlx::query_as::<_, Project>(
                "SELECT * FROM projects WHERE user_id = $1 ORDER BY created_utc DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, StoreError> {
        self.bounded(
            "get_project",
            sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE project_id = $1")
                .bind(project_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn create_project(&self, project: &Project) -> Result<(), StoreError> {
        self.bounded(
            "create_project",
            sqlx::query(
                r#"
                INSERT INTO projects (project_id, user_id, name, description, access_key, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(project.project_id)
            .bind(project.user_id)
            .bind(&project.name)
            .bind(&project.description)
            .bind(&project.access_key)
            .bind(project.created_utc)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn delete_project(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, StoreError> {
        let result = self
            .bounded(
                "delete_project",
                sqlx::query("DELETE FROM projects WHERE project_id = $1 AND user_id = $2")
                    .bind(project_id)
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Config Operations ====================

    async fn list_configs(&self, project_id: Uuid) -> Result<Vec<ProjectConfig>, StoreError> {
        let rows = self
            .bounded(
                "list_configs",
                sqlx::query_as::<_, ConfigRow>(
                    "SELECT * FROM configs WHERE project_id = $1 ORDER BY created_utc ASC",
                )
                .bind(project_id)
                .fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(ProjectConfig::try_from).collect()
    }

    async fn get_config(&self, config_id: Uuid) -> Result<Option<ProjectConfig>, StoreError> {
        self.bounded(
            "get_config",
            sqlx::query_as::<_, ConfigRow>("SELECT * FROM configs WHERE config_id = $1")
                .bind(config_id)
                .fetch_optional(&self.pool),
        )
        .await?
        .map(ProjectConfig::try_from)
        .transpose()
    }

    async fn create_config(&self, config: &ProjectConfig) -> Result<(), StoreError> {
        self.bounded(
            "create_config",
            sqlx::query(
                r#"
                INSERT INTO configs (config_id, project_id, name, limit_requests_count, limit_period, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(config.config_id)
            .bind(config.project_id)
            .bind(&config.name)
            .bind(config.policy.requests)
            .bind(config.policy.period.as_str())
            .bind(config.created_utc)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn delete_config(&self, project_id: Uuid, config_id: Uuid) -> Result<bool, StoreError> {
        let result = self
            .bounded(
                "delete_config",
                sqlx::query("DELETE FROM configs WHERE config_id = $1 AND project_id = $2")
                    .bind(config_id)
                    .bind(project_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Header Replacement Operations ====================

    async fn list_headers_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<HeaderReplacement>, StoreError> {
        self.bounded(
            "list_headers_for_project",
            sqlx::query_as::<_, HeaderReplacement>(
                r#"
                SELECT h.* FROM header_replacements h
                JOIN configs c ON c.config_id = h.config_id
                WHERE c.project_id = $1
                ORDER BY h.created_utc ASC
                "#,
            )
            .bind(project_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn get_header(&self, header_id: Uuid) -> Result<Option<HeaderReplacement>, StoreError> {
        self.bounded(
            "get_header",
            sqlx::query_as::<_, HeaderReplacement>(
                "SELECT * FROM header_replacements WHERE header_id = $1",
            )
            .bind(header_id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn create_header(&self, header: &HeaderReplacement) -> Result<(), StoreError> {
        self.bounded(
            "create_header",
            sqlx::query(
                r#"
                INSERT INTO header_replacements (header_id, config_id, header_name, header_value, created_utc)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(header.header_id)
            .bind(header.config_id)
            .bind(&header.header_name)
            .bind(&header.header_value)
            .bind(header.created_utc)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn delete_header(&self, config_id: Uuid, header_id: Uuid) -> Result<bool, StoreError> {
        let result = self
            .bounded(
                "delete_header",
                sqlx::query("DELETE FROM header_replacements WHERE header_id = $1 AND config_id = $2")
                    .bind(header_id)
                    .bind(config_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
