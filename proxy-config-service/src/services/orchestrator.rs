//! Guarded business operations.
//!
//! Every operation follows the same order: ownership chain for the target
//! depth, then input validation, then the store mutation. Header values are
//! encrypted before any write and only leave the store through
//! [`RequestOrchestrator::reveal_header_value`].

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;
use service_core::error::field_errors;
use uuid::Uuid;
use validator::Validate;

use super::cipher::SecretCipher;
use super::context::{ConfigScope, Principal};
use super::error::ServiceError;
use super::ownership::OwnershipChain;
use super::security_audit::{SecurityAuditLog, SecurityAuditService, SecurityEventType, Severity};
use super::store::ResourceStore;
use super::tokens::generate_access_key;
use crate::dtos::projects::{CreateConfigForm, CreateHeaderForm, CreateProjectForm};
use crate::models::{
    AccessKey, ConfigResponse, HeaderReplacement, HeaderReplacementSummary, Project,
    ProjectConfig, ProjectResponse,
};

/// `configId:projectId:accessKey`, the tuple a downstream proxy authenticates with.
pub struct ProxyCredential {
    pub config_id: Uuid,
    pub project_id: Uuid,
    access_key: AccessKey,
}

impl ProxyCredential {
    /// URL form with the credential in the userinfo part.
    pub fn url(&self, proxy_host: &str) -> String {
        format!("https://{}@{}", self, proxy_host)
    }
}

impl fmt::Display for ProxyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.config_id,
            self.project_id,
            self.access_key.as_str()
        )
    }
}

impl fmt::Debug for ProxyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredential")
            .field("config_id", &self.config_id)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

fn check<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationFailed(field_errors(&e)))
}

#[derive(Clone)]
pub struct RequestOrchestrator {
    store: Arc<dyn ResourceStore>,
    chain: OwnershipChain,
    cipher: SecretCipher,
    audit: SecurityAuditService,
}

impl RequestOrchestrator {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        cipher: SecretCipher,
        audit: SecurityAuditService,
    ) -> Self {
        Self {
            chain: OwnershipChain::new(store.clone(), audit.clone()),
            store,
            cipher,
            audit,
        }
    }

    pub fn chain(&self) -> &OwnershipChain {
        &self.chain
    }

    // ==================== Projects ====================

    /// Projects of the principal, newest first, each with its configs and
    /// header names. No header value is read.
    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn list_projects(
        &self,
        principal: Principal,
    ) -> Result<Vec<ProjectResponse>, ServiceError> {
        let projects = self.store.list_projects(principal.user_id).await?;
        let mut out = Vec::with_capacity(projects.len());
        for project in projects {
            let configs = self.config_summaries(project.project_id).await?;
            out.push(ProjectResponse::new(project, configs));
        }
        Ok(out)
    }

    async fn config_summaries(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ConfigResponse>, ServiceError> {
        let configs = self.store.list_configs(project_id).await?;
        let headers = self.store.list_headers_for_project(project_id).await?;

        Ok(configs
            .into_iter()
            .map(|config| {
                let summaries = headers
                    .iter()
                    .filter(|h| h.belongs_to(config.config_id))
                    .map(HeaderReplacementSummary::from)
                    .collect();
                ConfigResponse::new(config, summaries)
            })
            .collect())
    }

    #[tracing::instrument(skip(self, form), fields(user_id = %principal.user_id))]
    pub async fn create_project(
        &self,
        principal: Principal,
        form: &CreateProjectForm,
    ) -> Result<ProjectResponse, ServiceError> {
        check(form)?;

        let project = Project::new(
            principal.user_id,
            form.name(),
            form.description(),
            generate_access_key(),
        );
        self.store.create_project(&project).await?;

        tracing::info!(project_id = %project.project_id, "Project created");
        Ok(ProjectResponse::new(project, Vec::new()))
    }

    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn delete_project(
        &self,
        principal: Principal,
        project_id: Uuid,
    ) -> Result<(), ServiceError> {
        let scope = self
            .chain
            .resolve_project_for_principal(principal, project_id)
            .await?;

        if !self
            .store
            .delete_project(scope.principal().user_id, scope.project().project_id)
            .await?
        {
            return Err(ServiceError::NotFound);
        }

        tracing::info!(project_id = %project_id, "Project deleted");
        Ok(())
    }

    // ==================== Configs ====================

    /// Create a config together with its first header replacement.
    ///
    /// The value is encrypted before anything is written. A failed header
    /// insert triggers a compensating delete of the new config; only if that
    /// also fails is `PartialFailure` returned.
    #[tracing::instrument(skip(self, form), fields(user_id = %principal.user_id))]
    pub async fn create_config(
        &self,
        principal: Principal,
        project_id: Uuid,
        form: &CreateConfigForm,
    ) -> Result<ConfigResponse, ServiceError> {
        let scope = self
            .chain
            .resolve_project_for_principal(principal, project_id)
            .await?;
        check(form)?;

        let policy = form.policy().ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("validated config form has no policy"))
        })?;
        let sealed = self.seal(&form.header_value)?;

        let config = ProjectConfig::new(scope.project().project_id, form.name(), policy);
        let header = HeaderReplacement::new(config.config_id, form.header_name.clone(), sealed);

        self.store.create_config(&config).await?;

        if let Err(insert_err) = self.store.create_header(&header).await {
            tracing::error!(
                config_id = %config.config_id,
                error = %insert_err,
                "Header insert failed after config insert, compensating"
            );
            return match self
                .store
                .delete_config(config.project_id, config.config_id)
                .await
            {
                Ok(_) => Err(ServiceError::Store(insert_err)),
                Err(delete_err) => {
                    tracing::error!(
                        config_id = %config.config_id,
                        error = %delete_err,
                        "Compensating config delete failed"
                    );
                    self.audit.log(
                        SecurityAuditLog::new(
                            SecurityEventType::PartialCreate,
                            Severity::Critical,
                            Some(principal.user_id),
                            "Config left without its header replacement",
                        )
                        .with_project(config.project_id)
                        .with_config(config.config_id),
                    );
                    Err(ServiceError::PartialFailure {
                        config_id: config.config_id,
                    })
                }
            };
        }

        tracing::info!(config_id = %config.config_id, "Config created");
        let headers = vec![HeaderReplacementSummary::from(&header)];
        Ok(ConfigResponse::new(config, headers))
    }

    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn delete_config(
        &self,
        principal: Principal,
        project_id: Uuid,
        config_id: Uuid,
    ) -> Result<(), ServiceError> {
        let scope = self.chain.resolve_config(principal, project_id, config_id).await?;

        if !self
            .store
            .delete_config(scope.project().project_id, scope.config().config_id)
            .await?
        {
            return Err(ServiceError::NotFound);
        }

        tracing::info!(config_id = %config_id, "Config deleted");
        Ok(())
    }

    /// Proxy credential of a config, for its owner only.
    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn connection_credential(
        &self,
        principal: Principal,
        project_id: Uuid,
        config_id: Uuid,
    ) -> Result<ProxyCredential, ServiceError> {
        let scope = self.chain.resolve_config(principal, project_id, config_id).await?;
        Ok(credential_for(&scope))
    }

    // ==================== Header replacements ====================

    #[tracing::instrument(skip(self, form), fields(user_id = %principal.user_id))]
    pub async fn create_header(
        &self,
        principal: Principal,
        project_id: Uuid,
        config_id: Uuid,
        form: &CreateHeaderForm,
    ) -> Result<HeaderReplacementSummary, ServiceError> {
        let scope = self.chain.resolve_config(principal, project_id, config_id).await?;
        check(form)?;

        let sealed = self.seal(&form.header_value)?;
        let header = HeaderReplacement::new(
            scope.config().config_id,
            form.header_name.clone(),
            sealed,
        );
        self.store.create_header(&header).await?;

        tracing::info!(header_id = %header.header_id, "Header replacement created");
        Ok(HeaderReplacementSummary::from(&header))
    }

    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn delete_header(
        &self,
        principal: Principal,
        project_id: Uuid,
        config_id: Uuid,
        header_id: Uuid,
    ) -> Result<(), ServiceError> {
        let scope = self
            .chain
            .resolve_header(principal, project_id, config_id, header_id)
            .await?;

        if !self
            .store
            .delete_header(scope.config().config_id, scope.header().header_id)
            .await?
        {
            return Err(ServiceError::NotFound);
        }

        tracing::info!(header_id = %header_id, "Header replacement deleted");
        Ok(())
    }

    /// The only path by which a plaintext header value leaves the store.
    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn reveal_header_value(
        &self,
        principal: Principal,
        project_id: Uuid,
        config_id: Uuid,
        header_id: Uuid,
    ) -> Result<SecretString, ServiceError> {
        let scope = self
            .chain
            .resolve_header(principal, project_id, config_id, header_id)
            .await?;

        let event = |event_type, severity, details: String| {
            SecurityAuditLog::new(event_type, severity, Some(principal.user_id), details)
                .with_project(project_id)
                .with_config(config_id)
                .with_header(header_id)
        };

        match self.cipher.decrypt(&scope.header().header_value) {
            Ok(plaintext) => {
                self.audit.log(event(
                    SecurityEventType::SecretRevealed,
                    Severity::Info,
                    format!("Header '{}' revealed", scope.header().header_name),
                ));
                Ok(plaintext)
            }
            Err(e) => {
                self.audit.log(event(
                    SecurityEventType::DecryptionFailure,
                    Severity::Critical,
                    format!("Stored value failed to decrypt: {}", e.kind()),
                ));
                Err(ServiceError::DecryptionFailed)
            }
        }
    }

    fn seal(&self, plaintext: &str) -> Result<crate::models::EncryptedValue, ServiceError> {
        self.cipher.encrypt(plaintext).map_err(|e| {
            tracing::error!(kind = e.kind(), "Header value encryption failed");
            ServiceError::EncryptionFailed
        })
    }
}

fn credential_for(scope: &ConfigScope) -> ProxyCredential {
    ProxyCredential {
        config_id: scope.config().config_id,
        project_id: scope.project().project_id,
        access_key: scope.project().access_key.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cipher::KEY_LEN;
    use crate::services::store::InMemoryStore;
    use secrecy::ExposeSecret;

    struct Fixture {
        orchestrator: RequestOrchestrator,
        store: Arc<InMemoryStore>,
        audit: SecurityAuditService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let audit = SecurityAuditService::recording();
        let cipher = SecretCipher::new(&[3u8; KEY_LEN]).unwrap();
        Fixture {
            orchestrator: RequestOrchestrator::new(store.clone(), cipher, audit.clone()),
            store,
            audit,
        }
    }

    fn project_form(name: &str) -> CreateProjectForm {
        CreateProjectForm {
            name: name.to_string(),
            description: None,
        }
    }

    fn config_form() -> CreateConfigForm {
        CreateConfigForm {
            name: "api".to_string(),
            num_of_requests: "100".to_string(),
            requests_per: "hour".to_string(),
            header_name: "Authorization".to_string(),
            header_value: "secret-token".to_string(),
        }
    }

    #[tokio::test]
    async fn created_header_is_stored_encrypted() {
        let f = fixture();
        let owner = Principal::new(Uuid::new_v4());
        let project = f
            .orchestrator
            .create_project(owner, &project_form("demo"))
            .await
            .unwrap();
        f.orchestrator
            .create_config(owner, project.project_id, &config_form())
            .await
            .unwrap();

        let rows = f.store.stored_headers();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].header_value.as_str().contains("secret-token"));
    }

    #[tokio::test]
    async fn failed_header_insert_is_compensated() {
        let f = fixture();
        let owner = Principal::new(Uuid::new_v4());
        let project = f
            .orchestrator
            .create_project(owner, &project_form("demo"))
            .await
            .unwrap();

        f.store.set_fail_header_inserts(true);
        let err = f
            .orchestrator
            .create_config(owner, project.project_id, &config_form())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Store(_)));
        assert_eq!(f.store.config_count(), 0);
        assert!(f.audit.recorded().is_empty());
    }

    #[tokio::test]
    async fn failed_compensation_reports_partial_failure() {
        let f = fixture();
        let owner = Principal::new(Uuid::new_v4());
        let project = f
            .orchestrator
            .create_project(owner, &project_form("demo"))
            .await
            .unwrap();

        f.store.set_fail_header_inserts(true);
        f.store.set_fail_config_deletes(true);
        let err = f
            .orchestrator
            .create_config(owner, project.project_id, &config_form())
            .await
            .unwrap_err();

        let ServiceError::PartialFailure { config_id } = err else {
            panic!("expected partial failure, got {:?}", err);
        };
        assert_eq!(f.store.config_count(), 1);
        let events = f.audit.recorded();
        assert_eq!(events[0].event_type, SecurityEventType::PartialCreate);
        assert_eq!(events[0].config_id, Some(config_id));
    }

    #[tokio::test]
    async fn validation_runs_after_the_chain() {
        let f = fixture();
        let owner = Principal::new(Uuid::new_v4());
        let project = f
            .orchestrator
            .create_project(owner, &project_form("demo"))
            .await
            .unwrap();

        let bad = CreateConfigForm {
            name: String::new(),
            ..config_form()
        };

        let stranger = Principal::new(Uuid::new_v4());
        let err = f
            .orchestrator
            .create_config(stranger, project.project_id, &bad)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));

        let err = f
            .orchestrator
            .create_config(owner, project.project_id, &bad)
            .await
            .unwrap_err();
        let ServiceError::ValidationFailed(fields) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(fields.get("name").map(String::as_str), Some("required"));
        assert_eq!(f.store.config_count(), 0);
    }

    #[tokio::test]
    async fn reveal_is_audited() {
        let f = fixture();
        let owner = Principal::new(Uuid::new_v4());
        let project = f
            .orchestrator
            .create_project(owner, &project_form("demo"))
            .await
            .unwrap();
        let config = f
            .orchestrator
            .create_config(owner, project.project_id, &config_form())
            .await
            .unwrap();
        let header_id = config.headers[0].header_id;

        let value = f
            .orchestrator
            .reveal_header_value(owner, project.project_id, config.config_id, header_id)
            .await
            .unwrap();
        assert_eq!(value.expose_secret(), "secret-token");

        let events = f.audit.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SecurityEventType::SecretRevealed);
        assert!(!events[0].details.contains("secret-token"));
    }

    #[tokio::test]
    async fn corrupt_ciphertext_is_decryption_failed() {
        let f = fixture();
        let owner = Principal::new(Uuid::new_v4());
        let project = f
            .orchestrator
            .create_project(owner, &project_form("demo"))
            .await
            .unwrap();
        let config = f
            .orchestrator
            .create_config(owner, project.project_id, &config_form())
            .await
            .unwrap();

        let corrupt = HeaderReplacement::new(
            config.config_id,
            "X-Corrupt".to_string(),
            crate::models::EncryptedValue::from_stored("ab".repeat(40)),
        );
        f.store.create_header(&corrupt).await.unwrap();

        let err = f
            .orchestrator
            .reveal_header_value(owner, project.project_id, config.config_id, corrupt.header_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DecryptionFailed));
        assert_eq!(
            f.audit.recorded()[0].event_type,
            SecurityEventType::DecryptionFailure
        );
    }

    #[tokio::test]
    async fn connection_credential_is_colon_joined() {
        let f = fixture();
        let owner = Principal::new(Uuid::new_v4());
        let project = f
            .orchestrator
            .create_project(owner, &project_form("demo"))
            .await
            .unwrap();
        let config = f
            .orchestrator
            .create_config(owner, project.project_id, &config_form())
            .await
            .unwrap();

        let credential = f
            .orchestrator
            .connection_credential(owner, project.project_id, config.config_id)
            .await
            .unwrap();

        let expected = format!(
            "{}:{}:{}",
            config.config_id,
            project.project_id,
            project.access_key.as_str()
        );
        assert_eq!(credential.to_string(), expected);
        assert_eq!(
            credential.url("proxy.test"),
            format!("https://{}@proxy.test", expected)
        );
        assert!(!format!("{:?}", credential).contains(project.access_key.as_str()));
    }

    #[tokio::test]
    async fn listing_nests_configs_and_hides_values() {
        let f = fixture();
        let owner = Principal::new(Uuid::new_v4());
        let project = f
            .orchestrator
            .create_project(owner, &project_form("demo"))
            .await
            .unwrap();
        f.orchestrator
            .create_config(owner, project.project_id, &config_form())
            .await
            .unwrap();

        let listed = f.orchestrator.list_projects(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].configs.len(), 1);
        assert_eq!(listed[0].configs[0].headers[0].header_name, "Authorization");

        let json = serde_json::to_string(&listed).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(!json.contains(f.store.stored_headers()[0].header_value.as_str()));

        let other = f
            .orchestrator
            .list_projects(Principal::new(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn listing_groups_headers_under_their_own_config() {
        let f = fixture();
        let owner = Principal::new(Uuid::new_v4());
        let project = f
            .orchestrator
            .create_project(owner, &project_form("demo"))
            .await
            .unwrap();
        let first = f
            .orchestrator
            .create_config(owner, project.project_id, &config_form())
            .await
            .unwrap();
        let second = f
            .orchestrator
            .create_config(owner, project.project_id, &config_form())
            .await
            .unwrap();
        let extra = CreateHeaderForm {
            header_name: "X-Api-Key".to_string(),
            header_value: "other".to_string(),
        };
        f.orchestrator
            .create_header(owner, project.project_id, second.config_id, &extra)
            .await
            .unwrap();

        let listed = f.orchestrator.list_projects(owner).await.unwrap();
        let configs = &listed[0].configs;
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].config_id, first.config_id);
        assert_eq!(configs[0].headers.len(), 1);
        assert_eq!(configs[1].config_id, second.config_id);
        let names: Vec<&str> = configs[1]
            .headers
            .iter()
            .map(|h| h.header_name.as_str())
            .collect();
        assert_eq!(names, vec!["Authorization", "X-Api-Key"]);
        assert!(configs
            .iter()
            .all(|c| c.headers.iter().all(|h| h.config_id == c.config_id)));
    }
}
