//! Ownership chain: principal -> project -> config -> header.
//!
//! Each hop is one store fetch plus one equality check against the parent
//! already proven. Nothing here writes. A failure at any hop stops the chain.

use std::sync::Arc;

use uuid::Uuid;

use super::context::{ConfigScope, HeaderScope, Principal, ProjectScope};
use super::error::ServiceError;
use super::security_audit::{SecurityAuditLog, SecurityAuditService};
use super::store::ResourceStore;

#[derive(Clone)]
pub struct OwnershipChain {
    store: Arc<dyn ResourceStore>,
    audit: SecurityAuditService,
}

impl OwnershipChain {
    pub fn new(store: Arc<dyn ResourceStore>, audit: SecurityAuditService) -> Self {
        Self { store, audit }
    }

    /// `NotFound` when absent, `Unauthorized` when owned by someone else.
    pub async fn resolve_project_for_principal(
        &self,
        principal: Principal,
        project_id: Uuid,
    ) -> Result<ProjectScope, ServiceError> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if !project.is_owned_by(principal.user_id) {
            self.audit.log(SecurityAuditLog::cross_tenant_access(
                principal.user_id,
                project_id,
            ));
            return Err(ServiceError::Unauthorized);
        }

        Ok(ProjectScope::new(principal, project))
    }

    /// `NotFound` when absent, `ChainMismatch` when the config hangs off another project.
    pub async fn resolve_config_for_project(
        &self,
        scope: ProjectScope,
        config_id: Uuid,
    ) -> Result<ConfigScope, ServiceError> {
        let config = self
            .store
            .get_config(config_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let project_id = scope.project().project_id;
        if !config.belongs_to(project_id) {
            self.audit.log(
                SecurityAuditLog::chain_mismatch(
                    scope.principal().user_id,
                    "project",
                    project_id,
                    config_id,
                )
                .with_project(project_id)
                .with_config(config_id),
            );
            return Err(ServiceError::ChainMismatch);
        }

        Ok(scope.with_config(config))
    }

    /// `NotFound` when absent, `ChainMismatch` when the header hangs off another config.
    pub async fn resolve_header_for_config(
        &self,
        scope: ConfigScope,
        header_id: Uuid,
    ) -> Result<HeaderScope, ServiceError> {
        let header = self
            .store
            .get_header(header_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let config_id = scope.config().config_id;
        if !header.belongs_to(config_id) {
            self.audit.log(
                SecurityAuditLog::chain_mismatch(
                    scope.principal().user_id,
                    "config",
                    config_id,
                    header_id,
                )
                .with_project(scope.project().project_id)
                .with_config(config_id)
                .with_header(header_id),
            );
            return Err(ServiceError::ChainMismatch);
        }

        Ok(scope.with_header(header))
    }

    pub async fn resolve_config(
        &self,
        principal: Principal,
        project_id: Uuid,
        config_id: Uuid,
    ) -> Result<ConfigScope, ServiceError> {
        let scope = self
            .resolve_project_for_principal(principal, project_id)
            .await?;
        self.resolve_config_for_project(scope, config_id).await
    }

    pub async fn resolve_header(
        &self,
        principal: Principal,
        project_id: Uuid,
        config_id: Uuid,
        header_id: Uuid,
    ) -> Result<HeaderScope, ServiceError> {
        let scope = self.resolve_config(principal, project_id, config_id).await?;
        self.resolve_header_for_config(scope, header_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AccessKey, EncryptedValue, HeaderReplacement, LimitPeriod, Project, ProjectConfig,
        RateLimitPolicy,
    };
    use crate::services::security_audit::SecurityEventType;
    use crate::services::store::InMemoryStore;

    struct Fixture {
        chain: OwnershipChain,
        audit: SecurityAuditService,
        store: Arc<InMemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let audit = SecurityAuditService::recording();
        Fixture {
            chain: OwnershipChain::new(store.clone(), audit.clone()),
            audit,
            store,
        }
    }

    async fn seed_project(store: &InMemoryStore, owner: Uuid) -> Project {
        let project = Project::new(owner, "demo".into(), None, AccessKey::new("k".into()));
        store.create_project(&project).await.unwrap();
        project
    }

    async fn seed_config(store: &InMemoryStore, project_id: Uuid) -> ProjectConfig {
        let config = ProjectConfig::new(
            project_id,
            "api".into(),
            RateLimitPolicy {
                requests: 100,
                period: LimitPeriod::Hour,
            },
        );
        store.create_config(&config).await.unwrap();
        config
    }

    async fn seed_header(store: &InMemoryStore, config_id: Uuid) -> HeaderReplacement {
        let header = HeaderReplacement::new(
            config_id,
            "Authorization".into(),
            EncryptedValue::from_stored("00".repeat(40)),
        );
        store.create_header(&header).await.unwrap();
        header
    }

    #[tokio::test]
    async fn owner_resolves_full_chain() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let project = seed_project(&f.store, owner).await;
        let config = seed_config(&f.store, project.project_id).await;
        let header = seed_header(&f.store, config.config_id).await;

        let scope = f
            .chain
            .resolve_header(
                Principal::new(owner),
                project.project_id,
                config.config_id,
                header.header_id,
            )
            .await
            .unwrap();

        assert_eq!(scope.header().header_id, header.header_id);
        assert_eq!(scope.config().config_id, config.config_id);
        assert_eq!(scope.project().project_id, project.project_id);
        assert!(f.audit.recorded().is_empty());
    }

    #[tokio::test]
    async fn foreign_project_is_unauthorized_and_audited() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let project = seed_project(&f.store, owner).await;

        let err = f
            .chain
            .resolve_project_for_principal(Principal::new(intruder), project.project_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));

        let events = f.audit.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SecurityEventType::CrossTenantAccess);
        assert_eq!(events[0].user_id, Some(intruder));
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let f = fixture();
        let err = f
            .chain
            .resolve_project_for_principal(Principal::new(Uuid::new_v4()), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[tokio::test]
    async fn config_through_wrong_project_is_chain_mismatch() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let p1 = seed_project(&f.store, owner).await;
        let p2 = seed_project(&f.store, owner).await;
        let c2 = seed_config(&f.store, p2.project_id).await;

        let err = f
            .chain
            .resolve_config(Principal::new(owner), p1.project_id, c2.config_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ChainMismatch));
        assert_eq!(f.audit.recorded()[0].event_type, SecurityEventType::ChainMismatch);
    }

    #[tokio::test]
    async fn header_through_wrong_config_is_chain_mismatch() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let project = seed_project(&f.store, owner).await;
        let c1 = seed_config(&f.store, project.project_id).await;
        let c2 = seed_config(&f.store, project.project_id).await;
        let h2 = seed_header(&f.store, c2.config_id).await;

        let err = f
            .chain
            .resolve_header(
                Principal::new(owner),
                project.project_id,
                c1.config_id,
                h2.header_id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ChainMismatch));
    }

    #[tokio::test]
    async fn chain_stops_at_first_failure() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let project = seed_project(&f.store, owner).await;
        let config = seed_config(&f.store, project.project_id).await;
        let header = seed_header(&f.store, config.config_id).await;

        // Unauthorized at the project hop; the later hops would have succeeded.
        let err = f
            .chain
            .resolve_header(
                Principal::new(Uuid::new_v4()),
                project.project_id,
                config.config_id,
                header.header_id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));
        assert_eq!(f.audit.recorded().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let f = fixture();
        f.store.set_unavailable(true);
        let err = f
            .chain
            .resolve_project_for_principal(Principal::new(Uuid::new_v4()), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(_)));
    }
}
