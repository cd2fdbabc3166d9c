//! Security audit trail for the ownership chain and secret handling.
//!
//! Events are emitted under the `security_audit` tracing target so they can be
//! routed separately from application logs. Header values and access keys are
//! never part of an event.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Security audit event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    /// Principal addressed a project owned by someone else
    CrossTenantAccess,
    /// Child addressed through a parent it does not belong to
    ChainMismatch,
    /// Plaintext header value handed to its owner
    SecretRevealed,
    /// Stored ciphertext failed to decrypt
    DecryptionFailure,
    /// Composite create left a config without its header
    PartialCreate,
    /// OAuth callback state did not match the cookie
    OAuthStateMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Security audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAuditLog {
    pub id: Uuid,
    pub event_type: SecurityEventType,
    pub severity: Severity,
    /// Principal that triggered the event (if known)
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub config_id: Option<Uuid>,
    pub header_id: Option<Uuid>,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl SecurityAuditLog {
    pub fn new(
        event_type: SecurityEventType,
        severity: Severity,
        user_id: Option<Uuid>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            severity,
            user_id,
            project_id: None,
            config_id: None,
            header_id: None,
            details: details.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_config(mut self, config_id: Uuid) -> Self {
        self.config_id = Some(config_id);
        self
    }

    pub fn with_header(mut self, header_id: Uuid) -> Self {
        self.header_id = Some(header_id);
        self
    }

    pub fn cross_tenant_access(user_id: Uuid, project_id: Uuid) -> Self {
        Self::new(
            SecurityEventType::CrossTenantAccess,
            Severity::Critical,
            Some(user_id),
            "Attempted access to a project owned by another principal",
        )
        .with_project(project_id)
    }

    /// `parent_kind` names the level whose id did not match ("project" or "config").
    pub fn chain_mismatch(
        user_id: Uuid,
        parent_kind: &str,
        parent_id: Uuid,
        child_id: Uuid,
    ) -> Self {
        Self::new(
            SecurityEventType::ChainMismatch,
            Severity::Warning,
            Some(user_id),
            format!(
                "Resource {} addressed through {} {} it does not belong to",
                child_id, parent_kind, parent_id
            ),
        )
    }
}

/// Security audit service for logging security events.
#[derive(Clone, Default)]
pub struct SecurityAuditService {
    recorded: Option<Arc<Mutex<Vec<SecurityAuditLog>>>>,
}

impl SecurityAuditService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a copy of every event in memory as well, for assertions in tests.
    pub fn recording() -> Self {
        Self {
            recorded: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    pub fn log(&self, log: SecurityAuditLog) {
        match log.severity {
            Severity::Critical => tracing::error!(
                target: "security_audit",
                event_type = ?log.event_type,
                user_id = ?log.user_id,
                project_id = ?log.project_id,
                config_id = ?log.config_id,
                header_id = ?log.header_id,
                details = %log.details,
                "Security event"
            ),
            Severity::Warning => tracing::warn!(
                target: "security_audit",
                event_type = ?log.event_type,
                user_id = ?log.user_id,
                project_id = ?log.project_id,
                config_id = ?log.config_id,
                header_id = ?log.header_id,
                details = %log.details,
                "Security event"
            ),
            Severity::Info => tracing::info!(
                target: "security_audit",
                event_type = ?log.event_type,
                user_id = ?log.user_id,
                project_id = ?log.project_id,
                config_id = ?log.config_id,
                header_id = ?log.header_id,
                details = %log.details,
                "Security event"
            ),
        }

        if let Some(recorded) = &self.recorded {
            if let Ok(mut events) = recorded.lock() {
                events.push(log);
            }
        }
    }

    /// Events captured by a [`SecurityAuditService::recording`] instance.
    pub fn recorded(&self) -> Vec<SecurityAuditLog> {
        self.recorded
            .as_ref()
            .and_then(|r| r.lock().ok().map(|events| events.clone()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_tenant_event_carries_principal() {
        let audit = SecurityAuditService::recording();
        let user_id = Uuid::new_v4();
        let project_id = Uuid::new_v4();
        audit.log(SecurityAuditLog::cross_tenant_access(user_id, project_id));

        let events = audit.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SecurityEventType::CrossTenantAccess);
        assert_eq!(events[0].user_id, Some(user_id));
        assert_eq!(events[0].project_id, Some(project_id));
    }

    #[test]
    fn non_recording_service_keeps_nothing() {
        let audit = SecurityAuditService::new();
        audit.log(SecurityAuditLog::new(
            SecurityEventType::SecretRevealed,
            Severity::Info,
            None,
            "revealed",
        ));
        assert!(audit.recorded().is_empty());
    }
}
