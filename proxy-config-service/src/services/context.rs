//! Typed request context, widened one hop at a time by the ownership chain.
//!
//! A `ConfigScope` can only be obtained from a `ProjectScope` whose project is
//! owned by the principal, and a `HeaderScope` only from such a `ConfigScope`.
//! Holding a scope is therefore proof that every hop above it was checked.

use uuid::Uuid;

use crate::models::{HeaderReplacement, Project, ProjectConfig};

/// Authenticated end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Principal {
    pub user_id: Uuid,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectScope {
    principal: Principal,
    project: Project,
}

impl ProjectScope {
    pub(crate) fn new(principal: Principal, project: Project) -> Self {
        Self { principal, project }
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub(crate) fn with_config(self, config: ProjectConfig) -> ConfigScope {
        ConfigScope {
            parent: self,
            config,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigScope {
    parent: ProjectScope,
    config: ProjectConfig,
}

impl ConfigScope {
    pub fn principal(&self) -> Principal {
        self.parent.principal
    }

    pub fn project(&self) -> &Project {
        &self.parent.project
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub(crate) fn with_header(self, header: HeaderReplacement) -> HeaderScope {
        HeaderScope {
            parent: self,
            header,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeaderScope {
    parent: ConfigScope,
    header: HeaderReplacement,
}

impl HeaderScope {
    pub fn principal(&self) -> Principal {
        self.parent.principal()
    }

    pub fn project(&self) -> &Project {
        self.parent.project()
    }

    pub fn config(&self) -> &ProjectConfig {
        self.parent.config()
    }

    pub fn header(&self) -> &HeaderReplacement {
        &self.header
    }
}
