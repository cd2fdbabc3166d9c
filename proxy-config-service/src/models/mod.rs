//! Domain models for proxy-config-service.

pub mod header_replacement;
pub mod project;
pub mod project_config;
pub mod session;
pub mod user;

pub use header_replacement::{EncryptedValue, HeaderReplacement, HeaderReplacementSummary};
pub use project::{AccessKey, Project, ProjectResponse};
pub use project_config::{ConfigResponse, LimitPeriod, ProjectConfig, RateLimitPolicy};
pub use session::UserSession;
pub use user::{ExternalIdentity, User, UserResponse};
