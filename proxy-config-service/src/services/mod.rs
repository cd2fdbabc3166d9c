//! Services layer: cipher, store, ownership chain, sessions and the
//! orchestrator that composes them into guarded operations.

pub mod cipher;
pub mod context;
mod database;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod ownership;
pub mod security_audit;
pub mod session;
pub mod store;
pub mod tokens;

pub use cipher::{CipherError, SecretCipher};
pub use context::{ConfigScope, HeaderScope, Principal, ProjectScope};
pub use database::PgStore;
pub use error::ServiceError;
pub use identity::{GithubIdentityProvider, IdentityProvider, MockIdentityProvider};
pub use orchestrator::{ProxyCredential, RequestOrchestrator};
pub use ownership::OwnershipChain;
pub use security_audit::SecurityAuditService;
pub use session::{SessionResolver, SessionService};
pub use store::{InMemoryStore, ResourceStore, StoreError};
