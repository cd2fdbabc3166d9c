pub mod session;

pub use session::{session_middleware, AuthPrincipal, SESSION_COOKIE};
