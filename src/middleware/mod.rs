pub mod auth;
pub mod security;
pub mod session;

pub use auth::{auth_middleware, AuthUser};
pub use security::security_headers_middleware;
pub use session::{require_login, session_middleware, CurrentUser};
