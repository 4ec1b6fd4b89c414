pub mod auth;
pub mod sanitize;

pub use auth::{auth_middleware, require_admin, AuthUser};
pub use sanitize::{strip_authorization_middleware, PublicAuthPaths};
