/// Authentication and authorization utilities
///
/// - `tokens`: signed access tokens (stateless, verified by signature + expiry)
/// - `session`: refresh token rotation and access-token blacklist on Redis
/// - `password`: Argon2id password hashing
/// - `authorization`: per-request auth context and the admin capability check

pub mod authorization;
pub mod password;
pub mod session;
pub mod tokens;

pub use authorization::{AuthContext, AuthzError};
pub use session::{SessionError, SessionStore};
pub use tokens::{AccessClaims, TokenError, TokenSigner};
