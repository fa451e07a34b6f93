/// Access token signing and verification
///
/// Access tokens are short-lived JWTs signed with HS256. They are stateless:
/// verification needs only the signing key and the clock, no store lookup.
/// The revocation blacklist is a separate concern handled by
/// [`crate::auth::session::SessionStore`].
///
/// The signing capability is an explicitly constructed [`TokenSigner`]
/// injected wherever tokens are issued or verified; there is no global key
/// state, which keeps test doubles trivial.
///
/// # Example
///
/// ```
/// use fieldbook_shared::auth::tokens::TokenSigner;
/// use fieldbook_shared::models::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let signer = TokenSigner::new("a-secret-key-at-least-32-bytes-long", 15);
///
/// let user_id = Uuid::new_v4();
/// let (token, _expires_at) = signer.issue(user_id, UserRole::User)?;
///
/// let claims = signer.verify(&token)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::UserRole;

const ISSUER: &str = "fieldbook";

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Failed to sign a token
    #[error("Failed to sign token: {0}")]
    SigningError(String),

    /// Token is malformed, has a bad signature, or has expired
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Token has expired
    #[error("Credential has expired")]
    Expired,
}

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: user ID
    pub sub: Uuid,

    /// Role at issue time
    pub role: UserRole,

    /// Issuer, always "fieldbook"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    /// Time left until expiry, None if already expired
    pub fn remaining(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Signs and verifies access tokens with an injected HS256 key
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

impl TokenSigner {
    /// Creates a signer from a shared secret and an access-token TTL
    ///
    /// The secret should be at least 32 bytes of random data.
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    /// Issues a signed, time-bounded access token
    pub fn issue(
        &self,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.ttl_minutes);

        let claims = AccessClaims {
            sub: user_id,
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::SigningError(e.to_string()))?;

        Ok((token, expires_at))
    }

    /// Verifies signature, expiry, and issuer, returning the claims
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;

        let data = decode::<AccessClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidCredential(e.to_string()),
            }
        })?;

        Ok(data.claims)
    }
}

/// Extracts the signature segment of a JWT
///
/// Used as the blacklist key: the signature uniquely identifies the token
/// without storing the full credential.
pub fn token_signature(token: &str) -> &str {
    token.rsplit('.').next().unwrap_or(token)
}
