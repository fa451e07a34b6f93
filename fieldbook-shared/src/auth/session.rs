/// Revocable session store: refresh tokens and the access-token blacklist
///
/// Refresh tokens are opaque random identifiers mapped server-side to a user
/// ID with a multi-day TTL. They are single-use: each successful refresh
/// atomically consumes the old token (Redis `GETDEL`, one round-trip, no
/// window where old and new are both valid) and issues a new one.
///
/// The blacklist holds signatures of access tokens revoked before natural
/// expiry. Entries carry a TTL equal to the token's remaining lifetime, so
/// they self-expire exactly when the token would have, bounding storage.
///
/// If Redis is unavailable, every operation here fails with
/// [`SessionError::StoreUnavailable`]. Callers treat that as a capability
/// downgrade: stateless access-token verification keeps working, only
/// refresh, logout, and blacklist checks degrade.

use chrono::Duration;
use rand::RngCore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::redis::RedisClient;

const REFRESH_PREFIX: &str = "refresh:";
const BLACKLIST_PREFIX: &str = "blacklist:";

/// Session store errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Refresh token is unknown, expired, or already consumed
    #[error("Invalid or expired refresh token")]
    InvalidCredential,

    /// The revocable-token store could not be reached
    #[error("Token store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::StoreUnavailable(err.to_string())
    }
}

/// Refresh token rotation and access-token revocation over Redis
#[derive(Clone)]
pub struct SessionStore {
    conn: ConnectionManager,
    refresh_ttl: Duration,
}

impl SessionStore {
    /// Creates a session store with the given refresh-token TTL
    pub fn new(redis: &RedisClient, refresh_ttl_days: i64) -> Self {
        Self {
            conn: redis.get_connection(),
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    /// Issues a new refresh token for a user
    ///
    /// The token is 256 bits of OS randomness, hex-encoded; it only ever
    /// exists as a key in the store and in the client's hands.
    pub async fn issue_refresh(&self, user_id: Uuid) -> Result<String, SessionError> {
        let token = random_token();
        let mut conn = self.conn.clone();

        conn.set_ex::<_, _, ()>(
            format!("{REFRESH_PREFIX}{token}"),
            user_id.to_string(),
            self.refresh_ttl.num_seconds() as u64,
        )
        .await?;

        Ok(token)
    }

    /// Rotates a refresh token: consumes the old one, issues a new one
    ///
    /// Lookup and delete are a single `GETDEL`, so two concurrent rotations
    /// of the same token cannot both succeed. A second use of a rotated
    /// token fails with [`SessionError::InvalidCredential`].
    pub async fn rotate_refresh(&self, old_token: &str) -> Result<(Uuid, String), SessionError> {
        let mut conn = self.conn.clone();

        let value: Option<String> = redis::cmd("GETDEL")
            .arg(format!("{REFRESH_PREFIX}{old_token}"))
            .query_async(&mut conn)
            .await?;

        let user_id = value
            .and_then(|v| Uuid::parse_str(&v).ok())
            .ok_or(SessionError::InvalidCredential)?;

        let new_token = self.issue_refresh(user_id).await?;
        Ok((user_id, new_token))
    }

    /// Deletes a refresh token (logout)
    ///
    /// Deleting an unknown token is not an error; logout is idempotent.
    pub async fn revoke_refresh(&self, token: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(format!("{REFRESH_PREFIX}{token}")).await?;
        Ok(())
    }

    /// Blacklists an access-token signature for its remaining lifetime
    ///
    /// A non-positive remaining TTL means the token is already expired and
    /// nothing needs storing.
    pub async fn blacklist_access(
        &self,
        signature: &str,
        remaining: Duration,
    ) -> Result<(), SessionError> {
        let secs = remaining.num_seconds();
        if secs <= 0 {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(format!("{BLACKLIST_PREFIX}{signature}"), 1u8, secs as u64)
            .await?;
        Ok(())
    }

    /// Checks whether an access-token signature has been revoked
    pub async fn is_blacklisted(&self, signature: &str) -> Result<bool, SessionError> {
        let mut conn = self.conn.clone();
        let revoked: bool = conn
            .exists(format!("{BLACKLIST_PREFIX}{signature}"))
            .await?;
        Ok(revoked)
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis::RedisConfig;

    #[test]
    fn test_connection_errors_map_to_store_unavailable() {
        let err = redis::RedisError::from((redis::ErrorKind::IoError, "connection refused"));
        assert!(matches!(
            SessionError::from(err),
            SessionError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn test_random_token_shape() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    async fn test_store() -> SessionStore {
        let client = RedisClient::new(RedisConfig::default_for_test())
            .await
            .unwrap();
        SessionStore::new(&client, 7)
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_refresh_rotation_single_use() {
        let store = test_store().await;
        let user_id = Uuid::new_v4();

        let token = store.issue_refresh(user_id).await.unwrap();

        let (rotated_user, new_token) = store.rotate_refresh(&token).await.unwrap();
        assert_eq!(rotated_user, user_id);
        assert_ne!(new_token, token);

        // The consumed token must be rejected on reuse.
        assert!(matches!(
            store.rotate_refresh(&token).await,
            Err(SessionError::InvalidCredential)
        ));

        // The rotated-in token still works.
        let (again, _) = store.rotate_refresh(&new_token).await.unwrap();
        assert_eq!(again, user_id);
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_blacklist_roundtrip() {
        let store = test_store().await;
        let signature = random_token();

        assert!(!store.is_blacklisted(&signature).await.unwrap());
        store
            .blacklist_access(&signature, Duration::minutes(5))
            .await
            .unwrap();
        assert!(store.is_blacklisted(&signature).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_expired_token_not_blacklisted() {
        let store = test_store().await;
        let signature = random_token();

        // Nothing stored for an already-expired token.
        store
            .blacklist_access(&signature, Duration::seconds(-10))
            .await
            .unwrap();
        assert!(!store.is_blacklisted(&signature).await.unwrap());
    }
}
