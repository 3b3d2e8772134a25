//! One-shot tokens, currently only for password resets.

use std::time::Duration;

use crate::db::Token;
use crate::domain::{TokenType, UserId};
use crate::services::ServiceError;

/// Lifetime of a password-reset token.
pub const PASSWORD_RESET_TTL: Duration = Duration::from_secs(60 * 60);

/// Window inspected by [`TokenService::rate_limit`].
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Requests allowed inside the window before a warning is logged.
pub const RATE_LIMIT_MAX: usize = 3;

#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    /// Issues a token with a fresh 128-hex-character hash.
    async fn create(&self, user_id: UserId, token_type: TokenType) -> Result<Token, ServiceError>;

    /// Loads a live token.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for unknown hashes, and for tokens
    /// older than `ttl`, which are deleted on the way.
    async fn get(
        &self,
        hash: &str,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<Token, ServiceError>;

    /// Returns `true` when the user requested more than [`RATE_LIMIT_MAX`]
    /// tokens inside [`RATE_LIMIT_WINDOW`]. The result is advisory and only
    /// logged.
    async fn rate_limit(&self, user_id: UserId, token_type: TokenType)
    -> Result<bool, ServiceError>;

    async fn remove(&self, hash: &str, token_type: TokenType) -> Result<(), ServiceError>;
}
