//! `SeaORM` implementation of the `TokenService` trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::crypto::random_hash;
use crate::db::{NewToken, Store, Token};
use crate::domain::{TokenType, UserId};
use crate::services::ServiceError;
use crate::services::token_service::{RATE_LIMIT_MAX, RATE_LIMIT_WINDOW, TokenService};

pub struct SeaOrmTokenService {
    store: Store,
}

impl SeaOrmTokenService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

fn chrono_duration(d: Duration) -> chrono::TimeDelta {
    chrono::TimeDelta::from_std(d).unwrap_or(chrono::TimeDelta::MAX)
}

#[async_trait]
impl TokenService for SeaOrmTokenService {
    async fn create(&self, user_id: UserId, token_type: TokenType) -> Result<Token, ServiceError> {
        let token = self
            .store
            .tokens()
            .create(NewToken {
                hash: random_hash(),
                token_type,
                user_id,
                requested_at: Utc::now(),
            })
            .await?;

        Ok(token)
    }

    async fn get(
        &self,
        hash: &str,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<Token, ServiceError> {
        let token = self
            .store
            .tokens()
            .get(hash, token_type)
            .await?
            .ok_or_else(|| ServiceError::not_found("token"))?;

        if Utc::now() > token.requested_at + chrono_duration(ttl) {
            self.store.tokens().remove(hash, token_type).await?;
            return Err(ServiceError::NotFound(
                "The token is already expired".to_string(),
            ));
        }

        Ok(token)
    }

    async fn rate_limit(
        &self,
        user_id: UserId,
        token_type: TokenType,
    ) -> Result<bool, ServiceError> {
        let since = Utc::now() - chrono_duration(RATE_LIMIT_WINDOW);
        let recent = self
            .store
            .tokens()
            .list_by_user(user_id, token_type)
            .await?
            .into_iter()
            .filter(|t| t.requested_at >= since)
            .count();

        let limited = recent > RATE_LIMIT_MAX;
        if limited {
            warn!(
                user_id = %user_id,
                count = recent,
                token_type = %token_type,
                "Token requests exceed the rate limit"
            );
        }

        Ok(limited)
    }

    async fn remove(&self, hash: &str, token_type: TokenType) -> Result<(), ServiceError> {
        if self.store.tokens().remove(hash, token_type).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("token"))
        }
    }
}
