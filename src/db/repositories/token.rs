use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::{TokenType, UserId};
use crate::entities::{prelude::*, tokens};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: i32,
    pub hash: String,
    pub token_type: String,
    pub requested_at: DateTime<Utc>,
    pub user_id: UserId,
}

impl From<tokens::Model> for Token {
    fn from(model: tokens::Model) -> Self {
        Self {
            id: model.id,
            hash: model.hash,
            token_type: model.token_type,
            requested_at: model.requested_at,
            user_id: UserId::new(model.user_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub hash: String,
    pub token_type: TokenType,
    pub user_id: UserId,
    pub requested_at: DateTime<Utc>,
}

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, token: NewToken) -> Result<Token> {
        let model = tokens::ActiveModel {
            hash: Set(token.hash),
            token_type: Set(token.token_type.as_str().to_string()),
            requested_at: Set(token.requested_at),
            user_id: Set(token.user_id.value()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert token")?;

        Ok(Token::from(model))
    }

    pub async fn get(&self, hash: &str, token_type: TokenType) -> Result<Option<Token>> {
        let row = Tokens::find()
            .filter(tokens::Column::Hash.eq(hash))
            .filter(tokens::Column::TokenType.eq(token_type.as_str()))
            .one(&self.conn)
            .await
            .context("Failed to query token")?;

        Ok(row.map(Token::from))
    }

    /// Newest first.
    pub async fn list_by_user(&self, user_id: UserId, token_type: TokenType) -> Result<Vec<Token>> {
        let rows = Tokens::find()
            .filter(tokens::Column::UserId.eq(user_id.value()))
            .filter(tokens::Column::TokenType.eq(token_type.as_str()))
            .order_by_desc(tokens::Column::RequestedAt)
            .all(&self.conn)
            .await
            .context("Failed to list tokens")?;

        Ok(rows.into_iter().map(Token::from).collect())
    }

    pub async fn remove(&self, hash: &str, token_type: TokenType) -> Result<bool> {
        let result = Tokens::delete_many()
            .filter(tokens::Column::Hash.eq(hash))
            .filter(tokens::Column::TokenType.eq(token_type.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to delete token")?;

        Ok(result.rows_affected > 0)
    }
}
