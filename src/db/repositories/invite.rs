use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;

use super::user::{NewUser, User};
use super::{Author, author_or_unknown, load_authors};
use crate::domain::UserId;
use crate::entities::{prelude::*, user_invites, users};

/// Pending invitation, joined with the inviting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInvite {
    pub id: i32,
    pub hash: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Author,
}

/// Fields supplied by the inviting admin.
#[derive(Debug, Clone)]
pub struct InviteFields {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
}

fn to_invite(model: user_invites::Model, created_by: Author) -> UserInvite {
    UserInvite {
        id: model.id,
        hash: model.hash,
        username: model.username,
        email: model.email,
        display_name: model.display_name,
        is_admin: model.is_admin,
        created_at: model.created_at,
        created_by,
    }
}

pub struct InviteRepository {
    conn: DatabaseConnection,
}

impl InviteRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn hydrate(&self, rows: Vec<user_invites::Model>) -> Result<Vec<UserInvite>> {
        let authors = load_authors(&self.conn, rows.iter().map(|r| r.created_by)).await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let author = author_or_unknown(&authors, r.created_by);
                to_invite(r, author)
            })
            .collect())
    }

    async fn hydrate_one(&self, row: Option<user_invites::Model>) -> Result<Option<UserInvite>> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<UserInvite>> {
        let rows = UserInvites::find()
            .order_by_desc(user_invites::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list invites")?;

        self.hydrate(rows).await
    }

    pub async fn get(&self, id: i32) -> Result<Option<UserInvite>> {
        let row = UserInvites::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query invite by ID")?;

        self.hydrate_one(row).await
    }

    pub async fn get_by_hash(&self, hash: &str) -> Result<Option<UserInvite>> {
        let row = UserInvites::find()
            .filter(user_invites::Column::Hash.eq(hash))
            .one(&self.conn)
            .await
            .context("Failed to query invite by hash")?;

        self.hydrate_one(row).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<UserInvite>> {
        let row = UserInvites::find()
            .filter(user_invites::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query invite by username")?;

        self.hydrate_one(row).await
    }

    pub async fn get_by_mail(&self, email: &str) -> Result<Option<UserInvite>> {
        let row = UserInvites::find()
            .filter(user_invites::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query invite by mail")?;

        self.hydrate_one(row).await
    }

    pub async fn create(
        &self,
        fields: InviteFields,
        hash: String,
        created_by: UserId,
    ) -> Result<UserInvite> {
        let model = user_invites::ActiveModel {
            hash: Set(hash),
            username: Set(fields.username),
            email: Set(fields.email),
            display_name: Set(fields.display_name),
            is_admin: Set(fields.is_admin),
            created_at: Set(Utc::now()),
            created_by: Set(created_by.value()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert invite")?;

        self.hydrate_one(Some(model))
            .await?
            .context("Invite vanished after insert")
    }

    /// Replaces the invite fields and rotates its hash. `None` if the row is gone.
    pub async fn update(
        &self,
        id: i32,
        fields: InviteFields,
        hash: String,
    ) -> Result<Option<UserInvite>> {
        let Some(existing) = UserInvites::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query invite for update")?
        else {
            return Ok(None);
        };

        let mut active: user_invites::ActiveModel = existing.into();
        active.hash = Set(hash);
        active.username = Set(fields.username);
        active.email = Set(fields.email);
        active.display_name = Set(fields.display_name);
        active.is_admin = Set(fields.is_admin);
        active.created_at = Set(Utc::now());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update invite")?;

        self.hydrate_one(Some(model)).await
    }

    pub async fn remove(&self, id: i32) -> Result<bool> {
        let result = UserInvites::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete invite")?;

        Ok(result.rows_affected > 0)
    }

    /// Turns an invite into an active user and drops the invite, atomically.
    ///
    /// Returns `None` when the invite was consumed concurrently.
    pub async fn accept(&self, invite_id: i32, user: NewUser) -> Result<Option<User>> {
        let txn = self.conn.begin().await?;

        let deleted = UserInvites::delete_by_id(invite_id)
            .exec(&txn)
            .await
            .context("Failed to delete accepted invite")?;

        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let model = users::ActiveModel {
            username: Set(user.username),
            email: Set(user.email),
            display_name: Set(user.display_name),
            password: Set(user.password_hash),
            salt: Set(user.salt),
            is_admin: Set(user.is_admin),
            active: Set(user.active),
            last_modified: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert invited user")?;

        txn.commit().await?;

        Ok(Some(User::from(model)))
    }
}
