use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;

use crate::domain::{AdminCriteria, Pagination, UserId};
use super::site::purge_author;
use crate::entities::{prelude::*, users};

/// User data returned from repository (without password hash or salt)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub active: bool,
    pub last_modified: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: UserId::new(model.id),
            username: model.username,
            email: model.email,
            display_name: model.display_name,
            is_admin: model.is_admin,
            active: model.active,
            last_modified: model.last_modified,
        }
    }
}

/// User together with the stored credential pair, used only for authentication.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
    pub salt: String,
}

impl From<users::Model> for Credentials {
    fn from(model: users::Model) -> Self {
        let password_hash = model.password.clone();
        let salt = model.salt.clone();
        Self {
            user: User::from(model),
            password_hash,
            salt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub salt: String,
    pub is_admin: bool,
    pub active: bool,
}

/// Full replacement of the mutable user fields.
///
/// `credentials` is `Some((hash, salt))` only when the password changes.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub active: bool,
    pub credentials: Option<(String, String)>,
}

/// Outcome of a write that must leave at least one active administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminGuarded<T> {
    Done(T),
    Missing,
    NoAdminLeft,
}

async fn active_admins<C: ConnectionTrait>(conn: &C) -> Result<u64> {
    Users::find()
        .filter(users::Column::IsAdmin.eq(true))
        .filter(users::Column::Active.eq(true))
        .count(conn)
        .await
        .context("Failed to count administrators")
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, user: NewUser) -> Result<User> {
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
        .insert(&self.conn)
        .await
        .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    pub async fn list(&self, pagination: Option<Pagination>) -> Result<Vec<User>> {
        let mut query = Users::find().order_by_asc(users::Column::Username);

        if let Some(p) = pagination {
            query = query.offset(p.offset()).limit(p.limit());
        }

        let rows = query
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn get(&self, id: UserId) -> Result<Option<User>> {
        let user = Users::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_mail(&self, email: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by mail")?;

        Ok(user.map(User::from))
    }

    pub async fn credentials_by_username(&self, username: &str) -> Result<Option<Credentials>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query credentials by username")?;

        Ok(user.map(Credentials::from))
    }

    pub async fn credentials_by_mail(&self, email: &str) -> Result<Option<Credentials>> {
        let user = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query credentials by mail")?;

        Ok(user.map(Credentials::from))
    }

    pub async fn credentials(&self, id: UserId) -> Result<Option<Credentials>> {
        let user = Users::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query credentials by ID")?;

        Ok(user.map(Credentials::from))
    }

    /// Returns `None` when no row with `id` exists.
    pub async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>> {
        let Some(existing) = Users::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = existing.into();
        active.username = Set(changes.username);
        active.email = Set(changes.email);
        active.display_name = Set(changes.display_name);
        active.is_admin = Set(changes.is_admin);
        active.active = Set(changes.active);
        if let Some((hash, salt)) = changes.credentials {
            active.password = Set(hash);
            active.salt = Set(salt);
        }
        active.last_modified = Set(Utc::now());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update user")?;

        Ok(Some(User::from(model)))
    }

    /// Applies `changes` and re-counts active admins in the same transaction.
    ///
    /// The write comes first so SQLite hands out the write lock before the
    /// count runs; a concurrent demotion waits and then sees this one.
    pub async fn update_keeping_admin(
        &self,
        id: UserId,
        changes: UserChanges,
    ) -> Result<AdminGuarded<User>> {
        let txn = self.conn.begin().await?;

        let mut update = Users::update_many()
            .col_expr(users::Column::Username, Expr::value(changes.username))
            .col_expr(users::Column::Email, Expr::value(changes.email))
            .col_expr(users::Column::DisplayName, Expr::value(changes.display_name))
            .col_expr(users::Column::IsAdmin, Expr::value(changes.is_admin))
            .col_expr(users::Column::Active, Expr::value(changes.active))
            .col_expr(users::Column::LastModified, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id.value()));
        if let Some((hash, salt)) = changes.credentials {
            update = update
                .col_expr(users::Column::Password, Expr::value(hash))
                .col_expr(users::Column::Salt, Expr::value(salt));
        }

        let result = update
            .exec(&txn)
            .await
            .context("Failed to update user")?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(AdminGuarded::Missing);
        }

        if active_admins(&txn).await? == 0 {
            txn.rollback().await?;
            return Ok(AdminGuarded::NoAdminLeft);
        }

        let model = Users::find_by_id(id.value())
            .one(&txn)
            .await
            .context("Failed to reload user after update")?
            .context("User vanished after update")?;

        txn.commit().await?;

        Ok(AdminGuarded::Done(User::from(model)))
    }

    /// Removes the user together with their sites, renumbering the rest.
    ///
    /// Rolls back when no active admin would remain.
    pub async fn remove_keeping_admin(&self, id: UserId) -> Result<AdminGuarded<()>> {
        let txn = self.conn.begin().await?;

        purge_author(&txn, id).await?;

        let result = Users::delete_by_id(id.value())
            .exec(&txn)
            .await
            .context("Failed to delete user")?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(AdminGuarded::Missing);
        }

        if active_admins(&txn).await? == 0 {
            txn.rollback().await?;
            return Ok(AdminGuarded::NoAdminLeft);
        }

        txn.commit().await?;

        Ok(AdminGuarded::Done(()))
    }

    /// Counts users; admin counts only include active accounts.
    pub async fn count(&self, criteria: AdminCriteria) -> Result<u64> {
        let query = match criteria {
            AdminCriteria::OnlyAdmins => return active_admins(&self.conn).await,
            AdminCriteria::NoAdmins => Users::find().filter(users::Column::IsAdmin.eq(false)),
            AdminCriteria::AllUsers => Users::find(),
        };

        query
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }
}
