//! Callbacks invoked by the user service around account mutations.
//!
//! `pre_*` hooks run before the write and abort it by returning an error.
//! `post_create` runs after a successful insert; its failure is logged and
//! never undoes the insert.

use async_trait::async_trait;
use tracing::info;

use crate::db::User;
use crate::domain::UserId;

#[async_trait]
pub trait UserHooks: Send + Sync {
    async fn pre_create(&self, _username: &str, _email: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn post_create(&self, _user: &User) -> anyhow::Result<()> {
        Ok(())
    }

    async fn pre_update(&self, _before: &User, _password_changed: bool) -> anyhow::Result<()> {
        Ok(())
    }

    async fn pre_remove(&self, _user: &User) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing.
pub struct NoopUserHooks;

impl UserHooks for NoopUserHooks {}

/// Writes one structured audit line per account mutation.
pub struct AuditUserHooks;

#[async_trait]
impl UserHooks for AuditUserHooks {
    async fn pre_create(&self, username: &str, email: &str) -> anyhow::Result<()> {
        info!(target: "audit", username, email, "Creating user");
        Ok(())
    }

    async fn post_create(&self, user: &User) -> anyhow::Result<()> {
        info!(target: "audit", user_id = %user.id, username = %user.username, "User created");
        Ok(())
    }

    async fn pre_update(&self, before: &User, password_changed: bool) -> anyhow::Result<()> {
        info!(
            target: "audit",
            user_id = %before.id,
            password_changed,
            "Updating user"
        );
        Ok(())
    }

    async fn pre_remove(&self, user: &User) -> anyhow::Result<()> {
        info!(target: "audit", user_id = %user.id, username = %user.username, "Removing user");
        Ok(())
    }
}

/// Identifies the account a hook error belongs to in log lines.
#[must_use]
pub fn hook_subject(id: Option<UserId>, username: &str) -> String {
    id.map_or_else(|| username.to_string(), |id| format!("{username} ({id})"))
}
