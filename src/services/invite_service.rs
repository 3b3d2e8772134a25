//! Domain service for user invitations.

use zeroize::Zeroizing;

use crate::db::{InviteFields, User, UserInvite};
use crate::services::ServiceError;

#[async_trait::async_trait]
pub trait InviteService: Send + Sync {
    /// Stores the invite under a fresh hash and mails the activation link.
    async fn create(&self, caller: &User, fields: InviteFields) -> Result<UserInvite, ServiceError>;

    /// Replaces the invite fields, rotates the hash and re-sends the link.
    async fn update(
        &self,
        caller: &User,
        id: i32,
        fields: InviteFields,
    ) -> Result<UserInvite, ServiceError>;

    async fn get(&self, caller: &User, id: i32) -> Result<UserInvite, ServiceError>;

    async fn get_by_hash(&self, hash: &str) -> Result<UserInvite, ServiceError>;

    async fn list(&self, caller: &User) -> Result<Vec<UserInvite>, ServiceError>;

    async fn remove(&self, caller: &User, id: i32) -> Result<(), ServiceError>;

    /// Turns the invite into an active user with `password` and deletes it.
    async fn accept(&self, hash: &str, password: Zeroizing<String>) -> Result<User, ServiceError>;
}
