//! Domain service for user accounts and credentials.
//!
//! Owns the last-administrator rule, password derivation and the
//! forgot/reset password flow.

use zeroize::Zeroizing;

use crate::db::User;
use crate::domain::{AdminCriteria, LoginMethod, Pagination, UserId};
use crate::services::ServiceError;

/// Submitted account fields.
///
/// `password` is only consulted on create and when the caller asks for a
/// password change; it is zeroed when dropped.
#[derive(Clone)]
pub struct UserInput {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password: Option<Zeroizing<String>>,
    pub is_admin: bool,
    pub active: bool,
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Creates an account. Admin only.
    async fn create(&self, caller: &User, input: UserInput) -> Result<User, ServiceError>;

    /// Replaces the account fields of `id`.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::PermissionDenied`] if a non-admin targets another
    ///   account or changes its own role or active flag.
    /// - [`ServiceError::Unprocessable`] if no active administrator would remain.
    async fn update(
        &self,
        caller: &User,
        id: UserId,
        input: UserInput,
        change_password: bool,
    ) -> Result<User, ServiceError>;

    /// Verifies `login`/`password`; `method` selects lookup by username or mail.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for unknown or inactive
    /// accounts and wrong passwords alike.
    async fn authenticate(
        &self,
        method: LoginMethod,
        login: &str,
        password: &str,
    ) -> Result<User, ServiceError>;

    async fn get(&self, id: UserId) -> Result<User, ServiceError>;

    async fn get_by_username(&self, username: &str) -> Result<User, ServiceError>;

    async fn get_by_mail(&self, email: &str) -> Result<User, ServiceError>;

    async fn list(
        &self,
        caller: &User,
        pagination: Option<Pagination>,
    ) -> Result<Vec<User>, ServiceError>;

    async fn count(&self, criteria: AdminCriteria) -> Result<u64, ServiceError>;

    /// Deletes the account together with everything it owns. Admin only.
    async fn remove(&self, caller: &User, id: UserId) -> Result<User, ServiceError>;

    /// True when exactly one active administrator exists.
    async fn one_admin(&self) -> Result<bool, ServiceError>;

    /// Starts a password reset for the account identified by `login`.
    ///
    /// Succeeds silently for unknown or inactive accounts.
    async fn forgot_password(&self, login: &str) -> Result<(), ServiceError>;

    /// Consumes a reset token and sets a new password.
    async fn reset_password(
        &self,
        hash: &str,
        password: Zeroizing<String>,
    ) -> Result<User, ServiceError>;

    /// Creates the `admin` account when no user exists yet.
    ///
    /// Returns the generated plain password so it can be shown once.
    async fn bootstrap_admin(&self) -> Result<Option<(User, Zeroizing<String>)>, ServiceError>;
}
