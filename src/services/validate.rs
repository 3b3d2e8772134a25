//! Field validation shared by the services.

use crate::db::Store;
use crate::domain::UserId;
use crate::services::ServiceError;

pub const MAX_USERNAME: usize = 60;
pub const MAX_EMAIL: usize = 191;
pub const MAX_DISPLAY_NAME: usize = 191;
pub const MAX_HEADLINE: usize = 150;
pub const MAX_TITLE: usize = 191;
pub const MAX_FILENAME: usize = 255;

/// Trims `value` and checks that it is non-empty and at most `max` characters.
pub fn required(field: &'static str, value: &str, max: usize) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::ValueRequired { field });
    }
    max_length(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

pub fn max_length(field: &'static str, value: &str, max: usize) -> Result<(), ServiceError> {
    if value.chars().count() > max {
        return Err(ServiceError::ValueTooLong { field, max });
    }
    Ok(())
}

/// Normalized account fields after the per-field checks.
#[derive(Debug, Clone)]
pub struct AccountFields {
    pub username: String,
    pub email: String,
    pub display_name: String,
}

pub fn account_fields(
    username: &str,
    email: &str,
    display_name: &str,
) -> Result<AccountFields, ServiceError> {
    Ok(AccountFields {
        display_name: required("display_name", display_name, MAX_DISPLAY_NAME)?,
        email: required("email", email, MAX_EMAIL)?,
        username: required("username", username, MAX_USERNAME)?,
    })
}

/// Which checks [`AccountValidator::validate`] runs.
///
/// Checks always run in the same order: duplicate mail, duplicate username,
/// password length.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checks<'a> {
    pub mail: bool,
    pub username: bool,
    pub password: Option<&'a str>,
    /// Existing user to ignore in duplicate lookups.
    pub except_user: Option<UserId>,
    /// Existing invite to ignore in duplicate lookups.
    pub except_invite: Option<i32>,
}

pub struct AccountValidator<'a> {
    store: &'a Store,
    min_password_length: usize,
}

impl<'a> AccountValidator<'a> {
    pub const fn new(store: &'a Store, min_password_length: usize) -> Self {
        Self {
            store,
            min_password_length,
        }
    }

    /// Usernames and mail addresses are unique across users and pending invites.
    pub async fn validate(
        &self,
        fields: &AccountFields,
        checks: Checks<'_>,
    ) -> Result<(), ServiceError> {
        if checks.mail {
            self.duplicate_mail(&fields.email, checks).await?;
        }
        if checks.username {
            self.duplicate_username(&fields.username, checks).await?;
        }
        if let Some(password) = checks.password {
            self.password_length(password)?;
        }
        Ok(())
    }

    async fn duplicate_mail(&self, email: &str, checks: Checks<'_>) -> Result<(), ServiceError> {
        let taken_by_user = self
            .store
            .users()
            .get_by_mail(email)
            .await?
            .is_some_and(|u| Some(u.id) != checks.except_user);

        let taken_by_invite = self
            .store
            .invites()
            .get_by_mail(email)
            .await?
            .is_some_and(|i| Some(i.id) != checks.except_invite);

        if taken_by_user || taken_by_invite {
            return Err(ServiceError::Unprocessable(format!(
                "The mail address '{email}' is already in use"
            )));
        }
        Ok(())
    }

    async fn duplicate_username(
        &self,
        username: &str,
        checks: Checks<'_>,
    ) -> Result<(), ServiceError> {
        let taken_by_user = self
            .store
            .users()
            .get_by_username(username)
            .await?
            .is_some_and(|u| Some(u.id) != checks.except_user);

        let taken_by_invite = self
            .store
            .invites()
            .get_by_username(username)
            .await?
            .is_some_and(|i| Some(i.id) != checks.except_invite);

        if taken_by_user || taken_by_invite {
            return Err(ServiceError::Unprocessable(format!(
                "The username '{username}' is already taken"
            )));
        }
        Ok(())
    }

    pub fn password_length(&self, password: &str) -> Result<(), ServiceError> {
        if password.chars().count() < self.min_password_length {
            return Err(ServiceError::Unprocessable(format!(
                "The password must be at least {} characters long",
                self.min_password_length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_empty() {
        assert_eq!(required("title", "  About  ", 10).unwrap(), "About");
        assert!(matches!(
            required("title", "   ", 10),
            Err(ServiceError::ValueRequired { field: "title" })
        ));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(max_length("headline", "äöü", 3).is_ok());
        assert!(matches!(
            max_length("headline", "äöüß", 3),
            Err(ServiceError::ValueTooLong {
                field: "headline",
                max: 3
            })
        ));
    }

    #[test]
    fn account_fields_enforce_limits() {
        let long = "a".repeat(MAX_USERNAME + 1);
        assert!(matches!(
            account_fields(&long, "a@b.c", "A"),
            Err(ServiceError::ValueTooLong {
                field: "username",
                ..
            })
        ));

        let fields = account_fields(" homer ", "homer@example.com", "Homer Simpson").unwrap();
        assert_eq!(fields.username, "homer");
    }
}
