//! `SeaORM` implementation of the `UserService` trait.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::{Config, UserConfig};
use crate::crypto::{generate_salt, hash_password, random_password, verify_dummy, verify_password};
use crate::db::{AdminGuarded, Credentials, NewUser, Store, User, UserChanges};
use crate::domain::{AdminCriteria, LoginMethod, Pagination, TokenType, UserId};
use crate::services::hooks::{UserHooks, hook_subject};
use crate::services::mailer::Mailer;
use crate::services::token_service::{PASSWORD_RESET_TTL, TokenService};
use crate::services::user_service::{UserInput, UserService};
use crate::services::validate::{AccountValidator, Checks, account_fields};
use crate::services::{ServiceError, ensure_admin};

const UPDATE_LAST_ADMIN: &str = "Could not update the user, no administrator would remain";
const REMOVE_LAST_ADMIN: &str = "Could not remove the user, no administrator would remain";

/// Length of the generated bootstrap password.
const BOOTSTRAP_PASSWORD_LENGTH: usize = 16;

/// Salts and hashes `password` on the blocking pool. Returns `(hash, salt)`.
pub(crate) async fn derive_credentials(
    password: &Zeroizing<String>,
    cost: u32,
) -> Result<(String, String), ServiceError> {
    let plain = password.clone();
    let derived = tokio::task::spawn_blocking(move || {
        let salt = generate_salt();
        hash_password(&plain, &salt, cost).map(|hash| (hash, salt))
    })
    .await
    .context("Password hashing task failed")??;

    Ok(derived)
}

pub(crate) fn hook_rejected(subject: &str, err: &anyhow::Error) -> ServiceError {
    warn!(subject, error = %err, "User hook rejected the operation");
    ServiceError::Unprocessable(format!("The operation was rejected: {err}"))
}

pub struct SeaOrmUserService {
    store: Store,
    settings: UserConfig,
    upload_dir: PathBuf,
    tokens: Arc<dyn TokenService>,
    mailer: Mailer,
    hooks: Arc<dyn UserHooks>,
}

impl SeaOrmUserService {
    #[must_use]
    pub fn new(
        store: Store,
        config: &Config,
        tokens: Arc<dyn TokenService>,
        mailer: Mailer,
        hooks: Arc<dyn UserHooks>,
    ) -> Self {
        Self {
            store,
            settings: config.user.clone(),
            upload_dir: PathBuf::from(&config.file.location),
            tokens,
            mailer,
            hooks,
        }
    }

    const fn validator(&self) -> AccountValidator<'_> {
        AccountValidator::new(&self.store, self.settings.min_password_length)
    }

    async fn admins_left(&self) -> Result<u64, ServiceError> {
        Ok(self.store.users().count(AdminCriteria::OnlyAdmins).await?)
    }

    async fn remove_uploads(&self, names: Vec<String>) {
        for name in names {
            let path = self.upload_dir.join(&name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed upload of deleted user"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove upload"),
            }
        }
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn create(&self, caller: &User, input: UserInput) -> Result<User, ServiceError> {
        ensure_admin(caller)?;

        let fields = account_fields(&input.username, &input.email, &input.display_name)?;
        let password = input
            .password
            .as_ref()
            .ok_or(ServiceError::ValueRequired { field: "password" })?;

        self.validator()
            .validate(
                &fields,
                Checks {
                    mail: true,
                    username: true,
                    password: Some(password.as_str()),
                    ..Checks::default()
                },
            )
            .await?;

        self.hooks
            .pre_create(&fields.username, &fields.email)
            .await
            .map_err(|e| hook_rejected(&fields.username, &e))?;

        let (password_hash, salt) = derive_credentials(password, self.settings.bcrypt_cost).await?;

        let user = self
            .store
            .users()
            .create(NewUser {
                username: fields.username,
                email: fields.email,
                display_name: fields.display_name,
                password_hash,
                salt,
                is_admin: input.is_admin,
                active: input.active,
            })
            .await?;

        if let Err(e) = self.hooks.post_create(&user).await {
            warn!(
                subject = %hook_subject(Some(user.id), &user.username),
                error = %e,
                "post_create hook failed"
            );
        }

        Ok(user)
    }

    async fn update(
        &self,
        caller: &User,
        id: UserId,
        input: UserInput,
        change_password: bool,
    ) -> Result<User, ServiceError> {
        if !caller.is_admin && caller.id != id {
            return Err(ServiceError::denied("user"));
        }

        let existing = self
            .store
            .users()
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;

        if !caller.is_admin && (input.is_admin != existing.is_admin || input.active != existing.active)
        {
            return Err(ServiceError::PermissionDenied(
                "Only administrators can change roles or activation".to_string(),
            ));
        }

        let fields = account_fields(&input.username, &input.email, &input.display_name)?;
        let password = if change_password {
            Some(
                input
                    .password
                    .as_ref()
                    .ok_or(ServiceError::ValueRequired { field: "password" })?,
            )
        } else {
            None
        };

        self.validator()
            .validate(
                &fields,
                Checks {
                    mail: fields.email != existing.email,
                    username: fields.username != existing.username,
                    password: password.map(|p| p.as_str()),
                    except_user: Some(id),
                    except_invite: None,
                },
            )
            .await?;

        let loses_admin = existing.is_admin && existing.active && !(input.is_admin && input.active);
        if loses_admin && self.admins_left().await? <= 1 {
            return Err(ServiceError::Unprocessable(UPDATE_LAST_ADMIN.to_string()));
        }

        self.hooks
            .pre_update(&existing, change_password)
            .await
            .map_err(|e| hook_rejected(&hook_subject(Some(id), &existing.username), &e))?;

        let credentials = match password {
            Some(p) => Some(derive_credentials(p, self.settings.bcrypt_cost).await?),
            None => None,
        };

        let changes = UserChanges {
            username: fields.username,
            email: fields.email,
            display_name: fields.display_name,
            is_admin: input.is_admin,
            active: input.active,
            credentials,
        };

        let user = match self.store.users().update_keeping_admin(id, changes).await? {
            AdminGuarded::Done(user) => user,
            AdminGuarded::Missing => return Err(ServiceError::not_found("user")),
            AdminGuarded::NoAdminLeft => {
                return Err(ServiceError::Unprocessable(UPDATE_LAST_ADMIN.to_string()));
            }
        };

        if change_password {
            self.mailer.send_password_change_confirmation(&user);
        }

        Ok(user)
    }

    async fn authenticate(
        &self,
        method: LoginMethod,
        login: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        let repo = self.store.users();
        let credentials = match method {
            LoginMethod::Username => repo.credentials_by_username(login.trim()).await?,
            LoginMethod::Mail => repo.credentials_by_mail(login.trim()).await?,
        };

        let plain = Zeroizing::new(password.to_string());
        let cost = self.settings.bcrypt_cost;

        let Some(Credentials {
            user,
            password_hash,
            salt,
        }) = credentials
        else {
            tokio::task::spawn_blocking(move || verify_dummy(&plain, cost))
                .await
                .context("Password verification task failed")?;
            return Err(ServiceError::Unauthorized);
        };

        let valid =
            tokio::task::spawn_blocking(move || verify_password(&plain, &salt, &password_hash))
                .await
                .context("Password verification task failed")??;

        if !valid || !user.active {
            return Err(ServiceError::Unauthorized);
        }

        Ok(user)
    }

    async fn get(&self, id: UserId) -> Result<User, ServiceError> {
        self.store
            .users()
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))
    }

    async fn get_by_username(&self, username: &str) -> Result<User, ServiceError> {
        self.store
            .users()
            .get_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))
    }

    async fn get_by_mail(&self, email: &str) -> Result<User, ServiceError> {
        self.store
            .users()
            .get_by_mail(email)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))
    }

    async fn list(
        &self,
        caller: &User,
        pagination: Option<Pagination>,
    ) -> Result<Vec<User>, ServiceError> {
        ensure_admin(caller)?;
        Ok(self.store.users().list(pagination).await?)
    }

    async fn count(&self, criteria: AdminCriteria) -> Result<u64, ServiceError> {
        Ok(self.store.users().count(criteria).await?)
    }

    async fn remove(&self, caller: &User, id: UserId) -> Result<User, ServiceError> {
        ensure_admin(caller)?;

        let target = self
            .store
            .users()
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;

        if target.is_admin && target.active && self.admins_left().await? <= 1 {
            return Err(ServiceError::Unprocessable(REMOVE_LAST_ADMIN.to_string()));
        }

        self.hooks
            .pre_remove(&target)
            .await
            .map_err(|e| hook_rejected(&hook_subject(Some(id), &target.username), &e))?;

        let uploads = self.store.files().unique_names_by_author(id).await?;

        match self.store.users().remove_keeping_admin(id).await? {
            AdminGuarded::Done(()) => {}
            AdminGuarded::Missing => return Err(ServiceError::not_found("user")),
            AdminGuarded::NoAdminLeft => {
                return Err(ServiceError::Unprocessable(REMOVE_LAST_ADMIN.to_string()));
            }
        }

        self.remove_uploads(uploads).await;

        Ok(target)
    }

    async fn one_admin(&self) -> Result<bool, ServiceError> {
        Ok(self.admins_left().await? == 1)
    }

    async fn forgot_password(&self, login: &str) -> Result<(), ServiceError> {
        let login = login.trim();
        let user = match self.settings.login_method {
            LoginMethod::Username => self.store.users().get_by_username(login).await?,
            LoginMethod::Mail => self.store.users().get_by_mail(login).await?,
        };

        let Some(user) = user.filter(|u| u.active) else {
            debug!("Password reset requested for an unknown or inactive account");
            return Ok(());
        };

        self.tokens
            .rate_limit(user.id, TokenType::PasswordReset)
            .await?;

        let token = self.tokens.create(user.id, TokenType::PasswordReset).await?;
        self.mailer.send_password_reset_link(&user, &token);

        Ok(())
    }

    async fn reset_password(
        &self,
        hash: &str,
        password: Zeroizing<String>,
    ) -> Result<User, ServiceError> {
        let token = self
            .tokens
            .get(hash, TokenType::PasswordReset, PASSWORD_RESET_TTL)
            .await?;

        self.validator().password_length(&password)?;

        let user = self
            .store
            .users()
            .get(token.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;

        self.hooks
            .pre_update(&user, true)
            .await
            .map_err(|e| hook_rejected(&hook_subject(Some(user.id), &user.username), &e))?;

        let credentials = derive_credentials(&password, self.settings.bcrypt_cost).await?;

        let updated = self
            .store
            .users()
            .update(
                user.id,
                UserChanges {
                    username: user.username,
                    email: user.email,
                    display_name: user.display_name,
                    is_admin: user.is_admin,
                    active: user.active,
                    credentials: Some(credentials),
                },
            )
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;

        self.tokens.remove(hash, TokenType::PasswordReset).await?;
        self.mailer.send_password_change_confirmation(&updated);

        Ok(updated)
    }

    async fn bootstrap_admin(&self) -> Result<Option<(User, Zeroizing<String>)>, ServiceError> {
        if self.store.users().count(AdminCriteria::AllUsers).await? > 0 {
            return Ok(None);
        }

        let password = Zeroizing::new(random_password(BOOTSTRAP_PASSWORD_LENGTH));
        let (password_hash, salt) =
            derive_credentials(&password, self.settings.bcrypt_cost).await?;

        let user = self
            .store
            .users()
            .create(NewUser {
                username: "admin".to_string(),
                email: "admin@localhost".to_string(),
                display_name: "Administrator".to_string(),
                password_hash,
                salt,
                is_admin: true,
                active: true,
            })
            .await?;

        Ok(Some((user, password)))
    }
}
