//! `SeaORM` implementation of the `InviteService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::UserConfig;
use crate::crypto::random_hash;
use crate::db::{InviteFields, NewUser, Store, User, UserInvite};
use crate::services::hooks::{UserHooks, hook_subject};
use crate::services::invite_service::InviteService;
use crate::services::mailer::Mailer;
use crate::services::user_service_impl::{derive_credentials, hook_rejected};
use crate::services::validate::{AccountValidator, Checks, account_fields};
use crate::services::{ServiceError, ensure_admin};

pub struct SeaOrmInviteService {
    store: Store,
    settings: UserConfig,
    mailer: Mailer,
    hooks: Arc<dyn UserHooks>,
}

impl SeaOrmInviteService {
    #[must_use]
    pub const fn new(
        store: Store,
        settings: UserConfig,
        mailer: Mailer,
        hooks: Arc<dyn UserHooks>,
    ) -> Self {
        Self {
            store,
            settings,
            mailer,
            hooks,
        }
    }

    const fn validator(&self) -> AccountValidator<'_> {
        AccountValidator::new(&self.store, self.settings.min_password_length)
    }

    async fn checked_fields(
        &self,
        fields: InviteFields,
        except_invite: Option<i32>,
    ) -> Result<InviteFields, ServiceError> {
        let account = account_fields(&fields.username, &fields.email, &fields.display_name)?;

        self.validator()
            .validate(
                &account,
                Checks {
                    mail: true,
                    username: true,
                    except_invite,
                    ..Checks::default()
                },
            )
            .await?;

        Ok(InviteFields {
            username: account.username,
            email: account.email,
            display_name: account.display_name,
            is_admin: fields.is_admin,
        })
    }
}

#[async_trait]
impl InviteService for SeaOrmInviteService {
    async fn create(&self, caller: &User, fields: InviteFields) -> Result<UserInvite, ServiceError> {
        ensure_admin(caller)?;

        let fields = self.checked_fields(fields, None).await?;
        let invite = self
            .store
            .invites()
            .create(fields, random_hash(), caller.id)
            .await?;

        info!(invite_id = invite.id, username = %invite.username, "Invite created");
        self.mailer.send_activation_link(&invite);

        Ok(invite)
    }

    async fn update(
        &self,
        caller: &User,
        id: i32,
        fields: InviteFields,
    ) -> Result<UserInvite, ServiceError> {
        ensure_admin(caller)?;

        let fields = self.checked_fields(fields, Some(id)).await?;
        let invite = self
            .store
            .invites()
            .update(id, fields, random_hash())
            .await?
            .ok_or_else(|| ServiceError::not_found("invite"))?;

        self.mailer.send_activation_link(&invite);

        Ok(invite)
    }

    async fn get(&self, caller: &User, id: i32) -> Result<UserInvite, ServiceError> {
        ensure_admin(caller)?;

        self.store
            .invites()
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("invite"))
    }

    async fn get_by_hash(&self, hash: &str) -> Result<UserInvite, ServiceError> {
        self.store
            .invites()
            .get_by_hash(hash)
            .await?
            .ok_or_else(|| ServiceError::not_found("invite"))
    }

    async fn list(&self, caller: &User) -> Result<Vec<UserInvite>, ServiceError> {
        ensure_admin(caller)?;
        Ok(self.store.invites().list().await?)
    }

    async fn remove(&self, caller: &User, id: i32) -> Result<(), ServiceError> {
        ensure_admin(caller)?;

        if self.store.invites().remove(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("invite"))
        }
    }

    async fn accept(&self, hash: &str, password: Zeroizing<String>) -> Result<User, ServiceError> {
        let invite = self.get_by_hash(hash).await?;

        let account = account_fields(&invite.username, &invite.email, &invite.display_name)?;
        self.validator()
            .validate(
                &account,
                Checks {
                    mail: true,
                    username: true,
                    password: Some(password.as_str()),
                    except_user: None,
                    except_invite: Some(invite.id),
                },
            )
            .await?;

        self.hooks
            .pre_create(&account.username, &account.email)
            .await
            .map_err(|e| hook_rejected(&account.username, &e))?;

        let (password_hash, salt) =
            derive_credentials(&password, self.settings.bcrypt_cost).await?;

        let user = self
            .store
            .invites()
            .accept(
                invite.id,
                NewUser {
                    username: account.username,
                    email: account.email,
                    display_name: account.display_name,
                    password_hash,
                    salt,
                    is_admin: invite.is_admin,
                    active: true,
                },
            )
            .await?
            .ok_or_else(|| ServiceError::not_found("invite"))?;

        if let Err(e) = self.hooks.post_create(&user).await {
            warn!(
                subject = %hook_subject(Some(user.id), &user.username),
                error = %e,
                "post_create hook failed"
            );
        }

        info!(user_id = %user.id, username = %user.username, "Invite accepted");

        Ok(user)
    }
}
