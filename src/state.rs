use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    ArticleService, AuditUserHooks, CategoryService, FileService, InviteService, LogMailSender,
    MailSender, Mailer, NoopUserHooks, SeaOrmArticleService, SeaOrmCategoryService,
    SeaOrmFileService, SeaOrmInviteService, SeaOrmSiteService, SeaOrmTokenService,
    SeaOrmUserService, SessionProvider, SiteService, SmtpMailSender, TokenService, UserHooks,
    UserService,
};

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub sessions: Arc<SessionProvider>,

    pub mailer: Mailer,

    pub users: Arc<dyn UserService>,

    pub invites: Arc<dyn InviteService>,

    pub tokens: Arc<dyn TokenService>,

    pub articles: Arc<dyn ArticleService>,

    pub categories: Arc<dyn CategoryService>,

    pub sites: Arc<dyn SiteService>,

    pub files: Arc<dyn FileService>,
}

impl SharedState {
    /// Connects the store and picks the mail transport from `mail.enabled`.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let transport: Arc<dyn MailSender> = if config.mail.enabled {
            Arc::new(SmtpMailSender::new(&config.mail).context("Failed to set up SMTP transport")?)
        } else {
            info!("Mail delivery disabled, messages are only logged");
            Arc::new(LogMailSender)
        };

        Self::with_mail_sender(config, transport).await
    }

    pub async fn with_mail_sender(
        config: Config,
        transport: Arc<dyn MailSender>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let cost = config.user.bcrypt_cost;
        tokio::task::spawn_blocking(move || crate::crypto::prepare_dummy_hash(cost))
            .await
            .context("Dummy hash task failed")??;

        Ok(Self::assemble(config, store, transport))
    }

    /// Wires every service against an already migrated store.
    ///
    /// Spawns the mail consumer, so this must run inside a Tokio runtime.
    #[must_use]
    pub fn assemble(config: Config, store: Store, transport: Arc<dyn MailSender>) -> Self {
        let (mailer, _mail_task) = Mailer::start(transport, &config.mail, config.server.base_url());

        let hooks: Arc<dyn UserHooks> = if config.user.audit_hooks {
            Arc::new(AuditUserHooks)
        } else {
            Arc::new(NoopUserHooks)
        };

        let tokens = Arc::new(SeaOrmTokenService::new(store.clone())) as Arc<dyn TokenService>;

        let users = Arc::new(SeaOrmUserService::new(
            store.clone(),
            &config,
            tokens.clone(),
            mailer.clone(),
            hooks.clone(),
        )) as Arc<dyn UserService>;

        let invites = Arc::new(SeaOrmInviteService::new(
            store.clone(),
            config.user.clone(),
            mailer.clone(),
            hooks,
        )) as Arc<dyn InviteService>;

        let articles =
            Arc::new(SeaOrmArticleService::new(store.clone(), &config)) as Arc<dyn ArticleService>;
        let categories =
            Arc::new(SeaOrmCategoryService::new(store.clone())) as Arc<dyn CategoryService>;
        let sites = Arc::new(SeaOrmSiteService::new(store.clone())) as Arc<dyn SiteService>;
        let files =
            Arc::new(SeaOrmFileService::new(store.clone(), &config.file)) as Arc<dyn FileService>;

        let sessions = Arc::new(SessionProvider::new(config.session.ttl()));

        Self {
            config: Arc::new(config),
            store,
            sessions,
            mailer,
            users,
            invites,
            tokens,
            articles,
            categories,
            sites,
            files,
        }
    }
}
