use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::article::{Article, ArticleChanges, ArticleQuery, NewArticle};
pub use repositories::category::{Category, NewCategory};
pub use repositories::file::{File, NewFile};
pub use repositories::invite::{InviteFields, UserInvite};
pub use repositories::site::{NewSite, Site, SiteChanges};
pub use repositories::token::{NewToken, Token};
pub use repositories::user::{AdminGuarded, Credentials, NewUser, User, UserChanges};
pub use repositories::{Author, CategoryRef};

/// Shared handle to the relational store.
///
/// Cloning is cheap; every repository borrows the same connection pool.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn users(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn invites(&self) -> repositories::invite::InviteRepository {
        repositories::invite::InviteRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn tokens(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn articles(&self) -> repositories::article::ArticleRepository {
        repositories::article::ArticleRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn categories(&self) -> repositories::category::CategoryRepository {
        repositories::category::CategoryRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn sites(&self) -> repositories::site::SiteRepository {
        repositories::site::SiteRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn files(&self) -> repositories::file::FileRepository {
        repositories::file::FileRepository::new(self.conn.clone())
    }
}
