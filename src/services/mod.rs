pub mod error;
pub use error::{ServiceError, ensure_admin, ensure_owner};

pub mod feed;
pub mod hooks;
pub mod mailer;
pub mod session;
pub mod validate;

pub use hooks::{AuditUserHooks, NoopUserHooks, UserHooks};
pub use mailer::{LogMailSender, Mail, MailSender, Mailer, RecordingMailSender, SmtpMailSender};
pub use session::{Session, SessionProvider};

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{UserInput, UserService};
pub use user_service_impl::SeaOrmUserService;

pub mod invite_service;
pub mod invite_service_impl;
pub use invite_service::InviteService;
pub use invite_service_impl::SeaOrmInviteService;

pub mod token_service;
pub mod token_service_impl;
pub use token_service::TokenService;
pub use token_service_impl::SeaOrmTokenService;

pub mod article_service;
pub mod article_service_impl;
pub use article_service::{ArticleInput, ArticleService};
pub use article_service_impl::SeaOrmArticleService;

pub mod category_service;
pub mod category_service_impl;
pub use category_service::CategoryService;
pub use category_service_impl::SeaOrmCategoryService;

pub mod site_service;
pub mod site_service_impl;
pub use site_service::{SiteInput, SiteService};
pub use site_service_impl::SeaOrmSiteService;

pub mod file_service;
pub mod file_service_impl;
pub use file_service::{FileService, FileUpload, ServedFile};
pub use file_service_impl::SeaOrmFileService;
