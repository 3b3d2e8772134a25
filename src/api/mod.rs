use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::services::SessionProvider;
use crate::state::SharedState;

mod articles;
pub mod auth;
mod categories;
mod error;
mod files;
mod invites;
mod observability;
mod public;
mod sites;
mod system;
mod types;
mod users;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

/// Multipart framing allowance on top of `file.max_upload_size`.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn new(shared: Arc<SharedState>, prometheus_handle: Option<PrometheusHandle>) -> Arc<Self> {
        Arc::new(Self {
            shared,
            start_time: std::time::Instant::now(),
            prometheus_handle,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionProvider> {
        &self.shared.sessions
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config();
    let cors_origins = config.server.cors_allowed_origins.clone();
    let access_log = config.log.access;

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/{hash}", post(auth::reset_password))
        .route(
            "/activate-account/{hash}",
            get(auth::get_invite).post(auth::activate_account),
        )
        .route("/articles", get(public::list_articles))
        .route("/article/by-id/{id}", get(public::article_by_id))
        .route(
            "/article/{year}/{month}/{slug}",
            get(public::article_by_slug),
        )
        .route("/index", get(public::index))
        .route("/feed", get(public::feed))
        .route("/categories", get(public::list_categories))
        .route("/category/{slug}", get(public::category))
        .route("/sites/{section}", get(public::section))
        .route("/site/{link}", get(public::site))
        .route("/health", get(system::health))
        .with_state(state.clone());

    let file_router = Router::new()
        .route("/file/{unique_name}", get(files::serve_file))
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    let app = Router::new()
        .nest("/api", api_router)
        .merge(file_router)
        .layer(CookieManagerLayer::new())
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::logging_middleware));

    if access_log {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let upload_limit = state
        .config()
        .file
        .max_upload_size
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/me", get(auth::me))
        .route("/admin/profile", put(users::update_profile))
        .route(
            "/admin/articles",
            get(articles::list_articles).post(articles::create_article),
        )
        .route(
            "/admin/articles/{id}",
            get(articles::get_article)
                .put(articles::update_article)
                .delete(articles::delete_article),
        )
        .route(
            "/admin/articles/{id}/publish",
            post(articles::publish_article),
        )
        .route(
            "/admin/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/admin/categories/{id}",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/admin/sites",
            get(sites::list_sites).post(sites::create_site),
        )
        .route(
            "/admin/sites/{id}",
            get(sites::get_site)
                .put(sites::update_site)
                .delete(sites::delete_site),
        )
        .route("/admin/sites/{id}/publish", post(sites::publish_site))
        .route(
            "/admin/sites/{id}/order/{direction}",
            post(sites::order_site),
        )
        .route(
            "/admin/files",
            get(files::list_files)
                .post(files::upload_file)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/admin/files/{id}",
            get(files::get_file)
                .put(files::update_file)
                .delete(files::delete_file),
        )
        .route(
            "/admin/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/admin/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/admin/user-invites",
            get(invites::list_invites).post(invites::create_invite),
        )
        .route(
            "/admin/user-invites/{id}",
            get(invites::get_invite)
                .put(invites::update_invite)
                .delete(invites::delete_invite),
        )
        .route("/admin/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::session_middleware,
        ))
}
