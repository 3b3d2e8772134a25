use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{AdminListQuery, ApiError, ApiResponse, AppState, MessageResponse, PageDto};
use crate::db::{Article, ArticleQuery};
use crate::domain::PublishedCriteria;
use crate::services::ArticleInput;

#[derive(Debug, Deserialize)]
pub struct ArticleRequest {
    pub headline: String,
    #[serde(default)]
    pub teaser: String,
    #[serde(default)]
    pub content: String,
    pub category_id: Option<i32>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub regenerate_slug: bool,
}

impl From<ArticleRequest> for ArticleInput {
    fn from(req: ArticleRequest) -> Self {
        Self {
            headline: req.headline,
            teaser: req.teaser,
            content: req.content,
            category_id: req.category_id,
            published: req.published,
            regenerate_slug: req.regenerate_slug,
        }
    }
}

/// GET /api/admin/articles?page=&published=
///
/// Non-admins only see their own articles.
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<AdminListQuery>,
) -> Result<Json<ApiResponse<PageDto<Article>>>, ApiError> {
    let query = ArticleQuery {
        criteria: params.published.into(),
        ..ArticleQuery::default()
    };

    let page = state
        .shared
        .articles
        .list(
            Some(&current.user),
            query,
            params.pagination(state.config().blog.articles_per_page),
        )
        .await?;

    Ok(Json(ApiResponse::success(page.into())))
}

/// POST /api/admin/articles
pub async fn create_article(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<ArticleRequest>,
) -> Result<Json<ApiResponse<Article>>, ApiError> {
    let article = state
        .shared
        .articles
        .create(&current.user, payload.into())
        .await?;

    Ok(Json(ApiResponse::success(article)))
}

/// GET /api/admin/articles/{id}
pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Article>>, ApiError> {
    let article = state
        .shared
        .articles
        .get(Some(&current.user), id, PublishedCriteria::All)
        .await?;

    Ok(Json(ApiResponse::success(article)))
}

/// PUT /api/admin/articles/{id}
pub async fn update_article(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<ArticleRequest>,
) -> Result<Json<ApiResponse<Article>>, ApiError> {
    let article = state
        .shared
        .articles
        .update(&current.user, id, payload.into())
        .await?;

    Ok(Json(ApiResponse::success(article)))
}

/// POST /api/admin/articles/{id}/publish
pub async fn publish_article(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Article>>, ApiError> {
    let article = state.shared.articles.publish(&current.user, id).await?;
    Ok(Json(ApiResponse::success(article)))
}

/// DELETE /api/admin/articles/{id}
pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.shared.articles.delete(&current.user, id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Article {id} deleted"
    )))))
}
