//! Read-only endpoints for anonymous visitors.
//!
//! Every lookup here runs without a viewer, so drafts stay invisible.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, ArticleListQuery, CategoryPageDto, PageDto, PageQuery,
};
use crate::db::{Article, ArticleQuery, Category, Site};
use crate::domain::{CategoryFilter, PublishedCriteria, Section};
use crate::services::ServiceError;
use crate::services::feed::IndexYear;

/// GET /api/articles?page=&category=&author=
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArticleListQuery>,
) -> Result<Json<ApiResponse<PageDto<Article>>>, ApiError> {
    let category = match params.category.as_deref() {
        Some(slug) => Some(
            state
                .shared
                .categories
                .get_by_slug(slug, CategoryFilter::All)
                .await?
                .id,
        ),
        None => None,
    };

    let author = match params.author.as_deref() {
        Some(username) => Some(state.shared.users.get_by_username(username).await?.id),
        None => None,
    };

    let pagination = PageQuery {
        page: params.page,
        per_page: None,
    }
    .pagination(state.config().blog.articles_per_page);

    let query = ArticleQuery::published()
        .with_category(category)
        .with_author(author);

    let page = state
        .shared
        .articles
        .list(None, query, pagination)
        .await?;

    Ok(Json(ApiResponse::success(page.into())))
}

/// GET /api/article/by-id/{id}
pub async fn article_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Article>>, ApiError> {
    let article = state
        .shared
        .articles
        .get(None, id, PublishedCriteria::OnlyPublished)
        .await?;

    Ok(Json(ApiResponse::success(article)))
}

/// GET /api/article/{year}/{month}/{slug}
pub async fn article_by_slug(
    State(state): State<Arc<AppState>>,
    Path((year, month, slug)): Path<(String, String, String)>,
) -> Result<Json<ApiResponse<Article>>, ApiError> {
    let slug = format!("{year}/{month}/{slug}");

    let article = state
        .shared
        .articles
        .get_by_slug(None, &slug, PublishedCriteria::OnlyPublished)
        .await?;

    Ok(Json(ApiResponse::success(article)))
}

/// GET /api/index
pub async fn index(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<IndexYear>>>, ApiError> {
    let years = state.shared.articles.index().await?;
    Ok(Json(ApiResponse::success(years)))
}

/// GET /api/feed
pub async fn feed(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let xml = state.shared.articles.feed().await?;

    Ok((
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    ))
}

/// GET /api/categories
///
/// Only categories with at least one published article are listed.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Category>>>, ApiError> {
    let categories = state
        .shared
        .categories
        .list(CategoryFilter::WithPublishedArticles)
        .await?;

    Ok(Json(ApiResponse::success(categories)))
}

/// GET /api/category/{slug}?page=
pub async fn category(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ApiResponse<CategoryPageDto>>, ApiError> {
    let category = state
        .shared
        .categories
        .get_by_slug(&slug, CategoryFilter::WithPublishedArticles)
        .await?;

    let pagination = params.pagination(state.config().blog.articles_per_page);
    let articles = state
        .shared
        .articles
        .list(
            None,
            ArticleQuery::published().with_category(Some(category.id)),
            pagination,
        )
        .await?;

    Ok(Json(ApiResponse::success(CategoryPageDto {
        category,
        articles: articles.into(),
    })))
}

/// GET /api/sites/{section}
pub async fn section(
    State(state): State<Arc<AppState>>,
    Path(section): Path<String>,
) -> Result<Json<ApiResponse<Vec<Site>>>, ApiError> {
    let section: Section = section
        .parse()
        .map_err(|_| ServiceError::not_found("section"))?;

    let sites = state.shared.sites.section(section).await?;
    Ok(Json(ApiResponse::success(sites)))
}

/// GET /api/site/{link}
pub async fn site(
    State(state): State<Arc<AppState>>,
    Path(link): Path<String>,
) -> Result<Json<ApiResponse<Site>>, ApiError> {
    let site = state
        .shared
        .sites
        .get_by_link(None, &link, PublishedCriteria::OnlyPublished)
        .await?;

    Ok(Json(ApiResponse::success(site)))
}
