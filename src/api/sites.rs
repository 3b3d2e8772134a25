use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{AdminListQuery, ApiError, ApiResponse, AppState, MessageResponse, PageDto};
use crate::db::Site;
use crate::domain::{Direction, PublishedCriteria, Section};
use crate::services::{ServiceError, SiteInput};

#[derive(Debug, Deserialize)]
pub struct SiteRequest {
    pub title: String,
    pub link: String,
    pub section: Section,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub published: bool,
}

impl From<SiteRequest> for SiteInput {
    fn from(req: SiteRequest) -> Self {
        Self {
            title: req.title,
            link: req.link,
            section: req.section,
            content: req.content,
            published: req.published,
        }
    }
}

/// GET /api/admin/sites?page=&published=
pub async fn list_sites(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<AdminListQuery>,
) -> Result<Json<ApiResponse<PageDto<Site>>>, ApiError> {
    let page = state
        .shared
        .sites
        .list(
            Some(&current.user),
            params.published.into(),
            params.pagination(state.config().blog.articles_per_page),
        )
        .await?;

    Ok(Json(ApiResponse::success(page.into())))
}

/// POST /api/admin/sites
pub async fn create_site(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<SiteRequest>,
) -> Result<Json<ApiResponse<Site>>, ApiError> {
    let site = state
        .shared
        .sites
        .create(&current.user, payload.into())
        .await?;

    Ok(Json(ApiResponse::success(site)))
}

/// GET /api/admin/sites/{id}
pub async fn get_site(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Site>>, ApiError> {
    let site = state
        .shared
        .sites
        .get(Some(&current.user), id, PublishedCriteria::All)
        .await?;

    Ok(Json(ApiResponse::success(site)))
}

/// PUT /api/admin/sites/{id}
pub async fn update_site(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<SiteRequest>,
) -> Result<Json<ApiResponse<Site>>, ApiError> {
    let site = state
        .shared
        .sites
        .update(&current.user, id, payload.into())
        .await?;

    Ok(Json(ApiResponse::success(site)))
}

/// POST /api/admin/sites/{id}/publish
pub async fn publish_site(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Site>>, ApiError> {
    let site = state.shared.sites.publish(&current.user, id).await?;
    Ok(Json(ApiResponse::success(site)))
}

/// POST /api/admin/sites/{id}/order/{up|down}
pub async fn order_site(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path((id, direction)): Path<(i32, String)>,
) -> Result<Json<ApiResponse<Site>>, ApiError> {
    let direction: Direction = direction
        .parse()
        .map_err(|_| ServiceError::ParameterMissing("direction".to_string()))?;

    let site = state
        .shared
        .sites
        .order(&current.user, id, direction)
        .await?;

    Ok(Json(ApiResponse::success(site)))
}

/// DELETE /api/admin/sites/{id}
pub async fn delete_site(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.shared.sites.delete(&current.user, id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Site {id} deleted"
    )))))
}
