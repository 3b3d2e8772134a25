use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::db::Category;
use crate::domain::CategoryFilter;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryListFilter {
    #[default]
    All,
    Published,
    Empty,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListQuery {
    #[serde(default)]
    pub filter: CategoryListFilter,
}

impl From<CategoryListFilter> for CategoryFilter {
    fn from(filter: CategoryListFilter) -> Self {
        match filter {
            CategoryListFilter::All => Self::All,
            CategoryListFilter::Published => Self::WithPublishedArticles,
            CategoryListFilter::Empty => Self::WithoutArticles,
        }
    }
}

/// GET /api/admin/categories?filter=all|published|empty
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoryListQuery>,
) -> Result<Json<ApiResponse<Vec<Category>>>, ApiError> {
    let categories = state
        .shared
        .categories
        .list(params.filter.into())
        .await?;

    Ok(Json(ApiResponse::success(categories)))
}

/// POST /api/admin/categories
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state
        .shared
        .categories
        .create(&current.user, &payload.name)
        .await?;

    Ok(Json(ApiResponse::success(category)))
}

/// GET /api/admin/categories/{id}
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state
        .shared
        .categories
        .get(id, CategoryFilter::All)
        .await?;

    Ok(Json(ApiResponse::success(category)))
}

/// PUT /api/admin/categories/{id}
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state
        .shared
        .categories
        .update(&current.user, id, &payload.name)
        .await?;

    Ok(Json(ApiResponse::success(category)))
}

/// DELETE /api/admin/categories/{id}
///
/// Articles in the category keep existing without one.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.shared.categories.delete(&current.user, id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Category {id} deleted"
    )))))
}
