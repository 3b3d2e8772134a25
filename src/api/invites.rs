use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::db::{InviteFields, UserInvite};

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub username: String,
    pub email: String,
    #[serde(alias = "displayname")]
    pub display_name: String,
    #[serde(default, alias = "admin")]
    pub is_admin: bool,
}

impl From<InviteRequest> for InviteFields {
    fn from(req: InviteRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            display_name: req.display_name,
            is_admin: req.is_admin,
        }
    }
}

/// GET /api/admin/user-invites
pub async fn list_invites(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<UserInvite>>>, ApiError> {
    let invites = state.shared.invites.list(&current.user).await?;
    Ok(Json(ApiResponse::success(invites)))
}

/// POST /api/admin/user-invites
///
/// Stores the invite and queues the activation mail.
pub async fn create_invite(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<InviteRequest>,
) -> Result<Json<ApiResponse<UserInvite>>, ApiError> {
    let invite = state
        .shared
        .invites
        .create(&current.user, payload.into())
        .await?;

    Ok(Json(ApiResponse::success(invite)))
}

/// GET /api/admin/user-invites/{id}
pub async fn get_invite(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserInvite>>, ApiError> {
    let invite = state.shared.invites.get(&current.user, id).await?;
    Ok(Json(ApiResponse::success(invite)))
}

/// PUT /api/admin/user-invites/{id}
///
/// Rotates the hash, so earlier activation links stop working.
pub async fn update_invite(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<InviteRequest>,
) -> Result<Json<ApiResponse<UserInvite>>, ApiError> {
    let invite = state
        .shared
        .invites
        .update(&current.user, id, payload.into())
        .await?;

    Ok(Json(ApiResponse::success(invite)))
}

/// DELETE /api/admin/user-invites/{id}
pub async fn delete_invite(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.shared.invites.remove(&current.user, id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Invite {id} deleted"
    )))))
}
