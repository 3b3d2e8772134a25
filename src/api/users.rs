use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_cookies::Cookies;
use tracing::info;
use zeroize::Zeroizing;

use super::auth::{CurrentUser, rotate_session};
use super::{ApiError, ApiResponse, AppState, MessageResponse, PageQuery};
use crate::db::User;
use crate::domain::UserId;
use crate::services::UserInput;

const fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UserRequest {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password: Option<String>,
    pub password_repeat: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Account fields a user may change on their own profile.
#[derive(Deserialize)]
pub struct ProfileRequest {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password: Option<String>,
    pub password_repeat: Option<String>,
}

/// Returns the new password when one was submitted, checking the repeat.
fn submitted_password(
    password: Option<String>,
    repeat: Option<String>,
) -> Result<Option<Zeroizing<String>>, ApiError> {
    let Some(password) = password.filter(|p| !p.is_empty()).map(Zeroizing::new) else {
        return Ok(None);
    };
    let repeat = Zeroizing::new(repeat.unwrap_or_default());

    if *password != *repeat {
        return Err(ApiError::unprocessable("The passwords do not match"));
    }
    Ok(Some(password))
}

impl UserRequest {
    fn into_input(self) -> Result<UserInput, ApiError> {
        Ok(UserInput {
            password: submitted_password(self.password, self.password_repeat)?,
            username: self.username,
            email: self.email,
            display_name: self.display_name,
            is_admin: self.is_admin,
            active: self.active,
        })
    }
}

/// Drops sessions that must not survive an account change.
async fn revoke_after_update(
    state: &AppState,
    cookies: &Cookies,
    current: &CurrentUser,
    updated: &User,
    password_changed: bool,
) {
    if updated.id == current.user.id {
        if password_changed {
            let revoked = rotate_session(state, cookies, current).await;
            info!(user_id = %updated.id, revoked, "Session renewed after password change");
        }
        return;
    }

    if password_changed || !updated.active {
        let revoked = state.sessions().revoke_other_sessions(updated.id, "").await;
        info!(user_id = %updated.id, revoked, "Sessions revoked after account change");
    }
}

/// GET /api/admin/users?page=
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let pagination = params
        .page
        .map(|_| params.pagination(state.config().blog.articles_per_page));

    let users = state.shared.users.list(&current.user, pagination).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let input = payload.into_input()?;
    let user = state.shared.users.create(&current.user, input).await?;

    Ok(Json(ApiResponse::success(user)))
}

/// GET /api/admin/users/{id}
///
/// Non-admins may only read their own account.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let id = UserId::new(id);
    if !current.user.is_admin && current.user.id != id {
        return Err(crate::services::ServiceError::not_found("user").into());
    }

    let user = state.shared.users.get(id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// PUT /api/admin/users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    cookies: Cookies,
    Path(id): Path<i32>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let input = payload.into_input()?;
    let change_password = input.password.is_some();

    let user = state
        .shared
        .users
        .update(&current.user, UserId::new(id), input, change_password)
        .await?;

    revoke_after_update(&state, &cookies, &current, &user, change_password).await;

    Ok(Json(ApiResponse::success(user)))
}

/// PUT /api/admin/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    cookies: Cookies,
    Json(payload): Json<ProfileRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let password = submitted_password(payload.password, payload.password_repeat)?;
    let change_password = password.is_some();

    let input = UserInput {
        username: payload.username,
        email: payload.email,
        display_name: payload.display_name,
        password,
        is_admin: current.user.is_admin,
        active: current.user.active,
    };

    let user = state
        .shared
        .users
        .update(&current.user, current.user.id, input, change_password)
        .await?;

    revoke_after_update(&state, &cookies, &current, &user, change_password).await;

    Ok(Json(ApiResponse::success(user)))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let removed = state
        .shared
        .users
        .remove(&current.user, UserId::new(id))
        .await?;

    state.sessions().revoke_other_sessions(removed.id, "").await;

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "User {} deleted",
        removed.username
    )))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_means_no_change() {
        assert!(submitted_password(None, None).unwrap().is_none());
        assert!(
            submitted_password(Some(String::new()), Some("x".to_string()))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn password_repeat_must_match() {
        assert!(submitted_password(Some("secret123".into()), Some("secret124".into())).is_err());
        assert_eq!(
            submitted_password(Some("secret123".into()), Some("secret123".into()))
                .unwrap()
                .unwrap()
                .as_str(),
            "secret123"
        );
    }
}
