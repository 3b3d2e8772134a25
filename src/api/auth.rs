use axum::{
    Extension, Json,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies, cookie::SameSite};
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::config::SessionConfig;
use crate::db::{User, UserInvite};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or mail address, depending on `user.login_method`.
    pub login: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub login: String,
}

/// A new password typed twice.
#[derive(Deserialize)]
pub struct PasswordForm {
    pub password: String,
    pub password_repeat: String,
}

impl PasswordForm {
    pub fn into_password(self) -> Result<Zeroizing<String>, ApiError> {
        let password = Zeroizing::new(self.password);
        let repeat = Zeroizing::new(self.password_repeat);

        if *password != *repeat {
            return Err(ApiError::unprocessable("The passwords do not match"));
        }
        Ok(password)
    }
}

// ============================================================================
// Session Handling
// ============================================================================

/// The authenticated account of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: String,
}

pub fn set_session_cookie(cookies: &Cookies, config: &SessionConfig, session_id: String) {
    let cookie = Cookie::build((config.cookie_name.clone(), session_id))
        .path(config.cookie_path.clone())
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .build();

    cookies.add(cookie);
}

fn clear_session_cookie(cookies: &Cookies, config: &SessionConfig) {
    let cookie = Cookie::build((config.cookie_name.clone(), ""))
        .path(config.cookie_path.clone())
        .build();

    cookies.remove(cookie);
}

/// Resolves the session cookie into a [`CurrentUser`] extension.
///
/// Unknown or expired sessions and deactivated accounts are rejected with 401.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let config = &state.config().session;

    let Some(session_id) = cookies.get(&config.cookie_name).map(|c| c.value().to_string()) else {
        return Err(ApiError::unauthorized());
    };

    let Some(session) = state.sessions().get(&session_id).await else {
        clear_session_cookie(&cookies, config);
        return Err(ApiError::unauthorized());
    };

    let user = match state.shared.users.get(session.user_id).await {
        Ok(user) if user.active => user,
        Ok(_) | Err(crate::services::ServiceError::NotFound(_)) => {
            state.sessions().remove(&session_id).await;
            clear_session_cookie(&cookies, config);
            return Err(ApiError::unauthorized());
        }
        Err(e) => return Err(e.into()),
    };

    tracing::Span::current().record("user_id", user.id.value());

    request.extensions_mut().insert(CurrentUser { user, session_id });
    Ok(next.run(request).await)
}

/// Issues a fresh session id for `current` and drops the user's other
/// sessions. Used after a password change.
pub async fn rotate_session(
    state: &AppState,
    cookies: &Cookies,
    current: &CurrentUser,
) -> usize {
    let keep = match state.sessions().renew(&current.session_id).await {
        Some(renewed) => {
            set_session_cookie(cookies, &state.config().session, renewed.id.clone());
            renewed.id
        }
        None => String::new(),
    };

    state
        .sessions()
        .revoke_other_sessions(current.user.id, &keep)
        .await
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let password = Zeroizing::new(payload.password);
    let method = state.config().user.login_method;

    let user = match state
        .shared
        .users
        .authenticate(method, payload.login.trim(), &password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            warn!(login = %payload.login, "Failed login attempt");
            return Err(e.into());
        }
    };

    if let Some(previous) = cookies.get(&state.config().session.cookie_name) {
        state.sessions().remove(previous.value()).await;
    }

    let session = state.sessions().create(user.id).await;
    set_session_cookie(&cookies, &state.config().session, session.id);

    info!(user_id = %user.id, username = %user.username, "User logged in");

    Ok(Json(ApiResponse::success(user)))
}

/// POST /api/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Json<ApiResponse<MessageResponse>> {
    let config = &state.config().session;

    if let Some(cookie) = cookies.get(&config.cookie_name) {
        state.sessions().remove(cookie.value()).await;
    }
    clear_session_cookie(&cookies, config);

    Json(ApiResponse::success(MessageResponse::new("Logged out")))
}

/// GET /api/me
pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<ApiResponse<User>> {
    Json(ApiResponse::success(current.user))
}

/// POST /api/forgot-password
///
/// Answers the same way whether or not the account exists.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .shared
        .users
        .forgot_password(payload.login.trim())
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "If the account exists, a reset link has been sent",
    ))))
}

/// POST /api/reset-password/{hash}
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
    Json(form): Json<PasswordForm>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let password = form.into_password()?;
    let user = state.shared.users.reset_password(&hash, password).await?;

    let revoked = state.sessions().revoke_other_sessions(user.id, "").await;
    info!(user_id = %user.id, revoked, "Password reset");

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Your password has been changed",
    ))))
}

/// GET /api/activate-account/{hash}
pub async fn get_invite(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<ApiResponse<UserInvite>>, ApiError> {
    let invite = state.shared.invites.get_by_hash(&hash).await?;
    Ok(Json(ApiResponse::success(invite)))
}

/// POST /api/activate-account/{hash}
pub async fn activate_account(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
    Json(form): Json<PasswordForm>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let password = form.into_password()?;
    let user = state.shared.invites.accept(&hash, password).await?;

    Ok(Json(ApiResponse::success(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_form_requires_matching_entries() {
        let form = PasswordForm {
            password: "correct horse".to_string(),
            password_repeat: "correct horse".to_string(),
        };
        assert_eq!(form.into_password().unwrap().as_str(), "correct horse");

        let form = PasswordForm {
            password: "correct horse".to_string(),
            password_repeat: "battery staple".to_string(),
        };
        assert!(form.into_password().is_err());
    }
}
