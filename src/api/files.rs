use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, Request, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::services::ServeFile;
use tracing::debug;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, MessageResponse, PageDto, PageQuery};
use crate::db::File;
use crate::services::{FileUpload, ServiceError};

#[derive(Debug, Deserialize)]
pub struct FileUpdateRequest {
    pub filename: String,
    #[serde(default)]
    pub inline: bool,
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "on" | "yes")
}

/// GET /api/admin/files?page=
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ApiResponse<PageDto<File>>>, ApiError> {
    let page = state
        .shared
        .files
        .list(
            &current.user,
            params.pagination(state.config().blog.articles_per_page),
        )
        .await?;

    Ok(Json(ApiResponse::success(page.into())))
}

/// POST /api/admin/files
///
/// Multipart form with a `file` part, plus optional `inline` and
/// `filename` parts overriding the defaults.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<File>>, ApiError> {
    let mut upload: Option<FileUpload> = None;
    let mut inline = false;
    let mut display_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;

                upload = Some(FileUpload {
                    filename,
                    content_type,
                    inline: false,
                    data: data.to_vec(),
                });
            }
            "inline" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                inline = is_truthy(&value);
            }
            "filename" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                display_name = Some(value).filter(|v| !v.trim().is_empty());
            }
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let mut upload = upload.ok_or_else(|| ServiceError::ParameterMissing("file".to_string()))?;
    upload.inline = inline;
    if let Some(name) = display_name {
        upload.filename = name;
    }

    let file = state.shared.files.upload(&current.user, upload).await?;
    Ok(Json(ApiResponse::success(file)))
}

/// GET /api/admin/files/{id}
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<File>>, ApiError> {
    let file = state.shared.files.get(&current.user, id).await?;
    Ok(Json(ApiResponse::success(file)))
}

/// PUT /api/admin/files/{id}
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<FileUpdateRequest>,
) -> Result<Json<ApiResponse<File>>, ApiError> {
    let file = state
        .shared
        .files
        .update(&current.user, id, &payload.filename, payload.inline)
        .await?;

    Ok(Json(ApiResponse::success(file)))
}

/// DELETE /api/admin/files/{id}
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.shared.files.delete(&current.user, id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "File {id} deleted"
    )))))
}

/// GET /file/{unique_name}
///
/// Range and conditional requests are answered by `ServeFile`; the stored
/// content type and disposition replace the guessed ones.
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(unique_name): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let served = state.shared.files.serve(&unique_name).await?;

    let mut response = ServeFile::new(&served.path)
        .try_call(request)
        .await
        .map_err(ServiceError::from)?
        .into_response();

    if response.status().is_success() {
        let headers = response.headers_mut();

        if let Ok(value) = HeaderValue::from_str(&served.file.content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }

        let disposition = HeaderValue::from_str(&served.content_disposition())
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_form_values() {
        assert!(is_truthy("on"));
        assert!(is_truthy(" true "));
        assert!(!is_truthy("off"));
        assert!(!is_truthy(""));
    }
}
