//! Domain service for uploaded files.

use std::path::PathBuf;

use crate::db::{File, User};
use crate::domain::{Page, Pagination};
use crate::services::ServiceError;

#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Display name as sent by the client.
    pub filename: String,
    /// Guessed from the file name when absent.
    pub content_type: Option<String>,
    pub inline: bool,
    pub data: Vec<u8>,
}

/// A stored file together with the location of its bytes.
#[derive(Debug, Clone)]
pub struct ServedFile {
    pub file: File,
    pub path: PathBuf,
}

impl ServedFile {
    /// `Content-Disposition` header value derived from the inline flag.
    ///
    /// Names outside printable ASCII get an RFC 5987 `filename*` next to an
    /// ASCII fallback, so the value is always a valid header.
    #[must_use]
    pub fn content_disposition(&self) -> String {
        if self.file.inline {
            return "inline".to_string();
        }

        let name = &self.file.filename;
        let fallback: String = name
            .chars()
            .map(|c| match c {
                '"' | '\\' => '_',
                c if c.is_ascii() && !c.is_ascii_control() => c,
                _ => '_',
            })
            .collect();

        if name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
            format!("attachment; filename=\"{fallback}\"")
        } else {
            format!(
                "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
                urlencoding::encode(name)
            )
        }
    }
}

#[async_trait::async_trait]
pub trait FileService: Send + Sync {
    /// Writes the bytes below the upload root and records the metadata.
    async fn upload(&self, caller: &User, upload: FileUpload) -> Result<File, ServiceError>;

    /// Renames the display name and changes the inline flag.
    async fn update(
        &self,
        caller: &User,
        id: i32,
        filename: &str,
        inline: bool,
    ) -> Result<File, ServiceError>;

    /// Removes the row, then the bytes on disk.
    async fn delete(&self, caller: &User, id: i32) -> Result<(), ServiceError>;

    async fn get(&self, caller: &User, id: i32) -> Result<File, ServiceError>;

    /// Admins see every file, everyone else only their own.
    async fn list(&self, caller: &User, pagination: Pagination)
    -> Result<Page<File>, ServiceError>;

    async fn count(&self, caller: &User) -> Result<u64, ServiceError>;

    async fn serve(&self, unique_name: &str) -> Result<ServedFile, ServiceError>;
}
