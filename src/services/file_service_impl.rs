//! `SeaORM` implementation of the `FileService` trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::config::FileConfig;
use crate::db::{File, NewFile, Store, User};
use crate::domain::{Page, Pagination};
use crate::services::file_service::{FileService, FileUpload, ServedFile};
use crate::services::validate::{MAX_FILENAME, required};
use crate::services::{ServiceError, ensure_owner};
use crate::slug::{sanitize_filename, unique_filename};

/// Permission bits of stored uploads.
const UPLOAD_MODE: u32 = 0o640;

pub struct SeaOrmFileService {
    store: Store,
    location: PathBuf,
    max_upload_size: usize,
}

fn checked_filename(filename: &str) -> Result<String, ServiceError> {
    let filename = required("filename", filename, MAX_FILENAME)?;
    let sanitized = sanitize_filename(&filename);
    if sanitized.is_empty() {
        return Err(ServiceError::ValueRequired { field: "filename" });
    }
    Ok(sanitized)
}

async fn write_upload(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(UPLOAD_MODE);

    let file = options.open(path).await?;
    write_or_discard(path, file, data).await
}

/// Writes `data` into the freshly created blob at `path`, removing it on failure.
async fn write_or_discard<W: AsyncWrite + Unpin>(
    path: &Path,
    mut writer: W,
    data: &[u8],
) -> std::io::Result<()> {
    let written = async {
        writer.write_all(data).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(writer);
        remove_blob(path).await;
        return Err(e);
    }
    Ok(())
}

async fn remove_blob(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "Failed to remove stored file");
    }
}

impl SeaOrmFileService {
    #[must_use]
    pub fn new(store: Store, config: &FileConfig) -> Self {
        Self {
            store,
            location: PathBuf::from(&config.location),
            max_upload_size: config.max_upload_size,
        }
    }

    async fn owned(&self, caller: &User, id: i32) -> Result<File, ServiceError> {
        let file = self
            .store
            .files()
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("file"))?;

        ensure_owner(caller, file.author.id, "file")?;
        Ok(file)
    }

    const fn scope(caller: &User) -> Option<crate::domain::UserId> {
        if caller.is_admin { None } else { Some(caller.id) }
    }
}

#[async_trait]
impl FileService for SeaOrmFileService {
    async fn upload(&self, caller: &User, upload: FileUpload) -> Result<File, ServiceError> {
        let filename = checked_filename(&upload.filename)?;

        if upload.data.len() > self.max_upload_size {
            return Err(ServiceError::Unprocessable(format!(
                "The file exceeds the maximum upload size of {} bytes",
                self.max_upload_size
            )));
        }

        let content_type = upload
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&filename)
                    .first_or_octet_stream()
                    .to_string()
            });

        let unique_name = unique_filename(&filename);
        let path = self.location.join(&unique_name);

        tokio::fs::create_dir_all(&self.location).await?;
        write_upload(&path, &upload.data).await?;

        let created = self
            .store
            .files()
            .create(NewFile {
                filename,
                unique_name,
                content_type,
                size: i64::try_from(upload.data.len()).unwrap_or(i64::MAX),
                inline: upload.inline,
                author_id: caller.id,
            })
            .await;

        match created {
            Ok(file) => {
                info!(file_id = file.id, unique_name = %file.unique_name, size = file.size, "File uploaded");
                Ok(file)
            }
            Err(e) => {
                remove_blob(&path).await;
                Err(e.into())
            }
        }
    }

    async fn update(
        &self,
        caller: &User,
        id: i32,
        filename: &str,
        inline: bool,
    ) -> Result<File, ServiceError> {
        self.owned(caller, id).await?;
        let filename = checked_filename(filename)?;

        self.store
            .files()
            .update(id, filename, inline)
            .await?
            .ok_or_else(|| ServiceError::not_found("file"))
    }

    async fn delete(&self, caller: &User, id: i32) -> Result<(), ServiceError> {
        let file = self.owned(caller, id).await?;

        if !self.store.files().delete(id).await? {
            return Err(ServiceError::not_found("file"));
        }

        remove_blob(&self.location.join(&file.unique_name)).await;
        Ok(())
    }

    async fn get(&self, caller: &User, id: i32) -> Result<File, ServiceError> {
        self.owned(caller, id).await
    }

    async fn list(
        &self,
        caller: &User,
        pagination: Pagination,
    ) -> Result<Page<File>, ServiceError> {
        let author = Self::scope(caller);
        let repo = self.store.files();

        let total = repo.count(author).await?;
        let items = repo.list(author, Some(pagination)).await?;

        Ok(pagination.wrap(items, total))
    }

    async fn count(&self, caller: &User) -> Result<u64, ServiceError> {
        Ok(self.store.files().count(Self::scope(caller)).await?)
    }

    async fn serve(&self, unique_name: &str) -> Result<ServedFile, ServiceError> {
        if unique_name.contains(['/', '\\']) || unique_name.starts_with('.') {
            return Err(ServiceError::not_found("file"));
        }

        let file = self
            .store
            .files()
            .get_by_unique_name(unique_name)
            .await?
            .ok_or_else(|| ServiceError::not_found("file"))?;

        let path = self.location.join(&file.unique_name);
        if !tokio::fs::try_exists(&path).await? {
            warn!(path = %path.display(), "Stored file is missing on disk");
            return Err(ServiceError::not_found("file"));
        }

        Ok(ServedFile { file, path })
    }
}
