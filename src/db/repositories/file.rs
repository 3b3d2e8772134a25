use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;

use super::{Author, author_or_unknown, load_authors};
use crate::domain::{Pagination, UserId};
use crate::entities::{files, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct File {
    pub id: i32,
    pub filename: String,
    pub unique_name: String,
    pub content_type: String,
    pub size: i64,
    pub inline: bool,
    pub last_modified: DateTime<Utc>,
    pub author: Author,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub filename: String,
    pub unique_name: String,
    pub content_type: String,
    pub size: i64,
    pub inline: bool,
    pub author_id: UserId,
}

pub struct FileRepository {
    conn: DatabaseConnection,
}

impl FileRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn hydrate(&self, rows: Vec<files::Model>) -> Result<Vec<File>> {
        let authors = load_authors(&self.conn, rows.iter().map(|r| r.author_id)).await?;

        Ok(rows
            .into_iter()
            .map(|r| File {
                author: author_or_unknown(&authors, r.author_id),
                id: r.id,
                filename: r.filename,
                unique_name: r.unique_name,
                content_type: r.content_type,
                size: r.size,
                inline: r.inline,
                last_modified: r.last_modified,
            })
            .collect())
    }

    async fn hydrate_one(&self, row: Option<files::Model>) -> Result<Option<File>> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn create(&self, file: NewFile) -> Result<File> {
        let model = files::ActiveModel {
            filename: Set(file.filename),
            unique_name: Set(file.unique_name),
            content_type: Set(file.content_type),
            size: Set(file.size),
            inline: Set(file.inline),
            last_modified: Set(Utc::now()),
            author_id: Set(file.author_id.value()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert file")?;

        self.hydrate_one(Some(model))
            .await?
            .context("File vanished after insert")
    }

    /// Changes display name and disposition; the stored bytes are untouched.
    pub async fn update(&self, id: i32, filename: String, inline: bool) -> Result<Option<File>> {
        let Some(existing) = Files::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query file for update")?
        else {
            return Ok(None);
        };

        let mut active: files::ActiveModel = existing.into();
        active.filename = Set(filename);
        active.inline = Set(inline);
        active.last_modified = Set(Utc::now());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update file")?;

        self.hydrate_one(Some(model)).await
    }

    pub async fn get(&self, id: i32) -> Result<Option<File>> {
        let row = Files::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query file by ID")?;

        self.hydrate_one(row).await
    }

    pub async fn get_by_unique_name(&self, unique_name: &str) -> Result<Option<File>> {
        let row = Files::find()
            .filter(files::Column::UniqueName.eq(unique_name))
            .one(&self.conn)
            .await
            .context("Failed to query file by unique name")?;

        self.hydrate_one(row).await
    }

    pub async fn list(
        &self,
        author: Option<UserId>,
        pagination: Option<Pagination>,
    ) -> Result<Vec<File>> {
        let mut query = Files::find().order_by_desc(files::Column::LastModified);

        if let Some(author) = author {
            query = query.filter(files::Column::AuthorId.eq(author.value()));
        }
        if let Some(p) = pagination {
            query = query.offset(p.offset()).limit(p.limit());
        }

        let rows = query
            .all(&self.conn)
            .await
            .context("Failed to list files")?;

        self.hydrate(rows).await
    }

    pub async fn count(&self, author: Option<UserId>) -> Result<u64> {
        let mut query = Files::find();
        if let Some(author) = author {
            query = query.filter(files::Column::AuthorId.eq(author.value()));
        }

        query
            .count(&self.conn)
            .await
            .context("Failed to count files")
    }

    /// Storage names of every file owned by `author`.
    pub async fn unique_names_by_author(&self, author: UserId) -> Result<Vec<String>> {
        let names: Vec<String> = Files::find()
            .select_only()
            .column(files::Column::UniqueName)
            .filter(files::Column::AuthorId.eq(author.value()))
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to list file names by author")?;

        Ok(names)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Files::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete file")?;

        Ok(result.rows_affected > 0)
    }
}
