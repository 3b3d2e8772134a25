use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};
use serde::Serialize;

use super::{Author, author_or_unknown, load_authors};
use crate::domain::{CategoryFilter, UserId};
use crate::entities::{articles, categories, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub last_modified: DateTime<Utc>,
    pub author: Author,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub author_id: UserId,
}

fn apply_filter(query: Select<Categories>, filter: CategoryFilter) -> Select<Categories> {
    match filter {
        CategoryFilter::All => query,
        CategoryFilter::WithPublishedArticles => query.filter(
            categories::Column::Id.in_subquery(
                sea_orm::sea_query::Query::select()
                    .column(articles::Column::CategoryId)
                    .from(Articles)
                    .and_where(articles::Column::Published.eq(true))
                    .and_where(articles::Column::CategoryId.is_not_null())
                    .to_owned(),
            ),
        ),
        CategoryFilter::WithoutArticles => query.filter(
            categories::Column::Id.not_in_subquery(
                sea_orm::sea_query::Query::select()
                    .column(articles::Column::CategoryId)
                    .from(Articles)
                    .and_where(articles::Column::CategoryId.is_not_null())
                    .to_owned(),
            ),
        ),
    }
}

pub struct CategoryRepository {
    conn: DatabaseConnection,
}

impl CategoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn hydrate(&self, rows: Vec<categories::Model>) -> Result<Vec<Category>> {
        let authors = load_authors(&self.conn, rows.iter().map(|r| r.author_id)).await?;

        Ok(rows
            .into_iter()
            .map(|r| Category {
                author: author_or_unknown(&authors, r.author_id),
                id: r.id,
                name: r.name,
                slug: r.slug,
                last_modified: r.last_modified,
            })
            .collect())
    }

    async fn hydrate_one(&self, row: Option<categories::Model>) -> Result<Option<Category>> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn create(&self, category: NewCategory) -> Result<Category> {
        let model = categories::ActiveModel {
            name: Set(category.name),
            slug: Set(category.slug),
            last_modified: Set(Utc::now()),
            author_id: Set(category.author_id.value()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert category")?;

        self.hydrate_one(Some(model))
            .await?
            .context("Category vanished after insert")
    }

    pub async fn list(&self, filter: CategoryFilter) -> Result<Vec<Category>> {
        let rows = apply_filter(Categories::find(), filter)
            .order_by_asc(categories::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list categories")?;

        self.hydrate(rows).await
    }

    pub async fn count(&self, filter: CategoryFilter) -> Result<u64> {
        apply_filter(Categories::find(), filter)
            .count(&self.conn)
            .await
            .context("Failed to count categories")
    }

    pub async fn get(&self, id: i32, filter: CategoryFilter) -> Result<Option<Category>> {
        let row = apply_filter(Categories::find_by_id(id), filter)
            .one(&self.conn)
            .await
            .context("Failed to query category by ID")?;

        self.hydrate_one(row).await
    }

    pub async fn get_by_slug(&self, slug: &str, filter: CategoryFilter) -> Result<Option<Category>> {
        let row = apply_filter(
            Categories::find().filter(categories::Column::Slug.eq(slug)),
            filter,
        )
        .one(&self.conn)
        .await
        .context("Failed to query category by slug")?;

        self.hydrate_one(row).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = Categories::find()
            .filter(categories::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query category by name")?;

        self.hydrate_one(row).await
    }

    /// Renames the category; `slug` is `Some` only when it was regenerated.
    pub async fn update(
        &self,
        id: i32,
        name: String,
        slug: Option<String>,
    ) -> Result<Option<Category>> {
        let Some(existing) = Categories::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query category for update")?
        else {
            return Ok(None);
        };

        let mut active: categories::ActiveModel = existing.into();
        active.name = Set(name);
        if let Some(slug) = slug {
            active.slug = Set(slug);
        }
        active.last_modified = Set(Utc::now());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update category")?;

        self.hydrate_one(Some(model)).await
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Categories::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete category")?;

        Ok(result.rows_affected > 0)
    }
}
