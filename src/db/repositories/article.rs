use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};
use serde::Serialize;
use std::collections::HashMap;

use super::{Author, CategoryRef, author_or_unknown, load_authors};
use crate::domain::{Pagination, PublishedCriteria, UserId};
use crate::entities::{articles, categories, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: i32,
    pub headline: String,
    pub teaser: String,
    pub content: String,
    pub slug: String,
    pub published: bool,
    pub published_on: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
    pub category: Option<CategoryRef>,
    pub author: Author,
}

/// Read filter shared by every article lookup.
///
/// `author` restricts results to one owner; `category` to one category id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleQuery {
    pub author: Option<UserId>,
    pub category: Option<i32>,
    pub criteria: PublishedCriteria,
}

impl ArticleQuery {
    #[must_use]
    pub fn published() -> Self {
        Self {
            criteria: PublishedCriteria::OnlyPublished,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_author(mut self, author: Option<UserId>) -> Self {
        self.author = author;
        self
    }

    #[must_use]
    pub const fn with_category(mut self, category: Option<i32>) -> Self {
        self.category = category;
        self
    }

    fn apply(&self, mut query: Select<Articles>) -> Select<Articles> {
        if let Some(author) = self.author {
            query = query.filter(articles::Column::AuthorId.eq(author.value()));
        }
        if let Some(category) = self.category {
            query = query.filter(articles::Column::CategoryId.eq(category));
        }
        if let Some(published) = self.criteria.published_value() {
            query = query.filter(articles::Column::Published.eq(published));
        }
        query
    }
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub headline: String,
    pub teaser: String,
    pub content: String,
    pub slug: String,
    pub published: bool,
    pub category_id: Option<i32>,
    pub author_id: UserId,
}

/// `slug` is `Some` only when the caller regenerated it.
#[derive(Debug, Clone)]
pub struct ArticleChanges {
    pub headline: String,
    pub teaser: String,
    pub content: String,
    pub category_id: Option<i32>,
    pub slug: Option<String>,
}

pub struct ArticleRepository {
    conn: DatabaseConnection,
}

impl ArticleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn hydrate(&self, rows: Vec<articles::Model>) -> Result<Vec<Article>> {
        let authors = load_authors(&self.conn, rows.iter().map(|r| r.author_id)).await?;

        let mut category_ids: Vec<i32> = rows.iter().filter_map(|r| r.category_id).collect();
        category_ids.sort_unstable();
        category_ids.dedup();

        let categories: HashMap<i32, CategoryRef> = if category_ids.is_empty() {
            HashMap::new()
        } else {
            Categories::find()
                .filter(categories::Column::Id.is_in(category_ids))
                .all(&self.conn)
                .await
                .context("Failed to load article categories")?
                .into_iter()
                .map(|c| (c.id, CategoryRef::from(c)))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|r| Article {
                author: author_or_unknown(&authors, r.author_id),
                category: r.category_id.and_then(|id| categories.get(&id).cloned()),
                id: r.id,
                headline: r.headline,
                teaser: r.teaser,
                content: r.content,
                slug: r.slug,
                published: r.published,
                published_on: r.published_on,
                last_modified: r.last_modified,
            })
            .collect())
    }

    async fn hydrate_one(&self, row: Option<articles::Model>) -> Result<Option<Article>> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn create(&self, article: NewArticle) -> Result<Article> {
        let now = Utc::now();
        let model = articles::ActiveModel {
            headline: Set(article.headline),
            teaser: Set(article.teaser),
            content: Set(article.content),
            slug: Set(article.slug),
            published: Set(article.published),
            published_on: Set(article.published.then_some(now)),
            last_modified: Set(now),
            category_id: Set(article.category_id),
            author_id: Set(article.author_id.value()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert article")?;

        self.hydrate_one(Some(model))
            .await?
            .context("Article vanished after insert")
    }

    /// Newest publication first; unpublished drafts sort after by id.
    pub async fn list(
        &self,
        query: &ArticleQuery,
        pagination: Option<Pagination>,
    ) -> Result<Vec<Article>> {
        let mut select = query
            .apply(Articles::find())
            .order_by_desc(articles::Column::PublishedOn)
            .order_by_desc(articles::Column::Id);

        if let Some(p) = pagination {
            select = select.offset(p.offset()).limit(p.limit());
        }

        let rows = select
            .all(&self.conn)
            .await
            .context("Failed to list articles")?;

        self.hydrate(rows).await
    }

    pub async fn count(&self, query: &ArticleQuery) -> Result<u64> {
        query
            .apply(Articles::find())
            .count(&self.conn)
            .await
            .context("Failed to count articles")
    }

    pub async fn get(&self, id: i32, query: &ArticleQuery) -> Result<Option<Article>> {
        let row = query
            .apply(Articles::find_by_id(id))
            .one(&self.conn)
            .await
            .context("Failed to query article by ID")?;

        self.hydrate_one(row).await
    }

    pub async fn get_by_slug(&self, slug: &str, query: &ArticleQuery) -> Result<Option<Article>> {
        let row = query
            .apply(Articles::find().filter(articles::Column::Slug.eq(slug)))
            .one(&self.conn)
            .await
            .context("Failed to query article by slug")?;

        self.hydrate_one(row).await
    }

    pub async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let count = Articles::find()
            .filter(articles::Column::Slug.eq(slug))
            .count(&self.conn)
            .await
            .context("Failed to probe article slug")?;

        Ok(count > 0)
    }

    pub async fn update(&self, id: i32, changes: ArticleChanges) -> Result<Option<Article>> {
        let Some(existing) = Articles::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query article for update")?
        else {
            return Ok(None);
        };

        let mut active: articles::ActiveModel = existing.into();
        active.headline = Set(changes.headline);
        active.teaser = Set(changes.teaser);
        active.content = Set(changes.content);
        active.category_id = Set(changes.category_id);
        if let Some(slug) = changes.slug {
            active.slug = Set(slug);
        }
        active.last_modified = Set(Utc::now());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update article")?;

        self.hydrate_one(Some(model)).await
    }

    /// Sets the published flag; `published_on` follows the transition.
    pub async fn publish(&self, id: i32, published: bool) -> Result<Option<Article>> {
        let Some(existing) = Articles::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query article for publish")?
        else {
            return Ok(None);
        };

        let was_published = existing.published;
        let now = Utc::now();
        let mut active: articles::ActiveModel = existing.into();
        active.published = Set(published);
        if published && !was_published {
            active.published_on = Set(Some(now));
        } else if !published {
            active.published_on = Set(None);
        }
        active.last_modified = Set(now);

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to publish article")?;

        self.hydrate_one(Some(model)).await
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Articles::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete article")?;

        Ok(result.rows_affected > 0)
    }
}
