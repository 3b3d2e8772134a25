//! Domain service for articles.
//!
//! Handles slug assignment, ownership checks, publishing and the public
//! read models (paginated list, year index, RSS feed).

use crate::db::{Article, ArticleQuery, User};
use crate::domain::{Page, Pagination, PublishedCriteria};
use crate::services::ServiceError;
use crate::services::feed::IndexYear;

/// Submitted article fields.
#[derive(Debug, Clone, Default)]
pub struct ArticleInput {
    pub headline: String,
    pub teaser: String,
    pub content: String,
    pub category_id: Option<i32>,
    /// Honoured on create only.
    pub published: bool,
    /// Derive a new slug from the headline on update.
    pub regenerate_slug: bool,
}

#[async_trait::async_trait]
pub trait ArticleService: Send + Sync {
    async fn create(&self, caller: &User, input: ArticleInput) -> Result<Article, ServiceError>;

    async fn update(
        &self,
        caller: &User,
        id: i32,
        input: ArticleInput,
    ) -> Result<Article, ServiceError>;

    /// Flips the published flag.
    async fn publish(&self, caller: &User, id: i32) -> Result<Article, ServiceError>;

    async fn delete(&self, caller: &User, id: i32) -> Result<(), ServiceError>;

    /// `viewer = None` is an anonymous guest who only ever sees published
    /// articles; non-admin viewers only see their own.
    async fn get(
        &self,
        viewer: Option<&User>,
        id: i32,
        criteria: PublishedCriteria,
    ) -> Result<Article, ServiceError>;

    async fn get_by_slug(
        &self,
        viewer: Option<&User>,
        slug: &str,
        criteria: PublishedCriteria,
    ) -> Result<Article, ServiceError>;

    async fn list(
        &self,
        viewer: Option<&User>,
        query: ArticleQuery,
        pagination: Pagination,
    ) -> Result<Page<Article>, ServiceError>;

    /// Published articles grouped by publication year.
    async fn index(&self) -> Result<Vec<IndexYear>, ServiceError>;

    /// RSS 2.0 document of the newest published articles.
    async fn feed(&self) -> Result<String, ServiceError>;
}
