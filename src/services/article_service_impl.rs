//! `SeaORM` implementation of the `ArticleService` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{BlogConfig, Config};
use crate::db::{Article, ArticleChanges, ArticleQuery, NewArticle, Store, User};
use crate::domain::{CategoryFilter, Page, Pagination, PublishedCriteria};
use crate::services::article_service::{ArticleInput, ArticleService};
use crate::services::feed::{Channel, IndexYear, group_by_year, render_rss};
use crate::services::validate::{MAX_HEADLINE, required};
use crate::services::{ServiceError, ensure_owner};
use crate::slug::{MAX_SLUG_ATTEMPTS, article_slug, slugify};

pub struct SeaOrmArticleService {
    store: Store,
    blog: BlogConfig,
    domain: String,
}

/// Restricts a read to what `viewer` may see.
fn scoped(viewer: Option<&User>, mut query: ArticleQuery) -> ArticleQuery {
    match viewer {
        None => query.criteria = PublishedCriteria::OnlyPublished,
        Some(user) if !user.is_admin => query.author = Some(user.id),
        Some(_) => {}
    }
    query
}

struct ValidInput {
    headline: String,
    teaser: String,
    content: String,
    category_id: Option<i32>,
}

impl SeaOrmArticleService {
    #[must_use]
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            blog: config.blog.clone(),
            domain: config.server.base_url().to_string(),
        }
    }

    async fn validate(&self, input: &ArticleInput) -> Result<ValidInput, ServiceError> {
        let headline = required("headline", &input.headline, MAX_HEADLINE)?;
        if slugify(&headline, 0).is_empty() {
            return Err(ServiceError::Unprocessable(
                "The headline must contain at least one letter or digit".to_string(),
            ));
        }

        let teaser = input.teaser.trim();
        if teaser.is_empty() {
            return Err(ServiceError::ValueRequired { field: "teaser" });
        }

        if let Some(category_id) = input.category_id
            && self
                .store
                .categories()
                .get(category_id, CategoryFilter::All)
                .await?
                .is_none()
        {
            return Err(ServiceError::Unprocessable(format!(
                "The category {category_id} does not exist"
            )));
        }

        Ok(ValidInput {
            headline,
            teaser: teaser.to_string(),
            content: input.content.clone(),
            category_id: input.category_id,
        })
    }

    /// First free `YYYY/M/<slug>[n]` candidate; `current` counts as free.
    async fn free_slug(
        &self,
        headline: &str,
        at: DateTime<Utc>,
        current: Option<&str>,
    ) -> Result<String, ServiceError> {
        let repo = self.store.articles();
        let mut last = String::new();

        for suffix in 0..MAX_SLUG_ATTEMPTS {
            let candidate = article_slug(headline, at, suffix);
            if current == Some(candidate.as_str()) || !repo.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
            last = candidate;
        }

        Err(ServiceError::Unprocessable(format!(
            "Could not assign a slug, '{last}' and its variants are already taken"
        )))
    }

    async fn owned(&self, caller: &User, id: i32) -> Result<Article, ServiceError> {
        let article = self
            .store
            .articles()
            .get(id, &ArticleQuery::default())
            .await?
            .ok_or_else(|| ServiceError::not_found("article"))?;

        ensure_owner(caller, article.author.id, "article")?;
        Ok(article)
    }
}

#[async_trait]
impl ArticleService for SeaOrmArticleService {
    async fn create(&self, caller: &User, input: ArticleInput) -> Result<Article, ServiceError> {
        let valid = self.validate(&input).await?;
        let slug = self.free_slug(&valid.headline, Utc::now(), None).await?;

        let article = self
            .store
            .articles()
            .create(NewArticle {
                headline: valid.headline,
                teaser: valid.teaser,
                content: valid.content,
                slug,
                published: input.published,
                category_id: valid.category_id,
                author_id: caller.id,
            })
            .await?;

        info!(article_id = article.id, slug = %article.slug, author = %caller.id, "Article created");

        Ok(article)
    }

    async fn update(
        &self,
        caller: &User,
        id: i32,
        input: ArticleInput,
    ) -> Result<Article, ServiceError> {
        let existing = self.owned(caller, id).await?;
        let valid = self.validate(&input).await?;

        let slug = if input.regenerate_slug {
            Some(
                self.free_slug(&valid.headline, Utc::now(), Some(&existing.slug))
                    .await?,
            )
        } else {
            None
        };

        self.store
            .articles()
            .update(
                id,
                ArticleChanges {
                    headline: valid.headline,
                    teaser: valid.teaser,
                    content: valid.content,
                    category_id: valid.category_id,
                    slug,
                },
            )
            .await?
            .ok_or_else(|| ServiceError::not_found("article"))
    }

    async fn publish(&self, caller: &User, id: i32) -> Result<Article, ServiceError> {
        let existing = self.owned(caller, id).await?;

        let article = self
            .store
            .articles()
            .publish(id, !existing.published)
            .await?
            .ok_or_else(|| ServiceError::not_found("article"))?;

        info!(article_id = id, published = article.published, "Article publish state changed");

        Ok(article)
    }

    async fn delete(&self, caller: &User, id: i32) -> Result<(), ServiceError> {
        self.owned(caller, id).await?;

        if self.store.articles().delete(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("article"))
        }
    }

    async fn get(
        &self,
        viewer: Option<&User>,
        id: i32,
        criteria: PublishedCriteria,
    ) -> Result<Article, ServiceError> {
        let query = scoped(
            viewer,
            ArticleQuery {
                criteria,
                ..ArticleQuery::default()
            },
        );

        self.store
            .articles()
            .get(id, &query)
            .await?
            .ok_or_else(|| ServiceError::not_found("article"))
    }

    async fn get_by_slug(
        &self,
        viewer: Option<&User>,
        slug: &str,
        criteria: PublishedCriteria,
    ) -> Result<Article, ServiceError> {
        let query = scoped(
            viewer,
            ArticleQuery {
                criteria,
                ..ArticleQuery::default()
            },
        );

        self.store
            .articles()
            .get_by_slug(slug, &query)
            .await?
            .ok_or_else(|| ServiceError::not_found("article"))
    }

    async fn list(
        &self,
        viewer: Option<&User>,
        query: ArticleQuery,
        pagination: Pagination,
    ) -> Result<Page<Article>, ServiceError> {
        let query = scoped(viewer, query);
        let repo = self.store.articles();

        let total = repo.count(&query).await?;
        let items = repo.list(&query, Some(pagination)).await?;

        Ok(pagination.wrap(items, total))
    }

    async fn index(&self) -> Result<Vec<IndexYear>, ServiceError> {
        let articles = self
            .store
            .articles()
            .list(&ArticleQuery::published(), None)
            .await?;

        Ok(group_by_year(articles))
    }

    async fn feed(&self) -> Result<String, ServiceError> {
        let items = self
            .store
            .articles()
            .list(
                &ArticleQuery::published(),
                Some(Pagination::new(1, self.blog.feed_items)),
            )
            .await?;

        let channel = Channel {
            title: &self.blog.title,
            link: &self.domain,
            description: &self.blog.description,
            language: &self.blog.language,
        };

        Ok(render_rss(&channel, &items)?)
    }
}
