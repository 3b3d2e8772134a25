use serde::{Deserialize, Serialize};

use crate::db::{Article, Category};
use crate::domain::{Page, Pagination, PublishedCriteria};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `?page=` plus an optional page size override.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PageQuery {
    /// Page window, falling back to `default_per_page` and capping it at 100.
    #[must_use]
    pub fn pagination(&self, default_per_page: u64) -> Pagination {
        let per_page = self.per_page.unwrap_or(default_per_page).min(100);
        Pagination::new(self.page.unwrap_or(1), per_page)
    }
}

/// Admin list filter on the published flag.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishedFilter {
    #[default]
    All,
    Published,
    Draft,
}

impl From<PublishedFilter> for PublishedCriteria {
    fn from(filter: PublishedFilter) -> Self {
        match filter {
            PublishedFilter::All => Self::All,
            PublishedFilter::Published => Self::OnlyPublished,
            PublishedFilter::Draft => Self::NotPublished,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    #[serde(default)]
    pub published: PublishedFilter,
}

impl AdminListQuery {
    #[must_use]
    pub fn pagination(&self, default_per_page: u64) -> Pagination {
        PageQuery {
            page: self.page,
            per_page: self.per_page,
        }
        .pagination(default_per_page)
    }
}

/// Public article listing; `category` is a slug, `author` a username.
#[derive(Debug, Default, Deserialize)]
pub struct ArticleListQuery {
    pub page: Option<u64>,
    pub category: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PageDto<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> From<Page<T>> for PageDto<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            has_next: page.has_next(),
            has_previous: page.has_previous(),
            items: page.items,
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryPageDto {
    pub category: Category,
    pub articles: PageDto<Article>,
}
