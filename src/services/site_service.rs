//! Domain service for static sites shown in the navigation and footer.
//!
//! Sites share one contiguous `1..N` ordering across both sections.

use crate::db::{Site, User};
use crate::domain::{Direction, Page, Pagination, PublishedCriteria, Section};
use crate::services::ServiceError;

#[derive(Debug, Clone)]
pub struct SiteInput {
    pub title: String,
    pub link: String,
    pub section: Section,
    pub content: String,
    /// Honoured on create only.
    pub published: bool,
}

#[async_trait::async_trait]
pub trait SiteService: Send + Sync {
    /// Appends the site to the end of the ordering.
    async fn create(&self, caller: &User, input: SiteInput) -> Result<Site, ServiceError>;

    async fn update(&self, caller: &User, id: i32, input: SiteInput)
    -> Result<Site, ServiceError>;

    /// Flips the published flag.
    async fn publish(&self, caller: &User, id: i32) -> Result<Site, ServiceError>;

    /// Removes the site and closes the gap in the ordering.
    async fn delete(&self, caller: &User, id: i32) -> Result<(), ServiceError>;

    /// Swaps the site with its neighbour; a no-op at either end.
    async fn order(&self, caller: &User, id: i32, direction: Direction)
    -> Result<Site, ServiceError>;

    async fn get(
        &self,
        viewer: Option<&User>,
        id: i32,
        criteria: PublishedCriteria,
    ) -> Result<Site, ServiceError>;

    async fn get_by_link(
        &self,
        viewer: Option<&User>,
        link: &str,
        criteria: PublishedCriteria,
    ) -> Result<Site, ServiceError>;

    async fn list(
        &self,
        viewer: Option<&User>,
        criteria: PublishedCriteria,
        pagination: Pagination,
    ) -> Result<Page<Site>, ServiceError>;

    /// Published sites of one section in menu order.
    async fn section(&self, section: Section) -> Result<Vec<Site>, ServiceError>;

    async fn max(&self) -> Result<i32, ServiceError>;

    async fn count(&self, criteria: PublishedCriteria) -> Result<u64, ServiceError>;
}
