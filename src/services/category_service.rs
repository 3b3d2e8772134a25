//! Domain service for article categories.

use crate::db::{Category, User};
use crate::domain::CategoryFilter;
use crate::services::ServiceError;

#[async_trait::async_trait]
pub trait CategoryService: Send + Sync {
    async fn create(&self, caller: &User, name: &str) -> Result<Category, ServiceError>;

    /// Renames the category; the slug follows the new name.
    async fn update(&self, caller: &User, id: i32, name: &str) -> Result<Category, ServiceError>;

    async fn delete(&self, caller: &User, id: i32) -> Result<(), ServiceError>;

    async fn get(&self, id: i32, filter: CategoryFilter) -> Result<Category, ServiceError>;

    async fn get_by_slug(&self, slug: &str, filter: CategoryFilter)
    -> Result<Category, ServiceError>;

    async fn list(&self, filter: CategoryFilter) -> Result<Vec<Category>, ServiceError>;

    async fn count(&self, filter: CategoryFilter) -> Result<u64, ServiceError>;
}
