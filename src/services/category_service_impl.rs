//! `SeaORM` implementation of the `CategoryService` trait.

use async_trait::async_trait;

use crate::db::{Category, NewCategory, Store, User};
use crate::domain::CategoryFilter;
use crate::services::category_service::CategoryService;
use crate::services::validate::{MAX_TITLE, required};
use crate::services::{ServiceError, ensure_owner};
use crate::slug::{MAX_SLUG_ATTEMPTS, slugify};

pub struct SeaOrmCategoryService {
    store: Store,
}

impl SeaOrmCategoryService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn checked_name(&self, name: &str, except: Option<i32>) -> Result<String, ServiceError> {
        let name = required("name", name, MAX_TITLE)?;

        if self
            .store
            .categories()
            .get_by_name(&name)
            .await?
            .is_some_and(|c| Some(c.id) != except)
        {
            return Err(ServiceError::Unprocessable(format!(
                "The category '{name}' already exists"
            )));
        }

        Ok(name)
    }

    /// First free slug for `name`; the slug of `except` counts as free.
    async fn free_slug(&self, name: &str, except: Option<i32>) -> Result<String, ServiceError> {
        let repo = self.store.categories();
        let mut last = String::new();

        for suffix in 0..MAX_SLUG_ATTEMPTS {
            let candidate = slugify(name, suffix);
            if candidate.is_empty() {
                return Err(ServiceError::Unprocessable(
                    "The name must contain at least one letter or digit".to_string(),
                ));
            }

            match repo.get_by_slug(&candidate, CategoryFilter::All).await? {
                None => return Ok(candidate),
                Some(c) if Some(c.id) == except => return Ok(candidate),
                Some(_) => last = candidate,
            }
        }

        Err(ServiceError::Unprocessable(format!(
            "Could not assign a slug, '{last}' and its variants are already taken"
        )))
    }
}

#[async_trait]
impl CategoryService for SeaOrmCategoryService {
    async fn create(&self, caller: &User, name: &str) -> Result<Category, ServiceError> {
        let name = self.checked_name(name, None).await?;
        let slug = self.free_slug(&name, None).await?;

        Ok(self
            .store
            .categories()
            .create(NewCategory {
                name,
                slug,
                author_id: caller.id,
            })
            .await?)
    }

    async fn update(&self, caller: &User, id: i32, name: &str) -> Result<Category, ServiceError> {
        let existing = self.get(id, CategoryFilter::All).await?;
        ensure_owner(caller, existing.author.id, "category")?;

        let name = self.checked_name(name, Some(id)).await?;
        let slug = if name == existing.name {
            None
        } else {
            Some(self.free_slug(&name, Some(id)).await?)
        };

        self.store
            .categories()
            .update(id, name, slug)
            .await?
            .ok_or_else(|| ServiceError::not_found("category"))
    }

    async fn delete(&self, caller: &User, id: i32) -> Result<(), ServiceError> {
        let existing = self.get(id, CategoryFilter::All).await?;
        ensure_owner(caller, existing.author.id, "category")?;

        if self.store.categories().delete(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("category"))
        }
    }

    async fn get(&self, id: i32, filter: CategoryFilter) -> Result<Category, ServiceError> {
        self.store
            .categories()
            .get(id, filter)
            .await?
            .ok_or_else(|| ServiceError::not_found("category"))
    }

    async fn get_by_slug(
        &self,
        slug: &str,
        filter: CategoryFilter,
    ) -> Result<Category, ServiceError> {
        self.store
            .categories()
            .get_by_slug(slug, filter)
            .await?
            .ok_or_else(|| ServiceError::not_found("category"))
    }

    async fn list(&self, filter: CategoryFilter) -> Result<Vec<Category>, ServiceError> {
        Ok(self.store.categories().list(filter).await?)
    }

    async fn count(&self, filter: CategoryFilter) -> Result<u64, ServiceError> {
        Ok(self.store.categories().count(filter).await?)
    }
}
