//! `SeaORM` implementation of the `SiteService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::db::{NewSite, Site, SiteChanges, Store, User};
use crate::domain::{Direction, Page, Pagination, PublishedCriteria, Section};
use crate::services::site_service::{SiteInput, SiteService};
use crate::services::validate::{MAX_TITLE, required};
use crate::services::{ServiceError, ensure_owner};
use crate::slug::{is_external_link, slugify};

pub struct SeaOrmSiteService {
    store: Store,
}

/// External links are kept verbatim, everything else becomes a slug.
fn normalize_link(link: &str) -> Result<String, ServiceError> {
    let link = required("link", link, MAX_TITLE)?;
    if is_external_link(&link) {
        return Ok(link);
    }

    let slug = slugify(&link, 0);
    if slug.is_empty() {
        return Err(ServiceError::Unprocessable(
            "The link must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

const fn visible(viewer: Option<&User>, criteria: PublishedCriteria) -> PublishedCriteria {
    match viewer {
        None => PublishedCriteria::OnlyPublished,
        Some(_) => criteria,
    }
}

impl SeaOrmSiteService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn validate(
        &self,
        input: &SiteInput,
        except: Option<i32>,
    ) -> Result<(String, String), ServiceError> {
        let title = required("title", &input.title, MAX_TITLE)?;
        let link = normalize_link(&input.link)?;

        if !is_external_link(&link)
            && self
                .store
                .sites()
                .get_by_link(&link, PublishedCriteria::All)
                .await?
                .is_some_and(|s| Some(s.id) != except)
        {
            return Err(ServiceError::Unprocessable(format!(
                "The link '{link}' is already in use"
            )));
        }

        Ok((title, link))
    }

    async fn owned(&self, caller: &User, id: i32) -> Result<Site, ServiceError> {
        let site = self
            .store
            .sites()
            .get(id, PublishedCriteria::All)
            .await?
            .ok_or_else(|| ServiceError::not_found("site"))?;

        ensure_owner(caller, site.author.id, "site")?;
        Ok(site)
    }
}

#[async_trait]
impl SiteService for SeaOrmSiteService {
    async fn create(&self, caller: &User, input: SiteInput) -> Result<Site, ServiceError> {
        let (title, link) = self.validate(&input, None).await?;

        let site = self
            .store
            .sites()
            .create(NewSite {
                title,
                link,
                section: input.section,
                content: input.content,
                published: input.published,
                author_id: caller.id,
            })
            .await?;

        info!(site_id = site.id, order_no = site.order_no, "Site created");

        Ok(site)
    }

    async fn update(
        &self,
        caller: &User,
        id: i32,
        input: SiteInput,
    ) -> Result<Site, ServiceError> {
        self.owned(caller, id).await?;
        let (title, link) = self.validate(&input, Some(id)).await?;

        self.store
            .sites()
            .update(
                id,
                SiteChanges {
                    title,
                    link,
                    section: input.section,
                    content: input.content,
                },
            )
            .await?
            .ok_or_else(|| ServiceError::not_found("site"))
    }

    async fn publish(&self, caller: &User, id: i32) -> Result<Site, ServiceError> {
        let existing = self.owned(caller, id).await?;

        self.store
            .sites()
            .publish(id, !existing.published)
            .await?
            .ok_or_else(|| ServiceError::not_found("site"))
    }

    async fn delete(&self, caller: &User, id: i32) -> Result<(), ServiceError> {
        self.owned(caller, id).await?;

        if self.store.sites().delete(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("site"))
        }
    }

    async fn order(
        &self,
        caller: &User,
        id: i32,
        direction: Direction,
    ) -> Result<Site, ServiceError> {
        self.owned(caller, id).await?;

        self.store
            .sites()
            .order(id, direction)
            .await?
            .ok_or_else(|| ServiceError::not_found("site"))
    }

    async fn get(
        &self,
        viewer: Option<&User>,
        id: i32,
        criteria: PublishedCriteria,
    ) -> Result<Site, ServiceError> {
        self.store
            .sites()
            .get(id, visible(viewer, criteria))
            .await?
            .ok_or_else(|| ServiceError::not_found("site"))
    }

    async fn get_by_link(
        &self,
        viewer: Option<&User>,
        link: &str,
        criteria: PublishedCriteria,
    ) -> Result<Site, ServiceError> {
        let link = normalize_link(link)?;

        self.store
            .sites()
            .get_by_link(&link, visible(viewer, criteria))
            .await?
            .ok_or_else(|| ServiceError::not_found("site"))
    }

    async fn list(
        &self,
        viewer: Option<&User>,
        criteria: PublishedCriteria,
        pagination: Pagination,
    ) -> Result<Page<Site>, ServiceError> {
        let criteria = visible(viewer, criteria);
        let repo = self.store.sites();

        let total = repo.count(criteria).await?;
        let items = repo.list(criteria, None, Some(pagination)).await?;

        Ok(pagination.wrap(items, total))
    }

    async fn section(&self, section: Section) -> Result<Vec<Site>, ServiceError> {
        Ok(self
            .store
            .sites()
            .list(PublishedCriteria::OnlyPublished, Some(section), None)
            .await?)
    }

    async fn max(&self) -> Result<i32, ServiceError> {
        Ok(self.store.sites().max().await?)
    }

    async fn count(&self, criteria: PublishedCriteria) -> Result<u64, ServiceError> {
        Ok(self.store.sites().count(criteria).await?)
    }
}
