use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::Serialize;

use super::{Author, author_or_unknown, load_authors};
use crate::domain::{Direction, Pagination, PublishedCriteria, Section, UserId};
use crate::entities::{prelude::*, sites};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Site {
    pub id: i32,
    pub title: String,
    pub link: String,
    pub section: Section,
    pub content: String,
    pub published: bool,
    pub published_on: Option<DateTime<Utc>>,
    pub order_no: i32,
    pub last_modified: DateTime<Utc>,
    pub author: Author,
}

#[derive(Debug, Clone)]
pub struct NewSite {
    pub title: String,
    pub link: String,
    pub section: Section,
    pub content: String,
    pub published: bool,
    pub author_id: UserId,
}

#[derive(Debug, Clone)]
pub struct SiteChanges {
    pub title: String,
    pub link: String,
    pub section: Section,
    pub content: String,
}

fn apply_criteria(query: Select<Sites>, criteria: PublishedCriteria) -> Select<Sites> {
    match criteria.published_value() {
        Some(published) => query.filter(sites::Column::Published.eq(published)),
        None => query,
    }
}

fn parse_section(row: &sites::Model) -> Result<Section> {
    row.section
        .parse::<Section>()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Site {} has a corrupt section", row.id))
}

async fn max_order<C: ConnectionTrait>(conn: &C) -> Result<i32> {
    let max: Option<Option<i32>> = Sites::find()
        .select_only()
        .column_as(sites::Column::OrderNo.max(), "max_order")
        .into_tuple()
        .one(conn)
        .await
        .context("Failed to query max site order")?;

    Ok(max.flatten().unwrap_or(0))
}

/// Deletes every site of `author` and renumbers the rest to `1..N`.
///
/// Runs on the caller's connection so it can share a transaction.
pub(super) async fn purge_author<C: ConnectionTrait>(conn: &C, author: UserId) -> Result<u64> {
    let deleted = Sites::delete_many()
        .filter(sites::Column::AuthorId.eq(author.value()))
        .exec(conn)
        .await
        .context("Failed to delete sites of author")?;

    if deleted.rows_affected > 0 {
        let remaining = Sites::find()
            .order_by_asc(sites::Column::OrderNo)
            .all(conn)
            .await
            .context("Failed to load sites for renumbering")?;

        for (position, site) in (1..).zip(remaining) {
            if site.order_no != position {
                let mut active: sites::ActiveModel = site.into();
                active.order_no = Set(position);
                active
                    .update(conn)
                    .await
                    .context("Failed to renumber sites")?;
            }
        }
    }

    Ok(deleted.rows_affected)
}

pub struct SiteRepository {
    conn: DatabaseConnection,
}

impl SiteRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn hydrate(&self, rows: Vec<sites::Model>) -> Result<Vec<Site>> {
        let authors = load_authors(&self.conn, rows.iter().map(|r| r.author_id)).await?;

        rows.into_iter()
            .map(|r| -> Result<Site> {
                let section = parse_section(&r)?;
                Ok(Site {
                    author: author_or_unknown(&authors, r.author_id),
                    section,
                    id: r.id,
                    title: r.title,
                    link: r.link,
                    content: r.content,
                    published: r.published,
                    published_on: r.published_on,
                    order_no: r.order_no,
                    last_modified: r.last_modified,
                })
            })
            .collect()
    }

    async fn hydrate_one(&self, row: Option<sites::Model>) -> Result<Option<Site>> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Appends the site at `max(order_no) + 1` inside one transaction.
    pub async fn create(&self, site: NewSite) -> Result<Site> {
        let txn = self.conn.begin().await?;

        let next = max_order(&txn).await? + 1;
        let now = Utc::now();
        let model = sites::ActiveModel {
            title: Set(site.title),
            link: Set(site.link),
            section: Set(site.section.as_str().to_string()),
            content: Set(site.content),
            published: Set(site.published),
            published_on: Set(site.published.then_some(now)),
            order_no: Set(next),
            last_modified: Set(now),
            author_id: Set(site.author_id.value()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert site")?;

        txn.commit().await?;

        self.hydrate_one(Some(model))
            .await?
            .context("Site vanished after insert")
    }

    pub async fn list(
        &self,
        criteria: PublishedCriteria,
        section: Option<Section>,
        pagination: Option<Pagination>,
    ) -> Result<Vec<Site>> {
        let mut query = apply_criteria(Sites::find(), criteria).order_by_asc(sites::Column::OrderNo);

        if let Some(section) = section {
            query = query.filter(sites::Column::Section.eq(section.as_str()));
        }
        if let Some(p) = pagination {
            query = query.offset(p.offset()).limit(p.limit());
        }

        let rows = query
            .all(&self.conn)
            .await
            .context("Failed to list sites")?;

        self.hydrate(rows).await
    }

    pub async fn count(&self, criteria: PublishedCriteria) -> Result<u64> {
        apply_criteria(Sites::find(), criteria)
            .count(&self.conn)
            .await
            .context("Failed to count sites")
    }

    pub async fn max(&self) -> Result<i32> {
        max_order(&self.conn).await
    }

    pub async fn get(&self, id: i32, criteria: PublishedCriteria) -> Result<Option<Site>> {
        let row = apply_criteria(Sites::find_by_id(id), criteria)
            .one(&self.conn)
            .await
            .context("Failed to query site by ID")?;

        self.hydrate_one(row).await
    }

    pub async fn get_by_link(&self, link: &str, criteria: PublishedCriteria) -> Result<Option<Site>> {
        let row = apply_criteria(
            Sites::find().filter(sites::Column::Link.eq(link)),
            criteria,
        )
        .one(&self.conn)
        .await
        .context("Failed to query site by link")?;

        self.hydrate_one(row).await
    }

    pub async fn update(&self, id: i32, changes: SiteChanges) -> Result<Option<Site>> {
        let Some(existing) = Sites::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query site for update")?
        else {
            return Ok(None);
        };

        let mut active: sites::ActiveModel = existing.into();
        active.title = Set(changes.title);
        active.link = Set(changes.link);
        active.section = Set(changes.section.as_str().to_string());
        active.content = Set(changes.content);
        active.last_modified = Set(Utc::now());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update site")?;

        self.hydrate_one(Some(model)).await
    }

    pub async fn publish(&self, id: i32, published: bool) -> Result<Option<Site>> {
        let Some(existing) = Sites::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query site for publish")?
        else {
            return Ok(None);
        };

        let was_published = existing.published;
        let now = Utc::now();
        let mut active: sites::ActiveModel = existing.into();
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
            .context("Failed to publish site")?;

        self.hydrate_one(Some(model)).await
    }

    /// Deletes the site and closes the gap in `order_no`, atomically.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        let Some(existing) = Sites::find_by_id(id)
            .one(&txn)
            .await
            .context("Failed to query site for delete")?
        else {
            txn.rollback().await?;
            return Ok(false);
        };

        Sites::delete_by_id(id)
            .exec(&txn)
            .await
            .context("Failed to delete site")?;

        Sites::update_many()
            .col_expr(
                sites::Column::OrderNo,
                Expr::col(sites::Column::OrderNo).sub(1),
            )
            .filter(sites::Column::OrderNo.gt(existing.order_no))
            .exec(&txn)
            .await
            .context("Failed to renumber sites")?;

        txn.commit().await?;

        Ok(true)
    }

    /// Swaps the site with its neighbour in `direction`.
    ///
    /// Moving the first site up or the last one down leaves the order unchanged.
    pub async fn order(&self, id: i32, direction: Direction) -> Result<Option<Site>> {
        let txn = self.conn.begin().await?;

        let Some(site) = Sites::find_by_id(id)
            .one(&txn)
            .await
            .context("Failed to query site for reorder")?
        else {
            txn.rollback().await?;
            return Ok(None);
        };

        let current = site.order_no;
        let target = match direction {
            Direction::Up => (current > 1).then(|| current - 1),
            Direction::Down => {
                let max = max_order(&txn).await?;
                (current < max).then(|| current + 1)
            }
        };

        if let Some(target) = target {
            let now = Utc::now();

            if let Some(neighbour) = Sites::find()
                .filter(sites::Column::OrderNo.eq(target))
                .one(&txn)
                .await
                .context("Failed to query neighbouring site")?
            {
                let mut neighbour: sites::ActiveModel = neighbour.into();
                neighbour.order_no = Set(current);
                neighbour.last_modified = Set(now);
                neighbour
                    .update(&txn)
                    .await
                    .context("Failed to move neighbouring site")?;
            }

            let mut moved: sites::ActiveModel = site.into();
            moved.order_no = Set(target);
            moved.last_modified = Set(now);
            moved
                .update(&txn)
                .await
                .context("Failed to move site")?;
        }

        txn.commit().await?;

        self.get(id, PublishedCriteria::All).await
    }
}
