pub mod article;
pub mod category;
pub mod file;
pub mod invite;
pub mod site;
pub mod token;
pub mod user;

use crate::domain::UserId;
use crate::entities::{categories, prelude::*, users};
use anyhow::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::HashMap;

/// Author projection joined onto every aggregate read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
}

impl From<users::Model> for Author {
    fn from(model: users::Model) -> Self {
        Self {
            id: UserId::new(model.id),
            username: model.username,
            display_name: model.display_name,
        }
    }
}

impl Author {
    /// Placeholder for rows whose author vanished between two queries.
    fn unknown(id: i32) -> Self {
        Self {
            id: UserId::new(id),
            username: String::new(),
            display_name: String::new(),
        }
    }
}

/// Category projection joined onto articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

impl From<categories::Model> for CategoryRef {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
        }
    }
}

/// Load authors for a batch of rows in one query.
pub(crate) async fn load_authors(
    conn: &DatabaseConnection,
    ids: impl IntoIterator<Item = i32>,
) -> Result<HashMap<i32, Author>> {
    let mut ids: Vec<i32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = Users::find()
        .filter(users::Column::Id.is_in(ids))
        .all(conn)
        .await?;

    Ok(rows.into_iter().map(|u| (u.id, Author::from(u))).collect())
}

pub(crate) fn author_or_unknown(authors: &HashMap<i32, Author>, id: i32) -> Author {
    authors
        .get(&id)
        .cloned()
        .unwrap_or_else(|| Author::unknown(id))
}
