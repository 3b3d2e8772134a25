//! Domain primitives shared by the services, repositories and transport.
//!
//! Identifiers follow the newtype pattern so that a user id can never be
//! passed where an article id is expected. Read filters are enums instead of
//! boolean flags.

pub mod pagination;

pub use pagination::{Page, Pagination};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier of a user account.
///
/// # Examples
///
/// ```rust
/// use quillpress::domain::UserId;
///
/// let id = UserId::new(7);
/// assert_eq!(id.value(), 7);
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UserId(i32);

impl UserId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UserId> for i32 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl From<i32> for UserId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl Serialize for UserId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i32::deserialize(deserializer)?;
        Ok(Self::new(id))
    }
}

/// Read filter on the `published` flag of articles and sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishedCriteria {
    OnlyPublished,
    NotPublished,
    #[default]
    All,
}

impl PublishedCriteria {
    /// Returns the value the `published` column must have, `None` for no filter.
    #[must_use]
    pub const fn published_value(self) -> Option<bool> {
        match self {
            Self::OnlyPublished => Some(true),
            Self::NotPublished => Some(false),
            Self::All => None,
        }
    }
}

/// Count filter on the `is_admin` flag of users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminCriteria {
    OnlyAdmins,
    NoAdmins,
    #[default]
    AllUsers,
}

/// Category list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    /// Categories referenced by at least one published article.
    WithPublishedArticles,
    /// Categories no article references.
    WithoutArticles,
}

/// Placement of a site in the rendered layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Navigation,
    Footer,
}

impl Section {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Footer => "footer",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigation" => Ok(Self::Navigation),
            "footer" => Ok(Self::Footer),
            other => Err(format!("unknown section '{other}'")),
        }
    }
}

/// Direction of a site reorder step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Which user attribute identifies an account at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMethod {
    #[default]
    Username,
    Mail,
}

/// Kind of one-shot token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    PasswordReset,
}

impl TokenType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
