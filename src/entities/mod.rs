pub mod prelude;

pub mod articles;
pub mod categories;
pub mod files;
pub mod sites;
pub mod tokens;
pub mod user_invites;
pub mod users;
