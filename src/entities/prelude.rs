pub use super::articles::Entity as Articles;
pub use super::categories::Entity as Categories;
pub use super::files::Entity as Files;
pub use super::sites::Entity as Sites;
pub use super::tokens::Entity as Tokens;
pub use super::user_invites::Entity as UserInvites;
pub use super::users::Entity as Users;
