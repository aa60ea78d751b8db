pub use super::chapters::Entity as Chapters;
pub use super::comments::Entity as Comments;
pub use super::novels::Entity as Novels;
pub use super::sources::Entity as Sources;
pub use super::users::Entity as Users;
