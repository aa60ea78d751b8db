pub mod prelude;

pub mod chapters;
pub mod comments;
pub mod novels;
pub mod sources;
pub mod users;
