pub mod chapter;
pub mod comment;
pub mod import;
pub mod novel;
pub mod profile;
