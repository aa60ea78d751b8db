pub mod catalog;
pub mod comment;
pub mod profile;
