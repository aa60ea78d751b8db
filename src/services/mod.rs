pub mod avatar;
pub mod cache;
pub mod cookies;
pub mod cooldown;
pub mod markdown;
pub mod moderation;
pub mod tokens;

pub use avatar::AvatarProcessor;
pub use cache::TtlCache;
pub use cooldown::CommentCooldown;
pub use moderation::{DeliveryOutcome, DeliveryTicket, ModerationQueue};

pub mod catalog_service;
pub mod catalog_service_impl;
pub use catalog_service::{CatalogError, CatalogService};
pub use catalog_service_impl::SeaOrmCatalogService;

pub mod profile_service;
pub mod profile_service_impl;
pub use profile_service::{ProfileError, ProfileService};
pub use profile_service_impl::SeaOrmProfileService;

pub mod comment_service;
pub mod comment_service_impl;
pub use comment_service::{CommentError, CommentService};
pub use comment_service_impl::SeaOrmCommentService;
