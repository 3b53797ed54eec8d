pub mod audio;
pub mod auth;
pub mod backfill;
pub mod cache;
pub mod crate_save;
pub mod feed;
pub mod follow;
pub mod metadata;
pub mod post;
pub mod user;
