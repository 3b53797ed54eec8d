pub mod auth;
pub mod crate_save;
pub mod feed;
pub mod follow;
pub mod media;
pub mod pages;
pub mod post;
pub mod user;

pub use auth::*;
