pub mod crate_save;
pub mod follow;
pub mod post;
pub mod user;

pub use crate_save::Entity as CrateSave;
pub use follow::Entity as Follow;
pub use post::{Entity as Post, Model as PostModel};
pub use user::{Entity as User, Model as UserModel};
