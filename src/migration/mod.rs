use sea_orm_migration::prelude::*;

mod m20251001_000001_create_users_table;
mod m20251001_000002_create_follows_table;
mod m20251001_000003_create_posts_table;
mod m20251001_000004_create_crate_saves_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251001_000001_create_users_table::Migration),
            Box::new(m20251001_000002_create_follows_table::Migration),
            Box::new(m20251001_000003_create_posts_table::Migration),
            Box::new(m20251001_000004_create_crate_saves_table::Migration),
        ]
    }
}
