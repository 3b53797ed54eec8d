use super::parse_env;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::env;
use std::time::Duration;

pub async fn get_database() -> Result<DatabaseConnection, DbErr> {
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| DbErr::Custom("DATABASE_URL must be set".to_string()))?;

    connect(&database_url).await
}

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let max_connections: u32 = parse_env("DB_MAX_CONNECTIONS", 10);
    let min_connections: u32 = parse_env("DB_MIN_CONNECTIONS", 2);

    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true);

    Database::connect(opt).await
}
