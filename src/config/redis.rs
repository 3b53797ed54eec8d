use redis::aio::ConnectionManager;
use tokio::time::{timeout, Duration};

/// Connect to Redis when `REDIS_URL` is set. The metadata cache is optional,
/// so an unset URL yields `Ok(None)` rather than an error.
pub async fn get_redis() -> anyhow::Result<Option<ConnectionManager>> {
    let Ok(redis_url) = std::env::var("REDIS_URL") else {
        return Ok(None);
    };
    let client = redis::Client::open(redis_url)?;

    let manager = timeout(Duration::from_secs(5), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 5 seconds"))??;

    Ok(Some(manager))
}
