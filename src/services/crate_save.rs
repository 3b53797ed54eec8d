use crate::{
    error::{AppError, AppResult},
    models::{crate_save, CrateSave, Post},
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Statement,
};

/// A user's crate: the posts they saved for later.
pub struct CrateService {
    db: DatabaseConnection,
}

impl CrateService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn ensure_post(&self, post_id: i32) -> AppResult<()> {
        Post::find_by_id(post_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(())
    }

    /// Save a post. Saving twice is a no-op. Returns the new save count.
    pub async fn save(&self, user_id: i32, post_id: i32) -> AppResult<u64> {
        self.ensure_post(post_id).await?;

        self.db
            .execute(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "INSERT INTO crate_saves (user_id, post_id, created_at)
                 VALUES ($1, $2, NOW())
                 ON CONFLICT (user_id, post_id) DO NOTHING",
                vec![user_id.into(), post_id.into()],
            ))
            .await?;

        self.save_count(post_id).await
    }

    /// Remove a save. Removing an absent save is a no-op. Returns the new save count.
    pub async fn unsave(&self, user_id: i32, post_id: i32) -> AppResult<u64> {
        self.ensure_post(post_id).await?;

        CrateSave::delete_many()
            .filter(crate_save::Column::UserId.eq(user_id))
            .filter(crate_save::Column::PostId.eq(post_id))
            .exec(&self.db)
            .await?;

        self.save_count(post_id).await
    }

    pub async fn save_count(&self, post_id: i32) -> AppResult<u64> {
        Ok(CrateSave::find()
            .filter(crate_save::Column::PostId.eq(post_id))
            .count(&self.db)
            .await?)
    }
}
