use crate::{
    error::{AppError, AppResult},
    models::{follow, user, Follow, User, UserModel},
    response::MAX_PAGE,
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Statement,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}

pub struct FollowService {
    db: DatabaseConnection,
}

impl FollowService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn check_target(&self, follower_id: i32, followed_id: i32) -> AppResult<()> {
        if follower_id == followed_id {
            return Err(AppError::Validation("You cannot follow yourself".to_string()));
        }

        User::find_by_id(followed_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(())
    }

    /// Add the edge. Following someone twice is a no-op.
    /// Returns true if a new edge was created.
    pub async fn follow(&self, follower_id: i32, followed_id: i32) -> AppResult<bool> {
        self.check_target(follower_id, followed_id).await?;

        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "INSERT INTO follows (follower_id, followed_id, created_at)
                 VALUES ($1, $2, NOW())
                 ON CONFLICT (follower_id, followed_id) DO NOTHING",
                vec![follower_id.into(), followed_id.into()],
            ))
            .await?;

        let created = result.rows_affected() > 0;
        if created {
            tracing::debug!(follower_id, followed_id, "Follow created");
        }
        Ok(created)
    }

    /// Remove the edge. Unfollowing someone not followed is a no-op.
    /// Returns true if an edge was removed.
    pub async fn unfollow(&self, follower_id: i32, followed_id: i32) -> AppResult<bool> {
        self.check_target(follower_id, followed_id).await?;

        let result = Follow::delete_many()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FollowedId.eq(followed_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Toggle follow: if exists -> unfollow, if not -> follow.
    /// Returns true if now following, false if unfollowed.
    pub async fn toggle(&self, follower_id: i32, followed_id: i32) -> AppResult<bool> {
        if self.is_following(follower_id, followed_id).await? {
            self.unfollow(follower_id, followed_id).await?;
            Ok(false)
        } else {
            self.follow(follower_id, followed_id).await?;
            Ok(true)
        }
    }

    pub async fn is_following(&self, follower_id: i32, followed_id: i32) -> AppResult<bool> {
        let count = Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FollowedId.eq(followed_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn counts(&self, user_id: i32) -> AppResult<FollowCounts> {
        let followers = Follow::find()
            .filter(follow::Column::FollowedId.eq(user_id))
            .count(&self.db)
            .await?;
        let following = Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(FollowCounts {
            followers,
            following,
        })
    }

    /// Ids of everyone `user_id` follows.
    pub async fn following_ids(&self, user_id: i32) -> AppResult<Vec<i32>> {
        let follows = Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .all(&self.db)
            .await?;
        Ok(follows.into_iter().map(|f| f.followed_id).collect())
    }

    /// Users who follow `user_id`, most recent first.
    pub async fn list_followers(
        &self,
        user_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<UserModel>, u64)> {
        self.list_edge(
            follow::Column::FollowedId,
            user_id,
            |f| f.follower_id,
            page,
            per_page,
        )
        .await
    }

    /// Users `user_id` follows, most recent first.
    pub async fn list_following(
        &self,
        user_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<UserModel>, u64)> {
        self.list_edge(
            follow::Column::FollowerId,
            user_id,
            |f| f.followed_id,
            page,
            per_page,
        )
        .await
    }

    async fn list_edge(
        &self,
        anchor: follow::Column,
        user_id: i32,
        other_side: fn(&follow::Model) -> i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<UserModel>, u64)> {
        User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let paginator = Follow::find()
            .filter(anchor.eq(user_id))
            .order_by_desc(follow::Column::CreatedAt)
            .order_by_desc(follow::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let follows = paginator
            .fetch_page(page.clamp(1, MAX_PAGE) - 1)
            .await?;

        let user_ids: Vec<i32> = follows.iter().map(other_side).collect();
        if user_ids.is_empty() {
            return Ok((vec![], total));
        }

        let users = User::find()
            .filter(user::Column::Id.is_in(user_ids.clone()))
            .all(&self.db)
            .await?;

        // Reorder to match follow order
        let user_map: HashMap<i32, UserModel> = users.into_iter().map(|u| (u.id, u)).collect();
        let ordered: Vec<UserModel> = user_ids
            .into_iter()
            .filter_map(|id| user_map.get(&id).cloned())
            .collect();

        Ok((ordered, total))
    }
}
