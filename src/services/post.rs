use crate::{
    error::{AppError, AppResult},
    models::{post, Post, PostModel},
    services::metadata::MetadataService,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait};

const FIELD_MAX_LEN: usize = 300;

pub struct PostService {
    db: DatabaseConnection,
}

impl PostService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Resolve track metadata for `raw_url` and store the post. Nothing is
    /// written unless the lookup succeeds.
    pub async fn create_from_url(
        &self,
        metadata: &MetadataService,
        user_id: i32,
        raw_url: &str,
    ) -> AppResult<PostModel> {
        if raw_url.trim().is_empty() {
            return Err(AppError::Validation("URL required".to_string()));
        }

        let track = metadata.parse_track_url(raw_url).await?;

        let now = chrono::Utc::now().naive_utc();
        let new_post = post::ActiveModel {
            user_id: sea_orm::ActiveValue::Set(user_id),
            platform: sea_orm::ActiveValue::Set(track.platform.as_str().to_string()),
            url: sea_orm::ActiveValue::Set(track.url),
            title: sea_orm::ActiveValue::Set(track.title),
            artist: sea_orm::ActiveValue::Set(track.artist),
            thumbnail: sea_orm::ActiveValue::Set(track.thumbnail),
            embed_url: sea_orm::ActiveValue::Set(track.embed_url),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        let post = new_post.insert(&self.db).await?;
        tracing::info!(post_id = post.id, user_id, platform = %post.platform, "Post created");
        Ok(post)
    }

    pub async fn get_by_id(&self, post_id: i32) -> AppResult<PostModel> {
        Post::find_by_id(post_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Load a post the caller owns.
    pub async fn get_owned(&self, post_id: i32, user_id: i32) -> AppResult<PostModel> {
        let post = self.get_by_id(post_id).await?;
        if post.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        Ok(post)
    }

    /// Owner-only partial edit. Absent or blank fields keep their value.
    pub async fn update(
        &self,
        post_id: i32,
        user_id: i32,
        title: Option<&str>,
        artist: Option<&str>,
    ) -> AppResult<PostModel> {
        let existing = self.get_owned(post_id, user_id).await?;

        let title = non_blank(title);
        let artist = non_blank(artist);
        if title.is_none() && artist.is_none() {
            return Ok(existing);
        }

        let mut active: post::ActiveModel = existing.into();
        if let Some(title) = title {
            active.title = sea_orm::ActiveValue::Set(title);
        }
        if let Some(artist) = artist {
            active.artist = sea_orm::ActiveValue::Set(artist);
        }
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        Ok(active.update(&self.db).await?)
    }

    /// Owner-only hard delete.
    pub async fn delete(&self, post_id: i32, user_id: i32) -> AppResult<()> {
        let existing = self.get_owned(post_id, user_id).await?;
        Post::delete_by_id(existing.id).exec(&self.db).await?;
        tracing::info!(post_id, user_id, "Post deleted");
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(FIELD_MAX_LEN).collect())
}
