use crate::{
    error::AppResult,
    models::{post, Post, PostModel},
    services::metadata::{MetadataService, TrackMetadata, UNKNOWN_ARTIST},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BackfillReport {
    pub total: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Which stored fields a fresh lookup would change.
#[derive(Debug, Default, PartialEq, Eq)]
struct PostChanges {
    artist: Option<String>,
    title: Option<String>,
    thumbnail: Option<String>,
}

impl PostChanges {
    fn diff(post: &PostModel, fresh: &TrackMetadata) -> Self {
        let artist = (fresh.artist != UNKNOWN_ARTIST && fresh.artist != post.artist)
            .then(|| fresh.artist.clone());
        let title = (fresh.title != post.title).then(|| fresh.title.clone());
        let thumbnail = (fresh.thumbnail != post.thumbnail).then(|| fresh.thumbnail.clone());
        Self {
            artist,
            title,
            thumbnail,
        }
    }

    fn is_empty(&self) -> bool {
        self.artist.is_none() && self.title.is_none() && self.thumbnail.is_none()
    }
}

/// Re-runs metadata extraction over stored posts so they pick up the
/// current title/artist rules.
pub struct BackfillService {
    db: DatabaseConnection,
    metadata: MetadataService,
}

impl BackfillService {
    pub fn new(db: DatabaseConnection, metadata: MetadataService) -> Self {
        Self { db, metadata }
    }

    /// Process every post in id order. A failing post is counted and the
    /// run continues. With `dry_run` nothing is written.
    pub async fn run(&self, dry_run: bool) -> AppResult<BackfillReport> {
        let posts = Post::find()
            .order_by_asc(post::Column::Id)
            .all(&self.db)
            .await?;

        let mut report = BackfillReport {
            total: posts.len() as u64,
            ..Default::default()
        };
        tracing::info!(total = report.total, dry_run, "Artist backfill started");

        for (i, post) in posts.into_iter().enumerate() {
            let position = i + 1;
            let fresh = match self.metadata.refetch_track_url(&post.url).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::warn!(post_id = post.id, position, "Backfill lookup failed: {e}");
                    report.failed += 1;
                    continue;
                }
            };

            let changes = PostChanges::diff(&post, &fresh);
            if changes.is_empty() {
                tracing::debug!(post_id = post.id, position, "Backfill skipped, no changes");
                report.skipped += 1;
                continue;
            }

            tracing::info!(
                post_id = post.id,
                position,
                artist = ?changes.artist,
                title = ?changes.title,
                thumbnail_changed = changes.thumbnail.is_some(),
                "Backfill updating post"
            );

            if dry_run {
                report.updated += 1;
                continue;
            }

            match self.apply(post, changes).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    tracing::warn!(position, "Backfill write failed: {e}");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            total = report.total,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "Artist backfill finished"
        );
        Ok(report)
    }

    async fn apply(&self, post: PostModel, changes: PostChanges) -> AppResult<()> {
        let mut active: post::ActiveModel = post.into();
        if let Some(artist) = changes.artist {
            active.artist = sea_orm::ActiveValue::Set(artist);
        }
        if let Some(title) = changes.title {
            active.title = sea_orm::ActiveValue::Set(title);
        }
        if let Some(thumbnail) = changes.thumbnail {
            active.thumbnail = sea_orm::ActiveValue::Set(thumbnail);
        }
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;
        Ok(())
    }
}
