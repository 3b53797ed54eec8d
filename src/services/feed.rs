use crate::{
    error::{AppError, AppResult},
    models::PostModel,
};
use sea_orm::{DatabaseConnection, FromQueryResult, Statement, Value};
use serde::Serialize;
use utoipa::ToSchema;

pub const DEFAULT_FEED_LIMIT: u64 = 50;
pub const MAX_FEED_LIMIT: u64 = 100;
pub const DELETED_USERNAME: &str = "[deleted]";

/// One rendered post, with the author's name and per-viewer flags.
#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct FeedItem {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub title: String,
    pub artist: String,
    pub platform: String,
    pub url: String,
    pub thumbnail: String,
    pub embed_url: String,
    pub created_at: chrono::NaiveDateTime,
    pub is_mine: bool,
    pub is_saved: bool,
    pub save_count: i64,
    /// No earlier post shares this URL.
    pub is_first_discover: bool,
}

/// Which posts a feed query selects and how they are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    Global,
    /// The user's own posts plus posts by everyone they follow.
    Following(i32),
    Author(i32),
    /// The user's crate, most recent save first.
    Saved(i32),
    Single(i32),
}

impl FeedScope {
    fn join(&self) -> &'static str {
        match self {
            FeedScope::Saved(_) => "JOIN crate_saves s ON s.post_id = p.id",
            _ => "",
        }
    }

    fn filter(&self, param: usize) -> String {
        match self {
            FeedScope::Global => "TRUE".to_string(),
            FeedScope::Following(_) => format!(
                "(p.user_id = ${param} OR p.user_id IN \
                 (SELECT followed_id FROM follows WHERE follower_id = ${param}))"
            ),
            FeedScope::Author(_) => format!("p.user_id = ${param}"),
            FeedScope::Saved(_) => format!("s.user_id = ${param}"),
            FeedScope::Single(_) => format!("p.id = ${param}"),
        }
    }

    fn order(&self) -> &'static str {
        match self {
            FeedScope::Saved(_) => "s.created_at DESC, s.id DESC",
            _ => "p.created_at DESC, p.id DESC",
        }
    }

    fn subject(&self) -> Option<i32> {
        match self {
            FeedScope::Global => None,
            FeedScope::Following(id)
            | FeedScope::Author(id)
            | FeedScope::Saved(id)
            | FeedScope::Single(id) => Some(*id),
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

pub struct FeedService {
    db: DatabaseConnection,
}

impl FeedService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Page through a feed. Returns `(items, total)`.
    pub async fn list(
        &self,
        scope: FeedScope,
        viewer: Option<i32>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<FeedItem>, u64)> {
        let per_page = per_page.clamp(1, MAX_FEED_LIMIT);
        let offset = page
            .saturating_sub(1)
            .checked_mul(per_page)
            .and_then(|n| i64::try_from(n).ok());

        let total = self.count(scope).await?;
        let Some(offset) = offset.filter(|&n| (n as u64) < total) else {
            return Ok((vec![], total));
        };

        let mut values: Vec<Value> = vec![viewer.into(), (per_page as i64).into(), offset.into()];
        if let Some(subject) = scope.subject() {
            values.push(subject.into());
        }

        let sql = format!(
            "SELECT p.id, p.user_id, COALESCE(u.username, '{DELETED_USERNAME}') AS username, \
                p.title, p.artist, p.platform, p.url, p.thumbnail, p.embed_url, p.created_at, \
                COALESCE(p.user_id = $1, FALSE) AS is_mine, \
                EXISTS (SELECT 1 FROM crate_saves cs WHERE cs.post_id = p.id AND cs.user_id = $1) AS is_saved, \
                (SELECT COUNT(*) FROM crate_saves cs WHERE cs.post_id = p.id) AS save_count, \
                NOT EXISTS (SELECT 1 FROM posts e WHERE e.url = p.url \
                    AND (e.created_at < p.created_at OR (e.created_at = p.created_at AND e.id < p.id))) \
                    AS is_first_discover \
             FROM posts p \
             LEFT JOIN users u ON u.id = p.user_id \
             {join} \
             WHERE {filter} \
             ORDER BY {order} \
             LIMIT $2 OFFSET $3",
            join = scope.join(),
            filter = scope.filter(4),
            order = scope.order(),
        );

        let items = FeedItem::find_by_statement(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            &sql,
            values,
        ))
        .all(&self.db)
        .await?;

        Ok((items, total))
    }

    /// The newest `limit` posts of a scope, for pages that don't paginate.
    pub async fn latest(
        &self,
        scope: FeedScope,
        viewer: Option<i32>,
        limit: u64,
    ) -> AppResult<Vec<FeedItem>> {
        Ok(self.list(scope, viewer, 1, limit).await?.0)
    }

    /// A single post rendered as a feed item.
    pub async fn item(&self, post: &PostModel, viewer: Option<i32>) -> AppResult<FeedItem> {
        self.latest(FeedScope::Single(post.id), viewer, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::NotFound)
    }

    async fn count(&self, scope: FeedScope) -> AppResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM posts p {join} WHERE {filter}",
            join = scope.join(),
            filter = scope.filter(1),
        );
        let values: Vec<Value> = scope.subject().into_iter().map(Into::into).collect();

        let row = CountRow::find_by_statement(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            &sql,
            values,
        ))
        .one(&self.db)
        .await?;

        Ok(row.map(|r| r.count.max(0) as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_scope_has_no_parameter() {
        assert_eq!(FeedScope::Global.subject(), None);
        assert_eq!(FeedScope::Global.filter(4), "TRUE");
    }

    #[test]
    fn following_scope_includes_own_posts() {
        let filter = FeedScope::Following(7).filter(4);
        assert!(filter.starts_with("(p.user_id = $4 OR"));
        assert!(filter.contains("follower_id = $4"));
        assert_eq!(FeedScope::Following(7).subject(), Some(7));
    }

    #[test]
    fn saved_scope_orders_by_save_time() {
        let scope = FeedScope::Saved(3);
        assert!(scope.join().contains("crate_saves"));
        assert!(scope.order().starts_with("s.created_at"));
    }
}
