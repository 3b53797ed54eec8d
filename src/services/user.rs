use crate::{
    error::{AppError, AppResult},
    models::{user, User, UserModel},
};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, SqlErr,
};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
const SOCIAL_HANDLE_MAX_LEN: usize = 100;

/// Trim and check a username: 3-30 chars of letters, digits, `_`, `.` or `-`.
pub fn validate_username(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "Username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AppError::Validation(
            "Username may only contain letters, digits, '_', '.' and '-'".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Case-insensitive lookup; usernames differing only by case are one account.
pub async fn find_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<UserModel>, DbErr> {
    User::find()
        .filter(
            Expr::expr(Func::lower(Expr::col(user::Column::Username)))
                .eq(username.trim().to_lowercase()),
        )
        .one(db)
        .await
}

/// The `LOWER(username)` unique index is the final arbiter when two
/// requests race past the pre-check.
pub(crate) fn map_username_conflict(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Validation("Username already taken".to_string())
        }
        _ => AppError::Database(err),
    }
}

pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, user_id: i32) -> AppResult<UserModel> {
        User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn get_by_username(&self, username: &str) -> AppResult<UserModel> {
        find_by_username(&self.db, username)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Rename the caller. A case-only change of one's own name is allowed.
    pub async fn change_username(&self, user_id: i32, new_username: &str) -> AppResult<UserModel> {
        let new_username = validate_username(new_username)?;
        let existing = self.get_by_id(user_id).await?;

        if existing.username == new_username {
            return Ok(existing);
        }

        if let Some(other) = find_by_username(&self.db, &new_username).await? {
            if other.id != user_id {
                return Err(AppError::Validation("Username already taken".to_string()));
            }
        }

        let old = existing.username.clone();
        let mut active: user::ActiveModel = existing.into();
        active.username = sea_orm::ActiveValue::Set(new_username);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        let updated = active
            .update(&self.db)
            .await
            .map_err(map_username_conflict)?;
        tracing::info!(user_id, from = %old, to = %updated.username, "Username changed");
        Ok(updated)
    }

    /// Set or clear the social handle. A leading `@` is dropped.
    pub async fn update_social_handle(
        &self,
        user_id: i32,
        handle: Option<&str>,
    ) -> AppResult<UserModel> {
        let handle = normalize_social_handle(handle)?;
        let existing = self.get_by_id(user_id).await?;

        let mut active: user::ActiveModel = existing.into();
        active.social_handle = sea_orm::ActiveValue::Set(handle);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        Ok(active.update(&self.db).await?)
    }
}

fn normalize_social_handle(handle: Option<&str>) -> AppResult<Option<String>> {
    let Some(handle) = handle.map(|h| h.trim().trim_start_matches('@').trim()) else {
        return Ok(None);
    };
    if handle.is_empty() {
        return Ok(None);
    }
    if handle.chars().count() > SOCIAL_HANDLE_MAX_LEN {
        return Err(AppError::Validation(format!(
            "Social handle must be at most {SOCIAL_HANDLE_MAX_LEN} characters"
        )));
    }
    if handle.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(
            "Social handle cannot contain spaces".to_string(),
        ));
    }
    Ok(Some(handle.to_string()))
}
