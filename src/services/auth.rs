use crate::{
    error::{AppError, AppResult},
    models::{user, User, UserModel},
    services::user::{find_by_username, map_username_conflict, validate_username},
    utils::{encode_token, hash_password, validate_password, verify_password, TokenKind},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

const DEVICE_ID_MAX_LEN: usize = 255;
const GENERATED_NAME_ATTEMPTS: usize = 5;

pub struct AuthService {
    db: DatabaseConnection,
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Register a password account. Usernames are unique regardless of case.
    pub async fn register(&self, username: &str, password: &str) -> AppResult<UserModel> {
        let username = validate_username(username)?;
        validate_password(password)?;

        if find_by_username(&self.db, &username).await?.is_some() {
            return Err(AppError::Validation("Username already taken".to_string()));
        }

        let password_hash = hash_password(password)?;
        let user = self.insert_user(&username, Some(password_hash), None).await?;
        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Password login. Unknown user, device-only account and wrong password
    /// all look the same to the caller.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<UserModel> {
        let user = find_by_username(&self.db, username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, user.password_hash.as_deref())? {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Mobile auto-login keyed by device id. The first call creates the
    /// account, using `username` when given or a generated `listener_*` name.
    /// Returns the user and whether it was just created.
    pub async fn device_login(
        &self,
        device_id: &str,
        username: Option<&str>,
    ) -> AppResult<(UserModel, bool)> {
        let device_id = device_id.trim();
        if device_id.is_empty() || device_id.len() > DEVICE_ID_MAX_LEN {
            return Err(AppError::Validation("Invalid device_id".to_string()));
        }

        if let Some(user) = User::find()
            .filter(user::Column::DeviceId.eq(device_id))
            .one(&self.db)
            .await?
        {
            return Ok((user, false));
        }

        let username = match username.map(str::trim).filter(|u| !u.is_empty()) {
            Some(requested) => {
                let requested = validate_username(requested)?;
                if find_by_username(&self.db, &requested).await?.is_some() {
                    return Err(AppError::Validation("Username already taken".to_string()));
                }
                requested
            }
            None => self.generate_username().await?,
        };

        let user = self
            .insert_user(&username, None, Some(device_id.to_string()))
            .await?;
        tracing::info!(user_id = user.id, username = %user.username, "Device account created");
        Ok((user, true))
    }

    pub async fn get_user_by_id(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub fn issue_token(&self, user_id: i32, kind: TokenKind) -> AppResult<String> {
        Ok(encode_token(user_id, kind)?)
    }

    async fn generate_username(&self) -> AppResult<String> {
        for _ in 0..GENERATED_NAME_ATTEMPTS {
            let candidate = generated_username();
            if find_by_username(&self.db, &candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "Could not generate a free username"
        )))
    }

    async fn insert_user(
        &self,
        username: &str,
        password_hash: Option<String>,
        device_id: Option<String>,
    ) -> AppResult<UserModel> {
        let now = chrono::Utc::now().naive_utc();
        let new_user = user::ActiveModel {
            username: sea_orm::ActiveValue::Set(username.to_string()),
            password_hash: sea_orm::ActiveValue::Set(password_hash),
            device_id: sea_orm::ActiveValue::Set(device_id),
            social_handle: sea_orm::ActiveValue::Set(None),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        new_user.insert(&self.db).await.map_err(map_username_conflict)
    }
}

fn generated_username() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("listener_{}", &id[..8])
}
