//! Server-rendered pages. Sessions live in an HttpOnly cookie holding a
//! session-signed JWT; outcome messages travel in a one-shot flash cookie.

use crate::error::{AppError, AppResult};
use crate::handlers::user::PROFILE_POST_LIMIT;
use crate::middleware::CurrentUser;
use crate::services::auth::AuthService;
use crate::services::feed::{FeedScope, FeedService, DEFAULT_FEED_LIMIT};
use crate::services::follow::FollowService;
use crate::services::metadata::MetadataService;
use crate::services::post::PostService;
use crate::services::user::UserService;
use crate::templates::{
    EditPostTemplate, ErrorTemplate, FeedTemplate, LoginTemplate, PageContext, PostFormTemplate,
    ProfileTemplate, RegisterTemplate,
};
use crate::utils::cookie::{
    append_set_cookie, build_auth_cookie, build_clear_cookie, build_flash_cookie, extract_flash,
    FLASH_COOKIE, SESSION_COOKIE,
};
use crate::utils::{encode_token, TokenKind};
use askama::Template;
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

/// An error rendered as an HTML page instead of JSON.
pub struct PageError(AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        // Reuse the JSON mapping for status and logging.
        let status = self.0.into_response().status();
        let message = match status {
            StatusCode::NOT_FOUND => "That page doesn't exist.",
            StatusCode::FORBIDDEN => "You can't do that.",
            StatusCode::UNAUTHORIZED => "Please log in first.",
            StatusCode::BAD_REQUEST => "That request didn't make sense.",
            _ => "Something went wrong on our side.",
        };
        let ctx = PageContext::default();
        let page = ErrorTemplate {
            ctx: &ctx,
            status: status.as_u16(),
            message,
        };
        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(_) => status.into_response(),
        }
    }
}

type PageResult = Result<Response, PageError>;

fn page_context(user: CurrentUser, headers: &HeaderMap) -> PageContext {
    PageContext {
        current_user: user.0,
        flash: extract_flash(headers),
    }
}

/// Render a template; a shown flash message is consumed.
fn render<T: Template>(ctx: &PageContext, status: StatusCode, template: &T) -> PageResult {
    let html = template
        .render()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Template render failed: {e}")))?;
    let mut response = (status, Html(html)).into_response();
    if ctx.flash.is_some() {
        append_set_cookie(&mut response, &build_clear_cookie(FLASH_COOKIE))?;
    }
    Ok(response)
}

fn redirect_with_flash(to: &str, message: &str) -> AppResult<Response> {
    let mut response = Redirect::to(to).into_response();
    append_set_cookie(&mut response, &build_flash_cookie(message))?;
    Ok(response)
}

fn start_session(user_id: i32, to: &str) -> AppResult<Response> {
    let token = encode_token(user_id, TokenKind::Session)?;
    let cookie = build_auth_cookie(SESSION_COOKIE, &token, TokenKind::Session.expiry_secs()?);
    let mut response = Redirect::to(to).into_response();
    append_set_cookie(&mut response, &cookie)?;
    append_set_cookie(&mut response, &build_clear_cookie(FLASH_COOKIE))?;
    Ok(response)
}

fn session_user_id(user: &CurrentUser) -> AppResult<i32> {
    user.0
        .as_ref()
        .map(|u| u.user_id)
        .ok_or(AppError::Unauthorized)
}

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareForm {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct EditForm {
    pub title: Option<String>,
    pub artist: Option<String>,
}

pub async fn index(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    headers: HeaderMap,
) -> PageResult {
    let viewer = user.0.as_ref().map(|u| u.user_id);
    let posts = FeedService::new(db)
        .latest(FeedScope::Global, viewer, DEFAULT_FEED_LIMIT)
        .await?;

    let ctx = page_context(user, &headers);
    render(
        &ctx,
        StatusCode::OK,
        &FeedTemplate {
            ctx: &ctx,
            heading: "Latest",
            posts: &posts,
        },
    )
}

pub async fn feed_following(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    headers: HeaderMap,
) -> PageResult {
    let user_id = session_user_id(&user)?;
    let posts = FeedService::new(db)
        .latest(FeedScope::Following(user_id), Some(user_id), DEFAULT_FEED_LIMIT)
        .await?;

    let ctx = page_context(user, &headers);
    render(
        &ctx,
        StatusCode::OK,
        &FeedTemplate {
            ctx: &ctx,
            heading: "Following",
            posts: &posts,
        },
    )
}

pub async fn login_form(user: CurrentUser, headers: HeaderMap) -> PageResult {
    let ctx = page_context(user, &headers);
    render(
        &ctx,
        StatusCode::OK,
        &LoginTemplate {
            ctx: &ctx,
            username: "",
            error: None,
        },
    )
}

pub async fn login_submit(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> PageResult {
    match AuthService::new(db).login(&form.username, &form.password).await {
        Ok(account) => {
            tracing::debug!(user_id = account.id, "Page login");
            Ok(start_session(account.id, "/")?)
        }
        Err(AppError::Unauthorized) => {
            let ctx = page_context(user, &headers);
            render(
                &ctx,
                StatusCode::UNAUTHORIZED,
                &LoginTemplate {
                    ctx: &ctx,
                    username: &form.username,
                    error: Some("Invalid credentials"),
                },
            )
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn register_form(user: CurrentUser, headers: HeaderMap) -> PageResult {
    let ctx = page_context(user, &headers);
    render(
        &ctx,
        StatusCode::OK,
        &RegisterTemplate {
            ctx: &ctx,
            username: "",
            error: None,
        },
    )
}

pub async fn register_submit(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> PageResult {
    match AuthService::new(db)
        .register(&form.username, &form.password)
        .await
    {
        Ok(account) => Ok(start_session(account.id, "/")?),
        Err(AppError::Validation(message)) => {
            let ctx = page_context(user, &headers);
            render(
                &ctx,
                StatusCode::BAD_REQUEST,
                &RegisterTemplate {
                    ctx: &ctx,
                    username: &form.username,
                    error: Some(message.as_str()),
                },
            )
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn logout() -> PageResult {
    let mut response = redirect_with_flash("/login", "Logged out.")?;
    append_set_cookie(&mut response, &build_clear_cookie(SESSION_COOKIE))?;
    Ok(response)
}

pub async fn share_form(user: CurrentUser, headers: HeaderMap) -> PageResult {
    let ctx = page_context(user, &headers);
    render(&ctx, StatusCode::OK, &PostFormTemplate { ctx: &ctx })
}

pub async fn share_submit(
    Extension(db): Extension<DatabaseConnection>,
    Extension(metadata): Extension<MetadataService>,
    user: CurrentUser,
    Form(form): Form<ShareForm>,
) -> PageResult {
    let user_id = session_user_id(&user)?;

    if form.url.trim().is_empty() {
        return Ok(redirect_with_flash("/post", "URL required")?);
    }

    match PostService::new(db)
        .create_from_url(&metadata, user_id, &form.url)
        .await
    {
        Ok(_) => Ok(redirect_with_flash("/", "Posted!")?),
        Err(AppError::Validation(_)) => Ok(redirect_with_flash("/post", "Unsupported or invalid URL")?),
        Err(AppError::Upstream(message)) => Ok(redirect_with_flash("/post", &message)?),
        Err(e) => Err(e.into()),
    }
}

pub async fn profile(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> PageResult {
    let profile_user = UserService::new(db.clone()).get_by_username(&username).await?;
    let viewer = user.0.as_ref().map(|u| u.user_id);

    let follows = FollowService::new(db.clone());
    let counts = follows.counts(profile_user.id).await?;
    let is_me = viewer == Some(profile_user.id);
    let is_following = match viewer {
        Some(viewer_id) if !is_me => follows.is_following(viewer_id, profile_user.id).await?,
        _ => false,
    };

    let posts = FeedService::new(db)
        .latest(FeedScope::Author(profile_user.id), viewer, PROFILE_POST_LIMIT)
        .await?;

    let ctx = page_context(user, &headers);
    render(
        &ctx,
        StatusCode::OK,
        &ProfileTemplate {
            ctx: &ctx,
            profile_id: profile_user.id,
            profile_username: &profile_user.username,
            social_handle: profile_user.social_handle.as_deref(),
            followers: counts.followers,
            following: counts.following,
            is_following,
            is_me,
            posts: &posts,
        },
    )
}

pub async fn follow(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    Path(user_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let follower_id = session_user_id(&user)?;
    FollowService::new(db).follow(follower_id, user_id).await?;
    Ok(Json(json!({ "status": "following" })))
}

pub async fn unfollow(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    Path(user_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let follower_id = session_user_id(&user)?;
    FollowService::new(db).unfollow(follower_id, user_id).await?;
    Ok(Json(json!({ "status": "unfollowed" })))
}

pub async fn edit_form(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(post_id): Path<i32>,
) -> PageResult {
    let user_id = session_user_id(&user)?;
    let post = PostService::new(db).get_owned(post_id, user_id).await?;

    let ctx = page_context(user, &headers);
    render(
        &ctx,
        StatusCode::OK,
        &EditPostTemplate {
            ctx: &ctx,
            post: &post,
        },
    )
}

pub async fn edit_submit(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    Path(post_id): Path<i32>,
    Form(form): Form<EditForm>,
) -> PageResult {
    let user_id = session_user_id(&user)?;
    PostService::new(db)
        .update(
            post_id,
            user_id,
            form.title.as_deref(),
            form.artist.as_deref(),
        )
        .await?;
    Ok(redirect_with_flash("/", "Updated!")?)
}

pub async fn delete(
    Extension(db): Extension<DatabaseConnection>,
    user: CurrentUser,
    Path(post_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user_id(&user)?;
    PostService::new(db).delete(post_id, user_id).await?;
    Ok(Json(json!({ "success": true })))
}
