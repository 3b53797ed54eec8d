use crate::middleware::auth::AuthUser;
use crate::models::PostModel;
use crate::services::feed::FeedItem;
use askama::Template;

/// Values every page layout needs.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub current_user: Option<AuthUser>,
    pub flash: Option<String>,
}

impl PageContext {
    pub fn is_logged_in(&self) -> bool {
        self.current_user.is_some()
    }
}

#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedTemplate<'a> {
    pub ctx: &'a PageContext,
    pub heading: &'a str,
    pub posts: &'a [FeedItem],
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate<'a> {
    pub ctx: &'a PageContext,
    pub username: &'a str,
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate<'a> {
    pub ctx: &'a PageContext,
    pub username: &'a str,
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate<'a> {
    pub ctx: &'a PageContext,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate<'a> {
    pub ctx: &'a PageContext,
    pub profile_id: i32,
    pub profile_username: &'a str,
    pub social_handle: Option<&'a str>,
    pub followers: u64,
    pub following: u64,
    pub is_following: bool,
    pub is_me: bool,
    pub posts: &'a [FeedItem],
}

#[derive(Template)]
#[template(path = "edit_post.html")]
pub struct EditPostTemplate<'a> {
    pub ctx: &'a PageContext,
    pub post: &'a PostModel,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate<'a> {
    pub ctx: &'a PageContext,
    pub status: u16,
    pub message: &'a str,
}
