use crate::config::rate_limit::{RateLimitConfig, RateLimitRule};
use crate::handlers;
use crate::middleware::{auth_middleware, require_login, session_middleware};
use axum::{middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

/// JSON API under `/api` plus the server-rendered pages.
pub fn create_routes() -> Router {
    Router::new()
        .nest("/api", api_routes())
        .merge(page_routes())
}

fn api_routes() -> Router {
    let rate_limit_config = RateLimitConfig::from_env();

    let auth = auth_routes(&rate_limit_config);
    let public_read = public_read_routes(&rate_limit_config);
    let media = media_routes(&rate_limit_config);
    let protected =
        protected_routes(&rate_limit_config).layer(middleware::from_fn(auth_middleware));

    auth.merge(public_read).merge(media).merge(protected)
}

/// Register and login (password or device).
fn auth_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/register", routing::post(handlers::register))
        .route("/login", routing::post(handlers::login));

    with_optional_rate_limit(router, config.enabled, config.auth)
}

fn public_read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route(
            "/users/{user_id}/followers",
            routing::get(handlers::follow::list_followers),
        )
        .route(
            "/users/{user_id}/following",
            routing::get(handlers::follow::list_following),
        );

    with_optional_rate_limit(router, config.enabled, config.public_read)
}

/// Endpoints that shell out to yt-dlp, hold an upstream stream open, or
/// sweep every post. The backfill checks its own shared secret.
fn media_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/ytdl", routing::get(handlers::media::ytdl))
        .route("/audio", routing::get(handlers::media::audio_proxy))
        .route(
            "/migrate-artists",
            routing::post(handlers::media::migrate_artists),
        );

    with_optional_rate_limit(router, config.enabled, config.media)
}

fn protected_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/me", routing::get(handlers::get_current_user))
        // Feed
        .route("/feed", routing::get(handlers::feed::get_feed))
        // Posts
        .route("/post", routing::post(handlers::post::create_post))
        .route(
            "/post/{id}",
            routing::put(handlers::post::update_post).delete(handlers::post::delete_post),
        )
        // Profile
        .route("/profile", routing::put(handlers::user::update_profile))
        .route(
            "/profile/username",
            routing::put(handlers::user::change_username),
        )
        .route(
            "/profile/{username}",
            routing::get(handlers::user::get_profile),
        )
        // Follow
        .route(
            "/follow/{user_id}",
            routing::post(handlers::follow::toggle_follow),
        )
        // Crate
        .route("/crate", routing::get(handlers::crate_save::list_crate))
        .route(
            "/crate/{post_id}",
            routing::post(handlers::crate_save::save_post)
                .delete(handlers::crate_save::unsave_post),
        );

    with_optional_rate_limit(router, config.enabled, config.protected)
}

/// Browser pages. Every page sees the session user; the ones below
/// `require_login` redirect anonymous visitors to `/login`.
fn page_routes() -> Router {
    use handlers::pages;

    let members = Router::new()
        .route("/feed/following", routing::get(pages::feed_following))
        .route(
            "/post",
            routing::get(pages::share_form).post(pages::share_submit),
        )
        .route("/follow/{id}", routing::post(pages::follow))
        .route("/unfollow/{id}", routing::post(pages::unfollow))
        .route(
            "/edit/{id}",
            routing::get(pages::edit_form).post(pages::edit_submit),
        )
        .route("/delete/{id}", routing::post(pages::delete))
        .route_layer(middleware::from_fn(require_login));

    Router::new()
        .route("/", routing::get(pages::index))
        .route(
            "/login",
            routing::get(pages::login_form).post(pages::login_submit),
        )
        .route(
            "/register",
            routing::get(pages::register_form).post(pages::register_submit),
        )
        .route("/logout", routing::get(pages::logout))
        .route("/profile/{username}", routing::get(pages::profile))
        .merge(members)
        .layer(middleware::from_fn(session_middleware))
}

fn with_optional_rate_limit(router: Router, enabled: bool, rule: RateLimitRule) -> Router {
    if !enabled {
        return router;
    }

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(rule.per_second)
        .burst_size(rule.burst_size)
        .finish()
        .expect("Invalid rate limit configuration");

    router.layer(GovernorLayer::new(governor_conf))
}
