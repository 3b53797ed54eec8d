use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use std::{env, sync::OnceLock};
use url::form_urlencoded;

use crate::{
    config::parse_bool_env,
    error::{AppError, AppResult},
};

pub const SESSION_COOKIE: &str = "earshot_session";
/// One-shot message shown on the next rendered page.
pub const FLASH_COOKIE: &str = "earshot_flash";

#[derive(Debug, Clone)]
struct AuthCookieConfig {
    secure: bool,
    same_site: &'static str,
    domain: Option<String>,
}

impl AuthCookieConfig {
    fn from_env() -> Self {
        let same_site = parse_same_site(
            &env::var("AUTH_COOKIE_SAMESITE").unwrap_or_else(|_| "Lax".to_string()),
        );
        let mut secure = parse_bool_env("AUTH_COOKIE_SECURE", false);
        let domain = env::var("AUTH_COOKIE_DOMAIN")
            .ok()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        // Browsers require SameSite=None cookies to also be Secure.
        if same_site == "None" {
            secure = true;
        }

        Self {
            secure,
            same_site,
            domain,
        }
    }

    fn append_attributes(&self, cookie: &mut String) {
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
    }
}

fn auth_cookie_config() -> &'static AuthCookieConfig {
    static CONFIG: OnceLock<AuthCookieConfig> = OnceLock::new();
    CONFIG.get_or_init(AuthCookieConfig::from_env)
}

fn parse_same_site(value: &str) -> &'static str {
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => "Strict",
        "none" => "None",
        _ => "Lax",
    }
}

pub fn build_auth_cookie(name: &str, value: &str, max_age_seconds: u64) -> String {
    let config = auth_cookie_config();
    let mut cookie = format!(
        "{name}={value}; Path=/; Max-Age={max_age_seconds}; HttpOnly; SameSite={}",
        config.same_site
    );
    config.append_attributes(&mut cookie);
    cookie
}

pub fn build_clear_cookie(name: &str) -> String {
    let config = auth_cookie_config();
    let mut cookie = format!(
        "{name}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite={}",
        config.same_site
    );
    config.append_attributes(&mut cookie);
    cookie
}

pub fn build_flash_cookie(message: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(message.as_bytes()).collect();
    build_auth_cookie(FLASH_COOKIE, &encoded, 60)
}

pub fn append_set_cookie(response: &mut Response, cookie_value: &str) -> AppResult<()> {
    let value = HeaderValue::from_str(cookie_value).map_err(|e| {
        AppError::Internal(anyhow::anyhow!("Failed to build Set-Cookie header value: {}", e))
    })?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}

pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie_header| {
            cookie_header.split(';').find_map(|cookie| {
                let (key, value) = cookie.trim().split_once('=')?;
                (key.trim() == name).then(|| value.trim().to_string())
            })
        })
}

pub fn extract_flash(headers: &HeaderMap) -> Option<String> {
    let raw = extract_cookie(headers, FLASH_COOKIE).filter(|v| !v.is_empty())?;
    let decoded: String = form_urlencoded::parse(format!("m={raw}").as_bytes())
        .map(|(_, v)| v.into_owned())
        .next()?;
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; earshot_session=abc.def.ghi"),
        );
        assert_eq!(
            extract_cookie(&headers, SESSION_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn flash_message_survives_encoding() {
        let cookie = build_flash_cookie("Posted! Nice & loud");
        let value = cookie
            .split(';')
            .next()
            .and_then(|kv| kv.split_once('='))
            .map(|(_, v)| v.to_string())
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{FLASH_COOKIE}={value}")).unwrap(),
        );
        assert_eq!(extract_flash(&headers).as_deref(), Some("Posted! Nice & loud"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = build_clear_cookie(SESSION_COOKIE);
        assert!(cookie.starts_with("earshot_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
