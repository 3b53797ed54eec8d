use super::parse_env;
use anyhow::Result;
use std::env;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Signs bearer tokens handed to the mobile API.
    pub api_secret: String,
    /// Signs the browser session cookie.
    pub session_secret: String,
    pub api_token_expiry: u64,     // 30 days
    pub session_token_expiry: u64, // 7 days
}

impl JwtConfig {
    pub fn from_env() -> Result<Self> {
        let api_secret = env::var("JWT_SECRET_KEY")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET_KEY environment variable must be set"))?;

        if api_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET_KEY must be at least {MIN_SECRET_LEN} characters"
            ));
        }

        let session_secret = match env::var("SECRET_KEY") {
            Ok(secret) if secret.len() >= MIN_SECRET_LEN => secret,
            Ok(_) => {
                return Err(anyhow::anyhow!(
                    "SECRET_KEY must be at least {MIN_SECRET_LEN} characters"
                ))
            }
            Err(_) => {
                tracing::warn!("SECRET_KEY not set, signing sessions with JWT_SECRET_KEY");
                api_secret.clone()
            }
        };

        Ok(Self {
            api_secret,
            session_secret,
            api_token_expiry: parse_env("JWT_ACCESS_EXPIRATION", 2_592_000),
            session_token_expiry: parse_env("SESSION_EXPIRATION", 604_800),
        })
    }
}
