use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::jwt::JwtConfig;

static JWT_CONFIG: OnceLock<JwtConfig> = OnceLock::new();

/// Initialize JWT config from environment. Must be called once at startup.
pub fn init_jwt_config(config: JwtConfig) -> Result<()> {
    JWT_CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("JWT config already initialized"))?;
    Ok(())
}

fn get_config() -> Result<&'static JwtConfig> {
    JWT_CONFIG
        .get()
        .ok_or_else(|| anyhow::anyhow!("JWT config not initialized, call init_jwt_config() at startup"))
}

/// Bearer tokens for the JSON API and browser session cookies are signed
/// with different secrets, so one can never be replayed as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Api,
    Session,
}

impl TokenKind {
    fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Api => "api",
            TokenKind::Session => "session",
        }
    }

    fn secret(&self, config: &'static JwtConfig) -> &'static str {
        match self {
            TokenKind::Api => &config.api_secret,
            TokenKind::Session => &config.session_secret,
        }
    }

    pub fn expiry_secs(&self) -> Result<u64> {
        let config = get_config()?;
        Ok(match self {
            TokenKind::Api => config.api_token_expiry,
            TokenKind::Session => config.session_token_expiry,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: usize,
    pub iat: usize,
    pub token_type: String,
}

impl Claims {
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }
}

pub fn encode_token(user_id: i32, kind: TokenKind) -> Result<String> {
    let config = get_config()?;
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + kind.expiry_secs()? as usize,
        iat: now,
        token_type: kind.as_str().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(kind.secret(config).as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("Failed to encode {} token: {}", kind.as_str(), e))
}

pub fn decode_token(token: &str, kind: TokenKind) -> Result<Claims> {
    let config = get_config()?;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(kind.secret(config).as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| anyhow::anyhow!("Failed to decode JWT: {}", e))?;

    if claims.token_type != kind.as_str() {
        return Err(anyhow::anyhow!("Unexpected token type '{}'", claims.token_type));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn ensure_config() {
        INIT.call_once(|| {
            let _ = init_jwt_config(JwtConfig {
                api_secret: "api_secret_that_is_definitely_at_least_32_chars".to_string(),
                session_secret: "session_secret_that_is_also_at_least_32_chars".to_string(),
                api_token_expiry: 3600,
                session_token_expiry: 600,
            });
        });
    }

    #[test]
    fn api_token_round_trip() {
        ensure_config();
        let token = encode_token(42, TokenKind::Api).unwrap();
        let claims = decode_token(&token, TokenKind::Api).unwrap();
        assert_eq!(claims.user_id(), Some(42));
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.token_type, "api");
    }

    #[test]
    fn session_token_is_not_an_api_token() {
        ensure_config();
        let token = encode_token(7, TokenKind::Session).unwrap();
        assert!(decode_token(&token, TokenKind::Session).is_ok());
        assert!(decode_token(&token, TokenKind::Api).is_err());
    }

    #[test]
    fn tampered_token_fails() {
        ensure_config();
        let token = encode_token(42, TokenKind::Api).unwrap();
        let mut chars: Vec<char> = token.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert!(decode_token(&tampered, TokenKind::Api).is_err());
    }

    #[test]
    fn expired_token_fails() {
        ensure_config();
        let config = get_config().unwrap();
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: "42".to_string(),
            exp: now - 3600,
            iat: now - 7200,
            token_type: "api".to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.api_secret.as_bytes()),
        )
        .unwrap();
        assert!(decode_token(&token, TokenKind::Api).is_err());
    }

    #[test]
    fn empty_token_fails() {
        ensure_config();
        assert!(decode_token("", TokenKind::Session).is_err());
    }
}
