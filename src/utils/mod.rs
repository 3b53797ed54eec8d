pub mod cookie;
pub mod jwt;
pub mod password;

pub use jwt::{decode_token, encode_token, TokenKind};
pub use password::{hash_password, validate_password, verify_password};
