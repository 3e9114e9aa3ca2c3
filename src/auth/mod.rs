use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::SecurityConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User document id
    pub sub: String,
    pub username: String,
    pub groups: Vec<String>,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(
        sub: String,
        username: String,
        groups: Vec<String>,
        permissions: Vec<String>,
        security: &SecurityConfig,
    ) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(security.jwt_expiry_hours as i64)).timestamp();

        Self {
            sub,
            username,
            groups,
            permissions,
            exp,
            iat: now.timestamp(),
        }
    }

    /// Seconds until expiry, as reported by the login endpoint
    pub fn expires_in(&self) -> i64 {
        (self.exp - self.iat).max(0)
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidToken(String),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
        }
    }
}

impl std::error::Error for JwtError {}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate signature and expiry, returning the claims
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

/// Unsalted SHA-256 hex digest. Kept for compatibility with existing user
/// documents; not a password-grade hash.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

pub fn verify_password(password: &str, digest: &str) -> bool {
    hash_password(password).eq_ignore_ascii_case(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, Environment};

    fn security() -> SecurityConfig {
        AppConfig::for_environment(Environment::Development).security
    }

    #[test]
    fn password_digest_is_sha256_hex() {
        assert_eq!(
            hash_password("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
        assert!(verify_password("password", &hash_password("password")));
        assert!(!verify_password("Password", &hash_password("password")));
    }

    #[test]
    fn token_round_trip() {
        let security = security();
        let claims = Claims::new(
            "abc123".into(),
            "agent1".into(),
            vec!["Talent Agents".into()],
            vec!["main_app.view_musician".into()],
            &security,
        );
        let token = generate_jwt(&claims, &security.jwt_secret).unwrap();
        let decoded = decode_jwt(&token, &security.jwt_secret).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.expires_in(), 7 * 24 * 3600);
    }

    #[test]
    fn rejects_wrong_secret_and_empty_secret() {
        let security = security();
        let claims = Claims::new("u".into(), "u".into(), vec![], vec![], &security);
        let token = generate_jwt(&claims, &security.jwt_secret).unwrap();
        assert!(matches!(decode_jwt(&token, "other"), Err(JwtError::InvalidToken(_))));
        assert!(matches!(generate_jwt(&claims, ""), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn rejects_expired_tokens() {
        let security = security();
        let mut claims = Claims::new("u".into(), "u".into(), vec![], vec![], &security);
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;
        let token = generate_jwt(&claims, &security.jwt_secret).unwrap();
        assert!(decode_jwt(&token, &security.jwt_secret).is_err());
    }
}
