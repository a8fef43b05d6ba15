use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::SecurityConfig;
use crate::types::{Principal, Role, TenantId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<TenantId>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(principal: &Principal, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: principal.id,
            email: principal.email.clone(),
            role: principal.role,
            name: principal.name.clone(),
            school_id: principal.school_id,
            exp,
            iat: now.timestamp(),
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            id: self.sub,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            school_id: self.school_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    InvalidSecret,
}

pub fn generate_jwt(claims: &Claims, security: &SecurityConfig) -> Result<String, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(security.jwt_secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Verify signature and expiry, returning the embedded claims
pub fn decode_jwt(token: &str, security: &SecurityConfig) -> Result<Claims, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;
    Ok(token_data.claims)
}

/// Mint a token for `principal` using the configured expiry
pub fn issue_token(principal: &Principal, security: &SecurityConfig) -> Result<String, JwtError> {
    generate_jwt(&Claims::new(principal, security.jwt_expiry_hours), security)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn security(secret: &str) -> SecurityConfig {
        SecurityConfig {
            jwt_secret: secret.to_string(),
            jwt_expiry_hours: 24,
            cors_origins: vec![],
        }
    }

    fn teacher() -> Principal {
        Principal {
            id: 7,
            email: "prof@escola.com".to_string(),
            name: Some("Prof".to_string()),
            role: Role::Teacher,
            school_id: Some(20),
        }
    }

    #[test]
    fn token_carries_principal() {
        let security = security("test-secret");
        let token = issue_token(&teacher(), &security).unwrap();
        let claims = decode_jwt(&token, &security).unwrap();
        assert_eq!(claims.principal(), teacher());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(&teacher(), &security("one")).unwrap();
        assert!(matches!(decode_jwt(&token, &security("two")), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(issue_token(&teacher(), &security("")), Err(JwtError::InvalidSecret)));
    }
}
