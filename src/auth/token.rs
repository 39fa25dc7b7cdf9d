use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::models::AuthUser;

const BEARER_PREFIX: &str = "Bearer ";
const DEFAULT_EXPIRATION_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Malformed, tampered, wrongly signed and expired tokens all land here.
    #[error("invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: AuthUser,
    pub exp: i64,
    pub iat: i64,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiration: TimeDelta,
}

impl TokenService {
    pub fn new(secret: &str, expiration_hours: i64) -> Self {
        let hours = if expiration_hours > 0 {
            expiration_hours
        } else {
            DEFAULT_EXPIRATION_HOURS
        };

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            expiration: TimeDelta::try_hours(hours)
                .unwrap_or_else(|| TimeDelta::hours(DEFAULT_EXPIRATION_HOURS)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, config.jwt_expiration_hours)
    }

    pub fn issue(&self, user: &AuthUser) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.expiration)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = Claims {
            user: user.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Signing)
    }

    /// Accepts the raw token or a full `Bearer <token>` header value.
    pub fn verify(&self, token: &str) -> Result<AuthUser, TokenError> {
        let token = token.trim();
        let token = token.strip_prefix(BEARER_PREFIX).unwrap_or(token).trim();

        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.user)
            .map_err(|e| {
                tracing::debug!(reason = ?e.kind(), "token rejected");
                TokenError::Invalid(e)
            })
    }
}
