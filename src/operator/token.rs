use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, instrument};

use super::types::OperatorClaims;
use crate::shared::AppError;

/// Signs and checks operator tokens
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    pub expiration_hours: i64,
}

impl TokenConfig {
    pub fn new() -> Self {
        let expiration_hours = std::env::var("OPERATOR_TOKEN_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(12);

        Self {
            secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "your-secret-key-change-in-production".to_string()),
            expiration_hours,
        }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours: 12,
        }
    }

    #[instrument(skip(self, claims), fields(operator = %claims.sub))]
    pub fn create_token(&self, claims: &OperatorClaims) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = OperatorClaims {
            exp: (now + Duration::hours(self.expiration_hours)).timestamp() as usize,
            iat: now.timestamp() as usize,
            ..claims.clone()
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| {
            debug!(error = %e, "Failed to encode operator token");
            AppError::JwtError(e.to_string())
        })
    }

    #[instrument(skip(self, token))]
    pub fn validate_token(&self, token: &str) -> Result<OperatorClaims, AppError> {
        decode::<OperatorClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| {
            debug!(
                operator = %data.claims.sub,
                can_manage_pbis = data.claims.can_manage_pbis,
                is_super_admin = data.claims.is_super_admin,
                "Operator token decoded"
            );
            data.claims
        })
        .map_err(|e| {
            debug!(error = %e, "Failed to decode operator token");
            AppError::Unauthorized(e.to_string())
        })
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new()
    }
}
