use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use storefront_types::auth::{Claims, Principal, RoleFlags};

/// Process-wide signing configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    /// Lifetime of tokens handed out at login and registration.
    pub token_lifetime: Duration,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("invalid or expired token")]
    Invalid,
}

pub struct TokenIssuer {
    config: AuthConfig,
}

impl TokenIssuer {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issue a token with the configured default lifetime.
    pub fn access_token(&self, username: &str, user_id: i64, roles: RoleFlags) -> Result<String, TokenError> {
        self.issue(username, user_id, roles, self.config.token_lifetime)
    }

    pub fn issue(
        &self,
        username: &str,
        user_id: i64,
        roles: RoleFlags,
        lifetime: Duration,
    ) -> Result<String, TokenError> {
        self.issue_at(username, user_id, roles, lifetime, Utc::now())
    }

    /// `exp` is `now + lifetime` floored to whole seconds.
    pub fn issue_at(
        &self,
        username: &str,
        user_id: i64,
        roles: RoleFlags,
        lifetime: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let key = self.signing_key()?;
        let exp = now
            .checked_add_signed(lifetime)
            .ok_or_else(|| TokenError::Signing("expiry out of range".into()))?
            .timestamp();

        let claims = Claims {
            sub: username.to_string(),
            id: user_id,
            is_admin: roles.is_admin,
            is_supplier: roles.is_supplier,
            is_customer: roles.is_customer,
            exp,
        };

        encode(&Header::new(self.config.algorithm), &claims, &key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature and expiry, then hand back the caller's identity.
    pub fn verify(&self, token: &str) -> Result<Principal, TokenError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &Validation::new(self.config.algorithm),
        )
        .map_err(|_| TokenError::Invalid)?;

        Ok(data.claims.into())
    }

    fn signing_key(&self) -> Result<EncodingKey, TokenError> {
        if self.config.secret.is_empty() {
            return Err(TokenError::Signing("signing secret is not configured".into()));
        }
        if !is_hmac(self.config.algorithm) {
            return Err(TokenError::Signing(format!(
                "algorithm {:?} is not a symmetric HMAC algorithm",
                self.config.algorithm
            )));
        }
        Ok(EncodingKey::from_secret(self.config.secret.as_bytes()))
    }
}

pub fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}
