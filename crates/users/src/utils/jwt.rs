//! JWT (JSON Web Token) utilities for authentication.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use matchmaker_config::AuthConfig;
use matchmaker_database::{User, UserRole};
use serde::{Deserialize, Serialize};

use crate::types::UserError;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,     // Subject (user public id)
    pub uid: i64,        // Internal user id
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
    pub nbf: usize,
    pub iss: String,
    pub aud: String,
    pub jti: String,
}

/// A freshly signed token and the moment it stops being accepted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    token_duration: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: String, audience: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            token_duration: Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.issuer.clone(), config.audience.clone())
            .with_duration(Duration::from_secs(config.token_ttl_seconds))
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.token_duration = duration;
        self
    }

    pub fn generate_token(&self, user: &User) -> Result<IssuedToken, UserError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| UserError::TokenCreationFailed("system time before unix epoch".to_string()))?;
        let exp = now + self.token_duration;

        let claims = Claims {
            sub: user.public_id.clone(),
            uid: user.id,
            role: user.role,
            exp: exp.as_secs() as usize,
            iat: now.as_secs() as usize,
            nbf: now.as_secs() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| UserError::TokenCreationFailed(err.to_string()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(exp.as_secs() as i64, 0)
            .ok_or_else(|| UserError::TokenCreationFailed("expiry out of range".to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate signature, issuer, audience and expiry and return the claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, UserError> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|err| UserError::InvalidToken(err.to_string()))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchmaker_database::{UserSource, UserStatus};

    fn manager() -> JwtManager {
        JwtManager::new(
            "test_secret_key_that_is_long_enough_for_hs256",
            "test_issuer".to_string(),
            "test_audience".to_string(),
        )
    }

    fn user() -> User {
        User {
            id: 42,
            public_id: "usr_abc".into(),
            email: "noa@example.com".into(),
            password_hash: None,
            first_name: "Noa".into(),
            last_name: "Cohen".into(),
            phone: None,
            role: UserRole::Matchmaker,
            status: UserStatus::Active,
            is_verified: true,
            is_phone_verified: true,
            is_profile_complete: false,
            source: UserSource::Registration,
            language: "he".into(),
            marketing_consent: false,
            terms_accepted_at: None,
            last_login_at: None,
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn test_token_generation_and_validation() {
        let jwt = manager();
        let issued = jwt.generate_token(&user()).unwrap();
        assert!(!issued.token.is_empty());
        assert!(issued.expires_at > Utc::now());

        let claims = jwt.validate_token(&issued.token).unwrap();
        assert_eq!(claims.sub, "usr_abc");
        assert_eq!(claims.uid, 42);
        assert_eq!(claims.role, UserRole::Matchmaker);
        assert_eq!(claims.iss, "test_issuer");
        assert_eq!(claims.aud, "test_audience");
    }

    #[test]
    fn test_invalid_token() {
        assert!(manager().validate_token("invalid.jwt.token").is_err());
    }

    #[test]
    fn test_token_from_other_audience_is_rejected() {
        let other = JwtManager::new(
            "test_secret_key_that_is_long_enough_for_hs256",
            "test_issuer".to_string(),
            "someone_else".to_string(),
        );
        let issued = other.generate_token(&user()).unwrap();
        assert!(matches!(manager().validate_token(&issued.token), Err(UserError::InvalidToken(_))));
    }
}
