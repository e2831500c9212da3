use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::config::JwtConfig;
use crate::error::AppError;

use super::Claims;

/// Leeway for `exp`/`iat` checks, in seconds.
const CLOCK_SKEW_SECS: u64 = 30;

/// HS256 bearer token validation for user and service callers.
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_SECS;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(ref audience) = config.audience {
            validation.set_audience(&[audience]);
        }

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?
            .claims;

        if claims.sub.is_empty() {
            return Err(AppError::Auth("Token has no subject".to_string()));
        }
        Ok(claims)
    }

    /// Validate an `Authorization` header value of the form `Bearer <token>`.
    pub fn validate_bearer(&self, header: &str) -> Result<Claims, AppError> {
        match header.strip_prefix("Bearer ") {
            Some(token) => self.validate(token.trim()),
            None => Err(AppError::Auth("Expected a Bearer token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn create_test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            issuer: None,
            audience: None,
        }
    }

    fn create_test_token(sub: &str, secret: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: chrono::Utc::now().timestamp(),
            roles: vec!["user".to_string()],
            extra: Default::default(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_bearer_token() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);

        let token = create_test_token("user-123", &config.secret);
        let claims = validator
            .validate_bearer(&format!("Bearer {}", token))
            .unwrap();
        assert_eq!(claims.user_id(), "user-123");
        assert!(claims.has_role("user"));
        assert!(!claims.is_service());
    }

    #[test]
    fn test_invalid_token() {
        let validator = JwtValidator::new(&create_test_config());

        assert!(validator.validate("invalid-token").is_err());
        assert!(validator.validate_bearer("Basic abc").is_err());

        let foreign = create_test_token("user-123", "another-secret");
        assert!(validator.validate(&foreign).is_err());
    }

    #[test]
    fn test_empty_subject_rejected() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);
        let token = create_test_token("", &config.secret);
        assert!(validator.validate(&token).is_err());
    }
}
