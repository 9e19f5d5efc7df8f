//! Bearer token generation and verification
//!
//! Tokens are HS256-signed JWTs carrying the principal id and role, valid
//! for seven days. Keys are pre-computed once at startup and shared via
//! AppState; verification never surfaces an error to callers, only `None`.

use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::UserType;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal id)
    pub sub: String,
    /// Principal role: "farmer" or "admin"
    pub role: UserType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// The verified identity carried by a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaims {
    pub user_id: String,
    pub user_type: UserType,
}

/// Pre-computed signing keys, cached in AppState so no key derivation
/// happens per request.
#[derive(Clone)]
struct TokenKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl TokenKeys {
    fn new(secret: &str) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
        }
    }
}

/// Issues and verifies signed bearer tokens.
///
/// Create once at startup and clone freely; both keys are behind `Arc`.
#[derive(Clone)]
pub struct TokenService {
    keys: TokenKeys,
    expiry_days: i64,
}

impl TokenService {
    pub fn new(secret: &str, expiry_days: i64) -> Self {
        Self {
            keys: TokenKeys::new(secret),
            expiry_days,
        }
    }

    /// Generate a signed token asserting `(user_id, user_type)`.
    pub fn generate(&self, user_id: &str, user_type: UserType) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::days(self.expiry_days);

        let claims = Claims {
            sub: user_id.to_string(),
            role: user_type,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.keys.encoding)
            .map_err(|e| anyhow::anyhow!("Failed to generate token: {}", e))
    }

    /// Verify a token. Returns `None` on any failure: bad signature,
    /// malformed input, or expiry.
    pub fn verify(&self, token: &str) -> Option<AuthClaims> {
        decode::<Claims>(token, &self.keys.decoding, &Validation::default())
            .ok()
            .map(|data| AuthClaims {
                user_id: data.claims.sub,
                user_type: data.claims.role,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> TokenService {
        TokenService::new("test-secret", 7)
    }

    #[test]
    fn test_generate_and_verify_roundtrip() {
        let service = create_test_service();

        let token = service.generate("farmer-1", UserType::Farmer).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.user_id, "farmer-1");
        assert_eq!(claims.user_type, UserType::Farmer);
    }

    #[test]
    fn test_admin_role_survives_roundtrip() {
        let service = create_test_service();

        let token = service.generate("admin-1", UserType::Admin).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.user_type, UserType::Admin);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let service = create_test_service();
        assert!(service.verify("garbage").is_none());
        assert!(service.verify("a.b.c").is_none());
        assert!(service.verify("").is_none());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let service = create_test_service();
        let other = TokenService::new("another-secret", 7);

        let token = other.generate("farmer-1", UserType::Farmer).unwrap();
        assert!(service.verify(&token).is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = create_test_service();

        // Hand-craft claims aged past the 7-day window.
        let now = Utc::now();
        let claims = Claims {
            sub: "farmer-1".to_string(),
            role: UserType::Farmer,
            iat: (now - Duration::days(8)).timestamp(),
            exp: (now - Duration::days(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(service.verify(&token).is_none());
    }

    #[test]
    fn test_service_is_clone_cheap() {
        let service = create_test_service();
        let _cloned = service.clone(); // Should be cheap due to Arc
    }
}
