use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::MatchError;
use crate::models::{UserId, UserRole};
use crate::routes::matches::AppState;

/// JWT claims issued by the platform's auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: UserRole,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Verifies HS256 bearer tokens
#[derive(Clone)]
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Sign a token for `user_id`, valid for `ttl`
    ///
    /// Tokens are normally issued elsewhere; this is used by tooling and tests.
    pub fn issue(
        &self,
        user_id: UserId,
        role: UserRole,
        ttl: chrono::Duration,
    ) -> Result<String, MatchError> {
        let claims = Claims {
            sub: user_id,
            role,
            exp: (chrono::Utc::now() + ttl).timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| MatchError::Unauthorized(format!("failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, MatchError> {
        let mut validation = Validation::default();
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| MatchError::Unauthorized(format!("invalid token: {}", e)))
    }
}

/// The caller identified by the request's bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn require_admin(&self) -> Result<(), MatchError> {
        if self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(MatchError::Forbidden("administrator role required".to_string()))
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = MatchError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, MatchError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| MatchError::Unauthorized("authentication is not configured".to_string()))?;

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| MatchError::Unauthorized("missing bearer token".to_string()))?;

    let claims = state.jwt.verify(token.trim())?;

    Ok(AuthenticatedUser {
        id: claims.sub,
        role: claims.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_issue_and_verify() {
        let verifier = JwtVerifier::new("test_secret", Some("travel".to_string()));
        let user_id = Uuid::new_v4();

        let token = verifier
            .issue(user_id, UserRole::Admin, chrono::Duration::hours(1))
            .unwrap();
        let claims = verifier.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let issuer = JwtVerifier::new("secret1", None);
        let verifier = JwtVerifier::new("secret2", None);

        let token = issuer
            .issue(Uuid::new_v4(), UserRole::User, chrono::Duration::hours(1))
            .unwrap();

        assert!(matches!(
            verifier.verify(&token),
            Err(MatchError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let verifier = JwtVerifier::new("secret", None);
        let token = verifier
            .issue(Uuid::new_v4(), UserRole::User, chrono::Duration::hours(-2))
            .unwrap();

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_require_admin() {
        let user = AuthenticatedUser {
            id: Uuid::new_v4(),
            role: UserRole::User,
        };
        assert!(matches!(user.require_admin(), Err(MatchError::Forbidden(_))));
    }
}
