use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
}

/// Verifies HS256 access tokens signed with the shared secret
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let decoded =
            decode::<AccessClaims>(token, &self.key, &self.validation).map_err(|error| {
                AppError::unauthorized(format!("Token validation failed: {}", sanitize(&error)))
            })?;

        let user_id = decoded.claims.sub.trim();
        if user_id.is_empty() {
            return Err(AppError::unauthorized("Token subject is missing"));
        }

        Ok(AuthenticatedUser {
            user_id: user_id.to_string(),
        })
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }
    Ok(token)
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        exp: i64,
    }

    /// Sign a token for `sub` that expires `ttl_secs` from now
    pub(crate) fn sign(secret: &str, sub: &str, ttl_secs: i64) -> String {
        let claims = TestClaims {
            sub,
            exp: chrono::Utc::now().timestamp() + ttl_secs,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn bearer_token_extractor_accepts_standard_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn bearer_token_extractor_rejects_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
    }

    #[test]
    fn verifier_accepts_valid_token() {
        let verifier = JwtVerifier::new("secret");
        let user = verifier
            .verify_access_token(&sign("secret", "user-1", 300))
            .unwrap();
        assert_eq!(user.user_id, "user-1");
    }

    #[test]
    fn verifier_rejects_wrong_secret_and_expired_tokens() {
        let verifier = JwtVerifier::new("secret");
        assert!(verifier
            .verify_access_token(&sign("other", "user-1", 300))
            .is_err());
        assert!(verifier
            .verify_access_token(&sign("secret", "user-1", -3_600))
            .is_err());
    }

    #[test]
    fn verifier_rejects_blank_subject() {
        let verifier = JwtVerifier::new("secret");
        let err = verifier
            .verify_access_token(&sign("secret", "  ", 300))
            .unwrap_err();
        assert!(err.to_string().contains("subject"));
    }
}
