use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/login` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[allow(dead_code)]
    #[serde(default)]
    pub status: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// `POST /api/auth/register` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[allow(dead_code)]
    #[serde(default)]
    pub status: Option<String>,
    pub id: String,
}

/// `GET /api/auth/profile` payload. The profile doubles as the token
/// validation call, so it is the source of truth for identity.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub equipped_items: Vec<String>,
    #[serde(default)]
    pub closet: Vec<String>,
}

/// Identity held by the session store. The id is unknown between a raw
/// login and the next profile fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Unverified claims peeked out of a signed token's payload segment.
/// Display-only: nothing here is trusted beyond showing the user what
/// their own token says.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Decode the middle segment of a three-part token without verifying
/// the signature. Returns `None` for anything that is not base64url
/// JSON in the expected place.
pub fn peek_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::peek_claims;

    #[test]
    fn peeks_expiry_from_payload_segment() {
        // {"sub":"42","exp":2000000000}
        let payload = "eyJzdWIiOiI0MiIsImV4cCI6MjAwMDAwMDAwMH0";
        let token = format!("header.{payload}.sig");

        let claims = peek_claims(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(claims.exp, Some(2_000_000_000));
        assert!(claims.expires_at().is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(peek_claims("not-a-token").is_none());
        assert!(peek_claims("a.!!!.c").is_none());
    }
}
