use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// How long a session token issued by [`issue_session_token`] stays valid.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Session token claims shared with the main web app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Account role, e.g. STUDENT or ADMIN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Rank tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Issue an HS256 session token.
/// This server only verifies tokens; issuing lives here for tooling and tests.
pub fn issue_session_token(
    secret: &[u8],
    user_id: &str,
    role: Option<&str>,
    rank: Option<&str>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.map(str::to_string),
        rank: rank.map(str::to_string),
        iat: now.timestamp(),
        exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

/// Validate a session token: signature, algorithm and expiry.
pub fn validate_session_token(
    secret: &[u8],
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}
