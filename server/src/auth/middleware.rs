use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::auth::jwt::validate_session_token;

/// Cookie the web app stores its session token in.
pub const SESSION_COOKIE: &str = "tanq_token";

/// Authenticated caller, resolved from `Authorization: Bearer` or the session cookie.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Option<String>,
    pub rank: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing session token")]
    MissingToken,

    #[error("invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("session token has no subject")]
    EmptySubject,

    #[error("JWT secret not installed on request")]
    MissingSecret,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingSecret => {
                tracing::error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            _ => {
                tracing::debug!(error = %self, "Rejecting unauthenticated request");
                (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
            }
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AuthError::MissingToken)?;

        // Get JWT secret from request extensions (set by middleware layer)
        let jwt_secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or(AuthError::MissingSecret)?;

        let claims = validate_session_token(&jwt_secret.0, &token)?;
        if claims.sub.is_empty() {
            return Err(AuthError::EmptySubject);
        }

        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
            rank: claims.rank,
        })
    }
}

/// A Bearer header wins over the cookie, even when the header token is bad.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// JWT secret stored in request extensions for the AuthUser extractor
#[derive(Clone)]
pub struct JwtSecret(pub Vec<u8>);
