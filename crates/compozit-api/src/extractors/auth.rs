//! Caller identity extractor.
//!
//! Authentication happens upstream; the gateway forwards the resolved user
//! id in a configurable header (`server.identity_header`).

use std::ops::Deref;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use compozit_core::error::AppError;
use compozit_core::types::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// The identified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl Deref for AuthUser {
    type Target = UserId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers, &state.config.server.identity_header)
            .map(AuthUser)
            .ok_or_else(|| AppError::unauthorized("Missing caller identity").into())
    }
}

/// Reads a non-blank identity from `header`.
pub fn identity_from_headers(headers: &HeaderMap, header: &str) -> Option<UserId> {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(UserId::from)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_identity_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(identity_from_headers(&headers, "x-user-id"), None);

        headers.insert("x-user-id", HeaderValue::from_static("   "));
        assert_eq!(identity_from_headers(&headers, "x-user-id"), None);

        headers.insert("x-user-id", HeaderValue::from_static(" alice "));
        assert_eq!(
            identity_from_headers(&headers, "x-user-id"),
            Some(UserId::from("alice"))
        );
        assert_eq!(identity_from_headers(&headers, "x-other"), None);
    }
}
