// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session id extractor.
//!
//! Clients carry their session in the `x-session-id` header. A missing or
//! unusable header yields `SessionId(None)`; handlers decide whether that is
//! an error (signing) or a reason to mint a new id (provisioning).
//!
//! ## Usage
//!
//! ```rust,ignore
//! async fn my_handler(session: SessionId) -> impl IntoResponse {
//!     let id = session.or_new();
//!     // ...
//! }
//! ```

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Longest session id accepted.
pub const MAX_SESSION_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub Option<String>);

impl SessionId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// The caller's id, or a fresh UUID v4 when none was sent.
    pub fn or_new(self) -> String {
        self.0
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| is_valid_session_id(id))
            .map(str::to_string);
        Ok(SessionId(id))
    }
}

/// Non-empty, bounded, printable ASCII without spaces.
fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_SESSION_ID_LEN && id.bytes().all(|b| b.is_ascii_graphic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> SessionId {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = header {
            builder = builder.header(SESSION_HEADER, value);
        }
        let mut parts = builder.body(()).unwrap().into_parts().0;
        SessionId::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_header() {
        assert_eq!(
            extract(Some("sess-123")).await,
            SessionId(Some("sess-123".to_string()))
        );
    }

    #[tokio::test]
    async fn missing_or_invalid_header_is_none() {
        assert_eq!(extract(None).await, SessionId(None));
        assert_eq!(extract(Some("")).await, SessionId(None));
        assert_eq!(extract(Some("has space")).await, SessionId(None));
        let long = "a".repeat(MAX_SESSION_ID_LEN + 1);
        assert_eq!(extract(Some(&long)).await, SessionId(None));
    }

    #[test]
    fn or_new_keeps_existing_id() {
        assert_eq!(SessionId(Some("abc".to_string())).or_new(), "abc");
        let minted = SessionId(None).or_new();
        assert!(uuid::Uuid::parse_str(&minted).is_ok());
    }
}
