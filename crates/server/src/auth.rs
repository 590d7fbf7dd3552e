// crates/server/src/auth.rs
//! HTTP Basic authentication against `api.username` / `api.password`.
//!
//! `user` and `pass` query parameters override the header so ClickHouse
//! `URL` table engines, which cannot send headers, can authenticate.

use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::state::AppState;

const CHALLENGE: &str = "Basic realm=\"Provide username and password\"";

#[derive(Debug, Default, Deserialize)]
struct CredentialQuery {
    user: Option<String>,
    pass: Option<String>,
}

/// Username and password from an `Authorization: Basic` header. Missing or
/// malformed headers yield empty strings.
fn basic_credentials(headers: &HeaderMap) -> (String, String) {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .and_then(|pair| {
            pair.split_once(':')
                .map(|(user, pass)| (user.to_string(), pass.to_string()))
        })
        .unwrap_or_default()
}

pub async fn require_credentials(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let config = state.config.current();
    let (mut user, mut pass) = basic_credentials(req.headers());
    let query = Query::<CredentialQuery>::try_from_uri(req.uri())
        .map(|Query(q)| q)
        .unwrap_or_default();
    if let Some(u) = query.user {
        user = u;
    }
    if let Some(p) = query.pass {
        pass = p;
    }

    if user != config.api.username || pass != config.api.password {
        tracing::warn!(path = %req.uri().path(), %user, "Unauthorized request");
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, CHALLENGE)],
            "401 Unauthorized\n",
        )
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_basic_credentials_decoded() {
        let encoded = STANDARD.encode("admin:s3cr:et");
        let (user, pass) = basic_credentials(&headers_with(&format!("Basic {encoded}")));
        assert_eq!(user, "admin");
        assert_eq!(pass, "s3cr:et");
    }

    #[test]
    fn test_malformed_header_is_empty() {
        assert_eq!(basic_credentials(&headers_with("Bearer abc")), (String::new(), String::new()));
        assert_eq!(basic_credentials(&headers_with("Basic !!!")), (String::new(), String::new()));
        assert_eq!(basic_credentials(&HeaderMap::new()), (String::new(), String::new()));
    }
}
