//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use showcase_common::config::SessionConfig;
use showcase_core::{SessionService, SubmissionService, VotingService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub submission_service: SubmissionService,
    pub voting_service: VotingService,
    pub session_service: SessionService,
    pub session_config: SessionConfig,
}

/// Token from an `Authorization: Bearer` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware.
///
/// Resolves the caller and stores the [`showcase_core::Viewer`] in the
/// request extensions. A bearer header wins over the session cookie.
/// Requests that carry neither, or a credential the forum rejects, go on
/// anonymously.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = bearer_token(req.headers()).map(ToString::to_string).or_else(|| {
        CookieJar::from_headers(req.headers())
            .get(&state.session_config.cookie_name)
            .map(|cookie| cookie.value().to_string())
    });

    if let Some(viewer) = state.session_service.resolve(token.as_deref()).await {
        req.extensions_mut().insert(viewer);
    }

    next.run(req).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(bearer_token(&headers).is_none());
    }
}
