//! Authentication endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Serialize;
use showcase_common::{AppResult, config::SessionConfig};
use showcase_core::{AuthSession, LoginRequest, RegisterRequest, Viewer};

use crate::{extractors::MaybeAuthUser, middleware::AppState, response::ApiResponse};

/// Session response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub user: Viewer,
}

/// Build the HTTP-only cookie carrying the forum token.
fn session_cookie(config: &SessionConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookie)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(config.max_age_days))
        .build()
}

fn start_session(
    config: &SessionConfig,
    jar: CookieJar,
    session: AuthSession,
) -> (CookieJar, SessionResponse) {
    let jar = jar.add(session_cookie(config, session.token.clone()));
    (
        jar,
        SessionResponse {
            token: session.token,
            user: session.viewer,
        },
    )
}

/// Sign in with username or email.
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> AppResult<(CookieJar, ApiResponse<SessionResponse>)> {
    let session = state.session_service.login(req).await?;
    tracing::info!(user_id = %session.viewer.id, "Signed in");

    let (jar, body) = start_session(&state.session_config, jar, session);
    Ok((jar, ApiResponse::ok(body)))
}

/// Create an account and sign it in.
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(CookieJar, ApiResponse<SessionResponse>)> {
    let session = state.session_service.register(req).await?;

    let (jar, body) = start_session(&state.session_config, jar, session);
    Ok((jar, ApiResponse::created(body)))
}

/// Signout response.
#[derive(Serialize)]
pub struct SignoutResponse {
    pub ok: bool,
}

/// Sign out by dropping the session cookie.
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, ApiResponse<SignoutResponse>) {
    let jar = jar.remove(Cookie::build((state.session_config.cookie_name.clone(), "")).path("/"));
    (jar, ApiResponse::ok(SignoutResponse { ok: true }))
}

/// The current viewer, or `null` when signed out.
async fn me(MaybeAuthUser(viewer): MaybeAuthUser) -> ApiResponse<Option<Viewer>> {
    ApiResponse::ok(viewer)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/me", get(me))
}
