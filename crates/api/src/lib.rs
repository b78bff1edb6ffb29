//! HTTP API layer for showcase-rs.
//!
//! - **Endpoints**: sign-in, submissions, moderation
//! - **Extractors**: signed-in and optional viewers
//! - **Middleware**: resolves the caller from a bearer header or session cookie
//!
//! Built on Axum 0.8. Every success body is wrapped as `{"data": ...}`; errors
//! render through [`showcase_common::AppError`].

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
