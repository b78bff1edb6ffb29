//! Forum gateway abstraction.
//!
//! The core services talk to the forum backend only through this trait, so
//! they can run against the HTTP client in production and an in-memory
//! double in tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use showcase_common::AppResult;

use crate::models::{
    AuthToken, ForumUser, LoginInput, NewReport, NewThread, Page, Reaction, ReactionKind,
    RegisterInput, Report, ReportQuery, ReportStatus, Thread, ThreadQuery,
};

/// Channel to the forum backend.
///
/// An implementation is bound to the instance API key and is constructed
/// once per process. The caller's bearer token, when there is one, is passed
/// per call so the same instance serves anonymous and signed-in requests.
#[async_trait]
pub trait ForumGateway: Send + Sync {
    // ========== Auth ==========

    /// Resolve the user owning `token`.
    async fn me(&self, token: &str) -> AppResult<ForumUser>;

    /// Exchange credentials for a token.
    async fn login(&self, input: LoginInput) -> AppResult<AuthToken>;

    /// Create a new account.
    async fn register(&self, input: RegisterInput) -> AppResult<ForumUser>;

    // ========== Threads ==========

    /// Create a thread authored by the token's user.
    async fn create_thread(&self, token: Option<&str>, input: NewThread) -> AppResult<Thread>;

    /// List threads, newest first, optionally restricted to one author.
    async fn list_threads(&self, token: Option<&str>, query: ThreadQuery)
    -> AppResult<Page<Thread>>;

    /// Fetch one thread.
    async fn retrieve_thread(&self, token: Option<&str>, id: &str) -> AppResult<Thread>;

    /// Replace a thread's extension data.
    async fn update_thread(
        &self,
        token: Option<&str>,
        id: &str,
        extended_data: Value,
    ) -> AppResult<Thread>;

    // ========== Reactions ==========

    /// List reactions on a thread.
    async fn list_reactions(
        &self,
        token: Option<&str>,
        thread_id: &str,
        cursor: Option<String>,
    ) -> AppResult<Page<Reaction>>;

    /// React to a thread as the token's user.
    async fn create_reaction(
        &self,
        token: Option<&str>,
        thread_id: &str,
        kind: ReactionKind,
    ) -> AppResult<Reaction>;

    /// Remove a reaction.
    async fn delete_reaction(
        &self,
        token: Option<&str>,
        thread_id: &str,
        reaction_id: &str,
    ) -> AppResult<()>;

    // ========== Reports ==========

    /// File a moderation report.
    async fn create_report(&self, token: Option<&str>, input: NewReport) -> AppResult<Report>;

    /// List reports, optionally filtered by status.
    async fn list_reports(&self, token: Option<&str>, query: ReportQuery)
    -> AppResult<Page<Report>>;

    /// Change a report's status.
    async fn update_report(
        &self,
        token: Option<&str>,
        id: &str,
        status: ReportStatus,
    ) -> AppResult<Report>;
}

/// Shared, process-wide gateway handle.
pub type SharedGateway = Arc<dyn ForumGateway>;
