//! Forum backend gateway for showcase-rs.
//!
//! Every piece of persistent state (users, threads, moderation reports,
//! reactions) lives in an external forum service. This crate is the only
//! channel to it:
//!
//! - **Models**: wire types for threads, reports, reactions and users
//! - **Gateway**: the [`ForumGateway`] trait consumed by the core services
//! - **HTTP client**: [`HttpForumClient`], the reqwest-backed gateway
//! - **In-memory gateway**: [`InMemoryForum`] (feature `test-utils`)

pub mod gateway;
pub mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod models;

pub use gateway::{ForumGateway, SharedGateway};
pub use http::HttpForumClient;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryForum;
pub use models::{
    AuthToken, ForumUser, LoginInput, NewReport, NewThread, Page, Reaction, ReactionKind,
    RegisterInput, Report, ReportQuery, ReportStatus, Thread, ThreadQuery,
};
