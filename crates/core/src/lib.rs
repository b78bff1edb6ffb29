//! Showcase business logic.
//!
//! Services in this crate turn generic forum threads, reports and reactions
//! into a moderated project showcase. They reach the forum only through
//! [`showcase_forum::ForumGateway`].

pub mod services;

pub use services::*;
