//! Showcase services.

#![allow(missing_docs)]

pub mod listing_cache;
pub mod pagination;
pub mod session;
pub mod showcase_data;
pub mod submission;
pub mod voting;

pub use listing_cache::ListingCache;
pub use pagination::drain_pages;
pub use session::{
    AuthSession, LoginRequest, RegisterRequest, SessionService, Viewer, require_admin,
    require_viewer,
};
pub use showcase_data::{
    ANONYMOUS_AUTHOR, ImageUpload, SUBMISSION_TYPE, ShowcaseData, Submission, SubmissionStatus,
    to_submission, with_status,
};
pub use submission::{
    CreateSubmissionInput, CreatedSubmission, ReconcileSummary, SubmissionService,
};
pub use voting::{VoteOutcome, VoteResult, VotingService};
