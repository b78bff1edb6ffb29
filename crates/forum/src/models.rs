//! Wire models of the forum backend.
//!
//! These mirror the JSON the forum API speaks (camelCase). They are generic
//! forum records; showcase semantics are layered on top by the core crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque cursor for the next page; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no continuation.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// A forum account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Token returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
}

/// Credentials for `auth.login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    /// Username or email.
    pub login: String,
    pub password: String,
}

/// Fields for `auth.register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A forum thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// Free-form key/value bag persisted alongside the thread.
    #[serde(default)]
    pub extended_data: Value,
}

/// Payload for `threads.create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub title: String,
    pub body: String,
    pub extended_data: Value,
}

/// Query for `threads.list`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub limit: u32,
    /// Restrict to threads authored by this user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Reaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
    #[serde(other)]
    Other,
}

/// A reaction left by a user on a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
}

/// Moderation report status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Other,
}

impl ReportStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Other => "other",
        }
    }
}

/// A moderation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(rename = "type", default)]
    pub report_type: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// Payload for `reports.create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub thread_id: String,
    #[serde(rename = "type")]
    pub report_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ReportStatus,
}

/// Query for `reports.list`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    pub limit: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_thread_without_extended_data_decodes() {
        let thread: Thread = serde_json::from_value(json!({
            "id": "t1",
            "title": "Hello",
            "userId": "u1",
            "createdAt": "2025-01-01T00:00:00Z",
        }))
        .unwrap();
        assert!(thread.extended_data.is_null());
        assert!(thread.body.is_empty());
    }

    #[test]
    fn test_unknown_statuses_and_kinds_do_not_fail() {
        let report: Report = serde_json::from_value(json!({
            "id": "r1",
            "threadId": "t1",
            "type": "spam",
            "status": "escalated",
            "createdAt": "2025-01-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(report.status, ReportStatus::Other);

        let reaction: Reaction = serde_json::from_value(json!({
            "id": "x1",
            "userId": "u1",
            "type": "heart",
        }))
        .unwrap();
        assert_eq!(reaction.kind, ReactionKind::Other);
    }

    #[test]
    fn test_page_cursor_is_optional() {
        let page: Page<Reaction> = serde_json::from_value(json!({ "items": [] })).unwrap();
        assert!(page.next_cursor.is_none());
    }
}
