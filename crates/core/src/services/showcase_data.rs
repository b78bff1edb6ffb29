//! Showcase submissions on top of generic forum threads.
//!
//! A thread is a showcase submission when its extension data carries
//! `type: "showcase_submission"`. Everything else about the submission
//! (images, cover index, project link, moderation status, author name
//! snapshot) also lives in that bag. The bag is free-form and written by
//! other clients too, so it is decoded here once, field by field, with a
//! default for anything missing or malformed, and never trusted beyond
//! this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use showcase_forum::{Report, ReportStatus, Thread};
use validator::Validate;

/// Extension-data type marker of showcase threads and their reports.
pub const SUBMISSION_TYPE: &str = "showcase_submission";

/// Author name used when the snapshot is missing.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

const KEY_TYPE: &str = "type";
const KEY_IMAGES: &str = "images";
const KEY_MAIN_IMAGE_INDEX: &str = "mainImageIndex";
const KEY_PROJECT_URL: &str = "projectUrl";
const KEY_STATUS: &str = "status";
const KEY_AUTHOR_NAME: &str = "authorName";

/// An uploaded image referenced by a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ImageUpload {
    #[validate(url(message = "must be a valid URL"))]
    pub url: String,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub name: String,
}

/// Moderation state of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl From<SubmissionStatus> for ReportStatus {
    fn from(status: SubmissionStatus) -> Self {
        match status {
            SubmissionStatus::Pending => Self::Pending,
            SubmissionStatus::Approved => Self::Approved,
            SubmissionStatus::Rejected => Self::Rejected,
        }
    }
}

/// A showcase submission as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub description: String,
    pub images: Vec<ImageUpload>,
    /// Always a valid index into `images`, or 0 when there are none.
    pub main_image_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,
    pub author_id: String,
    pub author_name: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    /// Open moderation report, only set on the moderation queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    /// Live count of like reactions.
    pub upvotes: u64,
}

impl Submission {
    /// The cover image, if the submission has any image.
    #[must_use]
    pub fn main_image(&self) -> Option<&ImageUpload> {
        self.images
            .get(self.main_image_index)
            .or_else(|| self.images.first())
    }
}

/// Showcase fields carried in a thread's extension data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowcaseData {
    pub images: Vec<ImageUpload>,
    pub main_image_index: usize,
    pub project_url: Option<String>,
    pub status: SubmissionStatus,
    pub author_name: String,
}

impl Default for ShowcaseData {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            main_image_index: 0,
            project_url: None,
            status: SubmissionStatus::Pending,
            author_name: ANONYMOUS_AUTHOR.to_string(),
        }
    }
}

fn field<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Option<T> {
    object
        .get(key)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

impl ShowcaseData {
    /// Whether extension data marks its thread as a showcase submission.
    #[must_use]
    pub fn is_showcase(extended_data: &Value) -> bool {
        extended_data.get(KEY_TYPE).and_then(Value::as_str) == Some(SUBMISSION_TYPE)
    }

    /// Decode extension data, substituting defaults field by field.
    ///
    /// Never fails: a missing bag, a non-object bag, or a wrongly shaped
    /// field all fall back to the defaults.
    #[must_use]
    pub fn decode(extended_data: &Value) -> Self {
        let Some(object) = extended_data.as_object() else {
            return Self::default();
        };

        let images: Vec<ImageUpload> = field(object, KEY_IMAGES).unwrap_or_default();

        let main_image_index = field::<u64>(object, KEY_MAIN_IMAGE_INDEX)
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < images.len())
            .unwrap_or(0);

        let project_url = field::<String>(object, KEY_PROJECT_URL)
            .map(|u| u.trim().to_string())
            .filter(|u| url::Url::parse(u).is_ok());

        let status = field(object, KEY_STATUS).unwrap_or_default();

        let author_name = field::<String>(object, KEY_AUTHOR_NAME)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());

        Self {
            images,
            main_image_index,
            project_url,
            status,
            author_name,
        }
    }

    /// Encode into a fresh extension-data bag, type marker included.
    #[must_use]
    pub fn encode(&self) -> Value {
        let mut object = Map::new();
        object.insert(KEY_TYPE.to_string(), Value::from(SUBMISSION_TYPE));
        object.insert(
            KEY_IMAGES.to_string(),
            serde_json::to_value(&self.images).unwrap_or_else(|_| Value::Array(Vec::new())),
        );
        object.insert(
            KEY_MAIN_IMAGE_INDEX.to_string(),
            Value::from(self.main_image_index),
        );
        object.insert(
            KEY_PROJECT_URL.to_string(),
            Value::from(self.project_url.clone().unwrap_or_default()),
        );
        object.insert(KEY_STATUS.to_string(), Value::from(self.status.as_str()));
        object.insert(
            KEY_AUTHOR_NAME.to_string(),
            Value::from(self.author_name.clone()),
        );
        Value::Object(object)
    }
}

/// Copy of `extended_data` with only `status` replaced.
///
/// Every other key, including ones this crate does not know about, is kept.
/// Returns `None` when the bag is not an object, since such a thread cannot
/// be a showcase submission.
#[must_use]
pub fn with_status(extended_data: &Value, status: SubmissionStatus) -> Option<Value> {
    let mut object = extended_data.as_object()?.clone();
    object.insert(KEY_STATUS.to_string(), Value::from(status.as_str()));
    Some(Value::Object(object))
}

/// Build the client view of a thread, attaching the open report if given.
#[must_use]
pub fn to_submission(thread: &Thread, report: Option<&Report>) -> Submission {
    let data = ShowcaseData::decode(&thread.extended_data);
    Submission {
        id: thread.id.clone(),
        title: thread.title.clone(),
        description: thread.body.clone(),
        images: data.images,
        main_image_index: data.main_image_index,
        project_url: data.project_url,
        author_id: thread.user_id.clone(),
        author_name: data.author_name,
        status: data.status,
        created_at: thread.created_at,
        report_id: report.map(|r| r.id.clone()),
        upvotes: 0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thread(extended_data: Value) -> Thread {
        Thread {
            id: "t1".to_string(),
            title: "Demo".to_string(),
            body: "A ten-char desc".to_string(),
            user_id: "u1".to_string(),
            created_at: Utc::now(),
            extended_data,
        }
    }

    fn full_data() -> Value {
        json!({
            "type": "showcase_submission",
            "images": [
                {"url": "https://x/a.png", "name": "a.png"},
                {"url": "https://x/b.png", "name": "b.png"}
            ],
            "mainImageIndex": 1,
            "projectUrl": "https://github.com/example/demo",
            "status": "pending",
            "authorName": "Alice",
            "featured": true
        })
    }

    #[test]
    fn test_decode_full_data() {
        let data = ShowcaseData::decode(&full_data());
        assert_eq!(data.images.len(), 2);
        assert_eq!(data.main_image_index, 1);
        assert_eq!(
            data.project_url.as_deref(),
            Some("https://github.com/example/demo")
        );
        assert_eq!(data.status, SubmissionStatus::Pending);
        assert_eq!(data.author_name, "Alice");
    }

    #[test]
    fn test_decode_missing_bag_uses_defaults() {
        assert_eq!(ShowcaseData::decode(&Value::Null), ShowcaseData::default());
        assert_eq!(
            ShowcaseData::decode(&json!("garbage")),
            ShowcaseData::default()
        );
    }

    #[test]
    fn test_decode_wrong_shapes_fall_back_per_field() {
        let data = ShowcaseData::decode(&json!({
            "type": "showcase_submission",
            "images": "not-a-list",
            "mainImageIndex": "zero",
            "projectUrl": 42,
            "status": "archived",
            "authorName": ["x"]
        }));
        assert!(data.images.is_empty());
        assert_eq!(data.main_image_index, 0);
        assert!(data.project_url.is_none());
        assert_eq!(data.status, SubmissionStatus::Pending);
        assert_eq!(data.author_name, ANONYMOUS_AUTHOR);
    }

    #[test]
    fn test_out_of_range_main_image_index_falls_back_to_zero() {
        let mut value = full_data();
        value["mainImageIndex"] = json!(2);
        let submission = to_submission(&thread(value), None);
        assert_eq!(submission.main_image_index, 0);
        assert_eq!(submission.main_image().unwrap().name, "a.png");

        let mut value = full_data();
        value["mainImageIndex"] = json!(-1);
        assert_eq!(to_submission(&thread(value), None).main_image_index, 0);
    }

    #[test]
    fn test_main_image_of_imageless_submission() {
        let submission = to_submission(&thread(json!({"type": "showcase_submission"})), None);
        assert!(submission.main_image().is_none());
    }

    #[test]
    fn test_empty_or_malformed_project_url_is_absent() {
        let mut value = full_data();
        value["projectUrl"] = json!("");
        assert!(ShowcaseData::decode(&value).project_url.is_none());

        value["projectUrl"] = json!("not a url");
        assert!(ShowcaseData::decode(&value).project_url.is_none());
    }

    #[test]
    fn test_is_showcase() {
        assert!(ShowcaseData::is_showcase(&full_data()));
        assert!(!ShowcaseData::is_showcase(&json!({"type": "discussion"})));
        assert!(!ShowcaseData::is_showcase(&Value::Null));
    }

    #[test]
    fn test_to_submission_attaches_report() {
        let report = Report {
            id: "r1".to_string(),
            thread_id: Some("t1".to_string()),
            post_id: None,
            report_type: SUBMISSION_TYPE.to_string(),
            description: None,
            status: ReportStatus::Pending,
            created_at: Utc::now(),
        };
        let submission = to_submission(&thread(full_data()), Some(&report));
        assert_eq!(submission.report_id.as_deref(), Some("r1"));
        assert_eq!(submission.title, "Demo");
        assert_eq!(submission.description, "A ten-char desc");
        assert_eq!(submission.author_id, "u1");

        assert!(to_submission(&thread(full_data()), None).report_id.is_none());
    }

    #[test]
    fn test_status_change_preserves_other_fields() {
        let original = full_data();
        let updated = with_status(&original, SubmissionStatus::Approved).unwrap();

        let before = ShowcaseData::decode(&original);
        let after = ShowcaseData::decode(&updated);
        assert_eq!(after.status, SubmissionStatus::Approved);
        assert_eq!(after.images, before.images);
        assert_eq!(after.main_image_index, before.main_image_index);
        assert_eq!(after.project_url, before.project_url);
        assert_eq!(after.author_name, before.author_name);
        assert_eq!(updated["featured"], json!(true));
        assert!(ShowcaseData::is_showcase(&updated));
    }

    #[test]
    fn test_with_status_rejects_non_object() {
        assert!(with_status(&Value::Null, SubmissionStatus::Approved).is_none());
    }

    #[test]
    fn test_encode_then_decode_keeps_fields() {
        let data = ShowcaseData {
            images: vec![ImageUpload {
                url: "https://x/img.png".to_string(),
                name: "img.png".to_string(),
            }],
            main_image_index: 0,
            project_url: None,
            status: SubmissionStatus::Pending,
            author_name: "bob".to_string(),
        };
        let encoded = data.encode();
        assert!(ShowcaseData::is_showcase(&encoded));
        assert_eq!(encoded["projectUrl"], json!(""));
        assert_eq!(ShowcaseData::decode(&encoded), data);
    }
}
