//! crates/mintar_core/src/domain.rs
//!
//! Defines the core data structures for the application: the study material
//! produced by the remote summarizer, the records saved on the device, and the
//! persisted login state.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

//=========================================================================================
// Study Material
//=========================================================================================

/// Metadata about the uploaded file a summary was generated from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileInfo {
    /// The original file name, percent-encoded by the upload API.
    pub original_name: String,
    /// File size in bytes.
    pub size: u64,
    pub uploaded_at: String,
    /// Upstream fields the client never interprets (stored name, file url, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileInfo {
    /// The human-readable file name. Falls back to the raw value when it is not
    /// valid percent-encoded UTF-8.
    pub fn display_name(&self) -> String {
        display_file_name(&self.original_name)
    }
}

/// A single multiple-choice practice question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeQuestion {
    pub id: String,
    pub question: String,
    pub choices: Vec<String>,
    /// The correct choice, as given by the summarizer.
    pub answer: String,
}

/// One topic of the generated study material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicEntry {
    pub title: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub practice_questions: Vec<PracticeQuestion>,
}

/// The study material the remote API returns for one uploaded document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudySummary {
    pub file_info: FileInfo,
    pub materials: Vec<TopicEntry>,
}

impl StudySummary {
    /// Total number of practice questions across all topics.
    pub fn question_count(&self) -> usize {
        count_questions(&self.materials)
    }
}

/// A PDF picked by the user, ready to be uploaded.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

//=========================================================================================
// Saved Records
//=========================================================================================

/// A persisted unit of study material plus its save/upload metadata.
///
/// Only the envelope (`id`, `savedAt`) is typed. Everything else, normally
/// `fileInfo` and `materials`, is an opaque payload carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecord {
    pub id: String,
    /// ISO-8601 timestamp, kept verbatim. The only sort key of the collection.
    pub saved_at: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl SavedRecord {
    /// Wraps a summary in a record envelope.
    pub fn new(id: impl Into<String>, saved_at: impl Into<String>, summary: &StudySummary) -> Self {
        let payload = match serde_json::to_value(summary) {
            Ok(Value::Object(payload)) => payload,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            saved_at: saved_at.into(),
            payload,
        }
    }

    /// Stamps a freshly generated summary with a new id and save time.
    pub fn from_summary(summary: StudySummary, now: DateTime<Utc>) -> Self {
        Self::new(
            new_record_id(now),
            now.to_rfc3339_opts(SecondsFormat::Millis, true),
            &summary,
        )
    }

    /// The parsed save time, if `saved_at` is valid RFC 3339.
    pub fn saved_at_instant(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.saved_at)
    }

    /// Topic entries of the payload. Records written before the payload was
    /// normalised keep them under `data.materi`.
    fn topics(&self) -> &[Value] {
        self.payload
            .get("materials")
            .or_else(|| self.payload.get("data").and_then(|d| d.get("materi")))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Builds the list-card view of this record. `position` is the record's index in
    /// the listing and only feeds the fallback title. Missing or oddly shaped
    /// payload fields degrade to empty values.
    pub fn summary(&self, position: usize) -> RecordSummary {
        let file_info = self.payload.get("fileInfo");
        let title = file_info
            .and_then(|f| f.get("originalName"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(display_file_name)
            .unwrap_or_else(|| format!("Summary {}", position + 1));
        let file_size = file_info
            .and_then(|f| f.get("size"))
            .and_then(|size| size.as_u64().or_else(|| size.as_f64().map(|f| f as u64)))
            .unwrap_or_default();

        let topics = self.topics();
        let question_count = topics
            .iter()
            .filter_map(|topic| {
                topic
                    .get("practiceQuestions")
                    .or_else(|| topic.get("soalLatihan"))
                    .and_then(Value::as_array)
            })
            .map(Vec::len)
            .sum();

        RecordSummary {
            id: self.id.clone(),
            title,
            saved_at: self.saved_at.clone(),
            topic_count: topics.len(),
            question_count,
            file_size,
        }
    }
}

/// A condensed view of a saved record, used for browsing the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub id: String,
    pub title: String,
    pub saved_at: String,
    pub topic_count: usize,
    pub question_count: usize,
    pub file_size: u64,
}

/// Generates a record id: the millisecond timestamp followed by a short random suffix.
///
/// Collision-resistant for a single device, not globally unique.
pub fn new_record_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}", now.timestamp_millis(), &suffix[..9])
}

pub(crate) fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn count_questions(materials: &[TopicEntry]) -> usize {
    materials.iter().map(|m| m.practice_questions.len()).sum()
}

fn display_file_name(raw: &str) -> String {
    percent_decode(raw).unwrap_or_else(|| raw.to_string())
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

//=========================================================================================
// Login State
//=========================================================================================

/// Profile fields of the logged-in user. Every field is optional because the
/// remote API does not always return all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl UserProfile {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.email.is_none() && self.name.is_none()
    }
}

/// The token issued by the remote API together with the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    pub token: String,
    pub user: Option<UserProfile>,
}

/// Editable profile fields sent to the remote API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Whether a login token is currently persisted on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Authenticated(LoginData),
    Unauthenticated,
}
