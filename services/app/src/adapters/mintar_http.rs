//! services/app/src/adapters/mintar_http.rs
//!
//! This module contains the adapter for the remote Mintar API. It implements the
//! `SummarizationService` and `AuthenticationService` ports from the `core` crate
//! over HTTP using `reqwest`.

use async_trait::async_trait;
use mintar_core::{
    domain::{
        DocumentUpload, FileInfo, LoginData, PracticeQuestion, ProfileUpdate, StudySummary,
        TopicEntry, UserProfile,
    },
    ports::{AuthenticationService, PortError, PortResult, SummarizationService},
};
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_RATE_LIMIT_MESSAGE: &str =
    "Too many requests. Log in for a larger quota.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that talks to the Mintar upload and account endpoints.
#[derive(Clone)]
pub struct MintarHttpAdapter {
    client: Client,
    base_url: String,
}

impl MintarHttpAdapter {
    /// Creates a new `MintarHttpAdapter` rooted at `base_url` (e.g. `https://host/api/v1`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends a request and returns the status with the raw body.
    async fn send(&self, request: reqwest::RequestBuilder) -> PortResult<(StatusCode, String)> {
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Request to Mintar API failed: {}", e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read Mintar response: {}", e)))?;
        Ok((status, body))
    }
}

//=========================================================================================
// "Impure" Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    data: Option<UploadData>,
    #[serde(rename = "fileInfo", default)]
    file_info: Option<FileInfo>,
}

#[derive(Deserialize)]
struct UploadData {
    #[serde(default)]
    materi: Option<Vec<MateriRecord>>,
}

#[derive(Deserialize)]
struct MateriRecord {
    #[serde(default)]
    tema: String,
    #[serde(default)]
    rangkuman: String,
    #[serde(rename = "poinPenting", default)]
    poin_penting: Vec<String>,
    #[serde(rename = "soalLatihan", default)]
    soal_latihan: Vec<SoalRecord>,
}
impl MateriRecord {
    fn to_domain(self) -> TopicEntry {
        TopicEntry {
            title: self.tema,
            summary: self.rangkuman,
            key_points: self.poin_penting,
            practice_questions: self.soal_latihan.into_iter().map(|s| s.to_domain()).collect(),
        }
    }
}

#[derive(Deserialize)]
struct SoalRecord {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    pertanyaan: String,
    #[serde(default)]
    pilihan: Vec<String>,
    #[serde(default)]
    jawaban: String,
}
impl SoalRecord {
    fn to_domain(self) -> PracticeQuestion {
        PracticeQuestion {
            id: scalar_to_string(&self.id).unwrap_or_default(),
            question: self.pertanyaan,
            choices: self.pilihan,
            answer: self.jawaban,
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Returns the first path that resolves to a usable value.
fn first_of<'a>(body: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| {
        let found = path.iter().try_fold(body, |v, segment| v.get(segment))?;
        match found {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            other => Some(other),
        }
    })
}

fn message_of(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

//=========================================================================================
// Response Interpretation
//=========================================================================================

/// Interprets the upload endpoint's answer.
fn parse_upload_response(status: StatusCode, body: &str) -> PortResult<StudySummary> {
    let json: Option<Value> = serde_json::from_str(body).ok();
    let embedded_status = json
        .as_ref()
        .and_then(|v| v.get("status"))
        .and_then(Value::as_u64);

    if status == StatusCode::TOO_MANY_REQUESTS || embedded_status == Some(429) {
        let message = json
            .as_ref()
            .and_then(message_of)
            .unwrap_or_else(|| DEFAULT_RATE_LIMIT_MESSAGE.to_string());
        return Err(PortError::RateLimited(message));
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(PortError::Unauthorized);
    }
    if !status.is_success() {
        return Err(PortError::Unexpected(format!("Server error: {} - {}", status, body)));
    }

    let response: UploadResponse = serde_json::from_str(body)
        .map_err(|e| PortError::Unexpected(format!("Malformed upload response: {}", e)))?;
    let materi = response
        .data
        .and_then(|d| d.materi)
        .ok_or(PortError::UnsupportedDocument)?;

    Ok(StudySummary {
        file_info: response.file_info.unwrap_or_default(),
        materials: materi.into_iter().map(|m| m.to_domain()).collect(),
    })
}

fn extract_user(body: &Value) -> UserProfile {
    UserProfile {
        user_id: first_of(body, &[&["data", "user_id"], &["user", "id"], &["user_id"]])
            .and_then(scalar_to_i64),
        email: first_of(body, &[&["data", "email"], &["user", "email"], &["email"]])
            .and_then(scalar_to_string),
        name: first_of(body, &[&["data", "name"], &["user", "name"], &["name"]])
            .and_then(scalar_to_string),
    }
}

fn extract_login(body: &Value) -> Option<LoginData> {
    let token = first_of(body, &[&["token"], &["access_token"], &["accessToken"]])
        .and_then(Value::as_str)?
        .to_string();
    let user = extract_user(body);
    Some(LoginData {
        token,
        user: (!user.is_empty()).then_some(user),
    })
}

fn parse_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or(Value::Null)
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl SummarizationService for MintarHttpAdapter {
    async fn summarize(
        &self,
        upload: DocumentUpload,
        token: Option<&str>,
    ) -> PortResult<StudySummary> {
        let size = upload.bytes.len();
        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type)
            .map_err(|e| PortError::Unexpected(format!("Invalid mime type: {}", e)))?;
        let form = multipart::Form::new().part("pdf", part);

        let mut request = self.client.post(self.endpoint("upload")).multipart(form);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        debug!(file = %upload.file_name, size, authenticated = token.is_some(), "Uploading document");
        let (status, body) = self.send(request).await?;
        let result = parse_upload_response(status, &body);
        if let Err(e) = &result {
            warn!(%status, "Upload was not summarized: {}", e);
        }
        result
    }
}

#[async_trait]
impl AuthenticationService for MintarHttpAdapter {
    async fn login(&self, email: &str, password: &str) -> PortResult<LoginData> {
        let request = self
            .client
            .post(self.endpoint("login"))
            .json(&json!({ "email": email, "password": password }));
        let (status, body) = self.send(request).await?;
        let body = parse_body(&body);

        if !status.is_success() {
            return Err(PortError::Rejected(
                message_of(&body).unwrap_or_else(|| "Login failed".to_string()),
            ));
        }
        extract_login(&body)
            .ok_or_else(|| PortError::Unexpected("No token received from server".to_string()))
    }

    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> PortResult<Option<LoginData>> {
        let request = self
            .client
            .post(self.endpoint("register"))
            .json(&json!({ "name": name, "email": email, "password": password }));
        let (status, body) = self.send(request).await?;
        let body = parse_body(&body);

        if !status.is_success() {
            return Err(PortError::Rejected(
                message_of(&body).unwrap_or_else(|| "Registration failed".to_string()),
            ));
        }
        Ok(extract_login(&body))
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> PortResult<()> {
        let request = self
            .client
            .put(self.endpoint("profile"))
            .bearer_auth(token)
            .json(update);
        let (status, _) = self.send(request).await?;

        if status.is_success() {
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED {
            Err(PortError::Unauthorized)
        } else {
            Err(PortError::Rejected("Failed to update profile".to_string()))
        }
    }
}
