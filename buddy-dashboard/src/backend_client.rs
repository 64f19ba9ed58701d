//! HTTP client for the external assistant backend.
//!
//! Profiles, memory records, face registration/verification and the WebRTC
//! offer/answer endpoints all live behind `BACKEND_URL`. Calls are made once:
//! no retries, no timeouts, no caching.

use crate::capture::CapturedImage;
use async_trait::async_trait;
use buddy_types::*;
use reqwest::multipart::{Form, Part};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The request never got a readable response
    Transport(String),
    /// Non-2xx status, with the server's `detail` if the body carried one
    Status { status: u16, detail: Option<String> },
    /// 2xx but the body did not parse
    Decode(String),
}

impl BackendError {
    /// Message for the user: the server's detail when present, else `fallback`
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            BackendError::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            _ => fallback.to_string(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(e) => write!(f, "Backend unavailable: {}", e),
            BackendError::Status { status, detail } => match detail {
                Some(d) => write!(f, "Backend error ({}): {}", status, d),
                None => write!(f, "Backend error ({})", status),
            },
            BackendError::Decode(e) => write!(f, "Invalid response from backend: {}", e),
        }
    }
}

impl std::error::Error for BackendError {}

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, BackendError>;

    async fn list_memory(&self) -> Result<Vec<MemoryRecord>, BackendError>;

    async fn get_user(&self, username: &str) -> Result<User, BackendError>;

    async fn get_events(&self, username: &str) -> Result<Vec<MemoryRecord>, BackendError>;

    async fn list_tasks(&self) -> Result<Vec<LegacyTask>, BackendError>;

    async fn register_face(
        &self,
        username: &str,
        name: &str,
        image: CapturedImage,
    ) -> Result<serde_json::Value, BackendError>;

    async fn verify_face(&self, image: CapturedImage) -> Result<VerifyResponse, BackendError>;

    async fn fetch_webrtc_offer(&self) -> Result<SessionDescription, BackendError>;

    async fn post_webrtc_answer(&self, answer: &SessionDescription) -> Result<(), BackendError>;
}

pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // =====================================================
    // HTTP helpers
    // =====================================================

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        read_json(response).await
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        read_json(response).await
    }
}

#[async_trait]
impl BackendApi for BackendClient {
    async fn list_users(&self) -> Result<Vec<User>, BackendError> {
        let resp: UsersResponse = self.get("/api/users").await?;
        Ok(resp.users)
    }

    async fn list_memory(&self) -> Result<Vec<MemoryRecord>, BackendError> {
        let resp: MemoryResponse = self.get("/api/memory").await?;
        Ok(resp.memory)
    }

    async fn get_user(&self, username: &str) -> Result<User, BackendError> {
        let mut user: User = self
            .get(&format!("/api/users/{}", urlencoding::encode(username)))
            .await?;
        if user.username.is_empty() {
            user.username = username.to_string();
        }
        Ok(user)
    }

    async fn get_events(&self, username: &str) -> Result<Vec<MemoryRecord>, BackendError> {
        self.get(&format!("/api/events/{}", urlencoding::encode(username)))
            .await
    }

    async fn list_tasks(&self) -> Result<Vec<LegacyTask>, BackendError> {
        let resp: TasksResponse = self.get("/api/tasks").await?;
        Ok(resp.tasks)
    }

    async fn register_face(
        &self,
        username: &str,
        name: &str,
        image: CapturedImage,
    ) -> Result<serde_json::Value, BackendError> {
        let form = Form::new()
            .text("username", username.to_string())
            .text("name", name.to_string())
            .part("file", image_part(image)?);
        self.post_form("/api/register_face", form).await
    }

    async fn verify_face(&self, image: CapturedImage) -> Result<VerifyResponse, BackendError> {
        let form = Form::new().part("file", image_part(image)?);
        self.post_form("/api/verify_face", form).await
    }

    async fn fetch_webrtc_offer(&self) -> Result<SessionDescription, BackendError> {
        self.get("/api/webrtc_offer").await
    }

    async fn post_webrtc_answer(&self, answer: &SessionDescription) -> Result<(), BackendError> {
        let body = WebRtcAnswerRequest {
            answer: answer.clone(),
        };
        let response = self
            .client
            .post(self.url("/api/webrtc_answer"))
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            detail: extract_detail(&body),
        })
    }
}

fn image_part(image: CapturedImage) -> Result<Part, BackendError> {
    Part::bytes(image.bytes)
        .file_name(image.file_name)
        .mime_str(&image.mime)
        .map_err(|e| BackendError::Transport(format!("Invalid image type: {}", e)))
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| BackendError::Transport(format!("Failed to read response: {}", e)))?;

    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            detail: extract_detail(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Pull the `detail` field out of an error body.
/// Non-string details (validation error lists) are returned as JSON text.
pub fn extract_detail(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    match json.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail":"no match"}"#),
            Some("no match".to_string())
        );
    }

    #[test]
    fn test_extract_detail_missing_or_not_json() {
        assert_eq!(extract_detail(r#"{"error":"x"}"#), None);
        assert_eq!(extract_detail("Internal Server Error"), None);
        assert_eq!(extract_detail(r#"{"detail":null}"#), None);
        assert_eq!(extract_detail(r#"{"detail":""}"#), None);
    }

    #[test]
    fn test_extract_detail_structured() {
        let detail = extract_detail(r#"{"detail":[{"loc":["file"]}]}"#).unwrap();
        assert!(detail.contains("file"));
    }

    #[test]
    fn test_user_message_prefers_server_detail() {
        let err = BackendError::Status {
            status: 401,
            detail: Some("no match".to_string()),
        };
        assert_eq!(err.user_message("Face not recognized"), "no match");

        let err = BackendError::Status {
            status: 500,
            detail: None,
        };
        assert_eq!(err.user_message("Face not recognized"), "Face not recognized");

        let err = BackendError::Transport("connection refused".to_string());
        assert_eq!(err.user_message("Registration failed"), "Registration failed");
    }

    #[test]
    fn test_display() {
        let err = BackendError::Status {
            status: 404,
            detail: Some("User not found".to_string()),
        };
        assert_eq!(err.to_string(), "Backend error (404): User not found");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) is closed on test hosts
        let client = BackendClient::new("http://127.0.0.1:9/");
        match client.list_users().await {
            Err(BackendError::Transport(_)) => {}
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
