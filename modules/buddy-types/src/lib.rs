//! Shared types for the buddy dashboard host and the backend it talks to.

use serde::{Deserialize, Deserializer, Serialize};

/// Treat a JSON `null` like a missing string
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// =====================================================
// Domain Types
// =====================================================

/// A user profile as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

/// Category of a memory record shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Task,
    Reminder,
}

impl MemoryKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "task" => Some(MemoryKind::Task),
            "reminder" => Some(MemoryKind::Reminder),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Task => "task",
            MemoryKind::Reminder => "reminder",
        }
    }
}

/// A task/reminder/event entry owned by the backend.
///
/// The per-user events endpoint tags records with `type` and carries the text
/// in `description`; the global memory endpoint uses `memory_type` and
/// `content`. Both shapes deserialize into this one struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl MemoryRecord {
    /// Category from whichever discriminator the record carries
    pub fn kind(&self) -> Option<MemoryKind> {
        self.event_type
            .as_deref()
            .or(self.memory_type.as_deref())
            .and_then(MemoryKind::from_tag)
    }

    /// Display text: `title`, then `description`, then `content`.
    /// Empty strings are skipped.
    pub fn display_text(&self) -> String {
        [&self.title, &self.description, &self.content]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// A task from the legacy tasks endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub time: Option<String>,
}

/// Who spoke a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Anything that is not the user is rendered as the assistant
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("user") => Sender::User,
            _ => Sender::Assistant,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "You:",
            Sender::Assistant => "AI:",
        }
    }
}

/// One line of the live transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub sender: Sender,
    pub text: String,
}

// =====================================================
// Backend Response Types
// =====================================================

#[derive(Debug, Default, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemoryResponse {
    #[serde(default)]
    pub memory: Vec<MemoryRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TasksResponse {
    #[serde(default)]
    pub tasks: Vec<LegacyTask>,
}

/// Successful face verification
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub username: String,
}

/// Inbound frame on the realtime channel. Only `type == "transcript"` is
/// consumed; other kinds are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelFrame {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

pub const TRANSCRIPT_FRAME_KIND: &str = "transcript";

// =====================================================
// Signaling Types
// =====================================================

/// An SDP offer or answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(default)]
    pub sdp: String,
    #[serde(rename = "type", default)]
    pub sdp_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebRtcAnswerRequest {
    pub answer: SessionDescription,
}

// =====================================================
// Local RPC Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
}

/// Identity gate phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePhase {
    Idle,
    Capturing,
    Submitting,
    Granted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStatus {
    pub phase: GatePhase,
    pub message: Option<String>,
    pub identity: Option<String>,
    /// The camera failed once; captures stay disabled for this run
    #[serde(default)]
    pub camera_denied: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptPage {
    pub lines: Vec<TranscriptLine>,
    pub next: usize,
}

/// Profile and lists for the dashboard cards. `loaded` flips once the
/// loader has finished, whether or not its requests succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub loaded: bool,
    pub name: String,
    pub tasks: Vec<String>,
    pub reminders: Vec<String>,
    pub channel: String,
    pub media: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub started_at: String,
    pub session_active: bool,
    pub identity: Option<String>,
    pub channel: String,
    pub media: String,
    pub transcript_lines: usize,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
