//! In-memory `BackendApi` for tests.

use crate::backend_client::{BackendApi, BackendError};
use crate::capture::{CapturedImage, FrameSource};
use async_trait::async_trait;
use buddy_types::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn transport_error() -> BackendError {
    BackendError::Transport("connection refused".to_string())
}

pub struct MockBackend {
    pub users: Result<Vec<User>, BackendError>,
    pub memory: Result<Vec<MemoryRecord>, BackendError>,
    pub user: Result<User, BackendError>,
    pub events: Result<Vec<MemoryRecord>, BackendError>,
    pub tasks: Result<Vec<LegacyTask>, BackendError>,
    pub register: Result<serde_json::Value, BackendError>,
    pub verify: Result<VerifyResponse, BackendError>,
    pub offer: Result<SessionDescription, BackendError>,
    pub answer: Result<(), BackendError>,
    pub calls: AtomicUsize,
    pub posted_answers: Mutex<Vec<SessionDescription>>,
    pub registered: Mutex<Vec<(String, String, usize)>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            users: Ok(vec![]),
            memory: Ok(vec![]),
            user: Err(transport_error()),
            events: Ok(vec![]),
            tasks: Ok(vec![]),
            register: Ok(serde_json::json!({"status": "success"})),
            verify: Err(transport_error()),
            offer: Err(transport_error()),
            answer: Ok(()),
            calls: AtomicUsize::new(0),
            posted_answers: Mutex::new(Vec::new()),
            registered: Mutex::new(Vec::new()),
        }
    }
}

impl MockBackend {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn list_users(&self) -> Result<Vec<User>, BackendError> {
        self.hit();
        self.users.clone()
    }

    async fn list_memory(&self) -> Result<Vec<MemoryRecord>, BackendError> {
        self.hit();
        self.memory.clone()
    }

    async fn get_user(&self, _username: &str) -> Result<User, BackendError> {
        self.hit();
        self.user.clone()
    }

    async fn get_events(&self, _username: &str) -> Result<Vec<MemoryRecord>, BackendError> {
        self.hit();
        self.events.clone()
    }

    async fn list_tasks(&self) -> Result<Vec<LegacyTask>, BackendError> {
        self.hit();
        self.tasks.clone()
    }

    async fn register_face(
        &self,
        username: &str,
        name: &str,
        image: CapturedImage,
    ) -> Result<serde_json::Value, BackendError> {
        self.hit();
        self.registered
            .lock()
            .unwrap()
            .push((username.to_string(), name.to_string(), image.bytes.len()));
        self.register.clone()
    }

    async fn verify_face(&self, _image: CapturedImage) -> Result<VerifyResponse, BackendError> {
        self.hit();
        self.verify.clone()
    }

    async fn fetch_webrtc_offer(&self) -> Result<SessionDescription, BackendError> {
        self.hit();
        self.offer.clone()
    }

    async fn post_webrtc_answer(&self, answer: &SessionDescription) -> Result<(), BackendError> {
        self.hit();
        self.posted_answers.lock().unwrap().push(answer.clone());
        self.answer.clone()
    }
}

/// Frame source that always returns the same bytes
pub struct StaticFrame(pub Vec<u8>);

#[async_trait]
impl FrameSource for StaticFrame {
    async fn capture_still(&self) -> Result<CapturedImage, String> {
        Ok(CapturedImage::from_bytes(self.0.clone()))
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Audio + video offer, both tracks in stream `buddy-stream`
pub const SAMPLE_OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=msid:buddy-stream audio-track\r\n\
a=sendrecv\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:1\r\n\
a=msid:buddy-stream video-track\r\n\
a=sendonly\r\n\
a=rtpmap:96 VP8/90000\r\n";

pub fn sample_offer() -> SessionDescription {
    SessionDescription {
        sdp: SAMPLE_OFFER.to_string(),
        sdp_type: "offer".to_string(),
    }
}

/// Camera that always fails, counting attempts
#[derive(Default)]
pub struct FailingCamera {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl FrameSource for FailingCamera {
    async fn capture_still(&self) -> Result<CapturedImage, String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err("permission denied".to_string())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

pub fn record(kind: &str, text: &str) -> MemoryRecord {
    MemoryRecord {
        event_type: Some(kind.to_string()),
        description: Some(text.to_string()),
        ..Default::default()
    }
}
