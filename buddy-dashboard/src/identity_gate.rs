//! Face login/register gate in front of the dashboard.
//!
//! `idle -> capturing -> submitting -> granted`, or back to `idle` with a
//! message when the backend rejects the frame. Matching happens entirely on
//! the backend; this only captures, uploads and reads the verdict.

use crate::backend_client::BackendApi;
use crate::capture::{CapturedImage, FrameSource};
use buddy_types::{GatePhase, GateStatus};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const MSG_MISSING_FIELDS: &str = "⚠️ Please enter username and name";
const FALLBACK_REGISTER: &str = "Registration failed";
const FALLBACK_VERIFY: &str = "Face not recognized";
const MSG_CAMERA_FAILED: &str = "❌ Camera unavailable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Verification matched this handle
    Granted(String),
    /// Enrollment accepted
    Registered,
    /// Backend said no, or could not be reached
    Rejected(String),
    /// Local validation failed, nothing was sent
    Blocked(String),
    /// No camera stream attached; nothing was sent
    Aborted,
    /// The camera failed; captures stay disabled
    CameraDenied(String),
    /// Another capture is already in flight
    Busy,
}

#[derive(Debug)]
struct GateSnapshot {
    phase: GatePhase,
    message: Option<String>,
    identity: Option<String>,
    camera_denied: bool,
}

pub struct IdentityGate {
    api: Arc<dyn BackendApi>,
    frames: Option<Arc<dyn FrameSource>>,
    state: Mutex<GateSnapshot>,
}

impl IdentityGate {
    pub fn new(api: Arc<dyn BackendApi>, frames: Option<Arc<dyn FrameSource>>) -> Self {
        Self {
            api,
            frames,
            state: Mutex::new(GateSnapshot {
                phase: GatePhase::Idle,
                message: None,
                identity: None,
                camera_denied: false,
            }),
        }
    }

    pub async fn status(&self) -> GateStatus {
        let state = self.state.lock().await;
        GateStatus {
            phase: state.phase,
            message: state.message.clone(),
            identity: state.identity.clone(),
            camera_denied: state.camera_denied,
        }
    }

    /// Drop the session identity and return to `idle`.
    /// A camera failure is kept.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.phase = GatePhase::Idle;
        state.identity = None;
        if !state.camera_denied {
            state.message = None;
        }
    }

    pub async fn register(&self, username: &str, name: &str) -> GateOutcome {
        let username = username.trim();
        let name = name.trim();
        if username.is_empty() || name.is_empty() {
            self.state.lock().await.message = Some(MSG_MISSING_FIELDS.to_string());
            return GateOutcome::Blocked(MSG_MISSING_FIELDS.to_string());
        }

        let image = match self.capture().await {
            Ok(image) => image,
            Err(outcome) => return outcome,
        };

        self.set_phase(GatePhase::Submitting).await;
        log::info!("[GATE] Registering face for {}", username);

        match self.api.register_face(username, name, image).await {
            Ok(_) => {
                let msg = format!("✅ Registered {}. Switch to Login to sign in.", name);
                self.finish(GatePhase::Idle, msg, None).await;
                GateOutcome::Registered
            }
            Err(e) => {
                log::warn!("[GATE] Registration failed for {}: {}", username, e);
                let msg = format!("❌ {}", e.user_message(FALLBACK_REGISTER));
                self.finish(GatePhase::Idle, msg.clone(), None).await;
                GateOutcome::Rejected(msg)
            }
        }
    }

    pub async fn verify(&self) -> GateOutcome {
        let image = match self.capture().await {
            Ok(image) => image,
            Err(outcome) => return outcome,
        };

        self.set_phase(GatePhase::Submitting).await;
        log::info!("[GATE] Verifying face");

        match self.api.verify_face(image).await {
            Ok(resp) => {
                log::info!("[GATE] Access granted to {}", resp.username);
                let msg = format!("✅ Welcome, {}", resp.username);
                self.finish(GatePhase::Granted, msg, Some(resp.username.clone()))
                    .await;
                GateOutcome::Granted(resp.username)
            }
            Err(e) => {
                log::warn!("[GATE] Verification failed: {}", e);
                let msg = format!("❌ {}", e.user_message(FALLBACK_VERIFY));
                self.finish(GatePhase::Idle, msg.clone(), None).await;
                GateOutcome::Rejected(msg)
            }
        }
    }

    /// `idle -> capturing`, then grab a frame. On failure the gate is back in
    /// `idle` and the returned outcome says why.
    async fn capture(&self) -> Result<CapturedImage, GateOutcome> {
        {
            let mut state = self.state.lock().await;
            if state.camera_denied {
                let msg = state.message.clone().unwrap_or_else(|| MSG_CAMERA_FAILED.to_string());
                return Err(GateOutcome::CameraDenied(msg));
            }
            if state.phase != GatePhase::Idle {
                return Err(GateOutcome::Busy);
            }
            state.phase = GatePhase::Capturing;
        }

        let Some(frames) = &self.frames else {
            log::warn!("[GATE] No camera stream attached, capture aborted");
            self.set_phase(GatePhase::Idle).await;
            return Err(GateOutcome::Aborted);
        };

        match frames.capture_still().await {
            Ok(image) => Ok(image),
            Err(e) => {
                log::error!("[GATE] Capture from {} failed: {}", frames.name(), e);
                let msg = format!("{}: {}", MSG_CAMERA_FAILED, e);
                let mut state = self.state.lock().await;
                state.phase = GatePhase::Idle;
                state.message = Some(msg.clone());
                state.camera_denied = true;
                Err(GateOutcome::CameraDenied(msg))
            }
        }
    }

    async fn set_phase(&self, phase: GatePhase) {
        self.state.lock().await.phase = phase;
    }

    async fn finish(&self, phase: GatePhase, message: String, identity: Option<String>) {
        let mut state = self.state.lock().await;
        state.phase = phase;
        state.message = Some(message);
        state.identity = identity;
    }
}
