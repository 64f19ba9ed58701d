//! WebRTC offer/answer round-trip.
//!
//! Fetch the remote offer, apply it, create and apply a local answer, post the
//! answer back. One pass, no renegotiation or ICE restart: any failing step
//! aborts the media session.

use crate::backend_client::BackendApi;
use async_trait::async_trait;
use buddy_types::SessionDescription;
use rand::Rng;
use rand::distributions::Alphanumeric;

/// A remote media stream announced by the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub kinds: Vec<String>,
}

pub type RemoteStreamHandler = Box<dyn Fn(RemoteStream) + Send + Sync>;

#[async_trait]
pub trait MediaSession: Send {
    /// Called for each remote stream once the session is established
    fn on_remote_stream(&mut self, handler: RemoteStreamHandler);

    async fn set_remote_description(&mut self, offer: SessionDescription) -> Result<(), String>;

    async fn create_answer(&mut self) -> Result<SessionDescription, String>;

    async fn set_local_description(&mut self, answer: SessionDescription) -> Result<(), String>;

    async fn close(&mut self);
}

/// Run the handshake. Returns the answer that was posted.
pub async fn negotiate(
    api: &dyn BackendApi,
    session: &mut dyn MediaSession,
) -> Result<SessionDescription, String> {
    let offer = api
        .fetch_webrtc_offer()
        .await
        .map_err(|e| format!("Failed to fetch offer: {}", e))?;
    log::debug!("[SIGNALING] Received offer ({} bytes)", offer.sdp.len());

    session.set_remote_description(offer).await?;
    let answer = session.create_answer().await?;
    session.set_local_description(answer.clone()).await?;

    api.post_webrtc_answer(&answer)
        .await
        .map_err(|e| format!("Failed to post answer: {}", e))?;
    log::info!("[SIGNALING] Answer posted");
    Ok(answer)
}

// =====================================================
// Headless answerer
// =====================================================

#[derive(Debug, Clone, PartialEq)]
struct MediaSection {
    kind: String,
    m_line: String,
    mid: Option<String>,
    direction: String,
    stream_id: Option<String>,
    codec_lines: Vec<String>,
}

/// Built-in `MediaSession` for a host without a media pipeline.
///
/// Mirrors each offered media section with the complementary direction and
/// fresh ICE credentials, then reports the offered streams to the handler.
/// It runs no ICE agent and no DTLS, and the answer carries no
/// `a=fingerprint`, so a real WebRTC peer will not complete the connection.
/// It only exercises the signaling round-trip.
pub struct SdpAnswerer {
    handler: Option<RemoteStreamHandler>,
    remote: Option<Vec<MediaSection>>,
    bundle: Option<String>,
    local: Option<SessionDescription>,
    closed: bool,
}

impl SdpAnswerer {
    pub fn new() -> Self {
        Self {
            handler: None,
            remote: None,
            bundle: None,
            local: None,
            closed: false,
        }
    }

    fn remote_streams(&self) -> Vec<RemoteStream> {
        let mut streams: Vec<RemoteStream> = Vec::new();
        for section in self.remote.iter().flatten() {
            if section.direction == "recvonly" || section.direction == "inactive" {
                continue;
            }
            let id = section
                .stream_id
                .clone()
                .or_else(|| section.mid.clone())
                .unwrap_or_else(|| section.kind.clone());
            match streams.iter_mut().find(|s| s.id == id) {
                Some(stream) => stream.kinds.push(section.kind.clone()),
                None => streams.push(RemoteStream {
                    id,
                    kinds: vec![section.kind.clone()],
                }),
            }
        }
        streams
    }
}

impl Default for SdpAnswerer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSession for SdpAnswerer {
    fn on_remote_stream(&mut self, handler: RemoteStreamHandler) {
        self.handler = Some(handler);
    }

    async fn set_remote_description(&mut self, offer: SessionDescription) -> Result<(), String> {
        if self.closed {
            return Err("Media session is closed".to_string());
        }
        if offer.sdp_type != "offer" {
            return Err(format!("Expected an offer, got '{}'", offer.sdp_type));
        }
        if offer.sdp.trim().is_empty() {
            return Err("Remote offer is empty".to_string());
        }
        let (bundle, sections) = parse_offer(&offer.sdp);
        if sections.is_empty() {
            return Err("Remote offer has no media sections".to_string());
        }
        self.bundle = bundle;
        self.remote = Some(sections);
        Ok(())
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, String> {
        let sections = self
            .remote
            .as_ref()
            .ok_or_else(|| "No remote description applied".to_string())?;
        Ok(SessionDescription {
            sdp: build_answer(self.bundle.as_deref(), sections),
            sdp_type: "answer".to_string(),
        })
    }

    async fn set_local_description(&mut self, answer: SessionDescription) -> Result<(), String> {
        if self.remote.is_none() {
            return Err("No remote description applied".to_string());
        }
        if answer.sdp_type != "answer" {
            return Err(format!("Expected an answer, got '{}'", answer.sdp_type));
        }
        self.local = Some(answer);
        let streams = self.remote_streams();
        if let Some(handler) = &self.handler {
            for stream in streams {
                handler(stream);
            }
        }
        Ok(())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.handler = None;
            log::debug!("[SIGNALING] Media session closed");
        }
    }
}

fn parse_offer(sdp: &str) -> (Option<String>, Vec<MediaSection>) {
    let mut bundle = None;
    let mut sections: Vec<MediaSection> = Vec::new();

    for line in sdp.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(rest) = line.strip_prefix("m=") {
            sections.push(MediaSection {
                kind: rest.split_whitespace().next().unwrap_or("media").to_string(),
                m_line: line.to_string(),
                mid: None,
                direction: "sendrecv".to_string(),
                stream_id: None,
                codec_lines: Vec::new(),
            });
            continue;
        }
        let Some(section) = sections.last_mut() else {
            if line.starts_with("a=group:BUNDLE") {
                bundle = Some(line.to_string());
            }
            continue;
        };
        if let Some(mid) = line.strip_prefix("a=mid:") {
            section.mid = Some(mid.to_string());
        } else if let Some(msid) = line.strip_prefix("a=msid:") {
            section.stream_id = msid.split_whitespace().next().map(|s| s.to_string());
        } else if matches!(
            line,
            "a=sendrecv" | "a=sendonly" | "a=recvonly" | "a=inactive"
        ) {
            section.direction = line[2..].to_string();
        } else if line.starts_with("a=rtpmap:")
            || line.starts_with("a=fmtp:")
            || line.starts_with("a=rtcp-fb:")
            || line.starts_with("a=rtcp-mux")
            || line.starts_with("c=")
        {
            section.codec_lines.push(line.to_string());
        }
    }
    (bundle, sections)
}

fn answer_direction(offered: &str) -> &'static str {
    match offered {
        "sendonly" => "recvonly",
        "recvonly" => "sendonly",
        "inactive" => "inactive",
        _ => "sendrecv",
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn build_answer(bundle: Option<&str>, sections: &[MediaSection]) -> String {
    let session_id: u64 = rand::thread_rng().gen_range(1..i64::MAX as u64);
    let ufrag = random_token(8);
    let pwd = random_token(24);

    let mut lines = vec![
        "v=0".to_string(),
        format!("o=- {} 2 IN IP4 127.0.0.1", session_id),
        "s=-".to_string(),
        "t=0 0".to_string(),
    ];
    if let Some(bundle) = bundle {
        lines.push(bundle.to_string());
    }
    for section in sections {
        lines.push(section.m_line.clone());
        lines.extend(section.codec_lines.iter().cloned());
        if let Some(mid) = &section.mid {
            lines.push(format!("a=mid:{}", mid));
        }
        lines.push(format!("a=ice-ufrag:{}", ufrag));
        lines.push(format!("a=ice-pwd:{}", pwd));
        lines.push("a=setup:active".to_string());
        lines.push(format!("a={}", answer_direction(&section.direction)));
    }
    let mut sdp = lines.join("\r\n");
    sdp.push_str("\r\n");
    sdp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend_client::BackendError;
    use crate::mock_backend::{MockBackend, sample_offer, transport_error};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_negotiate_posts_answer_and_reports_stream() {
        let api = MockBackend {
            offer: Ok(sample_offer()),
            ..Default::default()
        };
        let seen: Arc<Mutex<Vec<RemoteStream>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut session = SdpAnswerer::new();
        session.on_remote_stream(Box::new(move |s| sink.lock().unwrap().push(s)));

        let answer = negotiate(&api, &mut session).await.unwrap();
        assert_eq!(answer.sdp_type, "answer");
        assert!(answer.sdp.contains("a=group:BUNDLE 0 1"));
        assert!(answer.sdp.contains("m=audio 9 UDP/TLS/RTP/SAVPF 111"));
        assert!(answer.sdp.contains("a=rtpmap:96 VP8/90000"));

        let posted = api.posted_answers.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0], answer);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![RemoteStream {
                id: "buddy-stream".to_string(),
                kinds: vec!["audio".to_string(), "video".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_rejected_answer_is_an_error() {
        let api = MockBackend {
            offer: Ok(sample_offer()),
            answer: Err(BackendError::Status {
                status: 500,
                detail: Some("answer rejected".to_string()),
            }),
            ..Default::default()
        };
        let mut session = SdpAnswerer::new();
        let err = negotiate(&api, &mut session).await.unwrap_err();
        assert!(err.contains("answer rejected"));
        assert_eq!(api.posted_answers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_directions_are_complementary() {
        let mut session = SdpAnswerer::new();
        session.set_remote_description(sample_offer()).await.unwrap();
        let answer = session.create_answer().await.unwrap();
        let video = answer.sdp.split("m=video").nth(1).unwrap();
        assert!(video.contains("a=recvonly"));
        let audio = answer.sdp.split("m=video").next().unwrap();
        assert!(audio.contains("a=sendrecv"));
    }

    #[tokio::test]
    async fn test_empty_offer_aborts_without_posting() {
        let api = MockBackend {
            offer: Ok(SessionDescription {
                sdp: String::new(),
                sdp_type: "offer".to_string(),
            }),
            ..Default::default()
        };
        let mut session = SdpAnswerer::new();
        let err = negotiate(&api, &mut session).await.unwrap_err();
        assert!(err.contains("empty"));
        assert!(api.posted_answers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offer_fetch_failure_aborts() {
        let api = MockBackend {
            offer: Err(transport_error()),
            ..Default::default()
        };
        let mut session = SdpAnswerer::new();
        assert!(negotiate(&api, &mut session).await.is_err());
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_offer() {
        let mut session = SdpAnswerer::new();
        session.close().await;
        session.close().await;
        assert!(session.set_remote_description(sample_offer()).await.is_err());
    }

    #[tokio::test]
    async fn test_answer_requires_remote() {
        let mut session = SdpAnswerer::new();
        assert!(session.create_answer().await.is_err());
    }
}
