use crate::loader::DashboardData;
use crate::transcript::TranscriptLog;
use buddy_types::DashboardSnapshot;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    /// Peer closed or the connection failed. Terminal until the next activation.
    Dropped(String),
    Closed,
}

impl ChannelState {
    pub fn label(&self) -> String {
        match self {
            ChannelState::Connecting => "connecting".to_string(),
            ChannelState::Open => "open".to_string(),
            ChannelState::Dropped(reason) => format!("dropped: {}", reason),
            ChannelState::Closed => "closed".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaState {
    Disabled,
    Negotiating,
    /// Handshake finished and this remote stream is the playback source.
    /// With the built-in answerer this only means the answer was accepted
    /// by the signaling endpoint, not that media is flowing.
    Playing(String),
    /// Handshake finished but the offer announced no stream to play
    Connected,
    Failed(String),
    Closed,
}

impl MediaState {
    pub fn label(&self) -> String {
        match self {
            MediaState::Disabled => "disabled".to_string(),
            MediaState::Negotiating => "negotiating".to_string(),
            MediaState::Playing(stream) => format!("playing {}", stream),
            MediaState::Connected => "connected".to_string(),
            MediaState::Failed(reason) => format!("failed: {}", reason),
            MediaState::Closed => "closed".to_string(),
        }
    }
}

/// Everything the dashboard renders for one view session.
/// Each field has a single writer: the loader, the channel, or signaling.
#[derive(Debug)]
pub struct DashboardViewModel {
    pub identity: Option<String>,
    pub data: DashboardData,
    pub loaded: bool,
    pub transcript: TranscriptLog,
    pub channel: ChannelState,
    pub media: MediaState,
}

impl DashboardViewModel {
    pub fn new(identity: Option<String>) -> Self {
        Self {
            identity,
            data: DashboardData::default(),
            loaded: false,
            transcript: TranscriptLog::new(),
            channel: ChannelState::Connecting,
            media: MediaState::Disabled,
        }
    }

    pub fn display_name(&self) -> &str {
        self.data.user.as_ref().map(|u| u.name.as_str()).unwrap_or("")
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            loaded: self.loaded,
            name: self.display_name().to_string(),
            tasks: self.data.tasks.clone(),
            reminders: self.data.reminders.clone(),
            channel: self.channel.label(),
            media: self.media.label(),
        }
    }
}

pub type SharedViewModel = Arc<RwLock<DashboardViewModel>>;

pub fn shared(identity: Option<String>) -> SharedViewModel {
    Arc::new(RwLock::new(DashboardViewModel::new(identity)))
}
