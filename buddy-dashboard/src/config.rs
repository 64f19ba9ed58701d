use crate::loader::LoaderSource;

pub const DEFAULT_PORT: u16 = 9110;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_REALTIME_URL: &str = "ws://localhost:8000/ws/rtc";

/// Where still frames for the identity gate come from
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureConfig {
    None,
    SnapshotFile(String),
    Command { program: String, args: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend_url: String,
    pub realtime_url: String,
    pub username: Option<String>,
    pub loader_mode: String,
    pub identity_gate: bool,
    pub capture: CaptureConfig,
    pub signaling: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let username = non_empty("BUDDY_USERNAME");
        let loader_mode = non_empty("BUDDY_LOADER_MODE")
            .map(|m| m.to_lowercase())
            .unwrap_or_else(|| {
                if username.is_some() {
                    "handle".to_string()
                } else {
                    "directory".to_string()
                }
            });

        let capture = if let Some(path) = non_empty("BUDDY_CAPTURE_FILE") {
            CaptureConfig::SnapshotFile(path)
        } else if let Some(cmd) = non_empty("BUDDY_CAPTURE_COMMAND") {
            let mut parts = cmd.split_whitespace().map(|s| s.to_string());
            match parts.next() {
                Some(program) => CaptureConfig::Command {
                    program,
                    args: parts.collect(),
                },
                None => CaptureConfig::None,
            }
        } else {
            CaptureConfig::None
        };

        Self {
            port: non_empty("BUDDY_DASHBOARD_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            backend_url: non_empty("BUDDY_BACKEND_URL")
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            realtime_url: non_empty("BUDDY_REALTIME_URL")
                .unwrap_or_else(|| DEFAULT_REALTIME_URL.to_string()),
            username,
            loader_mode,
            identity_gate: non_empty("BUDDY_IDENTITY_GATE").is_some_and(|v| is_truthy(&v)),
            capture,
            signaling: non_empty("BUDDY_SIGNALING").is_some_and(|v| is_truthy(&v)),
        }
    }

    /// Reject settings that would otherwise be silently ignored
    pub fn validate(&self) -> Result<(), String> {
        match self.loader_mode.as_str() {
            "handle" | "directory" | "legacy" => Ok(()),
            other => Err(unknown_mode(other)),
        }
    }

    /// Loader source used when the dashboard activates without the identity gate
    pub fn startup_source(&self) -> Result<LoaderSource, String> {
        match self.loader_mode.as_str() {
            "handle" => self
                .username
                .clone()
                .map(LoaderSource::Handle)
                .ok_or_else(|| "BUDDY_LOADER_MODE=handle requires BUDDY_USERNAME".to_string()),
            "directory" => Ok(LoaderSource::Directory),
            "legacy" => Ok(LoaderSource::Legacy),
            other => Err(unknown_mode(other)),
        }
    }

    /// Loader source for a handle returned by face verification.
    /// `legacy` mode has no per-user endpoints so it stays legacy.
    pub fn source_for_identity(&self, username: &str) -> LoaderSource {
        match self.loader_mode.as_str() {
            "legacy" => LoaderSource::Legacy,
            _ => LoaderSource::Handle(username.to_string()),
        }
    }
}

fn unknown_mode(mode: &str) -> String {
    format!(
        "Unknown BUDDY_LOADER_MODE '{}'. Use 'handle', 'directory' or 'legacy'.",
        mode
    )
}

fn is_truthy(v: &str) -> bool {
    matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
