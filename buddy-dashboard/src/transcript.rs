//! Append-only transcript log fed by the realtime channel.

use buddy_types::{ChannelFrame, Sender, TRANSCRIPT_FRAME_KIND, TranscriptLine};

/// Ordered transcript for one view session. Lines are kept in arrival order
/// and never edited or removed.
#[derive(Debug, Default, Clone)]
pub struct TranscriptLog {
    lines: Vec<TranscriptLine>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line, returning the new length
    pub fn append(&mut self, line: TranscriptLine) -> usize {
        self.lines.push(line);
        self.lines.len()
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    /// Lines from index `since` onward (empty when `since` is past the end)
    pub fn since(&self, since: usize) -> &[TranscriptLine] {
        self.lines.get(since..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Turn a raw channel frame into a transcript line.
/// Returns `None` for other kinds and for frames that are not JSON objects.
pub fn parse_frame(raw: &str) -> Option<TranscriptLine> {
    let frame: ChannelFrame = match serde_json::from_str(raw) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("[CHANNEL] Dropping unparseable frame: {}", e);
            return None;
        }
    };
    if frame.kind.as_deref() != Some(TRANSCRIPT_FRAME_KIND) {
        return None;
    }
    Some(TranscriptLine {
        sender: Sender::from_tag(frame.sender.as_deref()),
        text: frame.text.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcript_frame() {
        let line = parse_frame(r#"{"type":"transcript","sender":"user","text":"hi"}"#).unwrap();
        assert_eq!(line.sender, Sender::User);
        assert_eq!(line.text, "hi");
    }

    #[test]
    fn test_other_kinds_and_garbage_dropped() {
        assert!(parse_frame(r#"{"type":"status","text":"ready"}"#).is_none());
        assert!(parse_frame(r#"{"sender":"user","text":"no kind"}"#).is_none());
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame("[1,2,3]").is_none());
    }

    #[test]
    fn test_interleaved_frames_keep_arrival_order() {
        let frames = [
            r#"{"type":"transcript","sender":"user","text":"one"}"#,
            r#"{"type":"audio","chunk":"..."}"#,
            r#"{"type":"transcript","sender":"assistant","text":"two"}"#,
            "{oops",
            r#"{"type":"transcript","sender":"user","text":"three"}"#,
            r#"{"type":"heartbeat"}"#,
        ];
        let mut log = TranscriptLog::new();
        for raw in frames {
            if let Some(line) = parse_frame(raw) {
                log.append(line);
            }
        }
        let texts: Vec<&str> = log.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(log.lines()[1].sender, Sender::Assistant);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut log = TranscriptLog::new();
        let line = TranscriptLine {
            sender: Sender::User,
            text: "again".into(),
        };
        log.append(line.clone());
        assert_eq!(log.append(line), 2);
    }

    #[test]
    fn test_since_cursor() {
        let mut log = TranscriptLog::new();
        for i in 0..3 {
            log.append(TranscriptLine {
                sender: Sender::Assistant,
                text: i.to_string(),
            });
        }
        assert_eq!(log.since(0).len(), 3);
        assert_eq!(log.since(2)[0].text, "2");
        assert!(log.since(3).is_empty());
        assert!(log.since(10).is_empty());
    }
}
