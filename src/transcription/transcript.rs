//! Transcript accumulated over the running process

/// One completed transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSegment {
    pub text: String,
    /// Server conversation item the text belongs to
    pub item_id: Option<String>,
}

/// Completed segments of the current session, in arrival order
#[derive(Debug, Default, Clone)]
pub struct TranscriptLog {
    pub segments: Vec<TranscriptSegment>,
}

impl TranscriptLog {
    pub fn push(&mut self, text: &str, item_id: Option<&str>) {
        self.segments.push(TranscriptSegment {
            text: text.trim().to_string(),
            item_id: item_id.map(str::to_string),
        });
    }

    /// Get the full transcript text
    pub fn full_transcript(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_transcript_joins_segments() {
        let mut log = TranscriptLog::default();
        assert!(log.is_empty());
        log.push("Hello there.", Some("item_1"));
        log.push(" How are you? ", None);
        assert_eq!(log.full_transcript(), "Hello there. How are you?");
        assert_eq!(log.segments[0].item_id.as_deref(), Some("item_1"));
        log.clear();
        assert_eq!(log.full_transcript(), "");
    }
}
