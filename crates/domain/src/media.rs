use serde::{Deserialize, Serialize};

/// Input modality declared by the caller; selects the orchestrator entry point.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Maps a MIME type to a modality. Only the top-level type is inspected.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let (top_level, _) = content_type.split_once('/')?;
        match top_level.trim().to_ascii_lowercase().as_str() {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}
