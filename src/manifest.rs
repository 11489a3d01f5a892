//! Per-video caption manifest written by the ingestion side
use serde::{Deserialize, Serialize};

/// Lists the caption languages available for one video.
///
/// Only `langs` is required; `video_id` and `media_file` are carried through
/// when the producer writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_file: Option<String>,

    #[serde(default)]
    pub langs: Vec<String>,
}

impl Manifest {
    pub fn new(video_id: impl Into<String>, langs: Vec<String>) -> Self {
        Self {
            video_id: Some(video_id.into()),
            media_file: None,
            langs,
        }
    }

    pub fn with_media_file(mut self, media_file: impl Into<String>) -> Self {
        self.media_file = Some(media_file.into());
        self
    }
}
