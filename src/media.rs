//! Media element model and the abstract media store.
//!
//! Media elements are consumed read-only by the streaming core; scanning
//! and metadata extraction happen elsewhere and persist through a
//! [`MediaStore`] implementation.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of a media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaElementType {
    Audio,
    Video,
    Directory,
}

/// Video stream descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
}

/// Audio stream descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub language: Option<String>,
}

/// Subtitle stream format. The text formats can be rendered with a
/// timestamp-shifting filter; the picture formats need an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleFormat {
    Subrip,
    WebVtt,
    Ass,
    Dvb,
    Dvd,
    Pgs,
}

impl SubtitleFormat {
    /// Whether this format is text-based (as opposed to bitmap-based).
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Subrip | Self::WebVtt | Self::Ass)
    }
}

/// Subtitle stream descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleStreamInfo {
    pub format: SubtitleFormat,
    pub language: Option<String>,
    pub forced: bool,
}

/// A playable file in the library.
///
/// Empty `audio_streams`/`subtitle_streams` mean the element has no such
/// streams; the arrays are never "unknown".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaElement {
    pub id: Uuid,
    pub path: PathBuf,
    pub element_type: MediaElementType,
    /// Duration in whole seconds. Must be > 0 before segment math runs.
    pub duration_secs: u32,
    pub video: Option<VideoStreamInfo>,
    pub audio_streams: Vec<AudioStreamInfo>,
    pub subtitle_streams: Vec<SubtitleStreamInfo>,
}

/// Read-only lookup into the media library.
pub trait MediaStore: Send + Sync {
    fn get(&self, id: Uuid) -> Option<MediaElement>;
}

/// In-memory media store backed by a concurrent map.
#[derive(Default)]
pub struct MemoryMediaStore {
    elements: DashMap<Uuid, MediaElement>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, element: MediaElement) {
        self.elements.insert(element.id, element);
    }

    pub fn remove(&self, id: Uuid) {
        self.elements.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl MediaStore for MemoryMediaStore {
    fn get(&self, id: Uuid) -> Option<MediaElement> {
        self.elements.get(&id).map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_element() -> MediaElement {
        MediaElement {
            id: Uuid::new_v4(),
            path: PathBuf::from("/library/movie.mkv"),
            element_type: MediaElementType::Video,
            duration_secs: 95,
            video: Some(VideoStreamInfo {
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
            }),
            audio_streams: vec![AudioStreamInfo {
                codec: "aac".to_string(),
                sample_rate: 48000,
                channels: 6,
                language: Some("eng".to_string()),
            }],
            subtitle_streams: Vec::new(),
        }
    }

    #[test]
    fn test_store_insert_and_get() {
        let store = MemoryMediaStore::new();
        let element = sample_element();
        let id = element.id;

        store.insert(element);
        assert_eq!(store.len(), 1);

        let found = store.get(id).unwrap();
        assert_eq!(found.duration_secs, 95);
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_subtitle_format_classification() {
        assert!(SubtitleFormat::Subrip.is_text());
        assert!(SubtitleFormat::WebVtt.is_text());
        assert!(SubtitleFormat::Ass.is_text());
        assert!(!SubtitleFormat::Dvb.is_text());
        assert!(!SubtitleFormat::Dvd.is_text());
        assert!(!SubtitleFormat::Pgs.is_text());
    }
}
