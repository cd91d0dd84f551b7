//! What the encoder is asked to produce, and how it can answer.

use super::image_kind::ImageKind;
use super::preset::{OUTPUT_CONTAINER, Preset};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Concrete encoder settings derived from a preset
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderTarget {
    /// Bounding box; the source is only ever scaled down
    pub max_resolution: Option<(u32, u32)>,
    /// `None` keeps source quality (passthrough presets)
    pub video_bitrate_bps: Option<i64>,
    pub audio_bitrate_bps: i64,
    pub container: &'static str,
    /// Move the index to the front so playback can start while downloading
    pub fast_start: bool,
}

impl EncoderTarget {
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            max_resolution: preset.max_resolution,
            video_bitrate_bps: (!preset.is_passthrough()).then_some(preset.target_bitrate_bps),
            audio_bitrate_bps: preset.audio_bitrate_bps,
            container: OUTPUT_CONTAINER,
            fast_start: true,
        }
    }
}

/// Source tracks shifted by one frame, with the still image covering that frame
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionPlan {
    pub video_path: PathBuf,
    pub image_path: PathBuf,
    pub output_path: PathBuf,
    pub image_kind: ImageKind,
    pub frame_rate: f64,
    /// Source duration before the lead-in frame is added
    pub source_duration_s: Option<f64>,
    pub include_audio: bool,
    pub target: EncoderTarget,
}

impl CompositionPlan {
    /// Length of the reserved leading frame, `1 / frame_rate` seconds
    pub fn lead_in_s(&self) -> f64 {
        1.0 / self.frame_rate
    }

    /// Output timeline length: source plus lead-in frame
    pub fn total_duration_s(&self) -> Option<f64> {
        self.source_duration_s.map(|d| d + self.lead_in_s())
    }
}

/// How an encode session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderStatus {
    Completed,
    Failed(String),
    Cancelled,
    /// Ended in a way the engine can't classify
    Unknown(String),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("cannot open input {path}: {source}")]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to probe {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("no video track found in {0}")]
    NoVideoTrack(PathBuf),

    #[error("cover image {0} is not a JPEG, PNG or HEIC file")]
    UnsupportedImage(PathBuf),

    #[error("failed to start encoder session: {0}")]
    SessionCreation(String),

    #[error("export failed: {0}")]
    Failed(String),

    #[error("export cancelled")]
    Cancelled,

    #[error("export ended with unknown status: {0}")]
    UnknownStatus(String),
}

/// Shared flag asking an in-flight encode to stop
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
