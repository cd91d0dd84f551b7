// Input probing using ffprobe

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Frame rate assumed when the container doesn't report one
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run ffprobe: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("ffprobe could not read {path}: {stderr}")]
    Unreadable { path: String, stderr: String },

    #[error("failed to parse ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub kind: TrackKind,
    pub codec: Option<String>,
    /// Still images attached as cover art show up as video streams
    pub attached_pic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub tracks: Vec<Track>,
    pub duration_s: Option<f64>,
    pub frame_rate: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.tracks
            .iter()
            .any(|t| t.kind == TrackKind::Video && !t.attached_pic)
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Audio)
    }

    /// Has a timeline to play back
    pub fn is_playable(&self) -> bool {
        !self.tracks.is_empty() && self.duration_s.is_some_and(|d| d > 0.0)
    }

    /// Nominal frame rate, or 30fps when missing or nonsensical
    pub fn frame_rate_or_default(&self) -> f64 {
        match self.frame_rate {
            Some(fps) if fps.is_finite() && fps > 0.0 => fps,
            _ => DEFAULT_FRAME_RATE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    disposition: Option<FfprobeDisposition>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

/// Probe a media file with ffprobe to get its tracks, duration and frame rate
pub fn probe_media(ffprobe: &str, input_path: &Path) -> Result<MediaInfo, ProbeError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input_path)
        .output()?;

    if !output.status.success() {
        return Err(ProbeError::Unreadable {
            path: input_path.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_probe_json(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe `-show_format -show_streams` JSON
pub fn parse_probe_json(json: &str) -> Result<MediaInfo, ProbeError> {
    let probe: FfprobeOutput = serde_json::from_str(json)?;

    let mut info = MediaInfo {
        duration_s: probe
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.trim().parse::<f64>().ok()),
        ..MediaInfo::default()
    };

    for stream in probe.streams {
        let kind = match stream.codec_type.as_deref() {
            Some("video") => TrackKind::Video,
            Some("audio") => TrackKind::Audio,
            _ => TrackKind::Other,
        };
        let attached_pic = stream.disposition.is_some_and(|d| d.attached_pic != 0);

        // First real video stream defines geometry and timing
        if kind == TrackKind::Video && !attached_pic && info.width.is_none() {
            info.width = stream.width;
            info.height = stream.height;
            // Try r_frame_rate first (more accurate), fall back to avg_frame_rate
            info.frame_rate = stream
                .r_frame_rate
                .as_deref()
                .and_then(parse_fraction)
                .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_fraction));
        }

        info.tracks.push(Track {
            kind,
            codec: stream.codec_name,
            attached_pic,
        });
    }

    Ok(info)
}

/// Parse a fraction string like "30000/1001" to f64
fn parse_fraction(s: &str) -> Option<f64> {
    let (numerator, denominator) = s.split_once('/')?;
    let numerator: f64 = numerator.trim().parse().ok()?;
    let denominator: f64 = denominator.trim().parse().ok()?;

    if denominator == 0.0 {
        return None;
    }

    Some(numerator / denominator)
}
