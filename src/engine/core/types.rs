use super::preset::{Preset, PresetId};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Pending or processing
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Processing => "Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }
}

/// A queued cover-embedding job. Owned by the queue once enqueued.
#[derive(Debug, Clone)]
pub struct CoverJob {
    pub id: Uuid,
    pub video_path: PathBuf,
    pub image_path: PathBuf,
    pub preset: Preset,
    pub status: JobStatus,

    // Runtime
    pub progress: f64,
    pub eta: Option<Duration>,
    pub output_path: Option<PathBuf>,
    pub error_message: Option<String>,
}

impl CoverJob {
    /// Create a new pending job
    pub fn new(video_path: PathBuf, image_path: PathBuf, preset: Preset) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_path,
            image_path,
            preset,
            status: JobStatus::Pending,
            progress: 0.0,
            eta: None,
            output_path: None,
            error_message: None,
        }
    }

    /// `"<video stem> • <preset name>"`
    pub fn display_name(&self) -> String {
        let stem = self
            .video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.video_path.display().to_string());
        format!("{} • {}", stem, self.preset.display_name)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            display_name: self.display_name(),
            video_path: self.video_path.clone(),
            image_path: self.image_path.clone(),
            preset: self.preset.id,
            status: self.status,
            progress: self.progress,
            eta_seconds: self.eta.map(|d| d.as_secs_f64()),
            output_path: self.output_path.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Read-only view of a job handed to observers
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub display_name: String,
    pub video_path: PathBuf,
    pub image_path: PathBuf,
    pub preset: PresetId,
    pub status: JobStatus,
    pub progress: f64,
    pub eta_seconds: Option<f64>,
    pub output_path: Option<PathBuf>,
    pub error_message: Option<String>,
}

/// Format a remaining-time estimate as `~M min S sec` or `~S sec`.
/// Non-positive estimates render empty.
pub fn format_eta(eta: Duration) -> String {
    if eta.is_zero() {
        return String::new();
    }

    let total = eta.as_secs();
    let minutes = total / 60;
    let seconds = total % 60;
    if minutes > 0 {
        format!("~{} min {} sec", minutes, seconds)
    } else {
        format!("~{} sec", seconds)
    }
}

/// Parser for ffmpeg progress output (key=value format)
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    pub out_time_us: u64,
    pub fps: Option<f64>,
    pub speed: Option<f64>,
    pub total_size: Option<u64>,
    pub is_complete: bool,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single line of ffmpeg progress output
    pub fn parse_line(&mut self, line: &str) {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                // out_time_ms is microseconds too, despite the name
                "out_time_us" | "out_time_ms" => {
                    if let Ok(us) = value.trim().parse::<u64>() {
                        self.out_time_us = us;
                    }
                }
                "fps" => {
                    if let Ok(f) = value.trim().parse::<f64>() {
                        self.fps = Some(f);
                    }
                }
                "speed" => {
                    let speed_str = value.trim().trim_end_matches('x');
                    if let Ok(s) = speed_str.parse::<f64>() {
                        self.speed = Some(s);
                    }
                }
                "total_size" => {
                    if let Ok(size) = value.trim().parse::<u64>() {
                        self.total_size = Some(size);
                    }
                }
                "progress" => {
                    if value.trim() == "end" {
                        self.is_complete = true;
                    }
                }
                _ => {}
            }
        }
    }

    /// Get output time in seconds
    pub fn out_time_s(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }

    /// Completion fraction in [0, 1] given the composition duration
    pub fn fraction(&self, duration_s: Option<f64>) -> f64 {
        match duration_s {
            Some(dur) if dur > 0.0 => (self.out_time_s() / dur).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}
