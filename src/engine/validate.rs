//! Pre-flight checks run before a job is admitted to the queue.

use crate::engine::core::{
    ImageKind, Preset, derive_output_path, estimate_output_size, format_bytes,
    required_with_margin,
};
use crate::engine::disk::{SpaceProbe, is_readable, is_writable_dir};
use crate::engine::media::MediaEngine;
use crate::engine::probe::MediaInfo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("File is not readable: {}", .0.display())]
    FileNotReadable(PathBuf),

    #[error("Unsupported video format: {}", .0.display())]
    UnsupportedVideoFormat(PathBuf),

    #[error("Unsupported image format: {}", .0.display())]
    UnsupportedImageFormat(PathBuf),

    #[error("File is corrupted: {}", .0.display())]
    CorruptedFile(PathBuf),

    #[error(
        "Insufficient disk space. Required: {}, available: {}",
        format_bytes(*required),
        format_bytes(*available)
    )]
    InsufficientDiskSpace { required: u64, available: u64 },

    #[error("No write permission for folder: {}", .0.display())]
    NoWritePermission(PathBuf),

    #[error("File already exists: {}", .0.display())]
    OutputFileExists(PathBuf),
}

/// Estimated footprint of an output file on its destination volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePreview {
    pub estimated_bytes: u64,
    /// Estimate plus safety margin
    pub required_bytes: u64,
    pub available_bytes: Option<u64>,
}

impl SizePreview {
    /// Unknown free space counts as enough
    pub fn fits(&self) -> bool {
        self.available_bytes
            .is_none_or(|available| available >= self.required_bytes)
    }
}

/// Read-only input checks. Nothing is created or reserved on disk.
#[derive(Clone)]
pub struct Validator {
    engine: Arc<dyn MediaEngine>,
    space: Arc<dyn SpaceProbe>,
}

impl Validator {
    pub fn new(engine: Arc<dyn MediaEngine>, space: Arc<dyn SpaceProbe>) -> Self {
        Self { engine, space }
    }

    /// Run every check in order, stopping at the first failure
    pub fn validate(
        &self,
        video_path: &Path,
        image_path: &Path,
        preset: &Preset,
    ) -> Result<(), ValidationError> {
        check_exists(video_path)?;
        check_exists(image_path)?;

        check_readable(video_path)?;
        check_readable(image_path)?;

        let info = self.check_video_format(video_path)?;
        check_image_format(image_path)?;

        let output_path = derive_output_path(video_path, preset);
        check_output_absent(&output_path)?;

        let output_dir = output_dir_of(&output_path);
        check_writable(&output_dir)?;

        let preview = self.size_preview(video_path, &info, preset);
        if let Some(available) = preview.available_bytes {
            if !preview.fits() {
                return Err(ValidationError::InsufficientDiskSpace {
                    required: preview.required_bytes,
                    available,
                });
            }
        }

        debug!(
            video = %video_path.display(),
            output = %output_path.display(),
            estimated = preview.estimated_bytes,
            "validation passed"
        );
        Ok(())
    }

    /// Size estimate for the output of `video_path` under `preset`, for display
    pub fn preview(&self, video_path: &Path, preset: &Preset) -> Result<SizePreview, ValidationError> {
        check_exists(video_path)?;
        check_readable(video_path)?;
        let info = self.check_video_format(video_path)?;
        Ok(self.size_preview(video_path, &info, preset))
    }

    fn check_video_format(&self, path: &Path) -> Result<MediaInfo, ValidationError> {
        let info = self.engine.probe(path).map_err(|e| {
            debug!(path = %path.display(), "probe failed: {}", e);
            ValidationError::CorruptedFile(path.to_path_buf())
        })?;

        if !info.is_playable() || !info.has_video() {
            return Err(ValidationError::UnsupportedVideoFormat(path.to_path_buf()));
        }

        Ok(info)
    }

    fn size_preview(&self, video_path: &Path, info: &MediaInfo, preset: &Preset) -> SizePreview {
        let input_size = std::fs::metadata(video_path).map(|m| m.len()).unwrap_or(0);
        let estimated_bytes =
            estimate_output_size(info.duration_s.unwrap_or(0.0), preset, input_size);
        let output_dir = output_dir_of(&derive_output_path(video_path, preset));

        SizePreview {
            estimated_bytes,
            required_bytes: required_with_margin(estimated_bytes),
            available_bytes: self.space.available_bytes(&output_dir),
        }
    }
}

fn output_dir_of(output_path: &Path) -> PathBuf {
    match output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn check_exists(path: &Path) -> Result<(), ValidationError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ValidationError::FileNotFound(path.to_path_buf()))
    }
}

fn check_readable(path: &Path) -> Result<(), ValidationError> {
    if path.is_file() && is_readable(path) {
        Ok(())
    } else {
        Err(ValidationError::FileNotReadable(path.to_path_buf()))
    }
}

fn check_image_format(path: &Path) -> Result<(), ValidationError> {
    ImageKind::from_extension(path)
        .map(|_| ())
        .ok_or_else(|| ValidationError::UnsupportedImageFormat(path.to_path_buf()))
}

fn check_output_absent(path: &Path) -> Result<(), ValidationError> {
    if path.exists() {
        Err(ValidationError::OutputFileExists(path.to_path_buf()))
    } else {
        Ok(())
    }
}

/// Undeterminable permissions count as writable
fn check_writable(dir: &Path) -> Result<(), ValidationError> {
    match is_writable_dir(dir) {
        Some(false) => Err(ValidationError::NoWritePermission(dir.to_path_buf())),
        _ => Ok(()),
    }
}
