//! The encode/probe capability the pipeline depends on.

use super::core::{
    CancelFlag, CompositionPlan, EncodeError, EncoderStatus, FfmpegOptions, build_cover_cmd,
    run_ffmpeg_with_progress,
};
use super::probe::{MediaInfo, ProbeError, probe_media};
use std::path::Path;

/// A media framework able to inspect sources and render a composition.
///
/// `encode` reports completion fractions in `[0, 1]` through `progress` from
/// whatever thread it runs on. It returns `Err` only when no encode session
/// could be started; a started session always ends in an `EncoderStatus`.
pub trait MediaEngine: Send + Sync {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;

    fn encode(
        &self,
        plan: &CompositionPlan,
        cancel: &CancelFlag,
        progress: &mut dyn FnMut(f64),
    ) -> Result<EncoderStatus, EncodeError>;
}

/// `MediaEngine` backed by the ffmpeg and ffprobe binaries
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffprobe: String,
    options: FfmpegOptions,
}

impl FfmpegEngine {
    pub fn new(ffprobe: impl Into<String>, options: FfmpegOptions) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            options,
        }
    }

    pub fn options(&self) -> &FfmpegOptions {
        &self.options
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffprobe", FfmpegOptions::default())
    }
}

impl MediaEngine for FfmpegEngine {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        probe_media(&self.ffprobe, path)
    }

    fn encode(
        &self,
        plan: &CompositionPlan,
        cancel: &CancelFlag,
        progress: &mut dyn FnMut(f64),
    ) -> Result<EncoderStatus, EncodeError> {
        let cmd = build_cover_cmd(plan, &self.options);
        run_ffmpeg_with_progress(cmd, plan.total_duration_s(), cancel, progress)
    }
}
