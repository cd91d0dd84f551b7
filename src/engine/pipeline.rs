//! Turns one validated (video, image, preset) triple into an output file.

use crate::engine::core::{
    CancelFlag, CompositionPlan, EncodeError, EncoderStatus, EncoderTarget, ImageKind, Preset,
};
use crate::engine::media::MediaEngine;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default spacing between progress reports
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Open read handles on both inputs, held for the whole encode and released on drop
struct InputLease {
    _video: File,
    _image: File,
}

impl InputLease {
    fn acquire(video_path: &Path, image_path: &Path) -> Result<Self, EncodeError> {
        let open = |path: &Path| {
            File::open(path).map_err(|source| EncodeError::InputUnavailable {
                path: path.to_path_buf(),
                source,
            })
        };
        Ok(Self {
            _video: open(video_path)?,
            _image: open(image_path)?,
        })
    }
}

/// Turns raw encoder fractions into monotonic, throttled `(fraction, eta)` reports
pub struct ProgressTracker {
    started_at: Instant,
    min_interval: Duration,
    last_emit: Option<Instant>,
    fraction: f64,
}

impl ProgressTracker {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            min_interval,
            last_emit: None,
            fraction: 0.0,
        }
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Fold in a raw fraction; returns the report to emit, if one is due
    pub fn update(&mut self, raw: f64) -> Option<(f64, Option<Duration>)> {
        let raw = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
        self.fraction = self.fraction.max(raw);

        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.min_interval {
                return None;
            }
        }
        self.last_emit = Some(now);

        let eta = remaining_time(self.fraction, now.duration_since(self.started_at));
        Some((self.fraction, eta))
    }
}

/// `elapsed * (1 - p) / p`, undefined until some progress has been made
pub fn remaining_time(fraction: f64, elapsed: Duration) -> Option<Duration> {
    if fraction <= 0.0 {
        return None;
    }
    if fraction >= 1.0 {
        return Some(Duration::ZERO);
    }
    // Tiny fractions overflow Duration; no estimate until progress is meaningful
    Duration::try_from_secs_f64(elapsed.as_secs_f64() * (1.0 - fraction) / fraction).ok()
}

/// Best-effort removal of whatever the encoder left behind after a failed run
fn discard_partial_output(output_path: &Path) {
    match fs::remove_file(output_path) {
        Ok(()) => debug!(output = %output_path.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(output = %output_path.display(), "failed to remove partial output: {}", e),
    }
}

/// Encoding pipeline over a `MediaEngine`
#[derive(Clone)]
pub struct Pipeline {
    engine: Arc<dyn MediaEngine>,
    progress_interval: Duration,
}

impl Pipeline {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Embed `image_path` as cover art and leading frame of `video_path`,
    /// writing `output_path`. `on_progress` receives `(fraction, eta)`; the
    /// last report of a successful run is exactly `(1.0, 0s)`.
    pub fn process(
        &self,
        video_path: &Path,
        image_path: &Path,
        output_path: &Path,
        preset: &Preset,
        cancel: &CancelFlag,
        on_progress: &mut dyn FnMut(f64, Option<Duration>),
    ) -> Result<PathBuf, EncodeError> {
        let _lease = InputLease::acquire(video_path, image_path)?;

        let info = self
            .engine
            .probe(video_path)
            .map_err(|e| EncodeError::Probe {
                path: video_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !info.has_video() {
            return Err(EncodeError::NoVideoTrack(video_path.to_path_buf()));
        }

        let image_kind = ImageKind::detect(image_path)
            .map_err(|source| EncodeError::InputUnavailable {
                path: image_path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| EncodeError::UnsupportedImage(image_path.to_path_buf()))?;

        let plan = CompositionPlan {
            video_path: video_path.to_path_buf(),
            image_path: image_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            image_kind,
            frame_rate: info.frame_rate_or_default(),
            source_duration_s: info.duration_s,
            include_audio: info.has_audio(),
            target: EncoderTarget::from_preset(preset),
        };

        debug!(
            frame_rate = plan.frame_rate,
            audio = plan.include_audio,
            image = image_kind.mime_type(),
            "composition planned"
        );

        // Validation saw no file here, but something may have appeared since
        if output_path.exists() {
            if let Err(e) = fs::remove_file(output_path) {
                warn!(output = %output_path.display(), "failed to remove stale output: {}", e);
            }
        }

        let mut tracker = ProgressTracker::new(self.progress_interval);
        let status = self.engine.encode(&plan, cancel, &mut |raw| {
            if let Some((fraction, eta)) = tracker.update(raw) {
                on_progress(fraction, eta);
            }
        });

        let error = match status {
            Ok(EncoderStatus::Completed) => {
                on_progress(1.0, Some(Duration::ZERO));
                info!(output = %output_path.display(), "export completed");
                return Ok(output_path.to_path_buf());
            }
            Ok(EncoderStatus::Failed(reason)) => EncodeError::Failed(reason),
            Ok(EncoderStatus::Cancelled) => EncodeError::Cancelled,
            Ok(EncoderStatus::Unknown(detail)) => EncodeError::UnknownStatus(detail),
            Err(e) => e,
        };

        // A half-written file would block resubmitting the same inputs
        discard_partial_output(output_path);
        Err(error)
    }
}
