// In-process stand-ins for the media framework, the filesystem and the notifier

use coverframe::engine::{
    BatchSummary, CancelFlag, CompositionPlan, EncodeError, EncoderStatus, MediaEngine, MediaInfo,
    Notifier, ProbeError, SpaceProbe, Track, TrackKind,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

pub fn video_track() -> Track {
    Track {
        kind: TrackKind::Video,
        codec: Some("h264".to_string()),
        attached_pic: false,
    }
}

pub fn audio_track() -> Track {
    Track {
        kind: TrackKind::Audio,
        codec: Some("aac".to_string()),
        attached_pic: false,
    }
}

/// A playable clip with video and audio
pub fn clip(duration_s: f64) -> MediaInfo {
    MediaInfo {
        tracks: vec![video_track(), audio_track()],
        duration_s: Some(duration_s),
        frame_rate: Some(25.0),
        width: Some(1920),
        height: Some(1080),
    }
}

/// Blocks encodes until opened; lets tests observe a job mid-flight
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    /// Wait for the gate; returns false if `cancel` fired first
    fn pass(&self, cancel: &CancelFlag) -> bool {
        let (lock, cvar) = &*self.0;
        let mut open = lock.lock().unwrap();
        while !*open {
            if cancel.is_cancelled() {
                return false;
            }
            open = cvar
                .wait_timeout(open, Duration::from_millis(10))
                .unwrap()
                .0;
        }
        true
    }
}

/// Scriptable `MediaEngine`. Unknown paths probe as a 10 second clip.
#[derive(Default)]
pub struct FakeEngine {
    probes: Mutex<HashMap<PathBuf, Option<MediaInfo>>>,
    failing: Mutex<HashSet<PathBuf>>,
    crashing: Mutex<HashSet<PathBuf>>,
    steps: Mutex<Vec<f64>>,
    gate: Mutex<Option<Gate>>,
    encoded: Mutex<Vec<PathBuf>>,
    plans: Mutex<Vec<CompositionPlan>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_probe(&self, path: &Path, info: MediaInfo) {
        self.probes
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), Some(info));
    }

    pub fn set_unreadable(&self, path: &Path) {
        self.probes.lock().unwrap().insert(path.to_path_buf(), None);
    }

    pub fn fail_encode(&self, video: &Path) {
        self.failing.lock().unwrap().insert(video.to_path_buf());
    }

    /// Panic inside `encode` for this video
    pub fn crash_encode(&self, video: &Path) {
        self.crashing.lock().unwrap().insert(video.to_path_buf());
    }

    pub fn set_steps(&self, steps: &[f64]) {
        *self.steps.lock().unwrap() = steps.to_vec();
    }

    /// Hold every encode until the returned gate opens
    pub fn hold(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Source videos in the order their encodes started
    pub fn encoded(&self) -> Vec<PathBuf> {
        self.encoded.lock().unwrap().clone()
    }

    pub fn plans(&self) -> Vec<CompositionPlan> {
        self.plans.lock().unwrap().clone()
    }
}

impl MediaEngine for FakeEngine {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        match self.probes.lock().unwrap().get(path) {
            Some(Some(info)) => Ok(info.clone()),
            Some(None) => Err(ProbeError::Unreadable {
                path: path.display().to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            }),
            None => Ok(clip(10.0)),
        }
    }

    fn encode(
        &self,
        plan: &CompositionPlan,
        cancel: &CancelFlag,
        progress: &mut dyn FnMut(f64),
    ) -> Result<EncoderStatus, EncodeError> {
        self.encoded.lock().unwrap().push(plan.video_path.clone());
        self.plans.lock().unwrap().push(plan.clone());

        // Like ffmpeg, the output exists as soon as encoding starts
        fs::write(&plan.output_path, b"partial").map_err(|e| EncodeError::Failed(e.to_string()))?;

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if !gate.pass(cancel) {
                return Ok(EncoderStatus::Cancelled);
            }
        }

        let steps = self.steps.lock().unwrap().clone();
        for step in steps {
            progress(step);
        }

        if self.crashing.lock().unwrap().contains(&plan.video_path) {
            panic!("encoder crashed on {}", plan.video_path.display());
        }
        if self.failing.lock().unwrap().contains(&plan.video_path) {
            return Ok(EncoderStatus::Failed("encoder exploded".to_string()));
        }

        fs::write(&plan.output_path, b"encoded").map_err(|e| EncodeError::Failed(e.to_string()))?;
        Ok(EncoderStatus::Completed)
    }
}

/// Fixed free-space answer
pub struct FakeSpace(pub Option<u64>);

impl SpaceProbe for FakeSpace {
    fn available_bytes(&self, _dir: &Path) -> Option<u64> {
        self.0
    }
}

/// Plenty of room
pub fn roomy() -> Arc<FakeSpace> {
    Arc::new(FakeSpace(Some(u64::MAX / 2)))
}

#[derive(Default)]
pub struct RecordingNotifier {
    summaries: Mutex<Vec<BatchSummary>>,
}

impl RecordingNotifier {
    pub fn summaries(&self) -> Vec<BatchSummary> {
        self.summaries.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, summary: BatchSummary) {
        self.summaries.lock().unwrap().push(summary);
    }
}
