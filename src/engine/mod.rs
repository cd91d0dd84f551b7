// Cover-art engine - independent of any front end

pub mod core;
pub mod disk;
pub mod media;
pub mod notify;
pub mod pipeline;
pub mod probe;
pub mod queue;
pub mod validate;

pub use core::*;
pub use disk::{SpaceProbe, SystemSpaceProbe};
pub use media::{FfmpegEngine, MediaEngine};
pub use notify::{BatchSummary, LogNotifier, Notifier};
pub use pipeline::Pipeline;
pub use probe::{MediaInfo, ProbeError, Track, TrackKind};
pub use queue::{BatchAdmission, QueueController, QueueEvent};
pub use validate::{SizePreview, ValidationError, Validator};
