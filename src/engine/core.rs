mod composition;
mod estimate;
mod ffmpeg_cmd;
mod ffmpeg_info;
mod image_kind;
mod log;
mod preset;
mod scan;
mod types;

pub use composition::{CancelFlag, CompositionPlan, EncodeError, EncoderStatus, EncoderTarget};
pub use estimate::{
    DISK_SAFETY_MARGIN_PERCENT, estimate_output_size, format_bytes, required_with_margin,
};
pub use ffmpeg_cmd::{FfmpegOptions, build_cover_cmd, format_ffmpeg_cmd, run_ffmpeg_with_progress};
pub use ffmpeg_info::{ffmpeg_version, ffprobe_version};
pub use image_kind::ImageKind;
pub use log::{LocalTimestamp, init_file_logging, init_stderr_logging, parse_level};
pub use preset::{OUTPUT_CONTAINER, Preset, PresetId, PresetParseError, derive_output_path};
pub use scan::{collect_videos, is_video_file, scan_streaming};
pub use types::{CoverJob, JobSnapshot, JobStatus, ProgressParser, format_eta};
