use crate::cli::{Cli, Commands};
use coverframe::config::Config;
use coverframe::engine::{
    self, BatchSummary, FfmpegEngine, JobSnapshot, JobStatus, LogNotifier, MediaEngine, Notifier,
    Preset, PresetId, QueueController, QueueEvent, SystemSpaceProbe, Validator,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use tracing::Level;

/// Prints the batch summary for the person at the terminal
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, summary: BatchSummary) {
        LogNotifier.notify(summary);
        println!("{}", summary.message());
    }
}

pub fn run(cli: Cli) {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {:#}", e);
        Config::default()
    });
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::CheckFfmpeg => handle_check_ffmpeg(&config),
        Commands::Presets => handle_presets(),
        Commands::Probe { file } => handle_probe(&config, &file),
        Commands::Estimate { file, preset } => {
            handle_estimate(&config, &file, preset.unwrap_or(config.defaults.preset))
        }
        Commands::Validate {
            video,
            image,
            preset,
        } => handle_validate(
            &config,
            &video,
            &image,
            preset.unwrap_or(config.defaults.preset),
        ),
        Commands::Process {
            video,
            image,
            preset,
            json,
        } => handle_process(
            &config,
            video,
            image,
            preset.unwrap_or(config.defaults.preset),
            json,
        ),
        Commands::Batch {
            paths,
            image,
            preset,
            json,
        } => handle_batch(
            &config,
            &paths,
            &image,
            preset.unwrap_or(config.defaults.preset),
            json,
        ),
        Commands::InitConfig => handle_init_config(),
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        engine::parse_level(&config.logging.level)
    };

    if let Err(e) = engine::init_file_logging(&config.logging.file, level) {
        eprintln!("Warning: {:#}", e);
        engine::init_stderr_logging(level);
    }
}

fn media_engine(config: &Config) -> Arc<dyn MediaEngine> {
    Arc::new(FfmpegEngine::new(
        config.engine.ffprobe.clone(),
        config.engine.ffmpeg_options(),
    ))
}

fn validator(config: &Config) -> Validator {
    Validator::new(media_engine(config), Arc::new(SystemSpaceProbe))
}

fn notifier(config: &Config) -> Arc<dyn Notifier> {
    if config.defaults.notify {
        Arc::new(ConsoleNotifier)
    } else {
        Arc::new(LogNotifier)
    }
}

fn handle_check_ffmpeg(config: &Config) {
    match engine::ffmpeg_version(&config.engine.ffmpeg) {
        Ok(version) => {
            println!("ffmpeg found: {}", version);
            match engine::ffprobe_version(&config.engine.ffprobe) {
                Ok(probe_version) => {
                    println!("ffprobe found: {}", probe_version);
                    process::exit(0);
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_presets() {
    for preset in Preset::all() {
        let video = if preset.is_passthrough() {
            "source quality".to_string()
        } else {
            format!("{} kbps", preset.target_bitrate_bps / 1000)
        };
        let resolution = preset
            .max_resolution
            .map(|(w, h)| format!("max {}x{}", w, h))
            .unwrap_or_else(|| "source size".to_string());

        println!(
            "{:<12} {:<14} video {}, audio {} kbps, {}, suffix {}",
            preset.id,
            preset.display_name,
            video,
            preset.audio_bitrate_bps / 1000,
            resolution,
            preset.filename_suffix
        );
    }
}

fn handle_probe(config: &Config, file: &Path) {
    match media_engine(config).probe(file) {
        Ok(info) => {
            for (index, track) in info.tracks.iter().enumerate() {
                println!(
                    "Track {}: {:?} {}{}",
                    index,
                    track.kind,
                    track.codec.as_deref().unwrap_or("unknown"),
                    if track.attached_pic { " (cover art)" } else { "" }
                );
            }
            match info.duration_s {
                Some(duration) => println!("Duration: {:.2} seconds", duration),
                None => println!("Duration: unknown"),
            }
            if let (Some(w), Some(h)) = (info.width, info.height) {
                println!("Resolution: {}x{}", w, h);
            }
            println!("Frame rate: {:.3} fps", info.frame_rate_or_default());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_estimate(config: &Config, file: &Path, preset: PresetId) {
    let preset = preset.resolve();
    match validator(config).preview(file, &preset) {
        Ok(preview) => {
            println!(
                "Estimated size: {}",
                engine::format_bytes(preview.estimated_bytes)
            );
            println!(
                "Required space: {} (incl. {}% margin)",
                engine::format_bytes(preview.required_bytes),
                engine::DISK_SAFETY_MARGIN_PERCENT
            );
            match preview.available_bytes {
                Some(available) => println!("Available: {}", engine::format_bytes(available)),
                None => println!("Available: unknown"),
            }
            if !preview.fits() {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_validate(config: &Config, video: &Path, image: &Path, preset: PresetId) {
    let preset = preset.resolve();
    match validator(config).validate(video, image, &preset) {
        Ok(()) => println!(
            "OK: {} -> {}",
            video.display(),
            engine::derive_output_path(video, &preset).display()
        ),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_process(config: &Config, video: PathBuf, image: PathBuf, preset: PresetId, json: bool) {
    let mut queue = QueueController::with_engine(media_engine(config), notifier(config));
    let events = queue.subscribe();

    if let Err(e) = queue.enqueue(video, image, preset) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let summary = follow_queue(&events, json);
    queue.shutdown();
    exit_with(summary);
}

fn handle_batch(config: &Config, paths: &[PathBuf], image: &Path, preset: PresetId, json: bool) {
    let videos = match engine::collect_videos(paths) {
        Ok(videos) => videos,
        Err(e) => {
            eprintln!("Error scanning: {:#}", e);
            process::exit(1);
        }
    };
    if videos.is_empty() {
        eprintln!("No video files found");
        process::exit(0);
    }

    let mut queue = QueueController::with_engine(media_engine(config), notifier(config));
    let events = queue.subscribe();

    let admission = queue.enqueue_batch(videos, image, preset);
    for (video, error) in &admission.rejected {
        eprintln!("Skipped {}: {}", video.display(), error);
    }
    if admission.accepted.is_empty() {
        eprintln!("No videos passed validation");
        process::exit(1);
    }
    println!("Queued {} video(s)", admission.accepted.len());

    let summary = follow_queue(&events, json);
    if queue.has_active_tasks() {
        eprintln!("Stopping with unfinished jobs");
    }
    queue.shutdown();
    exit_with(summary);
}

/// Print job updates until the queue reports the end of the batch
fn follow_queue(events: &Receiver<QueueEvent>, json: bool) -> Option<BatchSummary> {
    for event in events.iter() {
        match event {
            QueueEvent::JobUpdated(snapshot) => {
                if json {
                    match serde_json::to_string(&snapshot) {
                        Ok(line) => println!("{}", line),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                } else {
                    print_progress(&snapshot);
                }
            }
            QueueEvent::JobRemoved(_) => {}
            QueueEvent::BatchCompleted(summary) => return Some(summary),
        }
    }
    None
}

fn print_progress(job: &JobSnapshot) {
    let mut stderr = std::io::stderr().lock();
    match job.status {
        JobStatus::Pending => {}
        JobStatus::Processing => {
            let eta = job
                .eta_seconds
                .map(|s| engine::format_eta(Duration::from_secs_f64(s)))
                .unwrap_or_default();
            let _ = write!(
                stderr,
                "\r{} {:>3.0}% {:<20}",
                job.display_name,
                job.progress * 100.0,
                eta
            );
        }
        JobStatus::Completed => {
            let output = job
                .output_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            let _ = writeln!(
                stderr,
                "\r{}: {} -> {}",
                job.status.label(),
                job.display_name,
                output
            );
        }
        JobStatus::Failed => {
            let _ = writeln!(
                stderr,
                "\r{}: {}: {}",
                job.status.label(),
                job.display_name,
                job.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }
    let _ = stderr.flush();
}

fn exit_with(summary: Option<BatchSummary>) {
    match summary {
        Some(summary) if summary.failed_count() == 0 => process::exit(0),
        _ => process::exit(1),
    }
}

fn handle_init_config() {
    match Config::config_path() {
        Ok(path) if path.exists() => match Config::load() {
            Ok(cfg) => {
                println!("Config loaded successfully from {}", path.display());
                println!("{:#?}", cfg);
            }
            Err(e) => {
                eprintln!("Config invalid: {:#}", e);
                process::exit(1);
            }
        },
        Ok(path) => {
            if let Err(e) = Config::ensure_default() {
                eprintln!("Failed to save default config: {:#}", e);
                process::exit(1);
            }
            println!("Default config saved to {}", path.display());
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
