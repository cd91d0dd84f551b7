use super::composition::{CancelFlag, CompositionPlan, EncodeError, EncoderStatus};
use super::types::ProgressParser;
use std::io::{BufRead, BufReader};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// Lines of ffmpeg stderr kept for error messages
const STDERR_TAIL_LINES: usize = 8;

/// Settings for the ffmpeg command line that don't come from the composition
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegOptions {
    pub ffmpeg: String,
    /// Seconds between progress reports
    pub stats_period_secs: f64,
    /// Extra arguments placed before the output path
    pub extra_args: String,
}

impl Default for FfmpegOptions {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            stats_period_secs: 0.1,
            extra_args: String::new(),
        }
    }
}

/// Check if FFmpeg was cancelled by user signal (SIGTERM, SIGINT, SIGQUIT)
///
/// FFmpeg catches signals and exits gracefully, printing "Exiting normally, received signal X"
/// So we check both the process signal status AND the stderr for this message.
#[cfg(unix)]
fn was_user_cancelled(status: &ExitStatus, stderr: &str) -> bool {
    use std::os::unix::process::ExitStatusExt;

    if let Some(signal) = status.signal() {
        if matches!(signal, 2 | 3 | 15) {
            return true;
        }
    }

    stderr.contains("received signal 2")
        || stderr.contains("received signal 3")
        || stderr.contains("received signal 15")
}

#[cfg(not(unix))]
fn was_user_cancelled(_status: &ExitStatus, stderr: &str) -> bool {
    stderr.contains("received signal")
}

/// Apply additional user-provided FFmpeg arguments to the command.
/// Uses shell-style parsing so quoted strings with spaces are preserved.
fn apply_additional_args(cmd: &mut Command, additional_args: &str) {
    if additional_args.trim().is_empty() {
        return;
    }

    if let Some(args) = shlex::split(additional_args) {
        cmd.args(args);
    } else {
        // Unbalanced quotes: fall back to simple whitespace split
        cmd.args(additional_args.split_whitespace());
    }
}

/// Render seconds for filter expressions without float noise
fn secs(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() { "0".to_string() } else { s.to_string() }
}

/// Build the filter graph: shifted source, cover image fading out over the lead-in frame
fn build_filter_graph(plan: &CompositionPlan) -> String {
    let lead_in = secs(plan.lead_in_s());

    let scale = match plan.target.max_resolution {
        Some((w, h)) => format!(
            ",scale=w='min({w},iw)':h='min({h},ih)':force_original_aspect_ratio=decrease:force_divisible_by=2"
        ),
        None => String::new(),
    };

    let mut graph = format!(
        "[0:v:0]tpad=start_duration={lead_in}:start_mode=add:color=black{scale},setsar=1[base];\
         [1:v]format=rgba,fade=t=out:st=0:d={lead_in}:alpha=1[cover];\
         [cover][base]scale2ref[cover_fit][base_fit];\
         [base_fit][cover_fit]overlay=eof_action=pass,format=yuv420p[vout]"
    );

    if plan.include_audio {
        let delay_ms = secs(plan.lead_in_s() * 1000.0);
        graph.push_str(&format!(";[0:a:0]adelay=delays={delay_ms}:all=1[aout]"));
    }

    graph
}

/// Build the ffmpeg command for a composition plan.
///
/// Inputs: 0 = source video, 1 = still image looped for the lead-in frame,
/// 2 = still image again as the attached cover-art stream.
pub fn build_cover_cmd(plan: &CompositionPlan, options: &FfmpegOptions) -> Command {
    let mut cmd = Command::new(&options.ffmpeg);

    cmd.arg("-hide_banner").arg("-nostdin").arg("-y");

    cmd.arg("-i").arg(&plan.video_path);

    cmd.arg("-loop")
        .arg("1")
        .arg("-framerate")
        .arg(secs(plan.frame_rate))
        .arg("-t")
        .arg(secs(plan.lead_in_s()))
        .arg("-i")
        .arg(&plan.image_path);

    cmd.arg("-i").arg(&plan.image_path);

    cmd.arg("-filter_complex").arg(build_filter_graph(plan));

    cmd.arg("-map").arg("[vout]");
    if plan.include_audio {
        cmd.arg("-map").arg("[aout]");
    }
    cmd.arg("-map").arg("2:v:0");

    // Main video stream
    cmd.arg("-c:v:0").arg("libx264").arg("-preset").arg("medium");
    match plan.target.video_bitrate_bps {
        Some(bps) => {
            cmd.arg("-b:v:0")
                .arg(bps.to_string())
                .arg("-maxrate:v:0")
                .arg(bps.to_string())
                .arg("-bufsize:v:0")
                .arg((bps * 2).to_string());
        }
        None => {
            cmd.arg("-crf").arg("18");
        }
    }

    if plan.include_audio {
        cmd.arg("-c:a")
            .arg("aac")
            .arg("-b:a")
            .arg(plan.target.audio_bitrate_bps.to_string());
    }

    // Cover art stream
    cmd.arg("-c:v:1")
        .arg(plan.image_kind.cover_codec())
        .arg("-disposition:v:1")
        .arg("attached_pic");

    if plan.target.fast_start {
        cmd.arg("-movflags").arg("+faststart");
    }

    cmd.arg("-progress")
        .arg("pipe:1")
        .arg("-stats_period")
        .arg(secs(options.stats_period_secs))
        .arg("-nostats");

    apply_additional_args(&mut cmd, &options.extra_args);

    cmd.arg("-f").arg(plan.target.container).arg(&plan.output_path);

    cmd
}

/// Format a command as a shell-quoted string for logs
pub fn format_ffmpeg_cmd(cmd: &Command) -> String {
    let parts: Vec<String> = std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    shlex::try_join(parts.iter().map(String::as_str)).unwrap_or_else(|_| parts.join(" "))
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Run an ffmpeg command, feeding completion fractions to `on_fraction` as
/// progress blocks arrive. Polls `cancel` between blocks and kills the child
/// when it is set.
///
/// `Err` means the session never started; every started session ends in an
/// `EncoderStatus`.
pub fn run_ffmpeg_with_progress(
    mut cmd: Command,
    total_duration_s: Option<f64>,
    cancel: &CancelFlag,
    on_fraction: &mut dyn FnMut(f64),
) -> Result<EncoderStatus, EncodeError> {
    debug!(command = %format_ffmpeg_cmd(&cmd), "spawning ffmpeg");

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| EncodeError::SessionCreation(format!("failed to spawn ffmpeg: {}", e)))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| EncodeError::SessionCreation("failed to capture stderr".to_string()))?;
    let stderr_thread = std::thread::spawn(move || {
        let mut stderr_output = String::new();
        let reader = BufReader::new(stderr);
        for line in reader.lines().map_while(Result::ok) {
            stderr_output.push_str(&line);
            stderr_output.push('\n');
        }
        stderr_output
    });

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| EncodeError::SessionCreation("failed to capture stdout".to_string()))?;
    let reader = BufReader::new(stdout);
    let mut parser = ProgressParser::new();
    let mut killed = false;

    for line in reader.lines().map_while(Result::ok) {
        if cancel.is_cancelled() {
            if let Err(e) = child.kill() {
                warn!("failed to kill ffmpeg: {}", e);
            }
            killed = true;
            break;
        }

        parser.parse_line(&line);
        // Each progress block ends with a "progress=" line
        if line.starts_with("progress=") {
            on_fraction(parser.fraction(total_duration_s));
        }
    }

    let status = child
        .wait()
        .map_err(|e| EncodeError::Failed(format!("failed to wait for ffmpeg: {}", e)))?;

    let stderr_output = stderr_thread
        .join()
        .unwrap_or_else(|_| "failed to capture stderr".to_string());

    if killed || (cancel.is_cancelled() && !status.success()) {
        return Ok(EncoderStatus::Cancelled);
    }
    if status.success() {
        return Ok(EncoderStatus::Completed);
    }
    if was_user_cancelled(&status, &stderr_output) {
        return Ok(EncoderStatus::Cancelled);
    }

    let tail = stderr_tail(&stderr_output);
    match status.code() {
        Some(code) => Ok(EncoderStatus::Failed(if tail.is_empty() {
            format!("ffmpeg exited with status {}", code)
        } else {
            tail
        })),
        None => Ok(EncoderStatus::Unknown(format!("{} {}", status, tail).trim().to_string())),
    }
}
