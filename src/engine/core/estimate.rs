use super::preset::Preset;

/// Headroom demanded on the destination volume on top of the estimate
pub const DISK_SAFETY_MARGIN_PERCENT: u64 = 20;

/// Growth allowed for passthrough output over the input file
const PASSTHROUGH_OVERHEAD_PERCENT: u64 = 10;

fn grow_by_percent(bytes: u64, percent: u64) -> u64 {
    (bytes as u128 * (100 + percent) as u128 / 100).min(u64::MAX as u128) as u64
}

/// Estimate output size in bytes.
///
/// Fixed-bitrate presets scale with duration:
/// `duration * (video_bps + audio_bps) / 8`. Passthrough presets are sized
/// from the input file instead. Fractions are truncated.
pub fn estimate_output_size(duration_s: f64, preset: &Preset, input_size_bytes: u64) -> u64 {
    if preset.is_passthrough() {
        return grow_by_percent(input_size_bytes, PASSTHROUGH_OVERHEAD_PERCENT);
    }

    let duration_s = duration_s.max(0.0);
    let total_bps = (preset.target_bitrate_bps + preset.audio_bitrate_bps) as f64;
    (duration_s * total_bps / 8.0) as u64
}

/// Bytes that must be free before an encode is admitted
pub fn required_with_margin(estimated_bytes: u64) -> u64 {
    grow_by_percent(estimated_bytes, DISK_SAFETY_MARGIN_PERCENT)
}

/// Render a byte count the way file managers do (decimal units)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "TB"];

    if bytes < 1000 {
        return format!("{} bytes", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
