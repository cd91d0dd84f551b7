use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Container extension for every output file
pub const OUTPUT_CONTAINER: &str = "mp4";

/// Quality tiers offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresetId {
    Original,
    TelegramHd,
    TelegramSd,
}

impl PresetId {
    pub const ALL: [PresetId; 3] = [
        PresetId::Original,
        PresetId::TelegramHd,
        PresetId::TelegramSd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetId::Original => "original",
            PresetId::TelegramHd => "telegram-hd",
            PresetId::TelegramSd => "telegram-sd",
        }
    }

    /// Look up the catalog entry for this id
    pub fn resolve(self) -> Preset {
        Preset::get(self)
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown preset '{given}' (expected one of: original, telegram-hd, telegram-sd)")]
pub struct PresetParseError {
    pub given: String,
}

impl FromStr for PresetId {
    type Err = PresetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        PresetId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| PresetParseError {
                given: s.to_string(),
            })
    }
}

/// Immutable export settings for one quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub id: PresetId,
    pub display_name: &'static str,
    /// Video bitrate target; 0 means passthrough quality with no bitrate cap
    pub target_bitrate_bps: i64,
    pub audio_bitrate_bps: i64,
    pub max_resolution: Option<(u32, u32)>,
    pub filename_suffix: &'static str,
}

impl Preset {
    /// Get a built-in preset by id
    pub fn get(id: PresetId) -> Self {
        match id {
            PresetId::Original => Preset {
                id,
                display_name: "Original quality",
                target_bitrate_bps: 0,
                audio_bitrate_bps: 256_000,
                max_resolution: None,
                filename_suffix: "_original",
            },
            PresetId::TelegramHd => Preset {
                id,
                display_name: "Telegram HD (1080p)",
                target_bitrate_bps: 4_000_000,
                audio_bitrate_bps: 128_000,
                max_resolution: Some((1920, 1080)),
                filename_suffix: "_telegram_hd",
            },
            PresetId::TelegramSd => Preset {
                id,
                display_name: "Telegram SD (720p)",
                target_bitrate_bps: 2_000_000,
                audio_bitrate_bps: 128_000,
                max_resolution: Some((1280, 720)),
                filename_suffix: "_telegram_sd",
            },
        }
    }

    /// All presets in catalog order
    pub fn all() -> Vec<Preset> {
        PresetId::ALL.into_iter().map(Preset::get).collect()
    }

    pub fn is_passthrough(&self) -> bool {
        self.target_bitrate_bps == 0
    }
}

/// Output lands next to the input: `<dir>/<stem><suffix>.mp4`
pub fn derive_output_path(input_path: &Path, preset: &Preset) -> PathBuf {
    let output_dir = input_path.parent().unwrap_or_else(|| Path::new(""));

    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_else(|| "output".into());

    output_dir.join(format!(
        "{}{}.{}",
        stem, preset.filename_suffix, OUTPUT_CONTAINER
    ))
}
