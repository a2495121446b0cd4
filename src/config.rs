//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con suffissi, scala di bitrate e tool esterni
//! - Fornisce validazione dei parametri prima di avviare il batch
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default identici al comportamento storico dello script
//!
//! ## Parametri di configurazione:
//! - `suffixes`: suffissi riconosciuti (default: .mp3 .wav .ogg .flac)
//! - `bitrates`: scala di bitrate in kbps, crescente (default: 128 160 192 224)
//! - `fallback_bitrate`: bitrate sorgente assunto se il probe non lo riporta (192000 bps)
//! - `tools`: nomi/percorsi di decoder, normalizer, prober ed encoder
//! - `encoder_mode` / `encoder_quality`: flag `-m` e `-q` dell'encoder (default: s, 0)
//! - `output_path`: directory di output (default: None = directory corrente)
//! - `tool_timeout_secs`: timeout per singola invocazione (default: 600)
//! - `on_collision`: cosa fare se l'output esiste già (default: overwrite)
//!
//! ## Validazione:
//! - Almeno un suffisso, nessun suffisso vuoto
//! - Scala di bitrate non vuota, strettamente crescente, senza zeri
//! - Qualità encoder tra 0 e 9
//! - Timeout > 0
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     bitrates: Config::HIGH_BITRATES.to_vec(),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::bitrate::BitrateLadder;
use crate::classifier::SuffixSet;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do when the derived output file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Warn and overwrite
    #[default]
    Overwrite,
    /// Leave the existing file and skip the track
    Skip,
    /// Mark the track as failed
    Fail,
}

/// External executables used by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub decoder: String,
    pub normalizer: String,
    pub prober: String,
    pub encoder: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            decoder: "ffmpeg".to_string(),
            normalizer: "normalize".to_string(),
            prober: "midentify".to_string(),
            encoder: "lame".to_string(),
        }
    }
}

/// Configuration for a conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recognized input suffixes (case-insensitive)
    pub suffixes: Vec<String>,
    /// Allowed output bitrates in kbps, ascending
    pub bitrates: Vec<u32>,
    /// Source bitrate assumed when the prober reports none (bps)
    pub fallback_bitrate: u64,
    pub tools: ToolsConfig,
    /// Encoder channel mode
    pub encoder_mode: String,
    /// Encoder quality (0 = best, 9 = fastest)
    pub encoder_quality: u8,
    /// Output directory (None = current directory)
    pub output_path: Option<PathBuf>,
    /// Where intermediate files are created (None = system temp dir)
    pub temp_dir: Option<PathBuf>,
    /// Per-invocation timeout for external tools
    pub tool_timeout_secs: u64,
    pub on_collision: CollisionPolicy,
    /// Print the plan without invoking any tool
    pub dry_run: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            suffixes: Self::AUDIO_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            bitrates: Self::DEFAULT_BITRATES.to_vec(),
            fallback_bitrate: 192_000,
            tools: ToolsConfig::default(),
            encoder_mode: "s".to_string(),
            encoder_quality: 0,
            output_path: None,
            temp_dir: None,
            tool_timeout_secs: 600,
            on_collision: CollisionPolicy::default(),
            dry_run: false,
            json_output: false,
        }
    }
}

impl Config {
    pub const AUDIO_SUFFIXES: &'static [&'static str] = &[".mp3", ".wav", ".ogg", ".flac"];
    pub const VIDEO_SUFFIXES: &'static [&'static str] =
        &[".avi", ".flv", ".mov", ".mp4", ".mpg", ".mpeg"];
    pub const DEFAULT_BITRATES: &'static [u32] = &[128, 160, 192, 224];
    /// Some players don't support more than 224 kbps, so these are opt-in
    pub const HIGH_BITRATES: &'static [u32] = &[128, 160, 192, 224, 256, 320];

    /// Add the video container suffixes, keeping existing entries
    pub fn include_video_suffixes(&mut self) {
        for suffix in Self::VIDEO_SUFFIXES {
            if !self.suffixes.iter().any(|s| s.eq_ignore_ascii_case(suffix)) {
                self.suffixes.push(suffix.to_string());
            }
        }
    }

    pub fn suffix_set(&self) -> SuffixSet {
        SuffixSet::new(&self.suffixes)
    }

    pub fn bitrate_ladder(&self) -> Result<BitrateLadder> {
        BitrateLadder::new(self.bitrates.clone())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.suffixes.is_empty() {
            return Err(anyhow::anyhow!("At least one suffix must be configured"));
        }

        if self.suffixes.iter().any(|s| s.is_empty()) {
            return Err(anyhow::anyhow!("Suffixes must not be empty"));
        }

        self.bitrate_ladder()?;

        if self.fallback_bitrate == 0 {
            return Err(anyhow::anyhow!("Fallback bitrate must be greater than 0"));
        }

        if self.encoder_quality > 9 {
            return Err(anyhow::anyhow!("Encoder quality must be between 0 and 9"));
        }

        if self.tool_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Tool timeout must be greater than 0"));
        }

        if let Some(ref output_path) = self.output_path {
            if output_path.exists() && !output_path.is_dir() {
                return Err(anyhow::anyhow!("Output path is not a directory: {}", output_path.display()));
            }
        }

        Ok(())
    }

    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("any2mp3").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
