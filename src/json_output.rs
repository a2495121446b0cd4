//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso da altri programmi.
//!
//! ## Responsabilità:
//! - Emette un oggetto JSON per riga su stdout
//! - Sostituisce le righe di progresso quando `--json` è attivo
//!
//! ## Tipi di messaggi:
//! - `start`: inizio batch con numero di tracce e configurazione
//! - `track_start`: inizio elaborazione di una traccia
//! - `track_complete`: fine traccia (bitrate, skip o errore con stage)
//! - `complete`: fine batch con statistiche finali

use crate::pipeline::Stage;
use crate::progress::BatchStats;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio del batch
    Start {
        total_tracks: usize,
        output_dir: Option<PathBuf>,
        config: JsonConfig,
    },

    /// Inizio elaborazione di una traccia
    TrackStart {
        index: usize,
        total: usize,
        input: String,
        output: PathBuf,
    },

    /// Fine elaborazione di una traccia
    TrackComplete {
        index: usize,
        input: String,
        output: PathBuf,
        bitrate: Option<u32>,
        skipped: bool,
        stage: Option<Stage>,
        error: Option<String>,
    },

    /// Batch completato
    Complete {
        tracks_processed: usize,
        tracks_converted: usize,
        tracks_planned: usize,
        tracks_skipped: usize,
        errors: usize,
        duration_seconds: f64,
    },
}

/// Configurazione riportata nel messaggio `start`
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub suffixes: Vec<String>,
    pub bitrates: Vec<u32>,
    pub dry_run: bool,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Crea un messaggio di completamento generale
    pub fn complete(stats: &BatchStats, duration_seconds: f64) -> Self {
        Self::Complete {
            tracks_processed: stats.tracks_processed,
            tracks_converted: stats.tracks_converted,
            tracks_planned: stats.tracks_planned,
            tracks_skipped: stats.tracks_skipped,
            errors: stats.errors,
            duration_seconds,
        }
    }
}

impl From<&crate::Config> for JsonConfig {
    fn from(config: &crate::Config) -> Self {
        Self {
            suffixes: config.suffixes.clone(),
            bitrates: config.bitrates.clone(),
            dry_run: config.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_complete_shape() {
        let message = JsonMessage::TrackComplete {
            index: 2,
            input: "b.wav".to_string(),
            output: PathBuf::from("b.mp3"),
            bitrate: None,
            skipped: false,
            stage: Some(Stage::Normalize),
            error: Some("normalize: 'normalize' failed".to_string()),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "track_complete");
        assert_eq!(value["stage"], "normalize");
        assert_eq!(value["bitrate"], serde_json::Value::Null);
    }

    #[test]
    fn test_start_includes_config() {
        let config = crate::Config::default();
        let message = JsonMessage::Start {
            total_tracks: 3,
            output_dir: None,
            config: JsonConfig::from(&config),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["config"]["bitrates"], json!([128, 160, 192, 224]));
    }

    #[test]
    fn test_complete_from_stats() {
        let mut stats = BatchStats::new();
        stats.add_converted();
        stats.add_planned();
        stats.add_error();
        let value = serde_json::to_value(JsonMessage::complete(&stats, 1.5)).unwrap();
        assert_eq!(value["tracks_converted"], 1);
        assert_eq!(value["tracks_planned"], 1);
        assert_eq!(value["errors"], 1);
    }
}
