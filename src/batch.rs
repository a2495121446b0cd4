//! # Batch Driver Module
//!
//! Questo è il modulo che orchestra la conversione di una lista di input.
//!
//! ## Responsabilità:
//! - Espansione opzionale delle directory (`--recursive`) con `walkdir`
//! - Filtro degli input tramite il `SuffixSet`
//! - Calcolo del nome di output e controllo collisioni
//! - Invocazione della pipeline una traccia alla volta, nell'ordine dato
//! - Raccolta dei fallimenti per traccia e report finale
//!
//! ## Flusso di esecuzione:
//! 1. **Espansione**: directory → file ordinati (solo con `recursive`)
//! 2. **Classificazione**: tiene solo i path con suffisso riconosciuto
//! 3. **Per ogni traccia**: riga di progresso, collisione, transcode
//! 4. **Reporting**: statistiche e lista delle tracce fallite
//!
//! ## Error handling:
//! - Un errore su una traccia non ferma il batch
//! - Le tracce fallite vengono elencate alla fine con lo stage coinvolto

use crate::{
    classifier::SuffixSet,
    config::CollisionPolicy,
    error::TranscodeError,
    json_output::{JsonConfig, JsonMessage},
    naming::{self, output_path_for},
    pipeline::Transcoder,
    probe::TrackMetadata,
    progress::{BatchStats, ProgressManager},
    tools::CommandRunner,
};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// What happened to one eligible input
#[derive(Debug)]
pub enum TrackStatus {
    Converted(TrackMetadata),
    /// Dry run: nothing was invoked
    Planned,
    Skipped(String),
    Failed(TranscodeError),
}

#[derive(Debug)]
pub struct TrackOutcome {
    pub index: usize,
    pub total: usize,
    pub input: String,
    pub output: PathBuf,
    pub status: TrackStatus,
}

/// Result of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TrackOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = (&TrackOutcome, &TranscodeError)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.status {
            TrackStatus::Failed(e) => Some((outcome, e)),
            _ => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Drives the pipeline over an ordered list of inputs
pub struct BatchDriver<R> {
    transcoder: Transcoder<R>,
    suffixes: SuffixSet,
    recursive: bool,
    progress: ProgressManager,
}

impl<R: CommandRunner> BatchDriver<R> {
    pub fn new(transcoder: Transcoder<R>) -> Self {
        let suffixes = transcoder.config().suffix_set();
        Self {
            transcoder,
            suffixes,
            recursive: false,
            progress: ProgressManager::hidden(),
        }
    }

    /// Expand directory inputs into the files below them
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_progress(mut self, progress: ProgressManager) -> Self {
        self.progress = progress;
        self
    }

    pub fn transcoder(&self) -> &Transcoder<R> {
        &self.transcoder
    }

    /// Inputs to convert, in the order given
    pub fn eligible_tracks(&self, inputs: &[String]) -> Vec<String> {
        let mut tracks = Vec::new();

        for input in inputs {
            let path = Path::new(input);
            if path.is_dir() {
                if self.recursive {
                    tracks.extend(self.expand_dir(path));
                } else {
                    debug!("Skipping directory: {}", input);
                }
                continue;
            }

            if self.suffixes.is_eligible(input) {
                tracks.push(input.clone());
            } else {
                debug!("Skipping unrecognized input: {}", input);
            }
        }

        tracks
    }

    fn expand_dir(&self, dir: &Path) -> Vec<String> {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| match e.path().to_str() {
                Some(path) => Some(path.to_string()),
                None => {
                    warn!("Skipping non UTF-8 path: {}", e.path().display());
                    None
                }
            })
            .filter(|path| self.suffixes.is_eligible(path))
            .collect()
    }

    /// Convert every eligible input, one track at a time
    pub async fn run(&self, inputs: &[String]) -> Result<BatchReport> {
        let start_time = Instant::now();
        let config = self.transcoder.config();
        let tracks = self.eligible_tracks(inputs);
        let total = tracks.len();

        info!("Found {} tracks to convert ({} inputs)", total, inputs.len());

        if let Some(ref output_dir) = config.output_path {
            if !config.dry_run {
                tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
                    anyhow::anyhow!("Failed to create output directory {}: {}", output_dir.display(), e)
                })?;
            }
        }

        if config.json_output {
            JsonMessage::Start {
                total_tracks: total,
                output_dir: config.output_path.clone(),
                config: JsonConfig::from(config),
            }
            .emit();
        }

        self.progress.start(total as u64);
        let mut report = BatchReport::default();

        for (i, input) in tracks.into_iter().enumerate() {
            let index = i + 1;
            let output = output_path_for(&input, &self.suffixes, config.output_path.as_deref());

            if config.json_output {
                JsonMessage::TrackStart {
                    index,
                    total,
                    input: input.clone(),
                    output: output.clone(),
                }
                .emit();
            } else {
                self.progress
                    .announce(index, total, &input, &output.display().to_string());
            }

            let status = self.process_track(&input, &output).await;
            self.progress.inc();

            match &status {
                TrackStatus::Converted(_) => report.stats.add_converted(),
                TrackStatus::Planned => report.stats.add_planned(),
                TrackStatus::Skipped(reason) => {
                    info!("Skipped {}: {}", input, reason);
                    report.stats.add_skipped();
                }
                TrackStatus::Failed(e) => {
                    error!("Failed to convert {}: {}", input, e);
                    report.stats.add_error();
                }
            }

            if config.json_output {
                emit_track_complete(index, &input, &output, &status);
            }

            report.outcomes.push(TrackOutcome {
                index,
                total,
                input,
                output,
                status,
            });
        }

        self.progress.finish(&report.stats.format_summary());

        for (outcome, e) in report.failures() {
            error!("{}/{} {} failed: {}", outcome.index, outcome.total, outcome.input, e);
        }

        if config.json_output {
            JsonMessage::complete(&report.stats, start_time.elapsed().as_secs_f64()).emit();
        }

        Ok(report)
    }

    async fn process_track(&self, input: &str, output: &Path) -> TrackStatus {
        let config = self.transcoder.config();

        if output
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(naming::is_degenerate)
        {
            warn!("'{}' sanitizes to an empty name, writing {}", input, output.display());
        }

        if output.exists() {
            let own_source = is_same_file(Path::new(input), output);
            match config.on_collision {
                CollisionPolicy::Overwrite => {
                    if own_source {
                        warn!("{} will be overwritten by its own conversion", output.display());
                    } else {
                        warn!("Overwriting existing file: {}", output.display());
                    }
                }
                CollisionPolicy::Skip => {
                    return TrackStatus::Skipped(format!("{} already exists", output.display()));
                }
                CollisionPolicy::Fail => {
                    return TrackStatus::Failed(TranscodeError::NameCollision {
                        output: output.to_path_buf(),
                    });
                }
            }
        }

        if config.dry_run {
            return TrackStatus::Planned;
        }

        self.progress.set_message("converting");
        match self.transcoder.transcode(Path::new(input), output).await {
            Ok(metadata) => TrackStatus::Converted(metadata),
            Err(e) => TrackStatus::Failed(e),
        }
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn emit_track_complete(index: usize, input: &str, output: &Path, status: &TrackStatus) {
    let (bitrate, skipped, stage, error) = match status {
        TrackStatus::Converted(metadata) => (Some(metadata.bitrate), false, None, None),
        TrackStatus::Planned => (None, false, None, None),
        TrackStatus::Skipped(_) => (None, true, None, None),
        TrackStatus::Failed(e) => (None, false, e.stage(), Some(e.to_string())),
    };

    JsonMessage::TrackComplete {
        index,
        input: input.to_string(),
        output: output.to_path_buf(),
        bitrate,
        skipped,
        stage,
        error,
    }
    .emit();
}
