//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il feedback su console e le statistiche del batch.
//!
//! ## Responsabilità:
//! - Una riga per traccia: `<indice>/<totale>: <input> -> <output>`
//! - Spinner `indicatif` con lo stage corrente mentre i tool lavorano
//! - Statistiche cumulative (convertiti, pianificati, saltati, falliti)
//!
//! ## Visual feedback:
//! ```text
//! 1/2: Music/It's Alright.flac -> Its_Alright.mp3
//! ⠋ [00:00:12] 1/2 encoding
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

const BLUE: &str = "\x1b[94m";
const ENDC: &str = "\x1b[0m";

/// Console progress for one batch run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
    color: bool,
}

impl ProgressManager {
    /// Create a new progress manager. The length is set by `start`.
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        // Lines go through `bar.println`, which draws on stderr
        Self {
            bar,
            color: std::io::stderr().is_terminal(),
        }
    }

    /// Progress manager without a spinner. Track lines go to stdout.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            color: std::io::stdout().is_terminal(),
        }
    }

    /// Size the bar once the eligible tracks are known
    pub fn start(&self, total_tracks: u64) {
        self.bar.set_length(total_tracks);
        self.bar.set_position(0);
    }

    /// Format the per-track line
    pub fn track_line(&self, index: usize, total: usize, input: &str, output: &str) -> String {
        if self.color {
            format!("{}{}/{}{}: {} -> {}", BLUE, index, total, ENDC, input, output)
        } else {
            format!("{}/{}: {} -> {}", index, total, input, output)
        }
    }

    /// Print the per-track line above the spinner
    pub fn announce(&self, index: usize, total: usize, input: &str, output: &str) {
        let line = self.track_line(index, total, input, output);
        if self.bar.is_hidden() {
            println!("{}", line);
        } else {
            self.bar.println(line);
        }
    }

    /// Set a custom message without incrementing
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Mark one track as done
    pub fn inc(&self) {
        self.bar.inc(1);
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_and_clear();
        if !message.is_empty() {
            eprintln!("{}", message);
        }
    }
}

/// Statistics tracker for a batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub tracks_processed: usize,
    pub tracks_converted: usize,
    pub tracks_planned: usize,
    pub tracks_skipped: usize,
    pub errors: usize,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_converted(&mut self) {
        self.tracks_processed += 1;
        self.tracks_converted += 1;
    }

    /// Dry run: the track would have been converted
    pub fn add_planned(&mut self) {
        self.tracks_processed += 1;
        self.tracks_planned += 1;
    }

    pub fn add_skipped(&mut self) {
        self.tracks_processed += 1;
        self.tracks_skipped += 1;
    }

    pub fn add_error(&mut self) {
        self.tracks_processed += 1;
        self.errors += 1;
    }

    pub fn format_summary(&self) -> String {
        let mut summary = format!(
            "Processed: {} tracks | Converted: {}",
            self.tracks_processed, self.tracks_converted
        );
        if self.tracks_planned > 0 {
            summary.push_str(&format!(" | Planned: {}", self.tracks_planned));
        }
        summary.push_str(&format!(" | Skipped: {} | Errors: {}", self.tracks_skipped, self.errors));
        summary
    }
}
