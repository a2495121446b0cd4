//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore della pipeline di conversione.
//!
//! ## Responsabilità:
//! - Definisce `TranscodeError` per categorizzare i fallimenti di una traccia
//! - Distingue il tool che non parte da quello che termina con errore
//! - Indica sempre lo stage (decode/normalize/encode) in cui è avvenuto il problema
//!
//! ## Categorie di errori:
//! - `ToolInvocation`: eseguibile mancante o non avviabile
//! - `ToolExecution`: il tool è partito ma è uscito con codice non-zero
//! - `Timeout`: il tool ha superato il tempo massimo ed è stato terminato
//! - `NameCollision`: il file di output esiste già (policy `fail`)
//! - `Io`: errori di I/O (file temporaneo, directory di output)
//!
//! Nessuno di questi errori interrompe il batch: il driver li raccoglie per traccia
//! e li riporta alla fine.
//!
//! ## Esempio:
//! ```rust,ignore
//! if !status.success() {
//!     return Err(TranscodeError::ToolExecution { stage, tool, code, stderr });
//! }
//! ```

use crate::pipeline::Stage;
use std::path::PathBuf;

/// Failure of a single track
#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    #[error("{stage}: could not start '{tool}': {source}")]
    ToolInvocation {
        stage: Stage,
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage}: '{tool}' failed ({}): {stderr}", describe_exit(.code))]
    ToolExecution {
        stage: Stage,
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{stage}: '{tool}' timed out after {seconds}s")]
    Timeout {
        stage: Stage,
        tool: String,
        seconds: u64,
    },

    #[error("Output already exists: {}", output.display())]
    NameCollision { output: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Stage the error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::ToolInvocation { stage, .. }
            | Self::ToolExecution { stage, .. }
            | Self::Timeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}
