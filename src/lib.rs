//! # any2mp3 Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test di integrazione
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore per traccia, con lo stage coinvolto
//! - `classifier`: Riconoscimento delle tracce audio per suffisso
//! - `naming`: Calcolo del nome MP3 di output
//! - `bitrate`: Scala dei bitrate ammessi
//! - `probe`: Estrazione tag e bitrate dal report del prober
//! - `pipeline`: decode → normalize → probe → encode per una traccia
//! - `batch`: Orchestratore della lista di input
//! - `tools`: Esecuzione dei tool esterni e ricerca nel PATH
//! - `progress` / `json_output`: Feedback su console e in JSON
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use any2mp3::{BatchDriver, Config, SystemRunner, Transcoder};
//!
//! let transcoder = Transcoder::new(Config::default(), SystemRunner)?;
//! let report = BatchDriver::new(transcoder).run(&inputs).await?;
//! ```

pub mod batch;
pub mod bitrate;
pub mod classifier;
pub mod config;
pub mod error;
pub mod json_output;
pub mod naming;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod tools;
pub mod utils;

pub use batch::{BatchDriver, BatchReport, TrackOutcome, TrackStatus};
pub use bitrate::BitrateLadder;
pub use classifier::SuffixSet;
pub use config::{CollisionPolicy, Config, ToolsConfig};
pub use error::TranscodeError;
pub use naming::derive_output_name;
pub use pipeline::{Stage, Transcoder};
pub use probe::{ProbeReport, TrackMetadata};
pub use tools::{CommandRunner, SystemRunner};
