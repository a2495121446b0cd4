//! # any2mp3 - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione da file e override da CLI
//! - Avvio del batch e exit code non-zero se qualche traccia è fallita
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, output, bitrate, tool, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica il file di configurazione (se presente) e applica gli override
//! 4. Controlla che i tool esterni siano nel PATH (solo warning)
//! 5. Converte le tracce una alla volta e riporta quelle fallite
//!
//! ## Esempio di utilizzo:
//! ```bash
//! any2mp3 Music/* --output phone/ --video --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use any2mp3::progress::ProgressManager;
use any2mp3::tools::check_dependencies;
use any2mp3::{BatchDriver, CollisionPolicy, Config, SystemRunner, Transcoder};

#[derive(Parser)]
#[command(name = "any2mp3")]
#[command(about = "Normalize audio files and encode them as tagged MP3s")]
struct Args {
    /// Files to convert (unrecognized suffixes are ignored)
    inputs: Vec<String>,

    /// Output directory for the MP3 files (default: current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (default: <config dir>/any2mp3/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,

    /// Also accept video containers (.avi .flv .mov .mp4 .mpg .mpeg)
    #[arg(long)]
    video: bool,

    /// Allow 256 and 320 kbps output
    #[arg(long)]
    high_bitrates: bool,

    /// Custom bitrate ladder in kbps, ascending
    #[arg(long, value_delimiter = ',')]
    bitrates: Option<Vec<u32>>,

    /// Source bitrate assumed when none is detected (bps)
    #[arg(long)]
    fallback_bitrate: Option<u64>,

    /// Decoder executable
    #[arg(long)]
    decoder: Option<String>,

    /// Normalizer executable
    #[arg(long)]
    normalizer: Option<String>,

    /// Prober executable
    #[arg(long)]
    prober: Option<String>,

    /// Encoder executable
    #[arg(long)]
    encoder: Option<String>,

    /// Timeout for each external tool, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// What to do when the output file already exists
    #[arg(long, value_enum)]
    on_collision: Option<CollisionPolicy>,

    /// Descend into directory inputs
    #[arg(short, long)]
    recursive: bool,

    /// Dry run - print the plan without converting
    #[arg(long)]
    dry_run: bool,

    /// Output progress and status as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(ref output) = self.output {
            config.output_path = Some(output.clone());
        }
        if self.video {
            config.include_video_suffixes();
        }
        if self.high_bitrates {
            config.bitrates = Config::HIGH_BITRATES.to_vec();
        }
        if let Some(ref bitrates) = self.bitrates {
            config.bitrates = bitrates.clone();
        }
        if let Some(fallback) = self.fallback_bitrate {
            config.fallback_bitrate = fallback;
        }
        if let Some(ref decoder) = self.decoder {
            config.tools.decoder = decoder.clone();
        }
        if let Some(ref normalizer) = self.normalizer {
            config.tools.normalizer = normalizer.clone();
        }
        if let Some(ref prober) = self.prober {
            config.tools.prober = prober.clone();
        }
        if let Some(ref encoder) = self.encoder {
            config.tools.encoder = encoder.clone();
        }
        if let Some(timeout) = self.timeout {
            config.tool_timeout_secs = timeout;
        }
        if let Some(policy) = self.on_collision {
            config.on_collision = policy;
        }
        config.dry_run |= self.dry_run;
        config.json_output |= self.json;
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config.clone().or_else(Config::default_path);
    let mut config = match config_path {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    if args.write_config {
        let path = config_path
            .ok_or_else(|| anyhow::anyhow!("No config directory available, pass --config"))?;
        config.save_to_file(&path).await?;
        info!("Configuration written to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    if !config.dry_run {
        check_dependencies(&config.tools);
    }

    let json_output = config.json_output;
    let transcoder = Transcoder::new(config, SystemRunner)?;
    let mut driver = BatchDriver::new(transcoder).with_recursive(args.recursive);
    if !json_output {
        driver = driver.with_progress(ProgressManager::new());
    }

    let report = driver.run(&args.inputs).await?;

    if report.has_failures() {
        error!(
            "{} of {} tracks failed",
            report.stats.errors, report.stats.tracks_processed
        );
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
