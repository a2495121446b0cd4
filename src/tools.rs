//! # External Tools
//!
//! Questo modulo centralizza l'esecuzione dei tool esterni (decoder, normalizer,
//! prober, encoder) e la loro ricerca nel `PATH`.
//!
//! ## Responsabilità:
//! - `ToolInvocation`: programma + lista strutturata di argomenti (niente shell)
//! - `CommandRunner`: punto di separazione tra pipeline e processi reali
//! - `SystemRunner`: implementazione con `tokio::process`, timeout e kill automatico
//! - Verifica disponibilità dei tool con istruzioni di installazione

use crate::config::ToolsConfig;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, warn};

/// One external command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, None if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Why a tool produced no output at all
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("failed to start: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Runs external commands to completion
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(&self, invocation: &ToolInvocation, timeout: Duration) -> Result<ToolOutput, RunError>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &ToolInvocation, timeout: Duration) -> Result<ToolOutput, RunError> {
        debug!("Running: {}", invocation);

        let child = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| RunError::TimedOut(timeout))??;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Find a tool in the system PATH, or check it directly if it is a path
pub fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
    let direct = Path::new(tool_name);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }

    let extension = if cfg!(windows) { ".exe" } else { "" };
    let tool_with_ext = format!("{}{}", tool_name, extension);

    env::split_paths(&env::var_os("PATH")?)
        .map(|dir| dir.join(&tool_with_ext))
        .find(|path| path.is_file())
}

/// Get installation instructions for a tool on Linux
pub fn install_instructions(tool_name: &str) -> String {
    let base = Path::new(tool_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(tool_name);
    match base {
        "ffmpeg" => "sudo apt-get install ffmpeg".to_string(),
        "normalize" | "normalize-audio" => "sudo apt-get install normalize-audio".to_string(),
        "midentify" | "mplayer" => "sudo apt-get install mplayer  # midentify ships with mplayer".to_string(),
        "lame" => "sudo apt-get install lame".to_string(),
        _ => format!("sudo apt-get install {}", base),
    }
}

/// Names of configured tools that cannot be found
pub fn missing_tools(tools: &ToolsConfig) -> Vec<String> {
    [&tools.decoder, &tools.normalizer, &tools.prober, &tools.encoder]
        .into_iter()
        .filter(|tool| find_in_system_path(tool).is_none())
        .cloned()
        .collect()
}

/// Warn about every missing tool. Missing tools only fail the tracks that need them.
pub fn check_dependencies(tools: &ToolsConfig) -> Vec<String> {
    let missing = missing_tools(tools);
    for tool in &missing {
        warn!(
            "Tool '{}' not found in PATH. To install on Linux, run: {}",
            tool,
            install_instructions(tool)
        );
    }
    missing
}
