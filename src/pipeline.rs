//! # Transcode Pipeline Module
//!
//! Questo modulo converte una singola traccia in un MP3 normalizzato e taggato.
//!
//! ## Pipeline per traccia (strettamente sequenziale):
//! 1. **Decode**: il decoder (ffmpeg) produce un WAV intermedio
//! 2. **Normalize**: il normalizer lavora in-place sul WAV intermedio
//! 3. **Probe**: il prober legge tag e bitrate dal file *originale*
//! 4. **Encode**: l'encoder (lame) scrive l'MP3 con bitrate e tag
//!
//! ## File intermedio:
//! - Vive in una directory temporanea privata per ogni traccia
//! - Viene rimosso su ogni percorso di uscita, successo o errore
//! - Due tracce non condividono mai lo stesso file intermedio
//!
//! ## Errori:
//! Ogni invocazione controlla lo stato di uscita. Un tool mancante, un codice di uscita
//! non-zero o un timeout interrompono la traccia con un `TranscodeError` che indica lo
//! stage. Il probe non fallisce mai (vedi `probe`).
//!
//! ## Esempio:
//! ```rust,ignore
//! let transcoder = Transcoder::new(config, SystemRunner)?;
//! let metadata = transcoder.transcode(Path::new("a.flac"), Path::new("a.mp3")).await?;
//! ```

use crate::args;
use crate::bitrate::BitrateLadder;
use crate::config::Config;
use crate::error::TranscodeError;
use crate::probe::{probe_track, ProbeSettings, TrackMetadata};
use crate::tools::{CommandRunner, RunError, ToolInvocation, ToolOutput};
use crate::utils::{dash_safe, os_arg};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::debug;

const INTERMEDIATE_NAME: &str = "decoded.wav";

/// Step of the per-track pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Decode,
    Normalize,
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decode => "decode",
            Stage::Normalize => "normalize",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// Private scratch space for one track's decoded audio
pub struct Intermediate {
    dir: TempDir,
}

impl Intermediate {
    pub fn create(base: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("any2mp3-");
        let dir = match base {
            Some(base) => builder.tempdir_in(base)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join(INTERMEDIATE_NAME)
    }
}

/// Runs decode → normalize → probe → encode for one track at a time
pub struct Transcoder<R> {
    config: Config,
    ladder: BitrateLadder,
    runner: R,
}

impl<R: CommandRunner> Transcoder<R> {
    pub fn new(config: Config, runner: R) -> anyhow::Result<Self> {
        config.validate()?;
        let ladder = config.bitrate_ladder()?;
        Ok(Self {
            config,
            ladder,
            runner,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.tool_timeout_secs)
    }

    /// Convert `input` into the MP3 at `output`, returning the metadata written into it
    pub async fn transcode(&self, input: &Path, output: &Path) -> Result<TrackMetadata, TranscodeError> {
        let start_time = Instant::now();
        let intermediate = Intermediate::create(self.config.temp_dir.as_deref())?;
        let wav = intermediate.path();

        self.run_stage(Stage::Decode, &self.decode_invocation(input, &wav)).await?;
        self.run_stage(Stage::Normalize, &self.normalize_invocation(&wav)).await?;

        let metadata = self.probe(input).await;

        self.run_stage(Stage::Encode, &self.encode_invocation(&metadata, &wav, output))
            .await?;

        debug!(
            "Transcoded {} -> {} at {} kbps in {:.1}s",
            input.display(),
            output.display(),
            metadata.bitrate,
            start_time.elapsed().as_secs_f64()
        );

        Ok(metadata)
    }

    /// Probe the original file for tags and bitrate
    pub async fn probe(&self, input: &Path) -> TrackMetadata {
        let settings = ProbeSettings {
            tool: &self.config.tools.prober,
            ladder: &self.ladder,
            fallback_bps: self.config.fallback_bitrate,
            timeout: self.timeout(),
        };
        probe_track(&self.runner, settings, input).await
    }

    pub fn decode_invocation(&self, input: &Path, wav: &Path) -> ToolInvocation {
        ToolInvocation::new(
            &self.config.tools.decoder,
            args!["-y", "-loglevel", "error", "-i", dash_safe(input), wav],
        )
    }

    pub fn normalize_invocation(&self, wav: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.config.tools.normalizer, args!["-q", wav])
    }

    pub fn encode_invocation(&self, metadata: &TrackMetadata, wav: &Path, output: &Path) -> ToolInvocation {
        let mut args = args![
            "--silent",
            "-m",
            &self.config.encoder_mode,
            "-q",
            self.config.encoder_quality.to_string(),
            "-b",
            metadata.bitrate.to_string(),
        ];

        for (flag, value) in metadata.tag_flags() {
            args.push(os_arg(flag));
            args.push(os_arg(value));
        }

        args.push(os_arg(wav));
        args.push(os_arg(dash_safe(output)));

        ToolInvocation::new(&self.config.tools.encoder, args)
    }

    async fn run_stage(&self, stage: Stage, invocation: &ToolInvocation) -> Result<ToolOutput, TranscodeError> {
        debug!("{}: {}", stage, invocation);

        let output = self
            .runner
            .run(invocation, self.timeout())
            .await
            .map_err(|e| match e {
                RunError::Spawn(source) => TranscodeError::ToolInvocation {
                    stage,
                    tool: invocation.program.clone(),
                    source,
                },
                RunError::TimedOut(limit) => TranscodeError::Timeout {
                    stage,
                    tool: invocation.program.clone(),
                    seconds: limit.as_secs(),
                },
            })?;

        if !output.success() {
            return Err(TranscodeError::ToolExecution {
                stage,
                tool: invocation.program.clone(),
                code: output.code,
                stderr: last_lines(&output.stderr, 3),
            });
        }

        if !output.stderr.trim().is_empty() {
            debug!("{} stderr: {}", invocation.program, output.stderr.trim_end());
        }

        Ok(output)
    }
}

/// Last `n` non-empty lines of tool diagnostics, joined for a one-line error
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::sync::Mutex;

    /// Records every invocation and answers with canned output per program
    #[derive(Default)]
    pub(crate) struct RecordingRunner {
        pub calls: Mutex<Vec<ToolInvocation>>,
        pub outputs: HashMap<String, ToolOutput>,
        pub missing: Vec<String>,
    }

    impl RecordingRunner {
        pub fn with_probe_report(report: &str) -> Self {
            let mut runner = Self::default();
            runner.outputs.insert(
                "midentify".to_string(),
                ToolOutput {
                    code: Some(0),
                    stdout: report.to_string(),
                    stderr: String::new(),
                },
            );
            runner
        }

        pub fn programs(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.program.clone())
                .collect()
        }

        pub fn calls_to(&self, program: &str) -> Vec<ToolInvocation> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .cloned()
                .collect()
        }
    }

    impl CommandRunner for RecordingRunner {
        async fn run(&self, invocation: &ToolInvocation, _timeout: Duration) -> Result<ToolOutput, RunError> {
            self.calls.lock().unwrap().push(invocation.clone());
            if self.missing.contains(&invocation.program) {
                return Err(RunError::Spawn(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "not found",
                )));
            }
            Ok(self
                .outputs
                .get(&invocation.program)
                .cloned()
                .unwrap_or(ToolOutput {
                    code: Some(0),
                    ..Default::default()
                }))
        }
    }

    fn failing(stderr: &str) -> ToolOutput {
        ToolOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    const REPORT: &str = "ID_CLIP_INFO_NAME0=Title\nID_CLIP_INFO_VALUE0=It's Alright\n\
                          ID_CLIP_INFO_NAME1=Track\nID_CLIP_INFO_VALUE1=7\n\
                          ID_AUDIO_BITRATE=130000\n";

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let transcoder = Transcoder::new(Config::default(), RecordingRunner::with_probe_report(REPORT)).unwrap();
        let metadata = transcoder
            .transcode(Path::new("in/It's Alright.flac"), Path::new("Its_Alright.mp3"))
            .await
            .unwrap();

        assert_eq!(metadata.bitrate, 160);
        assert_eq!(
            transcoder.runner().programs(),
            vec!["ffmpeg", "normalize", "midentify", "lame"]
        );
    }

    #[tokio::test]
    async fn test_intermediate_is_shared_within_track_and_removed() {
        let transcoder = Transcoder::new(Config::default(), RecordingRunner::default()).unwrap();
        transcoder
            .transcode(Path::new("a.wav"), Path::new("a.mp3"))
            .await
            .unwrap();

        let runner = transcoder.runner();
        let decode = &runner.calls_to("ffmpeg")[0];
        let normalize = &runner.calls_to("normalize")[0];
        let encode = &runner.calls_to("lame")[0];

        let wav = decode.args.last().unwrap().clone();
        assert_eq!(normalize.args.last().unwrap(), &wav);
        assert_eq!(&encode.args[encode.args.len() - 2], &wav);
        assert!(!Path::new(&wav).parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_each_track_gets_its_own_intermediate() {
        let transcoder = Transcoder::new(Config::default(), RecordingRunner::default()).unwrap();
        transcoder.transcode(Path::new("a.wav"), Path::new("a.mp3")).await.unwrap();
        transcoder.transcode(Path::new("b.wav"), Path::new("b.mp3")).await.unwrap();

        let decodes = transcoder.runner().calls_to("ffmpeg");
        assert_ne!(decodes[0].args.last(), decodes[1].args.last());
    }

    #[tokio::test]
    async fn test_probe_reads_original_input() {
        let transcoder = Transcoder::new(Config::default(), RecordingRunner::default()).unwrap();
        transcoder
            .transcode(Path::new("dir/Song.ogg"), Path::new("Song.mp3"))
            .await
            .unwrap();
        let probe = &transcoder.runner().calls_to("midentify")[0];
        assert_eq!(strings(&probe.args), vec!["dir/Song.ogg"]);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stderr_of_successful_stage_is_logged() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut runner = RecordingRunner::default();
        runner.outputs.insert(
            "normalize".to_string(),
            ToolOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: "clipping avoided\n".to_string(),
            },
        );
        let transcoder = Transcoder::new(Config::default(), runner).unwrap();
        transcoder.transcode(Path::new("a.wav"), Path::new("a.mp3")).await.unwrap();

        let logs = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("normalize stderr: clipping avoided"), "{}", logs);
    }

    #[tokio::test]
    async fn test_dash_leading_paths_are_not_read_as_options() {
        let transcoder = Transcoder::new(Config::default(), RecordingRunner::default()).unwrap();
        transcoder
            .transcode(Path::new("-Live-.flac"), Path::new("-Live-.mp3"))
            .await
            .unwrap();

        let runner = transcoder.runner();
        let decode = strings(&runner.calls_to("ffmpeg")[0].args);
        assert_eq!(decode[4], "./-Live-.flac");
        let probe = strings(&runner.calls_to("midentify")[0].args);
        assert_eq!(probe, vec!["./-Live-.flac"]);
        let encode = strings(&runner.calls_to("lame")[0].args);
        assert_eq!(encode.last().unwrap(), "./-Live-.mp3");
    }

    #[tokio::test]
    async fn test_encoder_arguments() {
        let transcoder = Transcoder::new(Config::default(), RecordingRunner::with_probe_report(REPORT)).unwrap();
        transcoder
            .transcode(Path::new("x.flac"), Path::new("out/x.mp3"))
            .await
            .unwrap();

        let encode = &transcoder.runner().calls_to("lame")[0];
        let args = strings(&encode.args);
        assert_eq!(args.len(), 13);
        assert_eq!(
            &args[..11],
            &["--silent", "-m", "s", "-q", "0", "-b", "160", "--tt", "It's Alright", "--tn", "7"]
        );
        assert!(args[11].ends_with("decoded.wav"));
        assert_eq!(args[12], "out/x.mp3");
    }

    #[test]
    fn test_absent_tags_are_omitted() {
        let transcoder = Transcoder::new(Config::default(), RecordingRunner::default()).unwrap();
        let metadata = TrackMetadata::empty(&BitrateLadder::default(), 192_000);
        let invocation = transcoder.encode_invocation(&metadata, Path::new("t.wav"), Path::new("o.mp3"));
        assert_eq!(
            strings(&invocation.args),
            vec!["--silent", "-m", "s", "-q", "0", "-b", "192", "t.wav", "o.mp3"]
        );
    }

    #[tokio::test]
    async fn test_decode_failure_stops_pipeline() {
        let mut runner = RecordingRunner::default();
        runner.outputs.insert("ffmpeg".to_string(), failing("first\nInvalid data found\n"));
        let transcoder = Transcoder::new(Config::default(), runner).unwrap();

        let err = transcoder
            .transcode(Path::new("bad.mp3"), Path::new("bad_out.mp3"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Decode));
        assert!(matches!(err, TranscodeError::ToolExecution { code: Some(1), .. }));
        assert!(err.to_string().contains("Invalid data found"));
        assert_eq!(transcoder.runner().programs(), vec!["ffmpeg"]);
    }

    #[tokio::test]
    async fn test_normalize_and_encode_failures_are_distinguished() {
        let mut runner = RecordingRunner::default();
        runner.outputs.insert("normalize".to_string(), failing("clipping"));
        let transcoder = Transcoder::new(Config::default(), runner).unwrap();
        let err = transcoder.transcode(Path::new("a.wav"), Path::new("a.mp3")).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Normalize));

        let mut runner = RecordingRunner::default();
        runner.outputs.insert("lame".to_string(), failing("disk full"));
        let transcoder = Transcoder::new(Config::default(), runner).unwrap();
        let err = transcoder.transcode(Path::new("a.wav"), Path::new("a.mp3")).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Encode));
    }

    #[tokio::test]
    async fn test_missing_tool_is_invocation_error() {
        let runner = RecordingRunner {
            missing: vec!["normalize".to_string()],
            ..Default::default()
        };
        let transcoder = Transcoder::new(Config::default(), runner).unwrap();
        let err = transcoder.transcode(Path::new("a.wav"), Path::new("a.mp3")).await.unwrap_err();
        assert!(matches!(
            err,
            TranscodeError::ToolInvocation { stage: Stage::Normalize, .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_prober_still_encodes() {
        let runner = RecordingRunner {
            missing: vec!["midentify".to_string()],
            ..Default::default()
        };
        let transcoder = Transcoder::new(Config::default(), runner).unwrap();
        let metadata = transcoder.transcode(Path::new("a.wav"), Path::new("a.mp3")).await.unwrap();
        assert_eq!(metadata.bitrate, 192);
        assert_eq!(transcoder.runner().calls_to("lame").len(), 1);
    }

    #[tokio::test]
    async fn test_custom_tools_and_temp_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.tools.normalizer = "normalize-audio".to_string();
        config.temp_dir = Some(temp_dir.path().to_path_buf());
        config.encoder_quality = 2;

        let transcoder = Transcoder::new(config, RecordingRunner::default()).unwrap();
        transcoder.transcode(Path::new("a.wav"), Path::new("a.mp3")).await.unwrap();

        let normalize = &transcoder.runner().calls_to("normalize-audio")[0];
        assert!(Path::new(&normalize.args[1]).starts_with(temp_dir.path()));
        let encode = &transcoder.runner().calls_to("lame")[0];
        assert_eq!(encode.args[4], "2");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            bitrates: vec![],
            ..Default::default()
        };
        assert!(Transcoder::new(config, RecordingRunner::default()).is_err());
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\n\nb\nc\nd\n", 3), "b | c | d");
        assert_eq!(last_lines("", 3), "");
    }
}
