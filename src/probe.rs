//! # Metadata Prober Adapter
//!
//! Questo modulo estrae i tag e il bitrate di una traccia dal report testuale del prober
//! (`midentify`).
//!
//! ## Formato del report:
//! Righe `CHIAVE=valore`. I tag usano una convenzione a chiave divisa:
//! ```text
//! ID_CLIP_INFO_NAME3=Artist
//! ID_CLIP_INFO_VALUE3=Sample Band
//! ```
//! La riga NAME associa l'indice `3` al tag `Artist`, la riga VALUE con lo stesso indice
//! ne fornisce il valore. Se manca una delle due righe il tag è assente (non è un errore).
//!
//! ## Bitrate:
//! - `ID_AUDIO_BITRATE=<bps>`: vince il primo valore positivo
//! - Se assente si assume il bitrate di fallback (default 192000)
//! - Il valore viene arrotondato sulla `BitrateLadder`
//!
//! ## Fallimenti:
//! Un prober che non parte, esce con errore o non stampa nulla produce metadati vuoti
//! con il bitrate di fallback: la traccia viene comunque convertita.

use crate::bitrate::BitrateLadder;
use crate::tools::{CommandRunner, ToolInvocation};
use crate::args;
use crate::utils::dash_safe;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const NAME_PREFIX: &str = "ID_CLIP_INFO_NAME";
const VALUE_PREFIX: &str = "ID_CLIP_INFO_VALUE";
const BITRATE_KEY: &str = "ID_AUDIO_BITRATE";

/// Tags and target bitrate for one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub comment: Option<String>,
    pub track_number: Option<String>,
    pub genre: Option<String>,
    /// Output bitrate in kbps, always a ladder candidate
    pub bitrate: u32,
}

impl TrackMetadata {
    /// Metadata with no tags, used when probing yields nothing
    pub fn empty(ladder: &BitrateLadder, fallback_bps: u64) -> Self {
        Self::from_report(&ProbeReport::default(), ladder, fallback_bps)
    }

    pub fn from_report(report: &ProbeReport, ladder: &BitrateLadder, fallback_bps: u64) -> Self {
        let source_bps = report.audio_bitrate().unwrap_or(fallback_bps);
        Self {
            title: report.clip_info("Title"),
            artist: report.clip_info("Artist"),
            album: report.clip_info("Album"),
            year: report.clip_info("Year"),
            comment: report.clip_info("Comment"),
            track_number: report.clip_info("Track"),
            genre: report.clip_info("Genre"),
            bitrate: ladder.select(source_bps),
        }
    }

    /// Present tags paired with the encoder flag that carries them
    pub fn tag_flags(&self) -> Vec<(&'static str, &str)> {
        [
            ("--tt", &self.title),
            ("--ta", &self.artist),
            ("--tl", &self.album),
            ("--ty", &self.year),
            ("--tc", &self.comment),
            ("--tn", &self.track_number),
            ("--tg", &self.genre),
        ]
        .into_iter()
        .filter_map(|(flag, value)| value.as_deref().map(|v| (flag, v)))
        .collect()
    }
}

/// Parsed key/value lines of a probe report, in report order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    entries: Vec<(String, String)>,
}

impl ProbeReport {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let line = line.trim_end_matches('\r');
                let (key, value) = line.split_once('=')?;
                Some((key.trim().to_string(), value.to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the clip info tag whose NAME line equals `name` exactly.
    /// An empty value counts as absent.
    pub fn clip_info(&self, name: &str) -> Option<String> {
        let index = self.entries.iter().find_map(|(key, value)| {
            let index = key.strip_prefix(NAME_PREFIX)?;
            let is_index = !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit());
            (is_index && value == name).then_some(index)
        })?;

        self.get(&format!("{}{}", VALUE_PREFIX, index))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// First positive `ID_AUDIO_BITRATE`, in bits per second
    pub fn audio_bitrate(&self) -> Option<u64> {
        self.entries
            .iter()
            .filter(|(key, _)| key == BITRATE_KEY)
            .filter_map(|(_, value)| value.trim().parse::<u64>().ok())
            .find(|&bps| bps > 0)
    }
}

/// Settings the prober needs, borrowed from the run configuration
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings<'a> {
    pub tool: &'a str,
    pub ladder: &'a BitrateLadder,
    pub fallback_bps: u64,
    pub timeout: Duration,
}

/// Probe `path` and build its metadata. Never fails: problems degrade to empty tags.
pub async fn probe_track<R: CommandRunner>(
    runner: &R,
    settings: ProbeSettings<'_>,
    path: &Path,
) -> TrackMetadata {
    let invocation = ToolInvocation::new(settings.tool, args![dash_safe(path)]);

    let report = match runner.run(&invocation, settings.timeout).await {
        Ok(output) => {
            if !output.success() {
                warn!(
                    "Prober '{}' exited with {:?} for {}, using its partial output",
                    settings.tool,
                    output.code,
                    path.display()
                );
            }
            ProbeReport::parse(&output.stdout)
        }
        Err(e) => {
            warn!("Prober '{}' {} for {}", settings.tool, e, path.display());
            ProbeReport::default()
        }
    };

    if report.is_empty() {
        debug!("Empty probe report for {}, using fallback bitrate", path.display());
    }

    let metadata = TrackMetadata::from_report(&report, settings.ladder, settings.fallback_bps);
    debug!("Probed {}: {:?}", path.display(), metadata);
    metadata
}
