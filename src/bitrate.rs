//! Bitrate ladder selection
//!
//! Rounds a detected source bitrate up to the nearest allowed output bitrate.
//! Sources above the top rung get the top rung.

use anyhow::Result;

/// Ascending list of allowed output bitrates (kbps)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitrateLadder {
    candidates: Vec<u32>,
}

impl BitrateLadder {
    pub fn new(candidates: Vec<u32>) -> Result<Self> {
        if candidates.is_empty() {
            return Err(anyhow::anyhow!("Bitrate ladder must not be empty"));
        }
        if candidates.contains(&0) {
            return Err(anyhow::anyhow!("Bitrate ladder must not contain 0"));
        }
        if candidates.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(anyhow::anyhow!(
                "Bitrate ladder must be strictly ascending: {:?}",
                candidates
            ));
        }
        Ok(Self { candidates })
    }

    /// Smallest candidate whose kbps value covers `source_bps`, else the largest
    pub fn select(&self, source_bps: u64) -> u32 {
        self.candidates
            .iter()
            .copied()
            .find(|&kbps| u64::from(kbps) * 1000 >= source_bps)
            .unwrap_or_else(|| self.max())
    }

    pub fn max(&self) -> u32 {
        // Non-empty by construction
        self.candidates[self.candidates.len() - 1]
    }

    pub fn contains(&self, kbps: u32) -> bool {
        self.candidates.contains(&kbps)
    }

    pub fn candidates(&self) -> &[u32] {
        &self.candidates
    }
}

impl Default for BitrateLadder {
    fn default() -> Self {
        Self {
            candidates: crate::config::Config::DEFAULT_BITRATES.to_vec(),
        }
    }
}
