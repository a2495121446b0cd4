//! # Track Classifier
//!
//! Decide se un path è una traccia audio da convertire, in base al solo suffisso.
//! Il confronto è case-insensitive e di tipo "ends-with": non viene letto nulla dal disco.

/// Recognized input suffixes, stored lowercased
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixSet {
    suffixes: Vec<String>,
}

impl SuffixSet {
    pub fn new<S: AsRef<str>>(suffixes: &[S]) -> Self {
        Self {
            suffixes: suffixes
                .iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// True if the lowercased path ends with one of the suffixes
    pub fn is_eligible(&self, path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        self.suffixes.iter().any(|suffix| lower.ends_with(suffix.as_str()))
    }

    /// Byte offset of the rightmost occurrence of any suffix in `name`.
    ///
    /// ASCII lowercasing keeps byte offsets stable, so the index is valid in `name`.
    pub fn rightmost_match(&self, name: &str) -> Option<usize> {
        let lower = name.to_ascii_lowercase();
        self.suffixes
            .iter()
            .filter(|suffix| !suffix.is_empty())
            .filter_map(|suffix| lower.rfind(suffix.as_str()))
            .max()
    }
}

impl Default for SuffixSet {
    fn default() -> Self {
        Self::new(crate::config::Config::AUDIO_SUFFIXES)
    }
}
