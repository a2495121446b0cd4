//! # Output Name Sanitizer
//!
//! Centralizza il calcolo del nome del file MP3 di output.
//!
//! ## Algoritmo (l'ordine conta):
//! 1. Rimuove le directory, tiene solo l'ultimo segmento
//! 2. Cerca l'occorrenza più a destra di un suffisso riconosciuto e taglia da lì alla fine
//! 3. Normalizza lo stem: `\ ` → spazio, spazio → `_`, `_-_` → `-`, via gli apostrofi,
//!    `\&` → `&`
//! 4. Aggiunge `.mp3`
//!
//! Il risultato è sempre un nome nudo, senza directory.

use crate::classifier::SuffixSet;
use std::path::{Path, PathBuf};

pub const OUTPUT_EXTENSION: &str = ".mp3";

/// Derive the bare output filename for `path`
pub fn derive_output_name(path: &str, suffixes: &SuffixSet) -> String {
    let name = final_segment(path);

    let stem = match suffixes.rightmost_match(name) {
        Some(idx) => &name[..idx],
        None => name,
    };

    let mut sanitized = sanitize_stem(stem);
    sanitized.push_str(OUTPUT_EXTENSION);
    sanitized
}

/// Output location for `path`: the bare name (current directory) or the name joined
/// onto `output_dir`
pub fn output_path_for(path: &str, suffixes: &SuffixSet, output_dir: Option<&Path>) -> PathBuf {
    let name = derive_output_name(path, suffixes);
    match output_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// True when the sanitized stem came out empty and the name is just the extension
pub fn is_degenerate(name: &str) -> bool {
    name == OUTPUT_EXTENSION
}

fn final_segment(path: &str) -> &str {
    // Backslash is part of the escape sequences handled below, so only '/' separates
    // directories here.
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

fn sanitize_stem(stem: &str) -> String {
    stem.replace("\\ ", " ")
        .replace(' ', "_")
        .replace("_-_", "-")
        .replace('\'', "")
        .replace("\\&", "&")
}
