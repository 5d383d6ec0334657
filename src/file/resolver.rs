//! Filename and language resolution
//!
//! A logical media name (`digits/1`, `/tmp/msg`) plus a preferred language
//! becomes a concrete file by trying a chain of language variants:
//!
//! 1. the preferred language, then that language with each `_` suffix
//!    stripped in turn (`en_US_x` → `en_US` → `en`)
//! 2. no language at all
//! 3. the default language, unless it was already tried
//!
//! The language is placed either before the whole name (`en/digits/1`) or
//! between its directory and file part (`digits/en/1`). Absolute names always
//! use the second form.

use std::path::{Path, PathBuf};

use super::config::FileConfig;
use crate::media::FormatCap;

/// A name that resolved to at least one existing file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Localized name, without extension
    pub name: String,
    /// Formats the file exists in
    pub formats: FormatCap,
}

/// Full path of `name` with extension `ext`
///
/// Absolute names are used as-is; relative names live under the sounds
/// directory.
pub fn build_filename(config: &FileConfig, name: &str, ext: &str) -> PathBuf {
    if Path::new(name).is_absolute() {
        PathBuf::from(format!("{name}.{ext}"))
    } else {
        config.sounds_dir.join(format!("{name}.{ext}"))
    }
}

/// `name` with the language directory inserted
pub fn localized_name(config: &FileConfig, name: &str, lang: Option<&str>) -> String {
    let Some(lang) = lang.filter(|l| !l.is_empty()) else {
        return name.to_string();
    };

    if config.language_is_prefix && !Path::new(name).is_absolute() {
        return format!("{lang}/{name}");
    }

    match name.rfind('/') {
        Some(slash) => format!("{}{lang}/{}", &name[..=slash], &name[slash + 1..]),
        None => format!("{lang}/{name}"),
    }
}

/// Languages to try, in order. `None` stands for "no language".
pub fn language_chain(preferred: &str, default: &str) -> Vec<Option<String>> {
    let mut chain = Vec::new();

    let mut lang = preferred;
    while !lang.is_empty() {
        chain.push(Some(lang.to_string()));
        match lang.rfind('_') {
            Some(end) => lang = &lang[..end],
            None => break,
        }
    }

    chain.push(None);

    let tried = chain.iter().flatten().any(|l| l == default);
    if !default.is_empty() && !tried {
        chain.push(Some(default.to_string()));
    }

    chain
}

/// Walk the language chain, returning the first localized name `probe`
/// finds in any format
pub fn resolve<F>(
    config: &FileConfig,
    name: &str,
    preferred: &str,
    mut probe: F,
) -> Option<Resolved>
where
    F: FnMut(&str) -> FormatCap,
{
    for lang in language_chain(preferred, &config.default_language) {
        let candidate = localized_name(config, name, lang.as_deref());
        let formats = probe(&candidate);
        tracing::trace!(candidate = %candidate, found = %formats, "Probed media name");
        if !formats.is_empty() {
            return Some(Resolved {
                name: candidate,
                formats,
            });
        }
    }
    None
}
