//! File action dispatcher
//!
//! One routine walks every format matching a filter and every extension of
//! each, builds the candidate path and applies an action to whatever exists
//! there.

use std::fs::{self, File};

use super::config::FileConfig;
use super::filestream::Filestream;
use super::resolver::build_filename;
use crate::error::{Error, Result};
use crate::media::FormatCap;
use crate::registry::FormatRegistry;

/// What to do with each matching file
#[derive(Debug, Clone, Copy)]
pub enum FileAction<'a> {
    /// Collect the formats the name exists in
    Exists,
    /// Remove every matching file
    Delete,
    /// Move every matching file to a new name, keeping its extension
    Rename(&'a str),
    /// Copy every matching file to a new name, keeping its extension
    Copy(&'a str),
    /// Open the first matching file whose format is in `accept`
    Open { accept: FormatCap },
}

impl FileAction<'_> {
    fn label(&self) -> &'static str {
        match self {
            FileAction::Exists => "exists",
            FileAction::Delete => "delete",
            FileAction::Rename(_) => "rename",
            FileAction::Copy(_) => "copy",
            FileAction::Open { .. } => "open",
        }
    }
}

/// Result of a dispatched action
#[derive(Debug)]
pub enum ActionResult {
    /// Formats the name exists in (empty if none)
    Exists(FormatCap),
    /// Number of files acted on
    Completed(usize),
    /// Stream opened for playback
    Opened(Filestream),
}

/// Apply `action` to `name` in every format matching `filter`
///
/// `Exists` never fails. The other actions report [`Error::NotFound`] when
/// no file matched, and the first filesystem error when every attempt failed.
pub fn dispatch(
    registry: &FormatRegistry,
    config: &FileConfig,
    filter: Option<&str>,
    name: &str,
    action: FileAction<'_>,
) -> Result<ActionResult> {
    let mut found = FormatCap::empty();
    let mut completed = 0;
    let mut first_error: Option<Error> = None;

    for def in registry.matching(filter) {
        for ext in def.extensions() {
            let path = build_filename(config, name, ext);
            if !path.is_file() {
                continue;
            }

            let outcome = match action {
                FileAction::Exists => {
                    found = found.union(def.capabilities());
                    continue;
                }
                FileAction::Delete => fs::remove_file(&path).map_err(Error::from),
                FileAction::Rename(dest) => {
                    let target = build_filename(config, dest, ext);
                    fs::rename(&path, &target).map_err(Error::from)
                }
                FileAction::Copy(dest) => {
                    let target = build_filename(config, dest, ext);
                    fs::copy(&path, &target).map(|_| ()).map_err(|e| {
                        // don't leave a half-written copy behind
                        let _ = fs::remove_file(&target);
                        Error::from(e)
                    })
                }
                FileAction::Open { accept } => {
                    if def.capabilities().intersection(accept).is_empty() {
                        tracing::trace!(format = %def.name(), "Format not acceptable, skipping");
                        continue;
                    }
                    let opened = File::open(&path).map_err(Error::from).and_then(|file| {
                        Filestream::create_for_read(def.clone(), file, &path, name)
                    });
                    match opened {
                        Ok(stream) => return Ok(ActionResult::Opened(stream)),
                        Err(e) => Err(e),
                    }
                }
            };

            match outcome {
                Ok(()) => completed += 1,
                Err(e) => {
                    tracing::warn!(
                        action = action.label(),
                        path = %path.display(),
                        error = %e,
                        "File action failed"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    if let FileAction::Exists = action {
        return Ok(ActionResult::Exists(found));
    }
    if completed > 0 {
        return Ok(ActionResult::Completed(completed));
    }
    Err(first_error.unwrap_or_else(|| Error::not_found(name)))
}

/// Formats `name` exists in, without language resolution
pub fn exists(
    registry: &FormatRegistry,
    config: &FileConfig,
    filter: Option<&str>,
    name: &str,
) -> FormatCap {
    match dispatch(registry, config, filter, name, FileAction::Exists) {
        Ok(ActionResult::Exists(found)) => found,
        _ => FormatCap::empty(),
    }
}
