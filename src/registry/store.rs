//! Format registry implementation
//!
//! The table of installed container formats. Lookups iterate the most
//! recently registered format first.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::error::RegistryError;
use super::event::FormatEvent;
use crate::codec::{FormatDef, G723Format, H264Format, OggVorbisFormat, PcmFormat};
use crate::error::{Error, Result};
use crate::media::Format;

/// Capacity of the event channel
const EVENT_CAPACITY: usize = 16;

/// Whether `ext` appears in a descriptor's extension list
pub(crate) fn has_extension(def: &dyn FormatDef, ext: &str) -> bool {
    def.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext))
}

/// Whether a descriptor matches a `|`-separated extension filter
pub(crate) fn matches_filter(def: &dyn FormatDef, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(filter) => filter.split('|').any(|ext| has_extension(def, ext)),
    }
}

/// Process-wide table of installed formats
///
/// A single exclusive lock guards the table. It is held only for the
/// duration of a lookup or registration; callers receive `Arc` handles and
/// never do file I/O under the lock.
pub struct FormatRegistry {
    /// Installed formats, newest first
    formats: Mutex<Vec<Arc<dyn FormatDef>>>,

    /// Register / unregister notifications
    events: broadcast::Sender<FormatEvent>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            formats: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Create a registry with the built-in formats installed
    pub fn with_builtin_formats() -> Self {
        let registry = Self::new();
        registry.register_builtin();
        registry
    }

    /// Install the built-in formats, skipping any name already present
    pub fn register_builtin(&self) {
        let builtin: [Arc<dyn FormatDef>; 5] = [
            Arc::new(G723Format),
            Arc::new(H264Format),
            Arc::new(OggVorbisFormat),
            Arc::new(PcmFormat::alaw()),
            Arc::new(PcmFormat::ulaw()),
        ];
        for def in builtin {
            if let Err(e) = self.register(def) {
                tracing::debug!(error = %e, "Built-in format skipped");
            }
        }
    }

    /// Install a format
    ///
    /// Fails if a format of the same name (case-insensitive) is present; the
    /// existing one is left untouched.
    pub fn register(&self, def: Arc<dyn FormatDef>) -> std::result::Result<(), RegistryError> {
        let mut formats = self.formats.lock();

        if formats
            .iter()
            .any(|f| f.name().eq_ignore_ascii_case(def.name()))
        {
            tracing::warn!(format = %def.name(), "Tried to register format twice");
            return Err(RegistryError::AlreadyRegistered(def.name().to_string()));
        }

        let event = FormatEvent::Registered {
            name: def.name().to_string(),
            extensions: def.extensions().iter().map(|e| e.to_string()).collect(),
        };
        tracing::info!(
            format = %def.name(),
            extensions = ?def.extensions(),
            "Registered file format"
        );
        formats.insert(0, def);
        drop(formats);

        // send() only fails when nobody is subscribed
        let _ = self.events.send(event);
        Ok(())
    }

    /// Remove a format by name
    pub fn unregister(&self, name: &str) -> std::result::Result<(), RegistryError> {
        let mut formats = self.formats.lock();

        let Some(index) = formats
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(name))
        else {
            tracing::warn!(format = %name, "Tried to unregister unknown format");
            return Err(RegistryError::NotFound(name.to_string()));
        };

        let removed = formats.remove(index);
        drop(formats);

        tracing::info!(format = %removed.name(), "Unregistered file format");
        let _ = self.events.send(FormatEvent::Unregistered {
            name: removed.name().to_string(),
        });
        Ok(())
    }

    /// Look a format up by name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn FormatDef>> {
        self.formats
            .lock()
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Every format recognizing the extension, newest first
    pub fn find_by_extension(&self, ext: &str) -> Vec<Arc<dyn FormatDef>> {
        self.formats
            .lock()
            .iter()
            .filter(|f| has_extension(f.as_ref(), ext))
            .cloned()
            .collect()
    }

    /// Formats matching an optional `|`-separated extension filter
    pub fn matching(&self, filter: Option<&str>) -> Vec<Arc<dyn FormatDef>> {
        self.formats
            .lock()
            .iter()
            .filter(|f| matches_filter(f.as_ref(), filter))
            .cloned()
            .collect()
    }

    /// All installed formats, newest first
    pub fn snapshot(&self) -> Vec<Arc<dyn FormatDef>> {
        self.formats.lock().clone()
    }

    /// Payload format of the first format recognizing the extension
    pub fn format_for_extension(&self, ext: &str) -> Option<Format> {
        self.formats
            .lock()
            .iter()
            .find(|f| has_extension(f.as_ref(), ext))
            .map(|f| f.format())
    }

    /// Preferred extension (with leading dot) for a MIME type
    pub fn extension_for_mime_type(&self, mime: &str) -> Option<String> {
        self.formats
            .lock()
            .iter()
            .find(|f| f.mime_types().iter().any(|m| m.eq_ignore_ascii_case(mime)))
            .and_then(|f| f.extensions().first().map(|ext| format!(".{ext}")))
    }

    /// Reduce a `|`-separated extension list.
    ///
    /// Unknown entries are dropped, as are entries handled by a format that
    /// an earlier entry already selected.
    pub fn reduce_format_list(&self, list: &str) -> Result<String> {
        let formats = self.formats.lock();
        let mut chosen: Vec<(&str, &Arc<dyn FormatDef>)> = Vec::new();

        for ext in list.split('|').filter(|e| !e.is_empty()) {
            let Some(def) = formats.iter().find(|f| has_extension(f.as_ref(), ext)) else {
                tracing::warn!(format = %ext, "Unknown format in list");
                continue;
            };
            if chosen.iter().any(|(_, seen)| Arc::ptr_eq(seen, def)) {
                tracing::debug!(format = %ext, "Format already listed");
                continue;
            }
            chosen.push((ext, def));
        }

        if chosen.is_empty() {
            return Err(Error::UnknownFormat(list.to_string()));
        }

        Ok(chosen
            .iter()
            .map(|(ext, _)| *ext)
            .collect::<Vec<_>>()
            .join("|"))
    }

    /// Receive register / unregister events
    ///
    /// ```
    /// use std::sync::Arc;
    /// use pbx_media::codec::PcmFormat;
    /// use pbx_media::registry::{FormatEvent, FormatRegistry};
    ///
    /// # tokio_test::block_on(async {
    /// let registry = FormatRegistry::new();
    /// let mut events = registry.subscribe();
    ///
    /// registry.register(Arc::new(PcmFormat::alaw())).unwrap();
    /// match events.recv().await.unwrap() {
    ///     FormatEvent::Registered { name, .. } => assert_eq!(name, "alaw"),
    ///     other => panic!("unexpected event {other:?}"),
    /// }
    /// # });
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<FormatEvent> {
        self.events.subscribe()
    }

    /// Number of installed formats
    pub fn len(&self) -> usize {
        self.formats.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.lock().is_empty()
    }

    /// Remove every format
    pub fn clear(&self) {
        let removed: Vec<_> = self.formats.lock().drain(..).collect();
        for def in removed {
            let _ = self.events.send(FormatEvent::Unregistered {
                name: def.name().to_string(),
            });
        }
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}
