//! Format registry
//!
//! Installed container formats, keyed by unique (case-insensitive) name and
//! looked up by file extension, name or MIME type.
//!
//! # Lifecycle
//!
//! ```text
//!   init() ──► global() ──► ... ──► shutdown()
//!     │                                 │
//!     └─ built-in formats installed     └─ table emptied, handle dropped
//! ```
//!
//! Components normally take an `Arc<FormatRegistry>` explicitly. The
//! process-wide instance exists for callers that want one shared table;
//! tests use [`FormatRegistry::new`] for isolated instances.

pub mod error;
pub mod event;
pub mod store;

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

pub use error::RegistryError;
pub use event::FormatEvent;
pub use store::FormatRegistry;

static GLOBAL: Lazy<Mutex<Option<Arc<FormatRegistry>>>> = Lazy::new(|| Mutex::new(None));

/// Create the process-wide registry with the built-in formats.
///
/// Calling it again returns the existing instance.
pub fn init() -> Arc<FormatRegistry> {
    let mut global = GLOBAL.lock();
    if let Some(registry) = global.as_ref() {
        return Arc::clone(registry);
    }
    let registry = Arc::new(FormatRegistry::with_builtin_formats());
    *global = Some(Arc::clone(&registry));
    tracing::debug!(formats = registry.len(), "Format registry initialized");
    registry
}

/// The process-wide registry, if initialized
pub fn global() -> Option<Arc<FormatRegistry>> {
    GLOBAL.lock().clone()
}

/// Tear the process-wide registry down
pub fn shutdown() {
    if let Some(registry) = GLOBAL.lock().take() {
        registry.clear();
        tracing::debug!("Format registry shut down");
    }
}
