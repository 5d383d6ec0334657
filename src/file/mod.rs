//! Media files
//!
//! This module provides:
//! - Configuration of the sounds tree and recording cache
//! - Resolution of logical names through the language fallback chain
//! - The filestream (one open file bound to one codec)
//! - The action dispatcher behind exists / delete / rename / copy / open
//! - [`FileEngine`], the entry point tying these to the format registry

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod filestream;
pub mod resolver;

pub use config::{FileConfig, DEFAULT_SOUNDS_DIR};
pub use dispatch::{ActionResult, FileAction};
pub use engine::{FileEngine, WriteOptions};
pub use filestream::{Filestream, StreamMode};
pub use resolver::Resolved;
