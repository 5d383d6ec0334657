//! Media file engine for PBX channels
//!
//! Plays prompt files to a channel, records channel audio to files and lets
//! callers interrupt or steer playback with DTMF.
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────┐      ┌────────────────┐
//!   │  FormatRegistry  │◄─────│   FileEngine   │  resolve / open / record
//!   │ (codec plugins)  │      │ (file actions) │
//!   └────────┬─────────┘      └───────┬────────┘
//!            │ open / rewrite         │ bind
//!            ▼                        ▼
//!   ┌──────────────────┐      ┌────────────────┐      ┌─────────────┐
//!   │    Filestream    │─────►│  MediaSession  │─────►│   Channel   │
//!   │ (codec instance) │      │  (scheduler)   │◄─────│  (DTMF etc) │
//!   └──────────────────┘      └───────┬────────┘      └─────────────┘
//!                                     │
//!                                     ▼
//!                             wait_stream / stream_and_wait
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pbx_media::{playback, Channel, FileConfig, FileEngine, MediaSession};
//!
//! async fn greet<C: Channel>(channel: C) -> pbx_media::Result<()> {
//!     let registry = pbx_media::registry::init();
//!     let engine = FileEngine::new(registry, FileConfig::default());
//!     let mut session = MediaSession::new(channel);
//!
//!     let outcome = playback::stream_and_wait(&engine, &mut session, "hello", "#").await?;
//!     tracing::info!(?outcome, "Greeting done");
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod file;
pub mod media;
pub mod playback;
pub mod registry;
pub mod session;
pub mod stats;
pub mod translate;

#[cfg(test)]
mod testing;

pub use codec::{CodecError, CodecInstance, FormatDef};
pub use error::{Error, Result};
pub use file::{FileConfig, FileEngine, Filestream, WriteOptions};
pub use media::{ChannelEvent, ControlFrame, Format, FormatCap, Frame, MediaKind};
pub use playback::{stream_and_wait, wait_stream, WaitOptions, WaitOutcome};
pub use registry::FormatRegistry;
pub use session::{Channel, ExtensionMatcher, MediaSession};
pub use translate::Translator;
