//! Error types
//!
//! `Error` is what the file engine, the delivery engine and the playback
//! controller report. Codec and registry failures are wrapped so callers can
//! still match on the underlying cause.

use std::io;

use crate::codec::CodecError;
use crate::media::Format;
use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Engine-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Format registry rejected the operation
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No file exists for the name in any language or format
    #[error("{name} does not exist in any format")]
    NotFound { name: String },

    /// No registered format handles the requested type
    #[error("no such format '{0}'")]
    UnknownFormat(String),

    /// The file exists but none of its formats suit the channel
    #[error("no format of {name} is usable on this channel")]
    NoCompatibleFormat { name: String },

    /// Codec reported a failure
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// No translation path exists between two formats
    #[error("unable to translate {from} to {to}")]
    Untranslatable { from: Format, to: Format },

    /// The bound channel was swapped out from under the stream
    #[error("channel identity changed while streaming")]
    IdentityMismatch,

    /// The channel hung up or could not be read
    #[error("channel hung up")]
    Hangup,

    /// The channel refused a frame
    #[error("channel write failed: {0}")]
    ChannelWrite(String),

    /// The channel cannot use the requested format
    #[error("channel cannot use format {0}")]
    ChannelFormat(Format),

    /// A previous write failed; the stream accepts no further frames
    #[error("stream already failed")]
    StreamFailed,

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Shorthand for [`Error::NotFound`]
    pub fn not_found(name: impl Into<String>) -> Self {
        Error::NotFound { name: name.into() }
    }

    /// True when the error means the channel went away
    pub fn is_hangup(&self) -> bool {
        matches!(self, Error::Hangup | Error::IdentityMismatch)
    }
}
