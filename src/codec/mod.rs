//! Codec plugin contract
//!
//! Every container format implements [`FormatDef`] (the descriptor that lives
//! in the registry) and hands out a [`CodecInstance`] per open file. The
//! instance is the codec's private state; all file access goes through the
//! [`StreamIo`] owned by the file stream.
//!
//! # Contract
//!
//! - `read` returning `Ok(None)` means no more data, not an error.
//! - Operations a format cannot support return [`CodecError::Unsupported`].
//! - `write` rejects frames of the wrong media kind or payload format with an
//!   error and leaves the file untouched.
//! - The sample delta reported by `read` is in the format's own sample units,
//!   never milliseconds.
//!
//! Built-in formats:
//! - [`g723`]: length-prefixed G.723 records with inter-frame delay
//! - [`h264`]: raw H.264 payloads framed with marker bit and timestamps
//! - [`vorbis`]: Ogg/Vorbis, mono 8 kHz
//! - [`pcm`]: headerless A-law / μ-law

pub mod g723;
pub mod h264;
pub mod pcm;
pub mod vorbis;

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::media::{Format, FormatCap, Frame, FrameOrigin};

pub use g723::G723Format;
pub use h264::H264Format;
pub use pcm::PcmFormat;
pub use vorbis::OggVorbisFormat;

/// Codec-level error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The format does not implement this operation
    #[error("{format} does not support {operation}")]
    Unsupported {
        format: String,
        operation: &'static str,
    },

    /// Malformed record in the file
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// Frame carries the wrong kind of media
    #[error("{codec} cannot store {actual:?} frames")]
    WrongMediaKind {
        codec: String,
        actual: crate::media::MediaKind,
    },

    /// Frame payload is in the wrong format
    #[error("{codec} expects {expected} frames, got {actual}")]
    WrongFormat {
        codec: String,
        expected: Format,
        actual: Format,
    },

    /// Payload does not fit the stream's scratch buffer
    #[error("payload of {len} bytes exceeds buffer of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// File content cannot be handled by this codec
    #[error("cannot open: {0}")]
    Open(String),

    /// Failure inside the Vorbis encoder or decoder
    #[error("vorbis: {0}")]
    Vorbis(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Operation not implemented by a format
    pub fn unsupported(format: impl Into<String>, operation: &'static str) -> Self {
        CodecError::Unsupported {
            format: format.into(),
            operation,
        }
    }

    /// Malformed record
    pub fn corrupt(reason: impl Into<String>) -> Self {
        CodecError::CorruptStream(reason.into())
    }
}

/// Origin for [`CodecInstance::seek`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
    /// From the start of the stream
    Set,
    /// Relative to the current position
    Current,
    /// Backwards from the end of the stream
    End,
    /// Relative to the current position, padding with silence past the end
    ForceCurrent,
}

/// A frame returned by [`CodecInstance::read`]
#[derive(Debug)]
pub struct ReadFrame {
    pub frame: Frame,
    /// Samples until the next frame is due, in the format's sample units.
    /// Zero means "deliver the next frame immediately".
    pub next_delta: u32,
}

/// Descriptor of an installed container format
pub trait FormatDef: Send + Sync {
    /// Unique name
    fn name(&self) -> &str;

    /// Recognized file extensions, preferred first
    fn extensions(&self) -> &[&str];

    /// Native payload format
    fn format(&self) -> Format;

    /// Formats this codec can carry
    fn capabilities(&self) -> FormatCap {
        FormatCap::single(self.format())
    }

    /// Scratch buffer size each open stream needs
    fn buffer_size(&self) -> usize;

    /// MIME types served by this format
    fn mime_types(&self) -> &[&str] {
        &[]
    }

    /// Prepare an existing file for reading
    fn open(&self, io: &mut StreamIo) -> Result<Box<dyn CodecInstance>, CodecError>;

    /// Prepare a fresh file for writing, embedding `comment` where supported
    fn rewrite(
        &self,
        io: &mut StreamIo,
        comment: Option<&str>,
    ) -> Result<Box<dyn CodecInstance>, CodecError>;
}

/// Per-file codec state
pub trait CodecInstance {
    /// Read the next frame. `Ok(None)` is end of stream.
    fn read(&mut self, io: &mut StreamIo) -> Result<Option<ReadFrame>, CodecError>;

    /// Append a frame to the file
    fn write(&mut self, io: &mut StreamIo, frame: &Frame) -> Result<(), CodecError>;

    /// Move to a sample offset
    fn seek(&mut self, io: &mut StreamIo, offset: i64, whence: SeekWhence)
        -> Result<(), CodecError>;

    /// Cut the file at the current position
    fn truncate(&mut self, io: &mut StreamIo) -> Result<(), CodecError>;

    /// Current position in samples
    fn tell(&mut self, io: &mut StreamIo) -> Result<u64, CodecError>;

    /// Flush and release codec state
    fn close(&mut self, _io: &mut StreamIo) -> Result<(), CodecError> {
        Ok(())
    }

    /// Embedded comment, if the container has one
    fn comment(&self) -> Option<String> {
        None
    }
}

/// Reject frames a codec cannot store
pub fn check_frame(codec: &str, expected: Format, frame: &Frame) -> Result<(), CodecError> {
    if frame.kind() != expected.kind() {
        return Err(CodecError::WrongMediaKind {
            codec: codec.to_string(),
            actual: frame.kind(),
        });
    }
    if frame.format != expected {
        return Err(CodecError::WrongFormat {
            codec: codec.to_string(),
            expected,
            actual: frame.format,
        });
    }
    Ok(())
}

/// Fixed-size per-stream scratch buffer.
///
/// The declared size is rounded up to pointer alignment at creation and
/// never changes. Frames are frozen slices of the buffer; while any of them
/// is alive the next fill lands in a fresh allocation instead of reusing it.
pub struct ScratchBuffer {
    buf: BytesMut,
    size: usize,
}

impl ScratchBuffer {
    pub fn new(size: usize) -> Self {
        let align = std::mem::size_of::<*const u8>();
        let size = size.div_ceil(align) * align;
        Self {
            buf: BytesMut::with_capacity(size),
            size,
        }
    }

    /// Aligned size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Zeroed region of `len` bytes to fill
    fn fill(&mut self, len: usize) -> Result<&mut [u8], CodecError> {
        if len > self.size {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.size,
            });
        }
        self.buf.clear();
        self.buf.reserve(self.size);
        self.buf.resize(len, 0);
        Ok(&mut self.buf[..len])
    }

    /// Hand out the first `len` filled bytes
    fn freeze(&mut self, len: usize) -> Bytes {
        self.buf.truncate(len);
        self.buf.split().freeze()
    }
}

/// File handle plus scratch buffer of one open stream
pub struct StreamIo {
    file: File,
    path: PathBuf,
    format: Format,
    buffer: ScratchBuffer,
    origin: Arc<FrameOrigin>,
}

impl StreamIo {
    pub fn new(file: File, path: impl Into<PathBuf>, def: &dyn FormatDef) -> Self {
        let path = path.into();
        let origin = Arc::new(FrameOrigin::new(def.name(), path.display().to_string()));
        Self {
            file,
            path,
            format: def.format(),
            buffer: ScratchBuffer::new(def.buffer_size()),
            origin,
        }
    }

    pub fn file(&mut self) -> &mut File {
        &mut self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Native format of the stream
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.size()
    }

    pub(crate) fn origin(&self) -> &Arc<FrameOrigin> {
        &self.origin
    }

    /// Read up to `len` bytes of payload into the scratch buffer.
    ///
    /// Returns fewer bytes at end of file; an empty result means nothing was
    /// left to read.
    pub fn read_payload(&mut self, len: usize) -> Result<Bytes, CodecError> {
        let region = self.buffer.fill(len)?;
        let got = read_full(&mut self.file, region)?;
        Ok(self.buffer.freeze(got))
    }

    /// Copy decoded payload into the scratch buffer
    pub fn payload_from(&mut self, data: &[u8]) -> Result<Bytes, CodecError> {
        self.buffer.fill(data.len())?.copy_from_slice(data);
        Ok(self.buffer.freeze(data.len()))
    }

    /// Read a fixed-size header. `Ok(None)` if the file ends first.
    pub fn read_header<const N: usize>(&mut self) -> Result<Option<[u8; N]>, CodecError> {
        let mut header = [0u8; N];
        let got = read_full(&mut self.file, &mut header)?;
        if got < N {
            return Ok(None);
        }
        Ok(Some(header))
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.file.write_all(data)?;
        Ok(())
    }

    /// Build a frame attributed to this stream
    pub fn frame(&self, data: Bytes, samples: u32) -> Frame {
        Frame::new(self.format, data, samples).with_origin(Arc::clone(&self.origin))
    }

    /// Current byte position
    pub fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    /// Current file length in bytes
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn seek_to(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    /// Whether the position is at (or past) the end of the file
    pub fn at_eof(&mut self) -> io::Result<bool> {
        let pos = self.position()?;
        Ok(pos >= self.len()?)
    }

    /// Truncate the file at the current position
    pub fn truncate_here(&mut self) -> io::Result<()> {
        let pos = self.position()?;
        self.file.set_len(pos)
    }
}

fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
