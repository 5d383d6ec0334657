//! Filestream lifecycle
//!
//! A [`Filestream`] is one open media file bound to one codec instance. It
//! owns the file handle, the codec state and a fixed scratch buffer sized by
//! the format descriptor.
//!
//! # Frame lifetime
//!
//! Frames returned by [`Filestream::read_frame`] are frozen slices of the
//! scratch buffer and each carries a handle to the stream's origin record.
//! Closing the stream releases the file and the codec; the buffer memory
//! behind outstanding frames is reclaimed when the last of them is dropped,
//! never while one is still held.

use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::{CodecError, CodecInstance, FormatDef, ReadFrame, SeekWhence, StreamIo};
use crate::error::{Error, Result};
use crate::media::{Format, Frame, MediaKind};
use crate::stats::StreamStats;
use crate::translate::{TranslationPath, Translator};

/// Direction a stream was opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Playback
    Read,
    /// Recording
    Write,
}

/// Data recorded under a temporary name and moved into place on close
#[derive(Debug, Clone)]
pub(crate) struct CacheMove {
    pub(crate) temp: PathBuf,
    pub(crate) dest: PathBuf,
}

/// One open media file bound to a codec
pub struct Filestream {
    def: Arc<dyn FormatDef>,
    codec: Box<dyn CodecInstance>,
    io: StreamIo,
    mode: StreamMode,

    /// Logical name the stream was opened under
    filename: String,

    /// Cache-mode recording target
    cache: Option<CacheMove>,

    /// Cached translator for recording frames of a foreign format
    translation: Option<Box<dyn TranslationPath>>,
    last_write_format: Option<Format>,

    /// Companion video recording
    video: Option<Box<Filestream>>,

    /// Set once a codec write fails
    failed: bool,
    closed: bool,

    stats: StreamStats,
}

impl Filestream {
    /// Open `file` for playback through `def`
    ///
    /// On failure the file is closed and the codec error surfaced.
    pub fn create_for_read(
        def: Arc<dyn FormatDef>,
        file: File,
        path: impl Into<PathBuf>,
        filename: &str,
    ) -> Result<Self> {
        let mut io = StreamIo::new(file, path, def.as_ref());
        let codec = def.open(&mut io).map_err(|e| {
            tracing::warn!(
                format = %def.name(),
                path = %io.path().display(),
                error = %e,
                "Unable to open file for playback"
            );
            e
        })?;
        Ok(Self::assemble(def, codec, io, StreamMode::Read, filename))
    }

    /// Prepare `file` for recording through `def`
    pub fn create_for_write(
        def: Arc<dyn FormatDef>,
        file: File,
        path: impl Into<PathBuf>,
        filename: &str,
        comment: Option<&str>,
    ) -> Result<Self> {
        let mut io = StreamIo::new(file, path, def.as_ref());
        let codec = def.rewrite(&mut io, comment).map_err(|e| {
            tracing::warn!(
                format = %def.name(),
                path = %io.path().display(),
                error = %e,
                "Unable to rewrite file"
            );
            e
        })?;
        Ok(Self::assemble(def, codec, io, StreamMode::Write, filename))
    }

    fn assemble(
        def: Arc<dyn FormatDef>,
        codec: Box<dyn CodecInstance>,
        io: StreamIo,
        mode: StreamMode,
        filename: &str,
    ) -> Self {
        tracing::debug!(
            format = %def.name(),
            path = %io.path().display(),
            mode = ?mode,
            buffer = io.buffer_size(),
            "Filestream created"
        );
        let stats = StreamStats::new(filename, def.name());
        Self {
            def,
            codec,
            io,
            mode,
            filename: filename.to_string(),
            cache: None,
            translation: None,
            last_write_format: None,
            video: None,
            failed: false,
            closed: false,
            stats,
        }
    }

    pub(crate) fn set_cache(&mut self, cache: CacheMove) {
        self.cache = Some(cache);
    }

    /// Descriptor of the codec handling this stream
    pub fn def(&self) -> &Arc<dyn FormatDef> {
        &self.def
    }

    /// Native payload format
    pub fn format(&self) -> Format {
        self.def.format()
    }

    pub fn kind(&self) -> MediaKind {
        self.format().kind()
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Logical name the stream was opened under
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Path of the file being read or written
    pub fn path(&self) -> &Path {
        self.io.path()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Companion video recording, if one was opened
    pub fn video(&self) -> Option<&Filestream> {
        self.video.as_deref()
    }

    pub(crate) fn video_mut(&mut self) -> Option<&mut Filestream> {
        self.video.as_deref_mut()
    }

    pub(crate) fn set_video(&mut self, video: Filestream) {
        self.video = Some(Box::new(video));
    }

    /// Frames read from this stream that are still alive
    pub fn outstanding_frames(&self) -> usize {
        Arc::strong_count(self.io.origin()).saturating_sub(1)
    }

    /// Read the next frame. `Ok(None)` at end of stream.
    ///
    /// Malformed records end the stream rather than failing it.
    pub fn read_frame(&mut self) -> Result<Option<ReadFrame>> {
        if self.closed {
            return Ok(None);
        }
        match self.codec.read(&mut self.io) {
            Ok(Some(read)) => {
                self.stats.record_read(&read.frame);
                tracing::trace!(
                    format = %self.def.name(),
                    datalen = read.frame.datalen(),
                    samples = read.frame.samples,
                    next = read.next_delta,
                    "Read frame"
                );
                Ok(Some(read))
            }
            Ok(None) => Ok(None),
            Err(CodecError::CorruptStream(reason)) => {
                tracing::warn!(
                    path = %self.io.path().display(),
                    reason = %reason,
                    "Corrupt record, ending stream"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a frame in the stream's native format
    pub fn write_native(&mut self, frame: &Frame) -> Result<()> {
        if self.failed {
            return Err(Error::StreamFailed);
        }
        if let Err(e) = self.codec.write(&mut self.io, frame) {
            if !matches!(
                e,
                CodecError::WrongFormat { .. } | CodecError::WrongMediaKind { .. }
            ) {
                self.failed = true;
            }
            tracing::warn!(
                format = %self.def.name(),
                path = %self.io.path().display(),
                error = %e,
                "Frame write failed"
            );
            return Err(e.into());
        }
        self.stats.record_write(frame);
        Ok(())
    }

    /// Write a frame, translating it to the native format when needed
    ///
    /// The translation path is cached and rebuilt whenever frames arrive in a
    /// different format than the one it was built for.
    pub fn write_translated(&mut self, frame: &Frame, translator: &dyn Translator) -> Result<()> {
        let native = self.format();
        if frame.format == native {
            return self.write_native(frame);
        }
        if self.failed {
            return Err(Error::StreamFailed);
        }

        if self.last_write_format != Some(frame.format) {
            if self.translation.take().is_some() {
                tracing::debug!(
                    from = ?self.last_write_format,
                    to = %frame.format,
                    "Write format changed, dropping translation path"
                );
            }
            self.last_write_format = None;
        }

        if self.translation.is_none() {
            let Some(path) = translator.build_path(frame.format, native) else {
                tracing::warn!(
                    source = %frame.format,
                    target = %native,
                    path = %self.io.path().display(),
                    "Unable to translate frame"
                );
                return Err(Error::Untranslatable {
                    from: frame.format,
                    to: native,
                });
            };
            self.translation = Some(path);
            self.last_write_format = Some(frame.format);
        }

        let translated = match self.translation.as_mut() {
            Some(path) => path.translate(frame),
            None => Vec::new(),
        };
        for out in &translated {
            self.write_native(out)?;
            self.stats.translated_frames += 1;
        }
        Ok(())
    }

    /// Move to a sample offset
    pub fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<()> {
        self.codec.seek(&mut self.io, offset, whence)?;
        tracing::debug!(
            path = %self.io.path().display(),
            offset,
            whence = ?whence,
            "Seeked stream"
        );
        Ok(())
    }

    /// Cut the file at the current position
    pub fn truncate(&mut self) -> Result<()> {
        Ok(self.codec.truncate(&mut self.io)?)
    }

    /// Current position in samples
    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.codec.tell(&mut self.io)?)
    }

    /// Length of the underlying file in bytes
    pub fn file_len(&self) -> Result<u64> {
        Ok(self.io.len()?)
    }

    /// Whether the file handle sits at (or past) the end of the file
    pub fn at_end(&mut self) -> Result<bool> {
        Ok(self.io.at_eof()?)
    }

    /// Position the file handle at its end, bypassing the codec
    pub(crate) fn seek_to_end(&mut self) -> Result<()> {
        self.io.seek_to(std::io::SeekFrom::End(0))?;
        Ok(())
    }

    /// Clock rate of the stream's sample unit
    pub fn sample_rate(&self) -> u32 {
        self.format().sample_rate()
    }

    fn ms_to_samples(&self, ms: u64) -> i64 {
        (ms * self.format().samples_per_ms() as u64) as i64
    }

    /// Skip forwards by `ms` milliseconds
    pub fn fast_forward(&mut self, ms: u64) -> Result<()> {
        let offset = self.ms_to_samples(ms);
        self.seek(offset, SeekWhence::Current)
    }

    /// Skip backwards by `ms` milliseconds, stopping at the start
    pub fn rewind(&mut self, ms: u64) -> Result<()> {
        let offset = self.ms_to_samples(ms);
        let pos = self.tell()? as i64;
        if offset > pos {
            self.seek(0, SeekWhence::Set)
        } else {
            self.seek(-offset, SeekWhence::Current)
        }
    }

    /// Comment embedded in the file
    pub fn comment(&self) -> Option<String> {
        self.codec.comment()
    }

    /// Release the codec, the companion video stream and the translator.
    ///
    /// Cache-mode recordings are moved into place. Calling this more than
    /// once is harmless.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut video) = self.video.take() {
            if let Err(e) = video.close() {
                tracing::warn!(error = %e, "Closing companion video stream failed");
            }
        }
        self.translation = None;

        let result = self.codec.close(&mut self.io).map_err(Error::from);

        if let Some(cache) = self.cache.take() {
            move_into_place(&cache)?;
        }

        tracing::debug!(
            format = %self.def.name(),
            path = %self.io.path().display(),
            frames_read = self.stats.frames_read,
            frames_written = self.stats.frames_written,
            outstanding = self.outstanding_frames(),
            "Filestream closed"
        );
        result
    }
}

fn move_into_place(cache: &CacheMove) -> Result<()> {
    if let Err(e) = fs::rename(&cache.temp, &cache.dest) {
        // rename fails across filesystems; copy instead
        tracing::debug!(error = %e, "Rename failed, copying cached recording");
        fs::copy(&cache.temp, &cache.dest)?;
        fs::remove_file(&cache.temp)?;
    }
    tracing::debug!(
        from = %cache.temp.display(),
        to = %cache.dest.display(),
        "Moved cached recording into place"
    );
    Ok(())
}

impl Drop for Filestream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(filename = %self.filename, error = %e, "Filestream teardown failed");
        }
    }
}

impl fmt::Debug for Filestream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filestream")
            .field("format", &self.def.name())
            .field("filename", &self.filename)
            .field("path", &self.io.path())
            .field("mode", &self.mode)
            .field("closed", &self.closed)
            .finish()
    }
}
