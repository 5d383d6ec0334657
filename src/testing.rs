//! Shared fixtures for unit tests

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::time::Instant;

use crate::codec::{
    check_frame, CodecError, CodecInstance, FormatDef, ReadFrame, SeekWhence, StreamIo,
};
use crate::error::{Error, Result};
use crate::media::{ChannelEvent, Format, FormatCap, Frame};
use crate::session::Channel;

/// Open (creating if needed) a file for reading and writing
pub fn open_rw(path: &Path) -> File {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .unwrap()
}

/// Fresh empty file in a temporary directory, wrapped for `def`
pub fn scratch_stream(def: &dyn FormatDef, name: &str) -> (TempDir, StreamIo) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    let file = open_rw(&path);
    let io = StreamIo::new(file, path, def);
    (dir, io)
}

/// Format producing a fixed number of silent A-law frames
pub struct MockFormat {
    name: String,
    extensions: &'static [&'static str],
    format: Format,
    frames: usize,
    closes: Arc<AtomicUsize>,
}

impl MockFormat {
    pub fn new(name: &str, extensions: &'static [&'static str]) -> Self {
        Self {
            name: name.to_string(),
            extensions,
            format: Format::Alaw,
            frames: 0,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Frames each opened stream yields
    pub fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Count of codec instances closed so far
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    fn instance(&self, remaining: usize) -> Box<dyn CodecInstance> {
        Box::new(MockCodec {
            name: self.name.clone(),
            format: self.format,
            remaining,
            position: 0,
            closes: Arc::clone(&self.closes),
        })
    }
}

impl FormatDef for MockFormat {
    fn name(&self) -> &str {
        &self.name
    }

    fn extensions(&self) -> &[&str] {
        self.extensions
    }

    fn format(&self) -> Format {
        self.format
    }

    fn buffer_size(&self) -> usize {
        160
    }

    fn open(&self, _io: &mut StreamIo) -> std::result::Result<Box<dyn CodecInstance>, CodecError> {
        Ok(self.instance(self.frames))
    }

    fn rewrite(
        &self,
        _io: &mut StreamIo,
        _comment: Option<&str>,
    ) -> std::result::Result<Box<dyn CodecInstance>, CodecError> {
        Ok(self.instance(0))
    }
}

struct MockCodec {
    name: String,
    format: Format,
    remaining: usize,
    position: u64,
    closes: Arc<AtomicUsize>,
}

impl CodecInstance for MockCodec {
    fn read(&mut self, io: &mut StreamIo) -> std::result::Result<Option<ReadFrame>, CodecError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.position += 160;
        let data = io.payload_from(&[0xD5; 160])?;
        Ok(Some(ReadFrame {
            frame: io.frame(data, 160),
            next_delta: 160,
        }))
    }

    fn write(&mut self, io: &mut StreamIo, frame: &Frame) -> std::result::Result<(), CodecError> {
        check_frame(&self.name, self.format, frame)?;
        io.write_all(&frame.data)
    }

    fn seek(
        &mut self,
        _io: &mut StreamIo,
        _offset: i64,
        _whence: SeekWhence,
    ) -> std::result::Result<(), CodecError> {
        Err(CodecError::unsupported(self.name.clone(), "seek"))
    }

    fn truncate(&mut self, _io: &mut StreamIo) -> std::result::Result<(), CodecError> {
        Err(CodecError::unsupported(self.name.clone(), "truncate"))
    }

    fn tell(&mut self, _io: &mut StreamIo) -> std::result::Result<u64, CodecError> {
        Ok(self.position)
    }

    fn close(&mut self, _io: &mut StreamIo) -> std::result::Result<(), CodecError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Scripted channel. Inbound events are released after their delay, measured
/// from the moment the previous one was taken.
pub struct MockChannel {
    name: String,
    token: u64,
    native: FormatCap,
    write_format: Format,
    written: Vec<Frame>,
    events: VecDeque<(Duration, Option<ChannelEvent>)>,
    reads: usize,
    next_at: Option<Instant>,
    fail_writes: bool,
    hung_up: bool,
    language: String,
}

impl MockChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            token: next_token(),
            native: [Format::Slin, Format::Ulaw, Format::Alaw]
                .into_iter()
                .collect(),
            write_format: Format::Slin,
            written: Vec::new(),
            events: VecDeque::new(),
            reads: 0,
            next_at: None,
            fail_writes: false,
            hung_up: false,
            language: String::new(),
        }
    }

    pub fn with_native(mut self, native: FormatCap) -> Self {
        self.native = native;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Queue an inbound event `after` the previous one
    pub fn push_event(&mut self, after: Duration, event: ChannelEvent) {
        self.events.push_back((after, Some(event)));
    }

    /// Make the read `after` the previous event fail
    pub fn push_read_failure(&mut self, after: Duration) {
        self.events.push_back((after, None));
    }

    /// Reads that have completed, failed ones included
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Frames written so far
    pub fn written(&self) -> &[Frame] {
        &self.written
    }

    /// Simulate the channel being swapped out
    pub fn swap_identity(&mut self) {
        self.token = next_token();
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Flag a soft hangup
    pub fn hang_up(&mut self) {
        self.hung_up = true;
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity_token(&self) -> u64 {
        self.token
    }

    fn native_formats(&self) -> FormatCap {
        self.native
    }

    fn write_format(&self) -> Format {
        self.write_format
    }

    fn set_write_format(&mut self, format: Format) -> Result<()> {
        if !self.native.contains(format) {
            return Err(Error::ChannelFormat(format));
        }
        self.write_format = format;
        Ok(())
    }

    fn write(&mut self, frame: Frame) -> Result<()> {
        if self.fail_writes {
            return Err(Error::ChannelWrite("scripted failure".into()));
        }
        self.written.push(frame);
        Ok(())
    }

    async fn read(&mut self) -> Option<ChannelEvent> {
        let Some(after) = self.events.front().map(|(after, _)| *after) else {
            return std::future::pending().await;
        };
        let due = *self.next_at.get_or_insert(Instant::now() + after);
        if due > Instant::now() {
            tokio::time::sleep_until(due).await;
        }
        self.next_at = None;
        self.reads += 1;
        self.events.pop_front().and_then(|(_, event)| event)
    }

    fn is_hung_up(&self) -> bool {
        self.hung_up
    }

    fn language(&self) -> &str {
        &self.language
    }
}
