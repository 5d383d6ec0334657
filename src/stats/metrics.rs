//! Statistics for file streams

use std::time::{Duration, Instant};

use crate::codec::h264;
use crate::media::{Format, Frame, MediaKind};

/// Per-filestream statistics
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Logical name the stream was opened under
    pub name: String,
    /// Codec handling the file
    pub codec: String,
    /// Open time
    pub started_at: Instant,
    /// Frames read from the file
    pub frames_read: u64,
    /// Frames written to the file
    pub frames_written: u64,
    /// Payload bytes read
    pub bytes_read: u64,
    /// Payload bytes written
    pub bytes_written: u64,
    /// Samples read or written, in the codec's sample units
    pub samples: u64,
    /// IDR frames seen (video)
    pub keyframes: u64,
    /// Frames that went through a translation path before being written
    pub translated_frames: u64,
}

impl StreamStats {
    pub fn new(name: impl Into<String>, codec: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codec: codec.into(),
            started_at: Instant::now(),
            frames_read: 0,
            frames_written: 0,
            bytes_read: 0,
            bytes_written: 0,
            samples: 0,
            keyframes: 0,
            translated_frames: 0,
        }
    }

    /// Account for a frame read from the file
    pub fn record_read(&mut self, frame: &Frame) {
        self.frames_read += 1;
        self.bytes_read += frame.datalen() as u64;
        self.account(frame);
    }

    /// Account for a frame written to the file
    pub fn record_write(&mut self, frame: &Frame) {
        self.frames_written += 1;
        self.bytes_written += frame.datalen() as u64;
        self.account(frame);
    }

    fn account(&mut self, frame: &Frame) {
        match frame.kind() {
            MediaKind::Audio => self.samples += frame.samples as u64,
            MediaKind::Video => {
                if frame.format == Format::H264 && h264::is_keyframe(&frame.data) {
                    self.keyframes += 1;
                }
            }
        }
    }

    /// Get duration since the stream was opened
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Calculate bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            ((self.bytes_read + self.bytes_written) * 8) / secs
        } else {
            0
        }
    }
}
