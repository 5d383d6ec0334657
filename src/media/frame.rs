//! Frames exchanged between file streams and channels
//!
//! A [`Frame`] is cheap to clone: its payload is a `bytes::Bytes` view. Frames
//! produced by a file stream are frozen slices of that stream's scratch
//! buffer, so the buffer's allocation stays alive for as long as any frame
//! read from it is held, and is reclaimed once the last one is dropped.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use super::format::{Format, MediaKind};

/// Identifies the file stream a frame was read from
#[derive(Debug)]
pub struct FrameOrigin {
    /// Name of the codec that produced the frame
    pub codec: String,
    /// Path of the file backing the stream
    pub path: String,
}

impl FrameOrigin {
    pub fn new(codec: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            path: path.into(),
        }
    }
}

/// A single timestamped unit of media
#[derive(Clone)]
pub struct Frame {
    /// Payload encoding
    pub format: Format,
    /// Payload bytes (zero-copy view)
    pub data: Bytes,
    /// Duration of the payload in the format's sample units
    pub samples: u32,
    /// End-of-access-unit marker (video)
    pub marker: bool,
    /// Stream the frame was read from, if any
    origin: Option<Arc<FrameOrigin>>,
}

impl Frame {
    /// Create a frame not associated with any file stream
    pub fn new(format: Format, data: Bytes, samples: u32) -> Self {
        Self {
            format,
            data,
            samples,
            marker: false,
            origin: None,
        }
    }

    /// Create a video frame with its marker flag
    pub fn video(format: Format, data: Bytes, samples: u32, marker: bool) -> Self {
        Self {
            marker,
            ..Self::new(format, data, samples)
        }
    }

    /// Attach the stream this frame was read from
    pub(crate) fn with_origin(mut self, origin: Arc<FrameOrigin>) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Media kind of the payload
    pub fn kind(&self) -> MediaKind {
        self.format.kind()
    }

    /// Payload length in bytes
    pub fn datalen(&self) -> usize {
        self.data.len()
    }

    /// Stream that produced this frame
    pub fn origin(&self) -> Option<&FrameOrigin> {
        self.origin.as_deref()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("format", &self.format)
            .field("datalen", &self.data.len())
            .field("samples", &self.samples)
            .field("marker", &self.marker)
            .field("src", &self.origin.as_ref().map(|o| o.codec.as_str()))
            .finish()
    }
}

/// Control indications delivered by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    Hangup,
    Busy,
    Congestion,
    Ringing,
    Answer,
    Hold,
    Unhold,
    /// Stop the current playback
    StreamStop,
    /// Suspend the current playback
    StreamSuspend,
    /// Restart the current playback
    StreamRestart,
    /// Skip backwards in the current playback
    StreamReverse,
    /// Skip forwards in the current playback
    StreamForward,
    /// Anything else, by numeric subclass
    Other(i32),
}

/// One event read from a channel
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Media frame (voice or video)
    Media(Frame),
    /// End of a DTMF digit
    Dtmf(char),
    /// Control indication
    Control(ControlFrame),
    /// Nothing of interest
    Null,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clone_shares_payload() {
        let data = Bytes::from(vec![0xD5u8; 160]);
        let frame = Frame::new(Format::Alaw, data.clone(), 160);
        let copy = frame.clone();

        assert_eq!(copy.data.as_ptr(), frame.data.as_ptr());
        assert_eq!(copy.datalen(), 160);
        assert_eq!(copy.kind(), MediaKind::Audio);
        assert!(copy.origin().is_none());
    }

    #[test]
    fn test_frame_origin() {
        let origin = Arc::new(FrameOrigin::new("alaw", "/tmp/x.alaw"));
        let frame = Frame::video(Format::H264, Bytes::from_static(&[0x65]), 90, true)
            .with_origin(Arc::clone(&origin));

        assert!(frame.marker);
        assert_eq!(frame.origin().map(|o| o.codec.as_str()), Some("alaw"));
        assert_eq!(Arc::strong_count(&origin), 2);
        drop(frame);
        assert_eq!(Arc::strong_count(&origin), 1);
    }
}
