//! Raw framed H.264 container
//!
//! ```text
//! +-------------+   +---------------+---------+--------------------+
//! | ts (4, BE)  |   | len (2, BE)   | payload | next ts (4, BE)    |  ...
//! | preamble    |   | bit 15 = mark |         |                    |
//! +-------------+   +---------------+---------+--------------------+
//! ```
//!
//! Timestamps are in the 90 kHz RTP clock. The delay to the next record is
//! reported as `next_ts * 4 / 45`.
//!
//! Payloads are single RTP NAL units; the first byte is the NAL header.

use bytes::BufMut;

use super::{check_frame, CodecError, CodecInstance, FormatDef, ReadFrame, SeekWhence, StreamIo};
use crate::media::{Format, Frame};

/// Largest payload a record may carry
pub const H264_MAX_SIZE: usize = 4096;

/// Marker bit in the length field
const FRAME_ENDED: u16 = 0x8000;

/// NAL unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluType {
    /// Non-IDR slice
    Slice = 1,
    /// Slice data partition A
    SlicePartA = 2,
    /// Slice data partition B
    SlicePartB = 3,
    /// Slice data partition C
    SlicePartC = 4,
    /// IDR slice (keyframe)
    Idr = 5,
    /// Supplemental enhancement information
    Sei = 6,
    /// Sequence parameter set
    Sps = 7,
    /// Picture parameter set
    Pps = 8,
    /// Access unit delimiter
    Aud = 9,
    /// End of sequence
    EndSeq = 10,
    /// End of stream
    EndStream = 11,
    /// Filler data
    Filler = 12,
    /// Single-time aggregation packet (RTP)
    StapA = 24,
    /// Fragmentation unit (RTP)
    FuA = 28,
}

impl NaluType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x1F {
            1 => Some(NaluType::Slice),
            2 => Some(NaluType::SlicePartA),
            3 => Some(NaluType::SlicePartB),
            4 => Some(NaluType::SlicePartC),
            5 => Some(NaluType::Idr),
            6 => Some(NaluType::Sei),
            7 => Some(NaluType::Sps),
            8 => Some(NaluType::Pps),
            9 => Some(NaluType::Aud),
            10 => Some(NaluType::EndSeq),
            11 => Some(NaluType::EndStream),
            12 => Some(NaluType::Filler),
            24 => Some(NaluType::StapA),
            28 => Some(NaluType::FuA),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, NaluType::Idr)
    }

    pub fn is_parameter_set(&self) -> bool {
        matches!(self, NaluType::Sps | NaluType::Pps)
    }
}

/// Whether an RTP H.264 payload starts (or is part of) an IDR picture
pub fn is_keyframe(payload: &[u8]) -> bool {
    let Some(&header) = payload.first() else {
        return false;
    };
    match NaluType::from_byte(header) {
        Some(NaluType::FuA) => payload
            .get(1)
            .and_then(|fu| NaluType::from_byte(*fu))
            .is_some_and(|t| t.is_keyframe()),
        Some(NaluType::StapA) => {
            // STAP-A: 16-bit size, then the NAL unit
            let mut offset = 1;
            while offset + 2 < payload.len() {
                let size = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
                offset += 2;
                if NaluType::from_byte(payload[offset]).is_some_and(|t| t.is_keyframe()) {
                    return true;
                }
                offset += size;
            }
            false
        }
        Some(t) => t.is_keyframe(),
        None => false,
    }
}

/// H.264 container descriptor
#[derive(Debug, Default)]
pub struct H264Format;

impl FormatDef for H264Format {
    fn name(&self) -> &str {
        "h264"
    }

    fn extensions(&self) -> &[&str] {
        &["h264"]
    }

    fn format(&self) -> Format {
        Format::H264
    }

    fn buffer_size(&self) -> usize {
        H264_MAX_SIZE
    }

    fn open(&self, io: &mut StreamIo) -> Result<Box<dyn CodecInstance>, CodecError> {
        let Some(preamble) = io.read_header::<4>()? else {
            return Err(CodecError::Open("empty h264 file".into()));
        };
        Ok(Box::new(H264Stream {
            last_ts: u32::from_be_bytes(preamble),
        }))
    }

    fn rewrite(
        &self,
        _io: &mut StreamIo,
        _comment: Option<&str>,
    ) -> Result<Box<dyn CodecInstance>, CodecError> {
        Ok(Box::new(H264Stream { last_ts: 0 }))
    }
}

struct H264Stream {
    /// Timestamp of the record about to be read
    last_ts: u32,
}

impl CodecInstance for H264Stream {
    fn read(&mut self, io: &mut StreamIo) -> Result<Option<ReadFrame>, CodecError> {
        let Some(header) = io.read_header::<2>()? else {
            return Ok(None);
        };
        let raw = u16::from_be_bytes(header);
        let marker = raw & FRAME_ENDED != 0;
        let len = (raw & !FRAME_ENDED) as usize;

        if len > H264_MAX_SIZE {
            tracing::warn!(
                path = %io.path().display(),
                len,
                "H.264 record length exceeds maximum, ending stream"
            );
            return Ok(None);
        }

        let payload = io.read_payload(len)?;
        if payload.len() < len {
            tracing::debug!(path = %io.path().display(), "Short H.264 record");
            return Ok(None);
        }

        if is_keyframe(&payload) {
            tracing::trace!(ts = self.last_ts, "H.264 keyframe");
        }

        let mut frame = io.frame(payload, self.last_ts);
        frame.marker = marker;

        let next_delta = match io.read_header::<4>()? {
            Some(ts) => {
                self.last_ts = u32::from_be_bytes(ts);
                ((self.last_ts as u64 * 4) / 45) as u32
            }
            None => 0,
        };

        Ok(Some(ReadFrame { frame, next_delta }))
    }

    fn write(&mut self, io: &mut StreamIo, frame: &Frame) -> Result<(), CodecError> {
        check_frame("h264", Format::H264, frame)?;
        if frame.datalen() > H264_MAX_SIZE {
            return Err(CodecError::FrameTooLarge {
                len: frame.datalen(),
                max: H264_MAX_SIZE,
            });
        }

        let mut len = frame.datalen() as u16;
        if frame.marker {
            len |= FRAME_ENDED;
        }

        let mut record = Vec::with_capacity(6 + frame.datalen());
        record.put_u32(frame.samples);
        record.put_u16(len);
        record.put_slice(&frame.data);
        io.write_all(&record)
    }

    fn seek(
        &mut self,
        _io: &mut StreamIo,
        _offset: i64,
        _whence: SeekWhence,
    ) -> Result<(), CodecError> {
        Err(CodecError::unsupported("h264", "seek"))
    }

    fn truncate(&mut self, io: &mut StreamIo) -> Result<(), CodecError> {
        io.truncate_here()?;
        Ok(())
    }

    fn tell(&mut self, io: &mut StreamIo) -> Result<u64, CodecError> {
        Ok(io.position()?)
    }
}
