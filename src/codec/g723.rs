//! G.723.1 simple-timestamp container
//!
//! ```text
//! +----------------+-------------+-----------------+
//! | delay (4, BE)  | length (2)  | payload         |
//! | milliseconds   | big-endian  | <= 1024 bytes   |
//! +----------------+-------------+-----------------+
//! ```
//!
//! A length above the maximum, or a short read, ends the stream.

use bytes::BufMut;

use super::{check_frame, CodecError, CodecInstance, FormatDef, ReadFrame, SeekWhence, StreamIo};
use crate::media::{Format, Frame};

/// Largest payload a record may carry
pub const G723_MAX_SIZE: usize = 1024;

/// Samples in one G.723.1 frame (30 ms at 8 kHz)
pub const G723_SAMPLES: u32 = 240;

/// G.723 container descriptor
#[derive(Debug, Default)]
pub struct G723Format;

impl FormatDef for G723Format {
    fn name(&self) -> &str {
        "g723sf"
    }

    fn extensions(&self) -> &[&str] {
        &["g723", "g723sf"]
    }

    fn format(&self) -> Format {
        Format::G723
    }

    fn buffer_size(&self) -> usize {
        G723_MAX_SIZE
    }

    fn open(&self, _io: &mut StreamIo) -> Result<Box<dyn CodecInstance>, CodecError> {
        Ok(Box::new(G723Stream))
    }

    fn rewrite(
        &self,
        _io: &mut StreamIo,
        _comment: Option<&str>,
    ) -> Result<Box<dyn CodecInstance>, CodecError> {
        Ok(Box::new(G723Stream))
    }
}

struct G723Stream;

impl CodecInstance for G723Stream {
    fn read(&mut self, io: &mut StreamIo) -> Result<Option<ReadFrame>, CodecError> {
        let Some(header) = io.read_header::<6>()? else {
            return Ok(None);
        };
        let delay_ms = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let len = u16::from_be_bytes([header[4], header[5]]) as usize;

        if len > G723_MAX_SIZE {
            tracing::warn!(
                path = %io.path().display(),
                len,
                "G.723 record length exceeds maximum, ending stream"
            );
            return Ok(None);
        }

        let payload = io.read_payload(len)?;
        if payload.len() < len {
            tracing::debug!(
                path = %io.path().display(),
                expected = len,
                got = payload.len(),
                "Short G.723 record"
            );
            return Ok(None);
        }

        let next_delta = delay_ms.saturating_mul(Format::G723.samples_per_ms());
        Ok(Some(ReadFrame {
            frame: io.frame(payload, G723_SAMPLES),
            next_delta,
        }))
    }

    fn write(&mut self, io: &mut StreamIo, frame: &Frame) -> Result<(), CodecError> {
        check_frame("g723sf", Format::G723, frame)?;
        if frame.datalen() > G723_MAX_SIZE {
            return Err(CodecError::FrameTooLarge {
                len: frame.datalen(),
                max: G723_MAX_SIZE,
            });
        }

        let mut record = Vec::with_capacity(6 + frame.datalen());
        record.put_u32(0);
        record.put_u16(frame.datalen() as u16);
        record.put_slice(&frame.data);
        io.write_all(&record)
    }

    fn seek(
        &mut self,
        _io: &mut StreamIo,
        _offset: i64,
        _whence: SeekWhence,
    ) -> Result<(), CodecError> {
        Err(CodecError::unsupported("g723sf", "seek"))
    }

    fn truncate(&mut self, io: &mut StreamIo) -> Result<(), CodecError> {
        io.truncate_here()?;
        Ok(())
    }

    fn tell(&mut self, _io: &mut StreamIo) -> Result<u64, CodecError> {
        Err(CodecError::unsupported("g723sf", "tell"))
    }
}
