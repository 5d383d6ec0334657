//! Headerless G.711 PCM (A-law and μ-law)
//!
//! One byte per sample, read in fixed 160-byte frames (20 ms). The final
//! frame of a file may be shorter. Positions are byte offsets, which equal
//! sample offsets.

use std::io::SeekFrom;

use super::{check_frame, CodecError, CodecInstance, FormatDef, ReadFrame, SeekWhence, StreamIo};
use crate::media::g711::{ALAW_SILENCE, ULAW_SILENCE};
use crate::media::{Format, Frame};

/// Bytes (and samples) per frame
pub const PCM_FRAME_SIZE: usize = 160;

/// Which companding law the file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Law {
    Alaw,
    Ulaw,
}

impl Law {
    fn format(&self) -> Format {
        match self {
            Law::Alaw => Format::Alaw,
            Law::Ulaw => Format::Ulaw,
        }
    }

    /// Encoding of a zero sample
    pub fn silence(&self) -> u8 {
        match self {
            Law::Alaw => ALAW_SILENCE,
            Law::Ulaw => ULAW_SILENCE,
        }
    }
}

/// PCM container descriptor
#[derive(Debug)]
pub struct PcmFormat {
    law: Law,
}

impl PcmFormat {
    /// Raw A-law (`.alaw`, `.al`, `.alw`)
    pub fn alaw() -> Self {
        Self { law: Law::Alaw }
    }

    /// Raw μ-law (`.pcm`, `.ulaw`, `.ul`, `.mu`, `.ulw`)
    pub fn ulaw() -> Self {
        Self { law: Law::Ulaw }
    }

    pub fn law(&self) -> Law {
        self.law
    }
}

impl FormatDef for PcmFormat {
    fn name(&self) -> &str {
        match self.law {
            Law::Alaw => "alaw",
            Law::Ulaw => "pcm",
        }
    }

    fn extensions(&self) -> &[&str] {
        match self.law {
            Law::Alaw => &["alaw", "al", "alw"],
            Law::Ulaw => &["pcm", "ulaw", "ul", "mu", "ulw"],
        }
    }

    fn format(&self) -> Format {
        self.law.format()
    }

    fn buffer_size(&self) -> usize {
        PCM_FRAME_SIZE
    }

    fn mime_types(&self) -> &[&str] {
        match self.law {
            Law::Alaw => &["audio/x-alaw-basic"],
            Law::Ulaw => &["audio/basic"],
        }
    }

    fn open(&self, _io: &mut StreamIo) -> Result<Box<dyn CodecInstance>, CodecError> {
        Ok(Box::new(PcmStream { law: self.law }))
    }

    fn rewrite(
        &self,
        _io: &mut StreamIo,
        _comment: Option<&str>,
    ) -> Result<Box<dyn CodecInstance>, CodecError> {
        Ok(Box::new(PcmStream { law: self.law }))
    }
}

struct PcmStream {
    law: Law,
}

impl PcmStream {
    fn name(&self) -> &'static str {
        match self.law {
            Law::Alaw => "alaw",
            Law::Ulaw => "pcm",
        }
    }
}

impl CodecInstance for PcmStream {
    fn read(&mut self, io: &mut StreamIo) -> Result<Option<ReadFrame>, CodecError> {
        let payload = io.read_payload(PCM_FRAME_SIZE)?;
        if payload.is_empty() {
            return Ok(None);
        }
        let samples = payload.len() as u32;
        Ok(Some(ReadFrame {
            frame: io.frame(payload, samples),
            next_delta: samples,
        }))
    }

    fn write(&mut self, io: &mut StreamIo, frame: &Frame) -> Result<(), CodecError> {
        check_frame(self.name(), self.law.format(), frame)?;
        io.write_all(&frame.data)
    }

    fn seek(
        &mut self,
        io: &mut StreamIo,
        offset: i64,
        whence: SeekWhence,
    ) -> Result<(), CodecError> {
        let cur = io.position()? as i64;
        let max = io.len()? as i64;

        let mut target = match whence {
            SeekWhence::Set => offset,
            SeekWhence::Current | SeekWhence::ForceCurrent => cur + offset,
            SeekWhence::End => max - offset,
        };
        if whence != SeekWhence::ForceCurrent {
            target = target.min(max);
        }
        let target = target.max(0);

        if target > max {
            let silence = [self.law.silence(); PCM_FRAME_SIZE];
            let padded = (target - max) as u64;
            let mut remaining = padded;
            io.seek_to(SeekFrom::End(0))?;
            while remaining > 0 {
                let chunk = remaining.min(PCM_FRAME_SIZE as u64) as usize;
                io.write_all(&silence[..chunk])?;
                remaining -= chunk as u64;
            }
            tracing::debug!(
                path = %io.path().display(),
                padded,
                "Extended PCM file with silence"
            );
        }

        io.seek_to(SeekFrom::Start(target as u64))?;
        Ok(())
    }

    fn truncate(&mut self, io: &mut StreamIo) -> Result<(), CodecError> {
        io.truncate_here()?;
        Ok(())
    }

    fn tell(&mut self, io: &mut StreamIo) -> Result<u64, CodecError> {
        Ok(io.position()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scratch_stream;
    use bytes::Bytes;
    use std::io::Write;

    fn alaw_frame(byte: u8, len: usize) -> Frame {
        Frame::new(Format::Alaw, Bytes::from(vec![byte; len]), len as u32)
    }

    #[test]
    fn test_round_trip_fixed_frames() {
        let def = PcmFormat::alaw();
        let (_dir, mut io) = scratch_stream(&def, "tone.alaw");
        let mut codec = def.rewrite(&mut io, None).unwrap();
        for byte in [0x11, 0x22, 0x33] {
            codec.write(&mut io, &alaw_frame(byte, PCM_FRAME_SIZE)).unwrap();
        }

        codec.seek(&mut io, 0, SeekWhence::Set).unwrap();
        for byte in [0x11u8, 0x22, 0x33] {
            let read = codec.read(&mut io).unwrap().unwrap();
            assert_eq!(read.frame.datalen(), PCM_FRAME_SIZE);
            assert!(read.frame.data.iter().all(|b| *b == byte));
            assert_eq!(read.frame.samples, 160);
            assert_eq!(read.next_delta, 160);
        }
        assert!(codec.read(&mut io).unwrap().is_none());
    }

    #[test]
    fn test_partial_final_frame() {
        let def = PcmFormat::alaw();
        let (_dir, mut io) = scratch_stream(&def, "short.alaw");
        io.file().write_all(&[0xD5; 200]).unwrap();

        let mut codec = def.open(&mut io).unwrap();
        codec.seek(&mut io, 0, SeekWhence::Set).unwrap();
        assert_eq!(codec.read(&mut io).unwrap().unwrap().frame.datalen(), 160);
        let last = codec.read(&mut io).unwrap().unwrap();
        assert_eq!(last.frame.datalen(), 40);
        assert_eq!(last.next_delta, 40);
    }

    #[test]
    fn test_seek_clamps() {
        let def = PcmFormat::alaw();
        let (_dir, mut io) = scratch_stream(&def, "clamp.alaw");
        io.file().write_all(&[0xD5; 1000]).unwrap();
        let mut codec = def.open(&mut io).unwrap();

        codec.seek(&mut io, 5000, SeekWhence::Set).unwrap();
        assert_eq!(codec.tell(&mut io).unwrap(), 1000);

        codec.seek(&mut io, -5000, SeekWhence::Current).unwrap();
        assert_eq!(codec.tell(&mut io).unwrap(), 0);

        codec.seek(&mut io, 100, SeekWhence::End).unwrap();
        assert_eq!(codec.tell(&mut io).unwrap(), 900);

        codec.seek(&mut io, 50, SeekWhence::Current).unwrap();
        assert_eq!(codec.tell(&mut io).unwrap(), 950);
        assert_eq!(io.len().unwrap(), 1000);
    }

    #[test]
    fn test_force_seek_pads_with_silence() {
        let def = PcmFormat::ulaw();
        let (_dir, mut io) = scratch_stream(&def, "pad.ulaw");
        io.file().write_all(&[0x00; 100]).unwrap();
        let mut codec = def.open(&mut io).unwrap();

        codec.seek(&mut io, 60, SeekWhence::ForceCurrent).unwrap();
        assert_eq!(codec.tell(&mut io).unwrap(), 160);
        assert_eq!(io.len().unwrap(), 160);

        codec.seek(&mut io, 100, SeekWhence::Set).unwrap();
        let read = codec.read(&mut io).unwrap().unwrap();
        assert_eq!(read.frame.datalen(), 60);
        assert!(read.frame.data.iter().all(|b| *b == ULAW_SILENCE));
    }

    #[test]
    fn test_force_seek_pads_across_frames() {
        let def = PcmFormat::alaw();
        let (_dir, mut io) = scratch_stream(&def, "long_pad.alaw");
        io.file().write_all(&[0x55; 10]).unwrap();
        let mut codec = def.open(&mut io).unwrap();

        codec.seek(&mut io, 1000, SeekWhence::ForceCurrent).unwrap();
        assert_eq!(codec.tell(&mut io).unwrap(), 1010);
        assert_eq!(io.len().unwrap(), 1010);

        codec.seek(&mut io, 10, SeekWhence::Set).unwrap();
        let mut padded = 0;
        while let Some(read) = codec.read(&mut io).unwrap() {
            assert!(read.frame.data.iter().all(|b| *b == ALAW_SILENCE));
            padded += read.frame.datalen();
        }
        assert_eq!(padded, 1000);
    }

    #[test]
    fn test_truncate_at_position() {
        let def = PcmFormat::alaw();
        let (_dir, mut io) = scratch_stream(&def, "cut.alaw");
        io.file().write_all(&[0xD5; 480]).unwrap();
        let mut codec = def.open(&mut io).unwrap();

        codec.seek(&mut io, 320, SeekWhence::Set).unwrap();
        codec.truncate(&mut io).unwrap();
        assert_eq!(io.len().unwrap(), 320);
    }

    #[test]
    fn test_law_mismatch_rejected() {
        let def = PcmFormat::ulaw();
        let (_dir, mut io) = scratch_stream(&def, "mismatch.ulaw");
        let mut codec = def.rewrite(&mut io, None).unwrap();
        assert!(matches!(
            codec.write(&mut io, &alaw_frame(0xD5, 160)),
            Err(CodecError::WrongFormat { .. })
        ));
        assert_eq!(io.len().unwrap(), 0);
    }
}
