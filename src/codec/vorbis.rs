//! Ogg/Vorbis, mono 8 kHz only
//!
//! Decoding goes through `lewton` and is handed out as fixed 160-sample
//! signed-linear frames (the last one may be shorter). Encoding goes through
//! `vorbis_rs`, which writes Ogg pages straight to the file. Vorbis streams
//! cannot be positioned by sample here: seek, truncate and tell are
//! unsupported.

use std::collections::VecDeque;
use std::fs::File;
use std::num::{NonZeroU32, NonZeroU8};

use lewton::inside_ogg::OggStreamReader;
use vorbis_rs::{VorbisEncoder, VorbisEncoderBuilder};

use super::{check_frame, CodecError, CodecInstance, FormatDef, ReadFrame, SeekWhence, StreamIo};
use crate::media::{Format, Frame};

/// Samples per emitted frame
pub const SAMPLES_PER_FRAME: usize = 160;

const SAMPLE_RATE: u32 = 8000;

const ENCODER_TAG: &str = concat!("pbx-media ", env!("CARGO_PKG_VERSION"));

/// Ogg/Vorbis container descriptor
#[derive(Debug, Default)]
pub struct OggVorbisFormat;

impl FormatDef for OggVorbisFormat {
    fn name(&self) -> &str {
        "ogg_vorbis"
    }

    fn extensions(&self) -> &[&str] {
        &["ogg"]
    }

    fn format(&self) -> Format {
        Format::Slin
    }

    fn buffer_size(&self) -> usize {
        SAMPLES_PER_FRAME * 2
    }

    fn mime_types(&self) -> &[&str] {
        &["audio/ogg", "application/ogg"]
    }

    fn open(&self, io: &mut StreamIo) -> Result<Box<dyn CodecInstance>, CodecError> {
        let reader = OggStreamReader::new(io.file().try_clone()?)
            .map_err(|e| CodecError::Open(e.to_string()))?;

        let channels = reader.ident_hdr.audio_channels;
        let rate = reader.ident_hdr.audio_sample_rate;
        if channels != 1 {
            return Err(CodecError::Open(format!(
                "only mono Vorbis is supported, file has {channels} channels"
            )));
        }
        if rate != SAMPLE_RATE {
            return Err(CodecError::Open(format!(
                "only 8000 Hz Vorbis is supported, file is {rate} Hz"
            )));
        }

        let comment = reader
            .comment_hdr
            .comment_list
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>();
        tracing::debug!(
            path = %io.path().display(),
            vendor = %reader.comment_hdr.vendor,
            comments = comment.len(),
            "Opened Ogg/Vorbis stream"
        );

        Ok(Box::new(VorbisReader {
            reader,
            pending: VecDeque::new(),
            comment: (!comment.is_empty()).then(|| comment.join("\n")),
            finished: false,
        }))
    }

    fn rewrite(
        &self,
        io: &mut StreamIo,
        comment: Option<&str>,
    ) -> Result<Box<dyn CodecInstance>, CodecError> {
        let rate = NonZeroU32::new(SAMPLE_RATE)
            .ok_or_else(|| CodecError::Vorbis("invalid sample rate".into()))?;
        let channels =
            NonZeroU8::new(1).ok_or_else(|| CodecError::Vorbis("invalid channel count".into()))?;

        let mut builder = VorbisEncoderBuilder::new(rate, channels, io.file().try_clone()?)
            .map_err(|e| CodecError::Vorbis(e.to_string()))?;
        builder.comment_tag("ENCODER", ENCODER_TAG);
        if let Some(comment) = comment {
            builder.comment_tag("COMMENT", comment);
        }
        let encoder = builder
            .build()
            .map_err(|e| CodecError::Vorbis(e.to_string()))?;

        tracing::debug!(
            path = %io.path().display(),
            comment = comment.is_some(),
            "Created Ogg/Vorbis stream"
        );

        Ok(Box::new(VorbisWriter {
            encoder: Some(encoder),
        }))
    }
}

struct VorbisReader {
    reader: OggStreamReader<File>,
    /// Decoded samples not yet handed out
    pending: VecDeque<i16>,
    comment: Option<String>,
    finished: bool,
}

impl VorbisReader {
    fn decode_more(&mut self) -> Result<(), CodecError> {
        while !self.finished && self.pending.len() < SAMPLES_PER_FRAME {
            match self.reader.read_dec_packet_itl() {
                Ok(Some(samples)) => self.pending.extend(samples),
                Ok(None) => self.finished = true,
                Err(e) => return Err(CodecError::Vorbis(e.to_string())),
            }
        }
        Ok(())
    }
}

impl CodecInstance for VorbisReader {
    fn read(&mut self, io: &mut StreamIo) -> Result<Option<ReadFrame>, CodecError> {
        self.decode_more()?;
        if self.pending.is_empty() {
            return Ok(None);
        }

        let count = self.pending.len().min(SAMPLES_PER_FRAME);
        let mut pcm = Vec::with_capacity(count * 2);
        for sample in self.pending.drain(..count) {
            pcm.extend_from_slice(&sample.to_ne_bytes());
        }

        let payload = io.payload_from(&pcm)?;
        Ok(Some(ReadFrame {
            frame: io.frame(payload, count as u32),
            next_delta: count as u32,
        }))
    }

    fn write(&mut self, _io: &mut StreamIo, _frame: &Frame) -> Result<(), CodecError> {
        Err(CodecError::unsupported("ogg_vorbis", "write on a stream opened for reading"))
    }

    fn seek(
        &mut self,
        _io: &mut StreamIo,
        _offset: i64,
        _whence: SeekWhence,
    ) -> Result<(), CodecError> {
        Err(CodecError::unsupported("ogg_vorbis", "seek"))
    }

    fn truncate(&mut self, _io: &mut StreamIo) -> Result<(), CodecError> {
        Err(CodecError::unsupported("ogg_vorbis", "truncate"))
    }

    fn tell(&mut self, _io: &mut StreamIo) -> Result<u64, CodecError> {
        Err(CodecError::unsupported("ogg_vorbis", "tell"))
    }

    fn comment(&self) -> Option<String> {
        self.comment.clone()
    }
}

struct VorbisWriter {
    encoder: Option<VorbisEncoder<File>>,
}

impl CodecInstance for VorbisWriter {
    fn read(&mut self, _io: &mut StreamIo) -> Result<Option<ReadFrame>, CodecError> {
        Err(CodecError::unsupported("ogg_vorbis", "read on a stream opened for writing"))
    }

    fn write(&mut self, _io: &mut StreamIo, frame: &Frame) -> Result<(), CodecError> {
        check_frame("ogg_vorbis", Format::Slin, frame)?;
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(CodecError::Vorbis("encoder already finished".into()));
        };
        if frame.data.len() < 2 {
            return Ok(());
        }

        let block: Vec<f32> = frame
            .data
            .chunks_exact(2)
            .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect();
        encoder
            .encode_audio_block([&block[..]])
            .map_err(|e| CodecError::Vorbis(e.to_string()))
    }

    fn seek(
        &mut self,
        _io: &mut StreamIo,
        _offset: i64,
        _whence: SeekWhence,
    ) -> Result<(), CodecError> {
        Err(CodecError::unsupported("ogg_vorbis", "seek"))
    }

    fn truncate(&mut self, _io: &mut StreamIo) -> Result<(), CodecError> {
        Err(CodecError::unsupported("ogg_vorbis", "truncate"))
    }

    fn tell(&mut self, _io: &mut StreamIo) -> Result<u64, CodecError> {
        Err(CodecError::unsupported("ogg_vorbis", "tell"))
    }

    fn close(&mut self, _io: &mut StreamIo) -> Result<(), CodecError> {
        if let Some(encoder) = self.encoder.take() {
            encoder
                .finish()
                .map_err(|e| CodecError::Vorbis(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scratch_stream;
    use bytes::Bytes;
    use std::io::SeekFrom;

    fn tone(samples: usize) -> Bytes {
        let mut pcm = Vec::with_capacity(samples * 2);
        for n in 0..samples {
            let phase = n as f32 * 2.0 * std::f32::consts::PI * 440.0 / 8000.0;
            let sample = (phase.sin() * 8000.0) as i16;
            pcm.extend_from_slice(&sample.to_ne_bytes());
        }
        Bytes::from(pcm)
    }

    #[test]
    fn test_encode_then_decode() {
        let def = OggVorbisFormat;
        let (_dir, mut io) = scratch_stream(&def, "tone.ogg");

        let mut writer = def.rewrite(&mut io, None).unwrap();
        for _ in 0..50 {
            let frame = Frame::new(Format::Slin, tone(160), 160);
            writer.write(&mut io, &frame).unwrap();
        }
        writer.close(&mut io).unwrap();
        assert!(io.len().unwrap() > 0);

        io.seek_to(SeekFrom::Start(0)).unwrap();
        let mut reader = def.open(&mut io).unwrap();
        let first = reader.read(&mut io).unwrap().unwrap();
        assert_eq!(first.frame.format, Format::Slin);
        assert_eq!(first.frame.samples, SAMPLES_PER_FRAME as u32);
        assert_eq!(first.frame.datalen(), SAMPLES_PER_FRAME * 2);

        let mut total = first.frame.samples as usize;
        while let Some(read) = reader.read(&mut io).unwrap() {
            assert!(read.frame.samples as usize <= SAMPLES_PER_FRAME);
            total += read.frame.samples as usize;
        }
        assert!(total >= 4000);
    }

    #[test]
    fn test_comment_survives_recording() {
        let def = OggVorbisFormat;
        let (_dir, mut io) = scratch_stream(&def, "greeting.ogg");

        let mut writer = def.rewrite(&mut io, Some("recorded by vm")).unwrap();
        for _ in 0..10 {
            let frame = Frame::new(Format::Slin, tone(160), 160);
            writer.write(&mut io, &frame).unwrap();
        }
        writer.close(&mut io).unwrap();

        io.seek_to(SeekFrom::Start(0)).unwrap();
        let reader = def.open(&mut io).unwrap();
        let comment = reader.comment().unwrap();
        assert!(comment.contains("COMMENT=recorded by vm"));
        assert!(comment.contains("ENCODER=pbx-media"));
    }

    #[test]
    fn test_position_ops_unsupported() {
        let def = OggVorbisFormat;
        let (_dir, mut io) = scratch_stream(&def, "pos.ogg");
        let mut writer = def.rewrite(&mut io, Some("recorded")).unwrap();

        assert!(matches!(
            writer.seek(&mut io, 0, SeekWhence::Set),
            Err(CodecError::Unsupported { .. })
        ));
        assert!(matches!(
            writer.truncate(&mut io),
            Err(CodecError::Unsupported { .. })
        ));
        assert!(matches!(
            writer.tell(&mut io),
            Err(CodecError::Unsupported { .. })
        ));
        writer.close(&mut io).unwrap();
    }

    #[test]
    fn test_not_ogg_fails_open() {
        let def = OggVorbisFormat;
        let (_dir, mut io) = scratch_stream(&def, "junk.ogg");
        io.write_all(&[0u8; 64]).unwrap();
        io.seek_to(SeekFrom::Start(0)).unwrap();
        assert!(matches!(def.open(&mut io), Err(CodecError::Open(_))));
    }

    #[test]
    fn test_rejects_companded_audio() {
        let def = OggVorbisFormat;
        let (_dir, mut io) = scratch_stream(&def, "alaw.ogg");
        let mut writer = def.rewrite(&mut io, None).unwrap();
        let frame = Frame::new(Format::Alaw, Bytes::from_static(&[0xD5; 160]), 160);
        assert!(matches!(
            writer.write(&mut io, &frame),
            Err(CodecError::WrongFormat { .. })
        ));
        writer.close(&mut io).unwrap();
    }
}
