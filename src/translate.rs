//! Format translation
//!
//! A [`Translator`] builds [`TranslationPath`]s between two payload formats.
//! Paths are stateful and cached by whoever uses them (a recording
//! filestream keeps one per incoming format).
//!
//! The built-in [`G711Translator`] converts between signed linear, A-law and
//! μ-law.

use bytes::Bytes;

use crate::media::g711::{alaw_to_linear, linear_to_alaw, linear_to_ulaw, ulaw_to_linear};
use crate::media::{Format, Frame};

/// Source of translation paths
pub trait Translator: Send + Sync {
    /// Build a path converting `src` frames to `dst`, if one exists
    fn build_path(&self, src: Format, dst: Format) -> Option<Box<dyn TranslationPath>>;
}

/// A live converter from one format to another
pub trait TranslationPath: Send {
    /// Format accepted
    fn source(&self) -> Format;

    /// Format produced
    fn destination(&self) -> Format;

    /// Convert one frame. May yield zero or more frames.
    fn translate(&mut self, frame: &Frame) -> Vec<Frame>;
}

/// Translator that knows no paths
#[derive(Debug, Default)]
pub struct NoTranslator;

impl Translator for NoTranslator {
    fn build_path(&self, _src: Format, _dst: Format) -> Option<Box<dyn TranslationPath>> {
        None
    }
}

/// Slin / A-law / μ-law translator
#[derive(Debug, Default)]
pub struct G711Translator;

impl Translator for G711Translator {
    fn build_path(&self, src: Format, dst: Format) -> Option<Box<dyn TranslationPath>> {
        let companded = |f: Format| matches!(f, Format::Alaw | Format::Ulaw);
        let supported = src != dst
            && (src == Format::Slin || companded(src))
            && (dst == Format::Slin || companded(dst));
        if !supported {
            return None;
        }
        tracing::debug!(src = %src, dst = %dst, "Built G.711 translation path");
        Some(Box::new(G711Path { src, dst }))
    }
}

struct G711Path {
    src: Format,
    dst: Format,
}

impl G711Path {
    fn decode(&self, data: &[u8]) -> Vec<i16> {
        match self.src {
            Format::Alaw => data.iter().map(|b| alaw_to_linear(*b)).collect(),
            Format::Ulaw => data.iter().map(|b| ulaw_to_linear(*b)).collect(),
            _ => data
                .chunks_exact(2)
                .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
                .collect(),
        }
    }

    fn encode(&self, samples: &[i16]) -> Vec<u8> {
        match self.dst {
            Format::Alaw => samples.iter().map(|s| linear_to_alaw(*s)).collect(),
            Format::Ulaw => samples.iter().map(|s| linear_to_ulaw(*s)).collect(),
            _ => samples.iter().flat_map(|s| s.to_ne_bytes()).collect(),
        }
    }
}

impl TranslationPath for G711Path {
    fn source(&self) -> Format {
        self.src
    }

    fn destination(&self) -> Format {
        self.dst
    }

    fn translate(&mut self, frame: &Frame) -> Vec<Frame> {
        if frame.format != self.src {
            return Vec::new();
        }
        let samples = self.decode(&frame.data);
        if samples.is_empty() {
            return Vec::new();
        }
        let count = samples.len() as u32;
        vec![Frame::new(self.dst, Bytes::from(self.encode(&samples)), count)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::g711::ALAW_SILENCE;

    #[test]
    fn test_paths() {
        let translator = G711Translator;
        assert!(translator.build_path(Format::Slin, Format::Alaw).is_some());
        assert!(translator.build_path(Format::Ulaw, Format::Alaw).is_some());
        assert!(translator.build_path(Format::Alaw, Format::Alaw).is_none());
        assert!(translator.build_path(Format::G723, Format::Alaw).is_none());
        assert!(translator.build_path(Format::Slin, Format::H264).is_none());
        assert!(NoTranslator.build_path(Format::Slin, Format::Alaw).is_none());
    }

    #[test]
    fn test_slin_to_alaw() {
        let mut path = G711Translator
            .build_path(Format::Slin, Format::Alaw)
            .unwrap();
        let silence = Frame::new(Format::Slin, Bytes::from(vec![0u8; 320]), 160);

        let out = path.translate(&silence);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].format, Format::Alaw);
        assert_eq!(out[0].samples, 160);
        assert_eq!(out[0].datalen(), 160);
        assert!(out[0].data.iter().all(|b| *b == ALAW_SILENCE));
    }

    #[test]
    fn test_ulaw_to_alaw_keeps_sign() {
        let mut path = G711Translator.build_path(Format::Ulaw, Format::Alaw).unwrap();
        let loud = linear_to_ulaw(10000);
        let frame = Frame::new(Format::Ulaw, Bytes::from(vec![loud; 8]), 8);

        let out = path.translate(&frame);
        assert!(alaw_to_linear(out[0].data[0]) > 9000);
    }

    #[test]
    fn test_wrong_source_yields_nothing() {
        let mut path = G711Translator.build_path(Format::Alaw, Format::Slin).unwrap();
        let frame = Frame::new(Format::Ulaw, Bytes::from_static(&[0xFF; 4]), 4);
        assert!(path.translate(&frame).is_empty());
    }
}
