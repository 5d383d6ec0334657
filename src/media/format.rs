//! Payload formats and capability sets
//!
//! A [`Format`] names the encoding of a frame payload. A [`FormatCap`] is a
//! bitmask of formats, used both for what a channel can carry natively and
//! for the set of formats a file was found in.

use std::fmt;

/// Kind of media a format carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Voice / audio samples
    Audio,
    /// Video access units
    Video,
}

/// Payload encoding of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Signed linear 16-bit, 8 kHz, host byte order
    Slin,
    /// G.711 μ-law
    Ulaw,
    /// G.711 A-law
    Alaw,
    /// G.723.1
    G723,
    /// H.264 (RTP payload units)
    H264,
}

impl Format {
    /// Every known format, in capability-bit order
    pub const ALL: [Format; 5] = [
        Format::Slin,
        Format::Ulaw,
        Format::Alaw,
        Format::G723,
        Format::H264,
    ];

    /// Canonical lower-case name
    pub fn name(&self) -> &'static str {
        match self {
            Format::Slin => "slin",
            Format::Ulaw => "ulaw",
            Format::Alaw => "alaw",
            Format::G723 => "g723",
            Format::H264 => "h264",
        }
    }

    /// Look a format up by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Media kind carried by this format
    pub fn kind(&self) -> MediaKind {
        match self {
            Format::H264 => MediaKind::Video,
            _ => MediaKind::Audio,
        }
    }

    /// Clock rate of the format's sample unit.
    ///
    /// Video formats count in a 1000 Hz clock.
    pub fn sample_rate(&self) -> u32 {
        match self.kind() {
            MediaKind::Audio => 8000,
            MediaKind::Video => 1000,
        }
    }

    /// Samples per millisecond of this format's clock
    pub fn samples_per_ms(&self) -> u32 {
        (self.sample_rate() / 1000).max(1)
    }

    /// Capability bit
    pub fn bit(&self) -> u32 {
        1 << (*self as u32)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FormatCap(u32);

impl FormatCap {
    /// Empty set
    pub const fn empty() -> Self {
        FormatCap(0)
    }

    /// Set containing exactly one format
    pub fn single(format: Format) -> Self {
        FormatCap(format.bit())
    }

    /// Raw bitmask
    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, format: Format) {
        self.0 |= format.bit();
    }

    pub fn contains(&self, format: Format) -> bool {
        self.0 & format.bit() != 0
    }

    /// Whether any member is of the given kind
    pub fn has_kind(&self, kind: MediaKind) -> bool {
        self.iter().any(|f| f.kind() == kind)
    }

    /// Formats present in both sets
    pub fn intersection(&self, other: FormatCap) -> FormatCap {
        FormatCap(self.0 & other.0)
    }

    /// Formats present in either set
    pub fn union(&self, other: FormatCap) -> FormatCap {
        FormatCap(self.0 | other.0)
    }

    /// Members of the given kind
    pub fn of_kind(&self, kind: MediaKind) -> FormatCap {
        self.iter().filter(|f| f.kind() == kind).collect()
    }

    /// Members of the set in capability-bit order
    pub fn iter(&self) -> impl Iterator<Item = Format> + '_ {
        Format::ALL.into_iter().filter(move |f| self.contains(*f))
    }

    /// First member of the given kind
    pub fn first_of_kind(&self, kind: MediaKind) -> Option<Format> {
        self.iter().find(|f| f.kind() == kind)
    }
}

impl FromIterator<Format> for FormatCap {
    fn from_iter<I: IntoIterator<Item = Format>>(iter: I) -> Self {
        let mut cap = FormatCap::empty();
        for format in iter {
            cap.insert(format);
        }
        cap
    }
}

impl fmt::Display for FormatCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(nothing)");
        }
        let names: Vec<&str> = self.iter().map(|fmt| fmt.name()).collect();
        f.write_str(&names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        for format in Format::ALL {
            assert_eq!(Format::from_name(format.name()), Some(format));
        }
        assert_eq!(Format::from_name("ALAW"), Some(Format::Alaw));
        assert_eq!(Format::from_name("gsm"), None);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(Format::Alaw.sample_rate(), 8000);
        assert_eq!(Format::Alaw.samples_per_ms(), 8);
        assert_eq!(Format::H264.kind(), MediaKind::Video);
        assert_eq!(Format::H264.samples_per_ms(), 1);
    }

    #[test]
    fn test_cap_operations() {
        let mut cap = FormatCap::empty();
        assert!(cap.is_empty());

        cap.insert(Format::Alaw);
        cap.insert(Format::H264);
        assert!(cap.contains(Format::Alaw));
        assert!(!cap.contains(Format::Ulaw));
        assert!(cap.has_kind(MediaKind::Video));
        assert_eq!(cap.first_of_kind(MediaKind::Audio), Some(Format::Alaw));

        let native: FormatCap = [Format::Ulaw, Format::Alaw].into_iter().collect();
        assert_eq!(cap.intersection(native), FormatCap::single(Format::Alaw));
        assert_eq!(cap.to_string(), "alaw|h264");
    }
}
