//! G.711 companding (ITU-T G.711)
//!
//! A-law uses the 13 most significant bits of a linear sample, μ-law the 14
//! most significant bits. Both produce one byte per sample.

/// A-law encoding of a zero sample
pub const ALAW_SILENCE: u8 = 0xD5;

/// μ-law encoding of a zero sample
pub const ULAW_SILENCE: u8 = 0xFF;

/// Compress a linear sample to A-law
pub fn linear_to_alaw(sample: i16) -> u8 {
    let mut ix = if sample < 0 {
        ((!sample) as u16 >> 4) as i16
    } else {
        sample >> 4
    };

    if ix > 15 {
        let mut exponent = 1;
        while ix > 16 + 15 {
            ix >>= 1;
            exponent += 1;
        }
        ix -= 16;
        ix += exponent << 4;
    }

    if sample >= 0 {
        ix |= 0x0080;
    }

    (ix ^ 0x0055) as u8
}

/// Expand an A-law byte to a linear sample
pub fn alaw_to_linear(byte: u8) -> i16 {
    let ix = ((byte ^ 0x55) as i16) & 0x007F;
    let exponent = ix >> 4;
    let mut mantissa = ix & 0x000F;

    if exponent > 0 {
        mantissa += 16;
    }
    mantissa = (mantissa << 4) + 0x0008;
    if exponent > 1 {
        mantissa <<= exponent - 1;
    }

    if byte > 127 {
        mantissa
    } else {
        -mantissa
    }
}

/// Compress a linear sample to μ-law
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let magnitude = if sample < 0 {
        ((!sample) as u16 >> 2) as i16 + 33
    } else {
        (sample >> 2) + 33
    };
    let magnitude = magnitude.min(0x1FFF);

    let mut segment = 1;
    let mut i = magnitude >> 6;
    while i != 0 {
        segment += 1;
        i >>= 1;
    }

    let high = 0x0008 - segment;
    let low = 0x000F - ((magnitude >> segment) & 0x000F);
    let mut byte = (high << 4) | low;
    if sample >= 0 {
        byte |= 0x0080;
    }

    byte as u8
}

/// Expand a μ-law byte to a linear sample
pub fn ulaw_to_linear(byte: u8) -> i16 {
    let sign: i16 = if byte < 0x80 { -1 } else { 1 };
    let inverted = (!byte) as i16;
    let exponent = (inverted >> 4) & 0x0007;
    let mantissa = inverted & 0x000F;
    let step = 4 << (exponent + 1);

    sign * ((0x0080 << exponent) + step * mantissa + step / 2 - 4 * 33)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_codes() {
        assert_eq!(linear_to_alaw(0), ALAW_SILENCE);
        assert_eq!(linear_to_ulaw(0), ULAW_SILENCE);
        assert_eq!(ulaw_to_linear(ULAW_SILENCE), 0);
        assert_eq!(alaw_to_linear(ALAW_SILENCE), 8);
    }

    #[test]
    fn test_alaw_round_trip_is_stable() {
        // Expanding then compressing any code yields the same code
        for byte in 0..=255u8 {
            assert_eq!(linear_to_alaw(alaw_to_linear(byte)), byte);
        }
    }

    #[test]
    fn test_ulaw_round_trip_is_stable() {
        for byte in 0..=255u8 {
            // 0x7F and 0xFF both decode to zero
            if byte == 0x7F {
                continue;
            }
            assert_eq!(linear_to_ulaw(ulaw_to_linear(byte)), byte);
        }
    }

    #[test]
    fn test_sign_preserved() {
        assert!(alaw_to_linear(linear_to_alaw(12000)) > 0);
        assert!(alaw_to_linear(linear_to_alaw(-12000)) < 0);
        assert!(ulaw_to_linear(linear_to_ulaw(i16::MIN)) < 0);
        assert!(ulaw_to_linear(linear_to_ulaw(i16::MAX)) > 0);
    }
}
