//! Conversion result vocabulary: output formats, bit depths and the
//! published variant descriptor.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::store::VariantHandle;

// ---------------------------------------------------------------------------
// BitDepth
// ---------------------------------------------------------------------------

/// Bit depths the conversion service produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Sixteen,
    TwentyFour,
}

/// A bit depth outside the supported 8/16/24 set.
#[derive(Debug, Error, PartialEq)]
#[error("unsupported bit depth: {0}")]
pub struct UnsupportedBitDepth(pub i64);

impl BitDepth {
    pub const ALL: [BitDepth; 3] = [BitDepth::Eight, BitDepth::Sixteen, BitDepth::TwentyFour];

    pub fn as_u8(self) -> u8 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
            BitDepth::TwentyFour => 24,
        }
    }
}

impl TryFrom<i64> for BitDepth {
    type Error = UnsupportedBitDepth;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            24 => Ok(BitDepth::TwentyFour),
            other => Err(UnsupportedBitDepth(other)),
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// VariantFormat
// ---------------------------------------------------------------------------

/// Container formats the conversion service produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantFormat {
    Wav,
    Mp3,
}

/// A format string this release does not know how to play or save.
#[derive(Debug, Error, PartialEq)]
#[error("unknown variant format: {0:?}")]
pub struct UnknownFormat(pub String);

impl VariantFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            VariantFormat::Wav => "wav",
            VariantFormat::Mp3 => "mp3",
        }
    }

    /// Mime type used when the service does not declare one.
    pub fn mime_type(self) -> &'static str {
        match self {
            VariantFormat::Wav => "audio/wav",
            VariantFormat::Mp3 => "audio/mpeg",
        }
    }
}

impl FromStr for VariantFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(VariantFormat::Wav),
            "mp3" => Ok(VariantFormat::Mp3),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for VariantFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ResultVariant
// ---------------------------------------------------------------------------

/// One converted rendition of the recording, as published to the front end.
///
/// The payload itself lives in the [`super::VariantStore`]; this descriptor
/// only carries the [`VariantHandle`] pointing at it, so revoking the store
/// epoch invalidates every outstanding descriptor at once.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultVariant {
    pub format: VariantFormat,
    pub bit_depth: BitDepth,
    /// Mime type declared by the service, or the format default.
    pub mime_type: String,
    /// Decoded payload length.
    pub size_bytes: usize,
    pub handle: VariantHandle,
}

impl ResultVariant {
    /// Payload size in kilobytes, displayed with two decimals in the UI.
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }

    /// Download name in the shape `audio_16bits.wav`.
    pub fn suggested_filename(&self) -> String {
        format!("audio_{}bits.{}", self.bit_depth, self.format)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_depth_round_trips_supported_values() {
        for depth in BitDepth::ALL {
            assert_eq!(BitDepth::try_from(depth.as_u8() as i64), Ok(depth));
        }
    }

    #[test]
    fn bit_depth_rejects_others() {
        assert_eq!(BitDepth::try_from(32), Err(UnsupportedBitDepth(32)));
        assert_eq!(BitDepth::try_from(0), Err(UnsupportedBitDepth(0)));
        assert_eq!(BitDepth::try_from(-8), Err(UnsupportedBitDepth(-8)));
    }

    #[test]
    fn format_parse_is_case_insensitive() {
        assert_eq!("wav".parse::<VariantFormat>(), Ok(VariantFormat::Wav));
        assert_eq!("WAV".parse::<VariantFormat>(), Ok(VariantFormat::Wav));
        assert_eq!("Mp3".parse::<VariantFormat>(), Ok(VariantFormat::Mp3));
    }

    #[test]
    fn format_parse_rejects_unknown() {
        assert_eq!(
            "flac".parse::<VariantFormat>(),
            Err(UnknownFormat("flac".into()))
        );
    }

    #[test]
    fn format_mime_fallbacks() {
        assert_eq!(VariantFormat::Wav.mime_type(), "audio/wav");
        assert_eq!(VariantFormat::Mp3.mime_type(), "audio/mpeg");
    }

    #[test]
    fn suggested_filename_shape() {
        let variant = ResultVariant {
            format: VariantFormat::Mp3,
            bit_depth: BitDepth::TwentyFour,
            mime_type: "audio/mpeg".into(),
            size_bytes: 1_536,
            handle: VariantHandle::from_raw(7),
        };
        assert_eq!(variant.suggested_filename(), "audio_24bits.mp3");
    }

    #[test]
    fn size_kb_two_decimal_display() {
        let variant = ResultVariant {
            format: VariantFormat::Wav,
            bit_depth: BitDepth::Sixteen,
            mime_type: "audio/wav".into(),
            size_bytes: 1_536,
            handle: VariantHandle::from_raw(1),
        };
        assert_eq!(format!("{:.2}", variant.size_kb()), "1.50");

        let odd = ResultVariant {
            size_bytes: 1_000,
            ..variant
        };
        assert_eq!(format!("{:.2}", odd.size_kb()), "0.98");
    }
}
