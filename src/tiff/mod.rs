
//! Tile-addressed pixel IO over TIFF 6.0 and BigTIFF files.
//!
//! [`Tiff`] owns an open file and its list of directories. An [`Ifd`]
//! is an exclusive handle on one directory, offering typed field access
//! and the [`read_image`](Ifd::read_image) / [`write_image`](Ifd::write_image)
//! operations that translate arbitrary rectangular plane requests into
//! aligned tile or strip IO.

pub mod tags;
pub mod codec;
pub mod wire;
pub mod file;
pub mod ifd;

mod read;
mod write;

pub use codec::{Codec, CompressionScheme};
pub use file::{enable_big_tiff, Mode, Tiff, BIG_TIFF_THRESHOLD};
pub use ifd::{Ifd, TileInfo};

use crate::error::{Error, Result};

/// Whether the pixel payload of a directory is split into
/// rectangular tiles or full-width strips.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TileType {

    /// Full-width blocks of consecutive rows.
    Strip,

    /// Rectangular blocks.
    Tile,
}

/// How the samples of a multi-sample image are placed in the payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlanarConfiguration {

    /// Samples interleaved pixel by pixel within each tile (`RGBRGB…`).
    Contig,

    /// One tile plane per sample (`RRR… GGG… BBB…`).
    Separate,
}

impl PlanarConfiguration {
    pub(crate) fn from_tag(value: u64) -> Result<Self> {
        match value {
            1 => Ok(PlanarConfiguration::Contig),
            2 => Ok(PlanarConfiguration::Separate),
            other => Err(Error::format(format!("invalid planar configuration {}", other))),
        }
    }

    pub(crate) fn tag_value(self) -> u16 {
        match self {
            PlanarConfiguration::Contig => 1,
            PlanarConfiguration::Separate => 2,
        }
    }
}

/// How sample values map to colour or intensity.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PhotometricInterpretation {

    /// Zero is white.
    MinIsWhite,

    /// Zero is black.
    MinIsBlack,

    /// Red, green and blue samples.
    Rgb,

    /// Indexed colour through a lookup table.
    Palette,

    /// A transparency mask.
    TransparencyMask,

    /// Separated colour, usually CMYK.
    Separated,

    /// Luminance and chrominance samples.
    YCbCr,

    /// CIE L*a*b*.
    CieLab,
}

impl PhotometricInterpretation {
    pub(crate) fn from_tag(value: u64) -> Result<Self> {
        use PhotometricInterpretation::*;

        match value {
            0 => Ok(MinIsWhite),
            1 => Ok(MinIsBlack),
            2 => Ok(Rgb),
            3 => Ok(Palette),
            4 => Ok(TransparencyMask),
            5 => Ok(Separated),
            6 => Ok(YCbCr),
            8 => Ok(CieLab),
            other => Err(Error::format(format!("invalid photometric interpretation {}", other))),
        }
    }

    pub(crate) fn tag_value(self) -> u16 {
        use PhotometricInterpretation::*;

        match self {
            MinIsWhite => 0,
            MinIsBlack => 1,
            Rgb => 2,
            Palette => 3,
            TransparencyMask => 4,
            Separated => 5,
            YCbCr => 6,
            CieLab => 8,
        }
    }
}

/// The numeric interpretation of each sample, from the `SampleFormat` field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleFormat {

    /// Unsigned integer samples.
    UnsignedInt,

    /// Two's-complement signed integer samples.
    SignedInt,

    /// IEEE floating point samples.
    Float,

    /// Complex IEEE floating point samples,
    /// two consecutive components per sample.
    ComplexFloat,
}

impl SampleFormat {
    pub(crate) fn from_tag(value: u64) -> Result<Self> {
        match value {
            1 => Ok(SampleFormat::UnsignedInt),
            2 => Ok(SampleFormat::SignedInt),
            3 => Ok(SampleFormat::Float),
            6 => Ok(SampleFormat::ComplexFloat),
            other => Err(Error::format(format!("unsupported sample format {}", other))),
        }
    }

    pub(crate) fn tag_value(self) -> u16 {
        match self {
            SampleFormat::UnsignedInt => 1,
            SampleFormat::SignedInt => 2,
            SampleFormat::Float => 3,
            SampleFormat::ComplexFloat => 6,
        }
    }
}
