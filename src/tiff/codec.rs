
//! The codec catalog, and compression and decompression of tile payloads.
//!
//! Codecs are identified by textual name. Each pixel type has an
//! allow-list of codecs; incompatible combinations are rejected before
//! the first tile is written. The catalog is read-mostly process state,
//! initialised once on first use.

use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::pixel::PixelType;

/// A compression scheme as stored in the `Compression` field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CompressionScheme {
    /// No compression.
    None,
    /// CCITT modified Huffman run length encoding, bilevel only.
    CcittRle,
    /// CCITT group 3 fax, bilevel only.
    CcittT4,
    /// CCITT group 4 fax, bilevel only.
    CcittT6,
    /// Lempel-Ziv-Welch.
    Lzw,
    /// Baseline JPEG, 8-bit only.
    Jpeg,
    /// Zlib deflate, the Adobe variant.
    AdobeDeflate,
    /// PackBits run length encoding.
    PackBits,
    /// Zlib deflate, the legacy registration.
    Deflate,
    /// JBIG, bilevel only.
    Jbig,
    /// LZMA2.
    Lzma,
    /// JPEG-2000.
    Jp2000,
}

impl CompressionScheme {

    /// The scheme for a `Compression` field value.
    pub fn from_tag(value: u64) -> Result<Self> {
        use CompressionScheme::*;

        match value {
            1 => Ok(None),
            2 => Ok(CcittRle),
            3 => Ok(CcittT4),
            4 => Ok(CcittT6),
            5 => Ok(Lzw),
            7 => Ok(Jpeg),
            8 => Ok(AdobeDeflate),
            32773 => Ok(PackBits),
            32946 => Ok(Deflate),
            34661 => Ok(Jbig),
            34925 => Ok(Lzma),
            34712 => Ok(Jp2000),
            other => Err(Error::format(format!("unknown compression scheme {}", other))),
        }
    }

    /// The `Compression` field value for this scheme.
    pub fn tag_value(self) -> u16 {
        use CompressionScheme::*;

        match self {
            None => 1,
            CcittRle => 2,
            CcittT4 => 3,
            CcittT6 => 4,
            Lzw => 5,
            Jpeg => 7,
            AdobeDeflate => 8,
            PackBits => 32773,
            Deflate => 32946,
            Jbig => 34661,
            Lzma => 34925,
            Jp2000 => 34712,
        }
    }

    /// The catalog name of this scheme.
    pub fn name(self) -> &'static str {
        use CompressionScheme::*;

        match self {
            None => "None",
            CcittRle => "CCITT RLE",
            CcittT4 => "CCITT T.4",
            CcittT6 => "CCITT T.6",
            Lzw => "LZW",
            Jpeg => "JPEG",
            AdobeDeflate => "Deflate",
            PackBits => "PackBits",
            Deflate => "LegacyDeflate",
            Jbig => "JBIG",
            Lzma => "LZMA",
            Jp2000 => "JP2000",
        }
    }

    /// Whether this scheme may be combined with the specified pixel type.
    pub fn supports(self, pixel_type: PixelType) -> bool {
        use CompressionScheme::*;

        match self {
            None => true,

            // Bilevel codecs.
            CcittRle | CcittT4 | CcittT6 | PackBits | Jbig =>
                pixel_type == PixelType::Bit,

            // Codecs which work with all pixel types.
            Lzw | AdobeDeflate | Deflate | Lzma | Jp2000 => true,

            // 8-bit data only.
            Jpeg => pixel_type == PixelType::UInt8,
        }
    }

    /// Compress one tile payload.
    pub fn compress(self, bytes: &[u8]) -> Result<Vec<u8>> {
        use CompressionScheme::*;

        match self {
            None => Ok(bytes.to_vec()),

            Lzw => {
                weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
                    .encode(bytes)
                    .map_err(|error| Error::format(format!("lzw compression failed: {:?}", error)))
            },

            AdobeDeflate | Deflate => {
                Ok(miniz_oxide::deflate::compress_to_vec_zlib(bytes, 4))
            },

            other => Err(Error::unsupported(
                format!("codec {} is not available for encoding", other.name()))),
        }
    }

    /// Decompress one tile payload.
    /// The expected size bounds allocation while decoding; the result may
    /// still be shorter, which the caller checks against the clipped region.
    pub fn decompress(self, bytes: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        use CompressionScheme::*;

        match self {
            None => Ok(bytes.to_vec()),

            Lzw => {
                weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
                    .decode(bytes)
                    .map_err(|error| Error::format(format!("lzw-compressed data malformed: {:?}", error)))
            },

            AdobeDeflate | Deflate => {
                let options = zune_inflate::DeflateOptions::default()
                    .set_limit(expected_size)
                    .set_size_hint(expected_size);

                zune_inflate::DeflateDecoder::new_with_options(bytes, options)
                    .decode_zlib()
                    .map_err(|_| Error::format("zlib-compressed data malformed"))
            },

            other => Err(Error::unsupported(
                format!("codec {} is not available for decoding", other.name()))),
        }
    }
}

impl std::fmt::Display for CompressionScheme {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name())
    }
}

/// One entry of the codec catalog.
#[derive(Clone, Copy, Debug)]
pub struct Codec {

    /// Codec name.
    pub name: &'static str,

    /// Codec scheme number.
    pub scheme: CompressionScheme,
}

/// All codecs known to this crate.
pub fn codecs() -> &'static [Codec] {
    static CODECS: OnceLock<Vec<Codec>> = OnceLock::new();

    CODECS.get_or_init(|| {
        use CompressionScheme::*;

        [None, CcittRle, CcittT4, CcittT6, Lzw, Jpeg,
         AdobeDeflate, PackBits, Deflate, Jbig, Lzma, Jp2000]
            .into_iter()
            .map(|scheme| Codec { name: scheme.name(), scheme })
            .collect()
    })
}

/// The names of all codecs known to this crate.
pub fn codec_names() -> impl Iterator<Item = &'static str> {
    codecs().iter().map(|codec| codec.name)
}

/// The names of the codecs usable with the specified pixel type.
/// The no-compression pseudo-codec is not listed.
pub fn codec_names_for(pixel_type: PixelType) -> Vec<&'static str> {
    codecs().iter()
        .filter(|codec| codec.scheme != CompressionScheme::None)
        .filter(|codec| codec.scheme.supports(pixel_type))
        .map(|codec| codec.name)
        .collect()
}

/// The compression scheme for a codec name,
/// or no compression if the name is unknown.
pub fn codec_scheme(name: &str) -> CompressionScheme {
    codecs().iter()
        .find(|codec| codec.name == name)
        .map(|codec| codec.scheme)
        .unwrap_or(CompressionScheme::None)
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn catalog_lookup() {
        assert_eq!(codec_scheme("LZW"), CompressionScheme::Lzw);
        assert_eq!(codec_scheme("Deflate"), CompressionScheme::AdobeDeflate);
        assert_eq!(codec_scheme("no such codec"), CompressionScheme::None);
        assert!(codec_names().any(|name| name == "JPEG"));
    }

    #[test]
    fn allow_lists() {
        let bilevel = codec_names_for(PixelType::Bit);
        assert!(bilevel.contains(&"CCITT T.6"));
        assert!(bilevel.contains(&"LZW"));
        assert!(!bilevel.contains(&"JPEG"));

        let bytes = codec_names_for(PixelType::UInt8);
        assert!(bytes.contains(&"JPEG"));
        assert!(!bytes.contains(&"CCITT T.6"));

        let floats = codec_names_for(PixelType::Float);
        assert!(floats.contains(&"Deflate"));
        assert!(!floats.contains(&"JPEG"));

        assert!(CompressionScheme::None.supports(PixelType::Bit));
    }

    #[test]
    fn deflate_round_trip() {
        let payload: Vec<u8> = (0_u8 .. 255).cycle().take(10_000).collect();
        let compressed = CompressionScheme::AdobeDeflate.compress(&payload).unwrap();
        assert!(compressed.len() < payload.len());

        let restored = CompressionScheme::AdobeDeflate
            .decompress(&compressed, payload.len()).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn lzw_round_trip() {
        let payload: Vec<u8> = std::iter::repeat([1_u8, 1, 2, 3, 5, 8].into_iter())
            .flatten().take(4_096).collect();

        let compressed = CompressionScheme::Lzw.compress(&payload).unwrap();
        let restored = CompressionScheme::Lzw.decompress(&compressed, payload.len()).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn unimplemented_codec_is_rejected() {
        assert!(matches!(
            CompressionScheme::Jpeg.compress(&[0; 8]),
            Err(Error::Type(_))
        ));
    }
}
