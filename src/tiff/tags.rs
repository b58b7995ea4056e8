
//! The TIFF field tags this crate consumes and emits.
//! Tag value semantics follow the TIFF 6.0 specification.

/// ImageWidth.
pub const IMAGE_WIDTH: u16 = 256;

/// ImageLength.
pub const IMAGE_LENGTH: u16 = 257;

/// BitsPerSample.
pub const BITS_PER_SAMPLE: u16 = 258;

/// Compression.
pub const COMPRESSION: u16 = 259;

/// PhotometricInterpretation.
pub const PHOTOMETRIC_INTERPRETATION: u16 = 262;

/// ImageDescription.
pub const IMAGE_DESCRIPTION: u16 = 270;

/// StripOffsets.
pub const STRIP_OFFSETS: u16 = 273;

/// SamplesPerPixel.
pub const SAMPLES_PER_PIXEL: u16 = 277;

/// RowsPerStrip.
pub const ROWS_PER_STRIP: u16 = 278;

/// StripByteCounts.
pub const STRIP_BYTE_COUNTS: u16 = 279;

/// PlanarConfiguration.
pub const PLANAR_CONFIGURATION: u16 = 284;

/// Software.
pub const SOFTWARE: u16 = 305;

/// ColorMap.
pub const COLOR_MAP: u16 = 320;

/// TileWidth.
pub const TILE_WIDTH: u16 = 322;

/// TileLength.
pub const TILE_LENGTH: u16 = 323;

/// TileOffsets.
pub const TILE_OFFSETS: u16 = 324;

/// TileByteCounts.
pub const TILE_BYTE_COUNTS: u16 = 325;

/// SubIFDs.
pub const SUB_IFD: u16 = 330;

/// SampleFormat.
pub const SAMPLE_FORMAT: u16 = 339;

/// ImageJ private metadata byte counts.
/// Registered so files written by ImageJ parse without complaint.
pub const IMAGEJ_META_DATA_BYTE_COUNTS: u16 = 50838;

/// ImageJ private metadata.
pub const IMAGEJ_META_DATA: u16 = 50839;

/// The name of a tag, for error messages and diagnostics.
/// Unknown tags have no name.
pub fn tag_name(tag: u16) -> Option<&'static str> {
    Some(match tag {
        IMAGE_WIDTH => "ImageWidth",
        IMAGE_LENGTH => "ImageLength",
        BITS_PER_SAMPLE => "BitsPerSample",
        COMPRESSION => "Compression",
        PHOTOMETRIC_INTERPRETATION => "PhotometricInterpretation",
        IMAGE_DESCRIPTION => "ImageDescription",
        STRIP_OFFSETS => "StripOffsets",
        SAMPLES_PER_PIXEL => "SamplesPerPixel",
        ROWS_PER_STRIP => "RowsPerStrip",
        STRIP_BYTE_COUNTS => "StripByteCounts",
        PLANAR_CONFIGURATION => "PlanarConfiguration",
        SOFTWARE => "Software",
        COLOR_MAP => "ColorMap",
        TILE_WIDTH => "TileWidth",
        TILE_LENGTH => "TileLength",
        TILE_OFFSETS => "TileOffsets",
        TILE_BYTE_COUNTS => "TileByteCounts",
        SUB_IFD => "SubIFDs",
        SAMPLE_FORMAT => "SampleFormat",
        IMAGEJ_META_DATA_BYTE_COUNTS => "ImageJMetadataByteCounts",
        IMAGEJ_META_DATA => "ImageJMetadata",
        _ => return None,
    })
}

/// The name of a tag, falling back to its number.
pub fn describe_tag(tag: u16) -> String {
    match tag_name(tag) {
        Some(name) => name.to_string(),
        None => format!("tag {}", tag),
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(tag_name(IMAGE_WIDTH), Some("ImageWidth"));
        assert_eq!(tag_name(IMAGEJ_META_DATA), Some("ImageJMetadata"));
        assert_eq!(tag_name(4242), None);
        assert_eq!(describe_tag(4242), "tag 4242");
    }
}
