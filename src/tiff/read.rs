
//! Transfer decoded tiles into a destination pixel buffer.
//!
//! The read path visits every tile that overlaps the requested region,
//! decodes it, and copies the clipped intersection into the destination:
//! one contiguous block copy where the tile spans the whole region width,
//! a copy per scanline otherwise, and a bit-by-bit unpack for bilevel
//! payloads.

use std::collections::BTreeMap;

use bit_field::BitField;

use crate::error::{u64_to_usize, Error, IoError, Result, UnitResult};
use crate::io::FileEndian;
use crate::pixel::variant::dispatch;
use crate::pixel::{PixelBuffer, PixelType, Sample, VariantPixelBuffer};
use crate::region::PlaneRegion;
use crate::tiff::file::Stream;
use crate::tiff::ifd::TileInfo;
use crate::tiff::tags::*;
use crate::tiff::wire::FieldValue;
use crate::tiff::TileType;

/// Read the specified tiles and copy their intersections with `region`
/// into the destination buffer. The destination has already been shaped
/// to the region by the caller.
pub(crate) fn read_tiles(
    stream: &mut Stream,
    fields: &BTreeMap<u16, FieldValue>,
    info: &TileInfo,
    region: &PlaneRegion,
    tiles: &[usize],
    dest: &mut VariantPixelBuffer,
) -> UnitResult {
    let payloads = PayloadIndex::new(fields, info)?;

    if info.pixel_type() == PixelType::Bit {
        read_bilevel_tiles(stream, &payloads, info, region, tiles, dest.buffer_mut::<bool>()?)
    }
    else {
        dispatch!(dest, |buffer|
            read_sample_tiles(stream, &payloads, info, region, tiles, buffer))
    }
}

/// Where each encoded tile lives in the file.
struct PayloadIndex {
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

impl PayloadIndex {
    fn new(fields: &BTreeMap<u16, FieldValue>, info: &TileInfo) -> Result<Self> {
        let (offsets_tag, counts_tag) = match info.tile_type() {
            TileType::Tile => (TILE_OFFSETS, TILE_BYTE_COUNTS),
            TileType::Strip => (STRIP_OFFSETS, STRIP_BYTE_COUNTS),
        };

        let integers = |tag: u16| -> Result<Vec<u64>> {
            fields.get(&tag)
                .ok_or_else(|| Error::format(format!("missing required field {}", describe_tag(tag))))?
                .integers()
                .ok_or_else(|| Error::format(format!("field {} is not an offset list", describe_tag(tag))))
        };

        Ok(PayloadIndex {
            offsets: integers(offsets_tag)?,
            byte_counts: integers(counts_tag)?,
        })
    }

    fn locate(&self, tile: usize) -> Result<(u64, usize)> {
        match (self.offsets.get(tile), self.byte_counts.get(tile)) {
            (Some(&offset), Some(&count)) => Ok((offset, u64_to_usize(count)?)),
            _ => Err(Error::format(format!("tile {} has no payload entry", tile))),
        }
    }
}

/// Read and decode one tile. The result is checked against the clipped
/// region and zero-extended to the full tile buffer size: whole tiles
/// must decode completely, while strips may decode short as long as the
/// rows being read are present.
fn decoded_tile_bytes(
    stream: &mut Stream,
    payloads: &PayloadIndex,
    info: &TileInfo,
    tile: usize,
    rclip: &PlaneRegion,
) -> Result<Vec<u8>> {
    let (offset, count) = payloads.locate(tile)?;
    let compressed = stream.read_payload(offset, count)?;

    let buffer_size = info.buffer_size();
    let mut bytes = info.compression.decompress(&compressed, buffer_size)?;

    match info.tile_type() {
        TileType::Tile => {
            if bytes.len() != buffer_size {
                return Err(short_read("tile", tile, bytes.len(), buffer_size));
            }
        },

        TileType::Strip => {
            let expected = expected_read(info, rclip);
            if bytes.len() < expected {
                return Err(short_read("strip", tile, bytes.len(), expected));
            }
        },
    }

    bytes.resize(buffer_size, 0);
    Ok(bytes)
}

/// The least number of decoded bytes that still contains the clipped region.
fn expected_read(info: &TileInfo, rclip: &PlaneRegion) -> usize {
    let samples = rclip.area() * info.copy_samples();

    if info.pixel_type() == PixelType::Bit { samples.div_ceil(8) }
    else { samples * info.pixel_type().byte_size() }
}

fn short_read(kind: &str, tile: usize, got: usize, expected: usize) -> Error {
    Error::Io(IoError::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("failed to read encoded {} {} fully: got {} of {} bytes",
            kind, tile, got, expected)))
}

fn read_sample_tiles<T: Sample>(
    stream: &mut Stream,
    payloads: &PayloadIndex,
    info: &TileInfo,
    region: &PlaneRegion,
    tiles: &[usize],
    dest: &mut PixelBuffer<T>,
) -> UnitResult {
    for &tile in tiles {
        let rfull = info.tile_region(tile);
        let rclip = info.tile_region_clipped(tile, region);
        if !rclip.valid() { continue; }

        let copy_samples = info.copy_samples();
        let dest_sample = info.tile_sample(tile);

        let bytes = decoded_tile_bytes(stream, payloads, info, tile, &rclip)?;
        let elements = decode_elements::<T>(&bytes, stream.endian)?;

        transfer_into_buffer(dest, region, &rfull, &rclip, copy_samples, dest_sample, &elements);
    }

    Ok(())
}

/// Parse a decoded tile payload into typed elements in file byte order.
fn decode_elements<T: Sample>(bytes: &[u8], endian: FileEndian) -> Result<Vec<T>> {
    let count = bytes.len() / T::PIXEL_TYPE.byte_size();
    let mut elements = vec![T::default(); count];

    let mut read = bytes;
    T::read_slice(&mut read, &mut elements, endian)?;

    Ok(elements)
}

fn transfer_into_buffer<T: Sample>(
    dest: &mut PixelBuffer<T>,
    region: &PlaneRegion,
    rfull: &PlaneRegion,
    rclip: &PlaneRegion,
    copy_samples: usize,
    dest_sample: usize,
    elements: &[T],
) {
    if rclip.w == rfull.w && rclip.x == region.x && rclip.w == region.w {
        // The tile spans the whole region width for both the source and
        // the destination, so all rows form one contiguous block.
        let source_offset = (rclip.y - rfull.y) * rfull.w * copy_samples;
        let dest_offset = dest.offset_of([rclip.x - region.x, rclip.y - region.y, 0, dest_sample]);
        let length = rclip.w * rclip.h * copy_samples;

        dest.data_mut()[dest_offset .. dest_offset + length]
            .copy_from_slice(&elements[source_offset .. source_offset + length]);
    }
    else {
        let x_offset = (rclip.x - rfull.x) * copy_samples;
        let length = rclip.w * copy_samples;

        for row in rclip.y .. rclip.y + rclip.h {
            let y_offset = (row - rfull.y) * rfull.w * copy_samples;
            let dest_offset = dest.offset_of([rclip.x - region.x, row - region.y, 0, dest_sample]);

            dest.data_mut()[dest_offset .. dest_offset + length]
                .copy_from_slice(&elements[y_offset + x_offset .. y_offset + x_offset + length]);
        }
    }
}

fn read_bilevel_tiles(
    stream: &mut Stream,
    payloads: &PayloadIndex,
    info: &TileInfo,
    region: &PlaneRegion,
    tiles: &[usize],
    dest: &mut PixelBuffer<bool>,
) -> UnitResult {
    for &tile in tiles {
        let rfull = info.tile_region(tile);
        let rclip = info.tile_region_clipped(tile, region);
        if !rclip.valid() { continue; }

        let copy_samples = info.copy_samples();
        let dest_sample = info.tile_sample(tile);

        let bytes = decoded_tile_bytes(stream, payloads, info, tile, &rclip)?;

        // Unpack single bits, most significant first within each byte.
        let x_offset = (rclip.x - rfull.x) * copy_samples;
        let full_row_width = rfull.w * copy_samples;

        for row in rclip.y .. rclip.y + rclip.h {
            let y_offset = (row - rfull.y) * full_row_width;
            let dest_offset = dest.offset_of([rclip.x - region.x, row - region.y, 0, dest_sample]);

            for sample_offset in 0 .. rclip.w * copy_samples {
                let bit = y_offset + x_offset + sample_offset;
                dest.data_mut()[dest_offset + sample_offset] =
                    bytes[bit / 8].get_bit(7 - bit % 8);
            }
        }
    }

    Ok(())
}
