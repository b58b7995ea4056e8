
//! Accumulate partial writes into per-tile buffers and encode each tile
//! exactly once.
//!
//! Every tile moves through a simple lifecycle: untouched, then partially
//! covered while subranges arrive in the cache, then flushed and evicted
//! as soon as the part of it that lies inside the image is fully covered.
//! Correctness of the bilevel OR-packing relies on cache buffers starting
//! zeroed and write requests never overlapping.

use std::collections::BTreeMap;

use bit_field::BitField;

use crate::coverage::TileCoverage;
use crate::error::{Error, UnitResult};
use crate::pixel::variant::dispatch;
use crate::pixel::{PixelBuffer, PixelType, Sample, VariantPixelBuffer};
use crate::region::PlaneRegion;
use crate::tiff::file::Stream;
use crate::tiff::ifd::{DirectoryState, TileInfo};

/// Per-tile byte buffers for tiles that are only partially covered yet.
#[derive(Debug, Default)]
pub(crate) struct TileCache {
    buffers: BTreeMap<usize, Vec<u8>>,
}

impl TileCache {
    pub fn find_or_insert(&mut self, tile: usize, size: usize) -> &mut Vec<u8> {
        self.buffers.entry(tile).or_insert_with(|| vec![0; size])
    }

    pub fn remove(&mut self, tile: usize) -> Option<Vec<u8>> {
        self.buffers.remove(&tile)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

/// Transfer the source buffer into the specified tiles, tracking coverage
/// and flushing every tile whose valid area becomes fully covered.
pub(crate) fn write_tiles(
    stream: &mut Stream,
    dir: &mut DirectoryState,
    info: &TileInfo,
    region: &PlaneRegion,
    tiles: &[usize],
    source: &VariantPixelBuffer,
) -> UnitResult {
    let coverage_count = info.sample_plane_count();

    if dir.coverage.len() != coverage_count {
        dir.coverage.resize_with(coverage_count, TileCoverage::new);
    }

    if info.pixel_type() == PixelType::Bit {
        write_bilevel_tiles(stream, dir, info, region, tiles, source.buffer::<bool>()?)
    }
    else {
        dispatch!(source, |buffer|
            write_sample_tiles(stream, dir, info, region, tiles, buffer))
    }
}

fn write_sample_tiles<T: Sample>(
    stream: &mut Stream,
    dir: &mut DirectoryState,
    info: &TileInfo,
    region: &PlaneRegion,
    tiles: &[usize],
    source: &PixelBuffer<T>,
) -> UnitResult {
    let element_size = T::PIXEL_TYPE.byte_size();

    for &tile in tiles {
        let rfull = info.tile_region(tile);
        let rclip = info.tile_region_clipped(tile, region);
        if !rclip.valid() { continue; }

        let copy_samples = info.copy_samples();
        let dest_sample = info.tile_sample(tile);

        let buffer = dir.cache.find_or_insert(tile, info.buffer_size());

        if rclip.w == rfull.w && rclip.x == region.x && rclip.w == region.w {
            // One contiguous block for both the source and the tile.
            let source_offset = source.offset_of(
                [rclip.x - region.x, rclip.y - region.y, 0, dest_sample]);
            let tile_offset = (rclip.y - rfull.y) * rfull.w * copy_samples;
            let length = rclip.w * rclip.h * copy_samples;

            encode_elements(
                &source.data()[source_offset .. source_offset + length],
                &mut buffer[tile_offset * element_size .. (tile_offset + length) * element_size],
                stream.endian)?;
        }
        else {
            let x_offset = (rclip.x - rfull.x) * copy_samples;
            let length = rclip.w * copy_samples;

            for row in rclip.y .. rclip.y + rclip.h {
                let y_offset = (row - rfull.y) * rfull.w * copy_samples;
                let source_offset = source.offset_of(
                    [rclip.x - region.x, row - region.y, 0, dest_sample]);
                let tile_offset = y_offset + x_offset;

                encode_elements(
                    &source.data()[source_offset .. source_offset + length],
                    &mut buffer[tile_offset * element_size .. (tile_offset + length) * element_size],
                    stream.endian)?;
            }
        }

        record_and_flush(stream, dir, info, tile, &rclip, dest_sample)?;
    }

    Ok(())
}

/// Serialize typed elements into a byte range of a tile buffer,
/// in file byte order.
fn encode_elements<T: Sample>(
    elements: &[T], mut bytes: &mut [u8], endian: crate::io::FileEndian,
) -> UnitResult {
    T::write_slice(&mut bytes, elements, endian)
}

fn write_bilevel_tiles(
    stream: &mut Stream,
    dir: &mut DirectoryState,
    info: &TileInfo,
    region: &PlaneRegion,
    tiles: &[usize],
    source: &PixelBuffer<bool>,
) -> UnitResult {
    for &tile in tiles {
        let rfull = info.tile_region(tile);
        let rclip = info.tile_region_clipped(tile, region);
        if !rclip.valid() { continue; }

        let copy_samples = info.copy_samples();
        let dest_sample = info.tile_sample(tile);

        let buffer = dir.cache.find_or_insert(tile, info.buffer_size());

        // Pack bits most significant first. Set bits are ORed in; the
        // buffer starts zeroed and each destination bit is written at
        // most once, so clearing is never needed.
        let x_offset = (rclip.x - rfull.x) * copy_samples;
        let full_row_width = rfull.w * copy_samples;

        for row in rclip.y .. rclip.y + rclip.h {
            let y_offset = (row - rfull.y) * full_row_width;
            let source_offset = source.offset_of(
                [rclip.x - region.x, row - region.y, 0, dest_sample]);

            for sample_offset in 0 .. rclip.w * copy_samples {
                if source.data()[source_offset + sample_offset] {
                    let bit = y_offset + x_offset + sample_offset;
                    buffer[bit / 8].set_bit(7 - bit % 8, true);
                }
            }
        }

        record_and_flush(stream, dir, info, tile, &rclip, dest_sample)?;
    }

    Ok(())
}

/// Record the clipped region in the coverage index, then encode and evict
/// the tile if the part of it inside the image is now fully covered.
fn record_and_flush(
    stream: &mut Stream,
    dir: &mut DirectoryState,
    info: &TileInfo,
    tile: usize,
    rclip: &PlaneRegion,
    sample: usize,
) -> UnitResult {
    if !dir.coverage[sample].insert(*rclip, true) {
        return Err(Error::state(format!(
            "region {} of sample {} was already written", rclip, sample)));
    }

    let valid_area = info.tile_region(tile).intersection(&info.image_region());
    if valid_area.area() == 0 {
        return Ok(());
    }

    if !dir.coverage[sample].covered(&valid_area) {
        return Ok(()); // stays cached until the remaining subranges arrive
    }

    let bytes = dir.cache.remove(tile).ok_or_else(||
        Error::state(format!("tile {} was flushed twice", tile)))?;

    let compressed = info.compression.compress(&bytes)?;
    let offset = stream.append_payload(&compressed)?;

    if dir.tile_offsets.len() <= tile {
        dir.tile_offsets.resize(tile + 1, 0);
        dir.tile_byte_counts.resize(tile + 1, 0);
    }

    dir.tile_offsets[tile] = offset;
    dir.tile_byte_counts[tile] = compressed.len() as u64;

    tracing::debug!(tile, bytes = compressed.len(), "flushed covered tile");
    Ok(())
}
