
//! A minimal TIFF format writer driven by an OME-XML metadata store.
//!
//! [`TiffWriter`] ties the metadata model to the tile IO engine: it
//! validates the store, sizes the file (classic or BigTIFF), sets up one
//! directory per plane with sensible strip or tile defaults, and flushes
//! directories as the caller advances through series, resolutions and
//! planes. Planes must be written in file order.

use std::path::Path;

use crate::error::{Error, Result, UnitResult};
use crate::meta::ome::{self, OmeXml, Resolution};
use crate::meta::{DimensionOrder, MetadataList};
use crate::pixel::VariantPixelBuffer;
use crate::tiff::{codec, enable_big_tiff, PhotometricInterpretation, PlanarConfiguration, Tiff, TileType};

/// Use strips below this image width, tiles at or above it.
/// Strips keep narrow images compatible with readers that lack tiles.
const TILE_WIDTH_CUTOVER: usize = 2048;

/// Aim for roughly this many bytes per strip.
const STRIP_CHUNK_BYTES: usize = 65_536;

/// Default edge length of tiles.
const DEFAULT_TILE_EDGE: u32 = 256;

/// Writes multi-series, multi-resolution images described by an
/// [`OmeXml`] store into a single TIFF or BigTIFF file.
#[derive(Debug)]
pub struct TiffWriter {
    meta: OmeXml,
    resolutions: MetadataList<Resolution>,
    tiff: Option<Tiff>,

    interleaved: Option<bool>,
    tile_size_x: Option<u32>,
    tile_size_y: Option<u32>,
    compression: Option<&'static str>,
    big_tiff: Option<bool>,

    series: usize,
    resolution: usize,
    plane: usize,
    ifd_index: usize,

    // First IFD index of each (series, resolution).
    ifd_base: Vec<Vec<usize>>,
}

impl TiffWriter {

    /// Create a writer for the images the store describes.
    /// Options must be set before [`open`](TiffWriter::open).
    pub fn new(meta: OmeXml) -> Self {
        TiffWriter {
            meta,
            resolutions: Vec::new(),
            tiff: None,
            interleaved: None,
            tile_size_x: None,
            tile_size_y: None,
            compression: None,
            big_tiff: None,
            series: 0,
            resolution: 0,
            plane: 0,
            ifd_index: 0,
            ifd_base: Vec::new(),
        }
    }

    /// Choose chunky or planar sample placement,
    /// overriding what the store declares.
    pub fn set_interleaved(&mut self, interleaved: bool) {
        self.interleaved = Some(interleaved);
    }

    /// Set the tile width. Tiles are used once both dimensions are set.
    pub fn set_tile_size_x(&mut self, size: u32) {
        self.tile_size_x = Some(size);
    }

    /// Set the tile height. Tiles are used once both dimensions are set.
    pub fn set_tile_size_y(&mut self, size: u32) {
        self.tile_size_y = Some(size);
    }

    /// Select a codec by catalog name.
    pub fn set_compression(&mut self, name: &str) -> UnitResult {
        let codec = codec::codecs().iter()
            .find(|codec| codec.name == name)
            .ok_or_else(|| Error::unsupported(format!("unknown codec {:?}", name)))?;

        self.compression = Some(codec.name);
        Ok(())
    }

    /// Force or forbid BigTIFF. Without a request the choice is made
    /// automatically from the pixel payload size of the store.
    pub fn set_big_tiff(&mut self, big: Option<bool>) {
        self.big_tiff = big;
    }

    /// The number of series the store describes.
    pub fn series_count(&self) -> usize {
        self.meta.image_count()
    }

    /// The number of resolution levels of a series, full size included.
    pub fn resolution_count(&self, series: usize) -> usize {
        self.resolutions.get(series).map(|levels| levels.len() + 1).unwrap_or(1)
    }

    /// The plane width at the current series and resolution.
    pub fn size_x(&self) -> Result<usize> {
        Ok(self.current_sizes()?.0)
    }

    /// The plane height at the current series and resolution.
    pub fn size_y(&self) -> Result<usize> {
        Ok(self.current_sizes()?.1)
    }

    /// The number of focal planes at the current series and resolution.
    pub fn size_z(&self) -> Result<usize> {
        Ok(self.current_sizes()?.2)
    }

    fn current_sizes(&self) -> Result<(usize, usize, usize)> {
        if self.resolution == 0 {
            Ok((
                self.meta.pixels_size_x(self.series)?,
                self.meta.pixels_size_y(self.series)?,
                self.meta.pixels_size_z(self.series)?,
            ))
        }
        else {
            let [x, y, z] = self.resolutions[self.series][self.resolution - 1];
            Ok((x, y, z))
        }
    }

    fn plane_count(&self, series: usize, resolution: usize) -> Result<usize> {
        let z = if resolution == 0 { self.meta.pixels_size_z(series)? }
                else { self.resolutions[series][resolution - 1][2] };

        Ok(z * self.meta.pixels_size_t(series)? * self.meta.channel_count(series)?.max(1))
    }

    /// Open the output file. Validates and repairs the store, reads the
    /// declared resolution pyramids, and decides the file variant.
    pub fn open(&mut self, path: impl AsRef<Path>) -> UnitResult {
        if self.tiff.is_some() {
            return Err(Error::state("writer is already open"));
        }

        ome::validate_model(&mut self.meta, true)?;

        self.resolutions = (0 .. self.meta.image_count())
            .map(|image| ome::get_resolutions(&self.meta, image))
            .collect::<Result<_>>()?;

        let payload = ome::significant_pixel_size(&self.meta);
        let big = enable_big_tiff(self.big_tiff, payload);

        // Lay the directories out in file order:
        // series, then resolution, then plane.
        let mut next_index = 0;
        self.ifd_base = Vec::with_capacity(self.series_count());

        for series in 0 .. self.series_count() {
            let mut bases = Vec::with_capacity(self.resolution_count(series));

            for resolution in 0 .. self.resolution_count(series) {
                bases.push(next_index);
                next_index += self.plane_count(series, resolution)?;
            }

            self.ifd_base.push(bases);
        }

        self.tiff = Some(Tiff::open_write(path, big)?);
        self.series = 0;
        self.resolution = 0;
        self.plane = 0;
        self.ifd_index = 0;

        self.setup_ifd()
    }

    fn tiff_mut(&mut self) -> Result<&mut Tiff> {
        self.tiff.as_mut().ok_or_else(|| Error::state("writer is not open"))
    }

    /// Flush the current directory and begin the next one.
    fn next_ifd(&mut self) -> UnitResult {
        self.tiff_mut()?.write_current_directory()?;
        self.ifd_index += 1;
        Ok(())
    }

    /// Switch to another series, flushing the current directory.
    pub fn set_series(&mut self, series: usize) -> UnitResult {
        if series >= self.series_count() {
            return Err(Error::logic(format!("no series with index {}", series)));
        }

        if series != self.series || self.resolution != 0 || self.plane != 0 {
            self.next_ifd()?;
            self.series = series;
            self.resolution = 0;
            self.plane = 0;
            self.setup_ifd()?;
        }

        Ok(())
    }

    /// Switch to another resolution level of the current series,
    /// flushing the current directory.
    pub fn set_resolution(&mut self, resolution: usize) -> UnitResult {
        if resolution >= self.resolution_count(self.series) {
            return Err(Error::logic(format!("no resolution with index {}", resolution)));
        }

        if resolution != self.resolution {
            self.next_ifd()?;
            self.resolution = resolution;
            self.plane = 0;
            self.setup_ifd()?;
        }

        Ok(())
    }

    /// Switch to another plane of the current series and resolution,
    /// flushing the current directory.
    pub fn set_plane(&mut self, plane: usize) -> UnitResult {
        if plane >= self.plane_count(self.series, self.resolution)? {
            return Err(Error::logic(format!("no plane with index {}", plane)));
        }

        if plane != self.plane {
            self.next_ifd()?;
            self.plane = plane;
            self.setup_ifd()?;
        }

        Ok(())
    }

    /// Write a rectangular region of the specified plane.
    /// Planes must arrive in file order; each pixel exactly once.
    pub fn save_bytes(
        &mut self, plane: usize, buffer: &VariantPixelBuffer,
        x: usize, y: usize, w: usize, h: usize,
    ) -> UnitResult {
        if self.tiff.is_none() {
            return Err(Error::state("writer is not open"));
        }

        self.set_plane(plane)?;

        let expected = self.ifd_base[self.series][self.resolution] + plane;

        if self.ifd_index != expected {
            return Err(Error::state(format!(
                "IFD index mismatch: actual is {} but {} expected",
                self.ifd_index, expected)));
        }

        self.tiff_mut()?.current_directory()?.write_image(buffer, x, y, w, h)
    }

    /// Write a whole plane.
    pub fn save_plane(&mut self, plane: usize, buffer: &VariantPixelBuffer) -> UnitResult {
        let (w, h, _) = self.current_sizes()?;
        self.save_bytes(plane, buffer, 0, 0, w, h)
    }

    /// Flush the last directory and close the file.
    /// Safe to call repeatedly.
    pub fn close(&mut self) -> UnitResult {
        if let Some(mut tiff) = self.tiff.take() {
            let result = tiff.write_current_directory();
            tiff.close()?;
            result?;
        }

        Ok(())
    }

    /// Prepare the current directory from the store
    /// and the writer options.
    fn setup_ifd(&mut self) -> UnitResult {
        let (size_x, size_y, _) = self.current_sizes()?;

        if size_x == 0 {
            return Err(Error::format("cannot choose a strip or tile size: image width is zero"));
        }

        let series = self.series;
        let plane = self.plane;

        let pixel_type = self.meta.pixels_type(series)?;
        let order = self.meta.pixels_dimension_order(series)?;
        let interleaved = match self.interleaved {
            Some(interleaved) => interleaved,
            None => self.meta.pixels_interleaved(series)?,
        };

        let z = self.meta.pixels_size_z(series)?;
        let t = self.meta.pixels_size_t(series)?;
        let channels = self.meta.channel_count(series)?.max(1);

        let [_, channel, _] = zct_coords(order, z, channels, t, plane);
        let samples = self.meta.channel_samples_per_pixel(series, channel)?.unwrap_or(1);

        let tile_size = match (self.tile_size_x, self.tile_size_y) {
            (Some(width), Some(height)) => Some((width, height)),
            _ => None,
        };

        let compression = self.compression.map(codec::codec_scheme);

        let size_y_limit = size_y.max(1);
        let mut ifd = self.tiff_mut()?.current_directory()?;

        ifd.set_image_width(size_x as u32);
        ifd.set_image_height(size_y as u32);

        match tile_size {
            Some((width, height)) => {
                ifd.set_tile_type(TileType::Tile);
                ifd.set_tile_width(width);
                ifd.set_tile_height(height);
            },

            None if size_x < TILE_WIDTH_CUTOVER => {
                ifd.set_tile_type(TileType::Strip);
                ifd.set_tile_width(size_x as u32);

                let rows = (STRIP_CHUNK_BYTES / size_x).clamp(1, size_y_limit);
                ifd.set_tile_height(rows as u32);
            },

            None => {
                ifd.set_tile_type(TileType::Tile);
                ifd.set_tile_width(DEFAULT_TILE_EDGE);
                ifd.set_tile_height(DEFAULT_TILE_EDGE);
            },
        }

        ifd.set_pixel_type(pixel_type);
        ifd.set_bits_per_sample(pixel_type.bit_size() as u16)?;
        ifd.set_samples_per_pixel(samples as u16);

        ifd.set_planar_configuration(
            if interleaved { PlanarConfiguration::Contig }
            else { PlanarConfiguration::Separate });

        // Three subchannels are assumed to be colour. Other counts map
        // each sample to intensity.
        ifd.set_photometric_interpretation(
            if samples == 3 { PhotometricInterpretation::Rgb }
            else { PhotometricInterpretation::MinIsBlack });

        if let Some(compression) = compression {
            ifd.set_compression(compression);
        }

        Ok(())
    }
}

impl Drop for TiffWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Split a plane index into its Z, C and T coordinates
/// for the specified dimension order.
fn zct_coords(order: DimensionOrder, z: usize, c: usize, t: usize, plane: usize) -> [usize; 3] {
    // The three inner axes, fastest first, with their extents.
    let (axes, sizes) = match order {
        DimensionOrder::Xyztc => (['Z', 'T', 'C'], [z, t, c]),
        DimensionOrder::Xyzct => (['Z', 'C', 'T'], [z, c, t]),
        DimensionOrder::Xytzc => (['T', 'Z', 'C'], [t, z, c]),
        DimensionOrder::Xytcz => (['T', 'C', 'Z'], [t, c, z]),
        DimensionOrder::Xyczt => (['C', 'Z', 'T'], [c, z, t]),
        DimensionOrder::Xyctz => (['C', 'T', 'Z'], [c, t, z]),
    };

    let coords = [
        plane % sizes[0].max(1),
        (plane / sizes[0].max(1)) % sizes[1].max(1),
        plane / (sizes[0].max(1) * sizes[1].max(1)),
    ];

    let mut zct = [0; 3];

    for (axis, coord) in axes.iter().zip(coords) {
        match axis {
            'Z' => zct[0] = coord,
            'C' => zct[1] = coord,
            _ => zct[2] = coord,
        }
    }

    zct
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zct_orderings() {
        // XYZTC: Z varies fastest, then T, then C.
        assert_eq!(zct_coords(DimensionOrder::Xyztc, 2, 3, 2, 0), [0, 0, 0]);
        assert_eq!(zct_coords(DimensionOrder::Xyztc, 2, 3, 2, 1), [1, 0, 0]);
        assert_eq!(zct_coords(DimensionOrder::Xyztc, 2, 3, 2, 2), [0, 0, 1]);
        assert_eq!(zct_coords(DimensionOrder::Xyztc, 2, 3, 2, 4), [0, 1, 0]);

        // XYCZT: C varies fastest.
        assert_eq!(zct_coords(DimensionOrder::Xyczt, 2, 3, 2, 1), [0, 1, 0]);
        assert_eq!(zct_coords(DimensionOrder::Xyczt, 2, 3, 2, 3), [1, 0, 0]);
    }
}
