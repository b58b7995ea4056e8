
//! Typed access to one TIFF directory, and the tile geometry derived
//! from it.
//!
//! An [`Ifd`] pairs the file's byte stream with the state of the current
//! directory. Typed field access is memoised; `read_image` and
//! `write_image` translate rectangular plane requests into tile IO.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::coverage::TileCoverage;
use crate::error::{Error, Result, UnitResult};
use crate::pixel::{Dim, PixelType, StorageOrder, VariantPixelBuffer};
use crate::region::PlaneRegion;
use crate::tiff::codec::CompressionScheme;
use crate::tiff::file::Stream;
use crate::tiff::tags::*;
use crate::tiff::wire::{FieldValue, RawDirectory};
use crate::tiff::write::TileCache;
use crate::tiff::{read, write};
use crate::tiff::{PhotometricInterpretation, PlanarConfiguration, SampleFormat, TileType};

/// Everything the file remembers about one directory:
/// its parsed fields, memoised typed parameters, and, while writing,
/// the per-sample coverage index and the tile cache.
#[derive(Debug, Default)]
pub(crate) struct DirectoryState {
    pub offset: Option<u64>,
    pub next_offset: u64,
    pub fields: BTreeMap<u16, FieldValue>,
    pub dirty: bool,

    // Payload bookkeeping while writing. Zero offset means unwritten.
    pub tile_offsets: Vec<u64>,
    pub tile_byte_counts: Vec<u64>,

    // Memoised typed parameters.
    pub tile_type: Option<TileType>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,
    pub pixel_type: Option<PixelType>,
    pub bits_per_sample: Option<u16>,
    pub samples_per_pixel: Option<u16>,
    pub planar_configuration: Option<PlanarConfiguration>,
    pub photometric: Option<PhotometricInterpretation>,
    pub compression: Option<CompressionScheme>,
    pub sub_ifds: Option<SmallVec<[u64; 4]>>,

    // One coverage index per sample plane when separate, one otherwise.
    pub coverage: Vec<TileCoverage>,
    pub cache: TileCache,
}

impl DirectoryState {
    pub fn from_raw(raw: RawDirectory) -> Self {
        DirectoryState {
            offset: Some(raw.offset),
            next_offset: raw.next_offset,
            fields: raw.fields,
            .. Self::default()
        }
    }
}

/// An exclusive handle on one directory of an open TIFF file.
///
/// Obtained from [`Tiff`](super::Tiff); switching directories is a
/// bookkeeping operation on the file, so only one handle exists at a time.
#[derive(Debug)]
pub struct Ifd<'a> {
    pub(crate) stream: &'a mut Stream,
    pub(crate) dir: &'a mut DirectoryState,
}

impl Ifd<'_> {

    /// The file offset of this directory.
    /// Unknown until the directory has been flushed when writing.
    pub fn offset(&self) -> Option<u64> {
        self.dir.offset
    }

    /// The offset of the next directory in the chain, if any.
    /// Directory iteration is forward-only.
    pub fn next_offset(&self) -> Option<u64> {
        match self.dir.next_offset {
            0 => None,
            offset => Some(offset),
        }
    }

    fn field(&self, tag: u16) -> Result<&FieldValue> {
        self.dir.fields.get(&tag).ok_or_else(||
            Error::format(format!("missing required field {}", describe_tag(tag))))
    }

    fn field_integer(&self, tag: u16) -> Result<u64> {
        self.field(tag)?.first_integer().ok_or_else(||
            Error::format(format!("field {} is not an integer", describe_tag(tag))))
    }

    fn set_field(&mut self, tag: u16, value: FieldValue) {
        self.dir.fields.insert(tag, value);
        self.dir.dirty = true;
    }

    /// The width of the image plane.
    pub fn image_width(&mut self) -> Result<u32> {
        if let Some(width) = self.dir.image_width { return Ok(width); }

        let width = u32::try_from(self.field_integer(IMAGE_WIDTH)?)
            .map_err(|_| Error::format("oversized value for ImageWidth"))?;

        self.dir.image_width = Some(width);
        Ok(width)
    }

    /// Set the width of the image plane.
    pub fn set_image_width(&mut self, width: u32) {
        self.set_field(IMAGE_WIDTH, FieldValue::integer(width as u64));
        self.dir.image_width = Some(width);
    }

    /// The height of the image plane.
    pub fn image_height(&mut self) -> Result<u32> {
        if let Some(height) = self.dir.image_height { return Ok(height); }

        let height = u32::try_from(self.field_integer(IMAGE_LENGTH)?)
            .map_err(|_| Error::format("oversized value for ImageLength"))?;

        self.dir.image_height = Some(height);
        Ok(height)
    }

    /// Set the height of the image plane.
    pub fn set_image_height(&mut self, height: u32) {
        self.set_field(IMAGE_LENGTH, FieldValue::integer(height as u64));
        self.dir.image_height = Some(height);
    }

    /// Whether the payload of this directory is stored
    /// as rectangular tiles or full-width strips.
    pub fn tile_type(&mut self) -> TileType {
        if let Some(tile_type) = self.dir.tile_type { return tile_type; }

        let tile_type =
            if self.dir.fields.contains_key(&TILE_WIDTH)
                && self.dir.fields.contains_key(&TILE_LENGTH) { TileType::Tile }
            else { TileType::Strip };

        self.dir.tile_type = Some(tile_type);
        tile_type
    }

    /// Choose tiles or strips before setting the tile dimensions.
    pub fn set_tile_type(&mut self, tile_type: TileType) {
        self.dir.tile_type = Some(tile_type);
    }

    /// The width of one tile. For strips this is the image width.
    pub fn tile_width(&mut self) -> Result<u32> {
        if let Some(width) = self.dir.tile_width { return Ok(width); }

        let width = match self.tile_type() {
            TileType::Tile => u32::try_from(self.field_integer(TILE_WIDTH)?)
                .map_err(|_| Error::format("oversized value for TileWidth"))?,
            TileType::Strip => self.image_width()?,
        };

        self.dir.tile_width = Some(width);
        Ok(width)
    }

    /// Set the width of one tile. Strips span the image width,
    /// so this does nothing for a strip directory.
    pub fn set_tile_width(&mut self, width: u32) {
        if self.tile_type() == TileType::Tile {
            self.set_field(TILE_WIDTH, FieldValue::integer(width as u64));
            self.dir.tile_width = Some(width);
        }
    }

    /// The height of one tile. For strips this is the rows per strip,
    /// or the whole image when the file stores a single strip.
    pub fn tile_height(&mut self) -> Result<u32> {
        if let Some(height) = self.dir.tile_height { return Ok(height); }

        let height = match self.tile_type() {
            TileType::Tile => u32::try_from(self.field_integer(TILE_LENGTH)?)
                .map_err(|_| Error::format("oversized value for TileLength"))?,

            TileType::Strip => {
                let rows = self.dir.fields.get(&ROWS_PER_STRIP)
                    .map(|value| value.first_integer().ok_or_else(||
                        Error::format("field RowsPerStrip is not an integer")))
                    .transpose()?;

                match rows {
                    // The default of "all rows in one strip" is stored as
                    // a value larger than any real image, so clamp.
                    Some(rows) => {
                        let image_height = self.image_height()? as u64;
                        u32::try_from(rows.min(image_height)).expect("row count was clamped")
                    },
                    None => self.image_height()?,
                }
            },
        };

        self.dir.tile_height = Some(height);
        Ok(height)
    }

    /// Set the height of one tile or the rows per strip.
    pub fn set_tile_height(&mut self, height: u32) {
        match self.tile_type() {
            TileType::Tile => self.set_field(TILE_LENGTH, FieldValue::integer(height as u64)),
            TileType::Strip => self.set_field(ROWS_PER_STRIP, FieldValue::integer(height as u64)),
        }

        self.dir.tile_height = Some(height);
    }

    /// The pixel type of this directory,
    /// derived from the sample format and the bits per sample.
    /// An absent sample format defaults to unsigned integer.
    pub fn pixel_type(&mut self) -> Result<PixelType> {
        if let Some(pixel_type) = self.dir.pixel_type { return Ok(pixel_type); }

        let format = match self.dir.fields.get(&SAMPLE_FORMAT) {
            Some(value) => SampleFormat::from_tag(value.first_integer().unwrap_or(1))?,
            None => SampleFormat::UnsignedInt,
        };

        let bits = self.bits_per_sample()?;

        let pixel_type = match (format, bits) {
            (SampleFormat::UnsignedInt, 1) => PixelType::Bit,
            (SampleFormat::UnsignedInt, 8) => PixelType::UInt8,
            (SampleFormat::UnsignedInt, 16) => PixelType::UInt16,
            (SampleFormat::UnsignedInt, 32) => PixelType::UInt32,
            (SampleFormat::UnsignedInt, other) => return Err(Error::format(
                format!("bit depth {} unsupported for unsigned integer pixel type", other))),

            (SampleFormat::SignedInt, 8) => PixelType::Int8,
            (SampleFormat::SignedInt, 16) => PixelType::Int16,
            (SampleFormat::SignedInt, 32) => PixelType::Int32,
            (SampleFormat::SignedInt, other) => return Err(Error::format(
                format!("bit depth {} unsupported for signed integer pixel type", other))),

            (SampleFormat::Float, 32) => PixelType::Float,
            (SampleFormat::Float, 64) => PixelType::Double,
            (SampleFormat::Float, other) => return Err(Error::format(
                format!("bit depth {} unsupported for floating point pixel type", other))),

            (SampleFormat::ComplexFloat, 64) => PixelType::ComplexFloat,
            (SampleFormat::ComplexFloat, 128) => PixelType::ComplexDouble,
            (SampleFormat::ComplexFloat, other) => return Err(Error::format(
                format!("bit depth {} unsupported for complex floating point pixel type", other))),
        };

        self.dir.pixel_type = Some(pixel_type);
        Ok(pixel_type)
    }

    /// Set the pixel type, storing the matching sample format.
    /// The bits per sample are set separately.
    pub fn set_pixel_type(&mut self, pixel_type: PixelType) {
        let format = match pixel_type {
            PixelType::Bit | PixelType::UInt8 | PixelType::UInt16 | PixelType::UInt32 =>
                SampleFormat::UnsignedInt,
            PixelType::Int8 | PixelType::Int16 | PixelType::Int32 =>
                SampleFormat::SignedInt,
            PixelType::Float | PixelType::Double =>
                SampleFormat::Float,
            PixelType::ComplexFloat | PixelType::ComplexDouble =>
                SampleFormat::ComplexFloat,
        };

        self.set_field(SAMPLE_FORMAT, FieldValue::integer(format.tag_value() as u64));
        self.dir.pixel_type = Some(pixel_type);
    }

    /// The number of bits per sample. Defaults to one, bilevel.
    pub fn bits_per_sample(&mut self) -> Result<u16> {
        if let Some(bits) = self.dir.bits_per_sample { return Ok(bits); }

        let bits = match self.dir.fields.get(&BITS_PER_SAMPLE) {
            Some(value) => u16::try_from(value.first_integer().unwrap_or(1))
                .map_err(|_| Error::format("oversized value for BitsPerSample"))?,
            None => 1,
        };

        self.dir.bits_per_sample = Some(bits);
        Ok(bits)
    }

    /// Set the number of bits per sample,
    /// clamped to the significant bits of the pixel type.
    pub fn set_bits_per_sample(&mut self, bits: u16) -> UnitResult {
        let most = self.pixel_type()?.significant_bit_size() as u16;
        let bits = bits.min(most);

        self.set_field(BITS_PER_SAMPLE, FieldValue::integer(bits as u64));
        self.dir.bits_per_sample = Some(bits);
        Ok(())
    }

    /// The number of samples per pixel. Defaults to one.
    pub fn samples_per_pixel(&mut self) -> Result<u16> {
        if let Some(samples) = self.dir.samples_per_pixel { return Ok(samples); }

        let samples = match self.dir.fields.get(&SAMPLES_PER_PIXEL) {
            Some(value) => u16::try_from(value.first_integer().unwrap_or(1))
                .map_err(|_| Error::format("oversized value for SamplesPerPixel"))?,
            None => 1,
        };

        self.dir.samples_per_pixel = Some(samples);
        Ok(samples)
    }

    /// Set the number of samples per pixel.
    pub fn set_samples_per_pixel(&mut self, samples: u16) {
        self.set_field(SAMPLES_PER_PIXEL, FieldValue::integer(samples as u64));
        self.dir.samples_per_pixel = Some(samples);
    }

    /// The sample placement of this directory. Defaults to chunky.
    pub fn planar_configuration(&mut self) -> Result<PlanarConfiguration> {
        if let Some(config) = self.dir.planar_configuration { return Ok(config); }

        let config = match self.dir.fields.get(&PLANAR_CONFIGURATION) {
            Some(value) => PlanarConfiguration::from_tag(value.first_integer().unwrap_or(1))?,
            None => PlanarConfiguration::Contig,
        };

        self.dir.planar_configuration = Some(config);
        Ok(config)
    }

    /// Set the sample placement of this directory.
    pub fn set_planar_configuration(&mut self, config: PlanarConfiguration) {
        self.set_field(PLANAR_CONFIGURATION, FieldValue::integer(config.tag_value() as u64));
        self.dir.planar_configuration = Some(config);
    }

    /// The photometric interpretation of this directory.
    pub fn photometric_interpretation(&mut self) -> Result<PhotometricInterpretation> {
        if let Some(photometric) = self.dir.photometric { return Ok(photometric); }

        let photometric = PhotometricInterpretation::from_tag(
            self.field_integer(PHOTOMETRIC_INTERPRETATION)?)?;

        self.dir.photometric = Some(photometric);
        Ok(photometric)
    }

    /// Set the photometric interpretation of this directory.
    pub fn set_photometric_interpretation(&mut self, photometric: PhotometricInterpretation) {
        self.set_field(PHOTOMETRIC_INTERPRETATION, FieldValue::integer(photometric.tag_value() as u64));
        self.dir.photometric = Some(photometric);
    }

    /// The compression scheme of this directory. Defaults to none.
    pub fn compression(&mut self) -> Result<CompressionScheme> {
        if let Some(compression) = self.dir.compression { return Ok(compression); }

        let compression = match self.dir.fields.get(&COMPRESSION) {
            Some(value) => CompressionScheme::from_tag(value.first_integer().unwrap_or(1))?,
            None => CompressionScheme::None,
        };

        self.dir.compression = Some(compression);
        Ok(compression)
    }

    /// Set the compression scheme of this directory.
    /// Pixel type compatibility is checked before the first tile write.
    pub fn set_compression(&mut self, compression: CompressionScheme) {
        self.set_field(COMPRESSION, FieldValue::integer(compression.tag_value() as u64));
        self.dir.compression = Some(compression);
    }

    /// The offsets of the sub-resolution directories of this directory.
    /// Empty when the field is absent.
    pub fn sub_ifd_offsets(&mut self) -> Result<SmallVec<[u64; 4]>> {
        if let Some(offsets) = &self.dir.sub_ifds { return Ok(offsets.clone()); }

        let offsets: SmallVec<[u64; 4]> = match self.dir.fields.get(&SUB_IFD) {
            Some(value) => value.integers().ok_or_else(||
                Error::format("field SubIFDs is not an offset list"))?.into_iter().collect(),
            None => SmallVec::new(),
        };

        self.dir.sub_ifds = Some(offsets.clone());
        Ok(offsets)
    }

    /// The number of sub-resolution directories of this directory.
    pub fn sub_ifd_count(&mut self) -> Result<usize> {
        Ok(self.sub_ifd_offsets()?.len())
    }

    /// Set the offsets of the sub-resolution directories.
    pub fn set_sub_ifd_offsets(&mut self, offsets: &[u64]) {
        self.set_field(SUB_IFD, FieldValue::Long8s(offsets.to_vec()));
        self.dir.sub_ifds = Some(offsets.iter().copied().collect());
    }

    /// Reserve space for the specified number of sub-resolution
    /// directories, with offsets to be filled in later.
    pub fn set_sub_ifd_count(&mut self, count: usize) {
        self.set_sub_ifd_offsets(&vec![0; count]);
    }

    /// The tile geometry of this directory.
    pub fn tile_info(&mut self) -> Result<TileInfo> {
        Ok(TileInfo {
            tile_type: self.tile_type(),
            tile_width: self.tile_width()? as usize,
            tile_height: self.tile_height()? as usize,
            image_width: self.image_width()? as usize,
            image_height: self.image_height()? as usize,
            samples: self.samples_per_pixel()? as usize,
            planar_configuration: self.planar_configuration()?,
            pixel_type: self.pixel_type()?,
            compression: self.compression()?,
        })
    }

    /// Read the colour lookup table of an indexed directory
    /// into a planar unsigned 16-bit buffer.
    pub fn read_lookup_table(&mut self, dest: &mut VariantPixelBuffer) -> UnitResult {
        let value = self.field(COLOR_MAP)?;

        let entries = match value {
            FieldValue::Shorts(values) if values.len() % 3 == 0 => values.clone(),
            _ => return Err(Error::format("field ColorMap is not three sample ramps")),
        };

        let ramp = entries.len() / 3;
        dest.set_buffer([ramp, 1, 1, 3], PixelType::UInt16, StorageOrder::planar());

        // A planar buffer lays the three ramps out exactly as the field does.
        dest.buffer_mut::<u16>()?.assign(entries.iter().copied())
    }

    /// Read a rectangular region of the image plane into the destination
    /// buffer. A destination with the wrong pixel type, shape or storage
    /// order is replaced by a fresh buffer of the correct layout.
    pub fn read_image(
        &mut self, dest: &mut VariantPixelBuffer,
        x: usize, y: usize, w: usize, h: usize,
    ) -> UnitResult {
        let pixel_type = self.pixel_type()?;
        let planar = self.planar_configuration()?;
        let samples = self.samples_per_pixel()? as usize;

        let shape = [w, h, 1, samples];
        let order = StorageOrder::new(planar == PlanarConfiguration::Contig);

        if dest.pixel_type() != pixel_type
            || dest.shape() != shape
            || dest.storage_order() != order {
            dest.set_buffer(shape, pixel_type, order);
        }

        let info = self.tile_info()?;
        let region = PlaneRegion::new(x, y, w, h);
        check_bounds(&region, &info.image_region())?;

        let tiles = info.tile_coverage(&region);
        read::read_tiles(self.stream, &self.dir.fields, &info, &region, &tiles, dest)
    }

    /// Read the whole image plane into the destination buffer.
    pub fn read_full_image(&mut self, dest: &mut VariantPixelBuffer) -> UnitResult {
        let w = self.image_width()? as usize;
        let h = self.image_height()? as usize;
        self.read_image(dest, 0, 0, w, h)
    }

    /// Read a single sample plane of a rectangular region.
    /// The destination receives shape `[w, h, 1, 1]`.
    pub fn read_image_sample(
        &mut self, dest: &mut VariantPixelBuffer,
        x: usize, y: usize, w: usize, h: usize, sample: usize,
    ) -> UnitResult {
        let samples = self.samples_per_pixel()? as usize;

        if sample >= samples {
            return Err(Error::logic(format!(
                "sample {} out of range for {} samples per pixel", sample, samples)));
        }

        let mut whole = VariantPixelBuffer::new(
            [1, 1, 1, 1], self.pixel_type()?,
            crate::pixel::Endian::Native, StorageOrder::default());

        self.read_image(&mut whole, x, y, w, h)?;

        crate::pixel::variant::dispatch!(&whole, |source| {
            *dest = source.clone_sample_plane(sample).into();
        });

        Ok(())
    }

    /// Write a rectangular region of the image plane from the source
    /// buffer. The source pixel type, dimensions and storage order must
    /// match this directory.
    ///
    /// Partial tile writes accumulate in the tile cache; each tile is
    /// encoded exactly once, when the part of it that lies inside the
    /// image is fully covered. Write requests must not overlap.
    pub fn write_image(
        &mut self, source: &VariantPixelBuffer,
        x: usize, y: usize, w: usize, h: usize,
    ) -> UnitResult {
        let pixel_type = self.pixel_type()?;
        let planar = self.planar_configuration()?;
        let samples = self.samples_per_pixel()? as usize;

        if source.pixel_type() != pixel_type {
            return Err(Error::unsupported(format!(
                "buffer pixel type {} is incompatible with file sample format and bit depth (expected {})",
                source.pixel_type(), pixel_type)));
        }

        let shape = [w, h, 1, samples];
        let source_shape = source.shape();

        if source_shape != shape {
            return Err(Error::logic(format!(
                "buffer dimensions ({}\u{d7}{}, {} samples) incompatible with requested image region ({}\u{d7}{}, {} samples)",
                source_shape[Dim::X as usize], source_shape[Dim::Y as usize], source_shape[Dim::S as usize],
                shape[Dim::X as usize], shape[Dim::Y as usize], shape[Dim::S as usize])));
        }

        let order = StorageOrder::new(planar == PlanarConfiguration::Contig);

        if source.storage_order() != order {
            return Err(Error::logic(format!(
                "buffer storage order incompatible with {} planar configuration",
                match planar {
                    PlanarConfiguration::Contig => "contiguous",
                    PlanarConfiguration::Separate => "separate",
                })));
        }

        let info = self.tile_info()?;

        if !info.compression.supports(pixel_type) {
            return Err(Error::unsupported(format!(
                "codec {} is incompatible with pixel type {}",
                info.compression.name(), pixel_type)));
        }

        let region = PlaneRegion::new(x, y, w, h);
        check_bounds(&region, &info.image_region())?;

        let tiles = info.tile_coverage(&region);
        write::write_tiles(self.stream, self.dir, &info, &region, &tiles, source)
    }

    /// Write the whole image plane from the source buffer.
    pub fn write_full_image(&mut self, source: &VariantPixelBuffer) -> UnitResult {
        let w = self.image_width()? as usize;
        let h = self.image_height()? as usize;
        self.write_image(source, 0, 0, w, h)
    }

    /// Write a single sample plane separately.
    ///
    /// Combining samples from separate calls in one tile would require the
    /// tile cache to track per-sample coverage of interleaved tiles, which
    /// is not implemented; write all samples of a region in one call.
    pub fn write_image_sample(
        &mut self, _source: &VariantPixelBuffer,
        _x: usize, _y: usize, _w: usize, _h: usize, _sample: usize,
    ) -> UnitResult {
        Err(Error::state("writing samples separately is not implemented; \
             write all samples of a region in a single call"))
    }
}

fn check_bounds(region: &PlaneRegion, image: &PlaneRegion) -> UnitResult {
    if !region.valid() || !image.contains(region) {
        return Err(Error::logic(format!(
            "region {} outside image plane {}", region, image)));
    }

    Ok(())
}

/// The tile geometry of one directory: grid layout, per-tile regions,
/// sample assignment, and the size of one decoded tile buffer.
#[derive(Clone, Copy, Debug)]
pub struct TileInfo {
    pub(crate) tile_type: TileType,
    pub(crate) tile_width: usize,
    pub(crate) tile_height: usize,
    pub(crate) image_width: usize,
    pub(crate) image_height: usize,
    pub(crate) samples: usize,
    pub(crate) planar_configuration: PlanarConfiguration,
    pub(crate) pixel_type: PixelType,
    pub(crate) compression: CompressionScheme,
}

impl TileInfo {

    /// Whether this directory stores tiles or strips.
    pub fn tile_type(&self) -> TileType {
        self.tile_type
    }

    /// The width of one tile.
    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    /// The height of one tile.
    pub fn tile_height(&self) -> usize {
        self.tile_height
    }

    /// The pixel type of the payload.
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// The whole image plane as a region.
    pub fn image_region(&self) -> PlaneRegion {
        PlaneRegion::new(0, 0, self.image_width, self.image_height)
    }

    /// The number of samples each transfer copies per pixel:
    /// one for separate planes, all samples when interleaved.
    pub fn copy_samples(&self) -> usize {
        match self.planar_configuration {
            PlanarConfiguration::Separate => 1,
            PlanarConfiguration::Contig => self.samples,
        }
    }

    /// The size of one decoded tile buffer, in bytes.
    pub fn buffer_size(&self) -> usize {
        let copy_samples = self.copy_samples();

        if self.pixel_type == PixelType::Bit {
            self.tile_width.div_ceil(8) * self.tile_height * copy_samples
        }
        else {
            self.tile_width * self.tile_height * self.pixel_type.byte_size() * copy_samples
        }
    }

    /// The number of tile columns.
    pub fn tile_column_count(&self) -> usize {
        self.image_width.div_ceil(self.tile_width)
    }

    /// The number of tile rows.
    pub fn tile_row_count(&self) -> usize {
        self.image_height.div_ceil(self.tile_height)
    }

    fn plane_tile_count(&self) -> usize {
        self.tile_column_count() * self.tile_row_count()
    }

    pub(crate) fn sample_plane_count(&self) -> usize {
        match self.planar_configuration {
            PlanarConfiguration::Separate => self.samples,
            PlanarConfiguration::Contig => 1,
        }
    }

    /// The total number of tiles, across all sample planes when separate.
    pub fn tile_count(&self) -> usize {
        self.plane_tile_count() * self.sample_plane_count()
    }

    /// The full region of the specified tile on the image plane.
    /// Edge tiles extend beyond the image.
    pub fn tile_region(&self, index: usize) -> PlaneRegion {
        let spatial = index % self.plane_tile_count();
        let column = spatial % self.tile_column_count();
        let row = spatial / self.tile_column_count();

        PlaneRegion::new(
            column * self.tile_width, row * self.tile_height,
            self.tile_width, self.tile_height)
    }

    /// The region of the specified tile clipped to the given region
    /// and to the image plane.
    pub fn tile_region_clipped(&self, index: usize, clip: &PlaneRegion) -> PlaneRegion {
        self.tile_region(index)
            .intersection(clip)
            .intersection(&self.image_region())
    }

    /// The sample plane the specified tile belongs to.
    /// Always zero for interleaved payloads.
    pub fn tile_sample(&self, index: usize) -> usize {
        match self.planar_configuration {
            PlanarConfiguration::Separate => index / self.plane_tile_count(),
            PlanarConfiguration::Contig => 0,
        }
    }

    /// The indices of all tiles whose bounding tile overlaps the region,
    /// across all sample planes.
    pub fn tile_coverage(&self, region: &PlaneRegion) -> Vec<usize> {
        let clipped = region.intersection(&self.image_region());
        if !clipped.valid() { return Vec::new(); }

        let first_column = clipped.x / self.tile_width;
        let last_column = (clipped.x + clipped.w - 1) / self.tile_width;
        let first_row = clipped.y / self.tile_height;
        let last_row = (clipped.y + clipped.h - 1) / self.tile_height;

        let mut tiles = Vec::with_capacity(
            self.sample_plane_count()
                * (last_column - first_column + 1)
                * (last_row - first_row + 1));

        for sample in 0 .. self.sample_plane_count() {
            let plane_base = sample * self.plane_tile_count();

            for row in first_row ..= last_row {
                for column in first_column ..= last_column {
                    tiles.push(plane_base + row * self.tile_column_count() + column);
                }
            }
        }

        tiles
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn tiled_info() -> TileInfo {
        TileInfo {
            tile_type: TileType::Tile,
            tile_width: 16, tile_height: 16,
            image_width: 40, image_height: 24,
            samples: 3,
            planar_configuration: PlanarConfiguration::Contig,
            pixel_type: PixelType::UInt8,
            compression: CompressionScheme::None,
        }
    }

    fn separate_strip_info() -> TileInfo {
        TileInfo {
            tile_type: TileType::Strip,
            tile_width: 43, tile_height: 5,
            image_width: 43, image_height: 37,
            samples: 3,
            planar_configuration: PlanarConfiguration::Separate,
            pixel_type: PixelType::UInt16,
            compression: CompressionScheme::None,
        }
    }

    #[test]
    fn grid_counts() {
        let info = tiled_info();
        assert_eq!(info.tile_column_count(), 3);
        assert_eq!(info.tile_row_count(), 2);
        assert_eq!(info.tile_count(), 6);

        let strips = separate_strip_info();
        assert_eq!(strips.tile_column_count(), 1);
        assert_eq!(strips.tile_row_count(), 8);
        assert_eq!(strips.tile_count(), 24);
    }

    #[test]
    fn buffer_sizes() {
        assert_eq!(tiled_info().buffer_size(), 16 * 16 * 3);
        assert_eq!(separate_strip_info().buffer_size(), 43 * 5 * 2);

        let bilevel = TileInfo {
            pixel_type: PixelType::Bit,
            samples: 1,
            .. tiled_info()
        };
        assert_eq!(bilevel.buffer_size(), 2 * 16);
    }

    #[test]
    fn tile_regions() {
        let info = tiled_info();

        assert_eq!(info.tile_region(0), PlaneRegion::new(0, 0, 16, 16));
        assert_eq!(info.tile_region(2), PlaneRegion::new(32, 0, 16, 16));
        assert_eq!(info.tile_region(5), PlaneRegion::new(32, 16, 16, 16));

        // Edge tiles clip to the image.
        let clip = PlaneRegion::new(0, 0, 40, 24);
        assert_eq!(info.tile_region_clipped(2, &clip), PlaneRegion::new(32, 0, 8, 16));
        assert_eq!(info.tile_region_clipped(5, &clip), PlaneRegion::new(32, 16, 8, 8));
    }

    #[test]
    fn separate_tiles_carry_samples() {
        let info = separate_strip_info();

        assert_eq!(info.tile_sample(0), 0);
        assert_eq!(info.tile_sample(7), 0);
        assert_eq!(info.tile_sample(8), 1);
        assert_eq!(info.tile_sample(23), 2);

        assert_eq!(info.tile_region(8), info.tile_region(0));
        assert_eq!(info.tile_region(9), PlaneRegion::new(0, 5, 43, 5));
    }

    #[test]
    fn coverage_returns_overlapping_tiles() {
        let info = tiled_info();

        assert_eq!(info.tile_coverage(&PlaneRegion::new(0, 0, 16, 16)), vec![0]);
        assert_eq!(info.tile_coverage(&PlaneRegion::new(8, 8, 16, 16)), vec![0, 1, 3, 4]);
        assert_eq!(info.tile_coverage(&PlaneRegion::new(0, 0, 40, 24)), vec![0, 1, 2, 3, 4, 5]);

        let strips = separate_strip_info();
        assert_eq!(strips.tile_coverage(&PlaneRegion::new(0, 0, 43, 5)), vec![0, 8, 16]);
    }

    #[test]
    fn region_tiling_exhausts_area() {
        let info = tiled_info();
        let region = PlaneRegion::new(3, 2, 30, 20);

        let total: usize = info.tile_coverage(&region).iter()
            .filter(|&&tile| info.tile_sample(tile) == 0)
            .map(|&tile| info.tile_region_clipped(tile, &region).area())
            .sum();

        assert_eq!(total, region.area());

        let strips = separate_strip_info();
        let region = strips.image_region();

        for sample in 0 .. 3 {
            let total: usize = strips.tile_coverage(&region).iter()
                .filter(|&&tile| strips.tile_sample(tile) == sample)
                .map(|&tile| strips.tile_region_clipped(tile, &region).area())
                .sum();

            assert_eq!(total, region.area());
        }
    }
}
