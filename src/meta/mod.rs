
//! The series and resolution metadata model.
//!
//! A [`CoreMetadata`] entry is the minimal description of one image:
//! its dimensions, channel layout and pixel format. A
//! [`CoreMetadataList`] holds one list per series, ordered from the
//! full-resolution image down through its sub-resolution pyramid.

pub mod ome;

use smallvec::SmallVec;

use crate::error::{Error, UnitResult};
use crate::pixel::PixelType;

/// One of the six canonical OME dimension orders.
/// Every order begins with the two spatial plane axes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[allow(missing_docs)]
pub enum DimensionOrder {
    #[default]
    Xyztc,
    Xyzct,
    Xytzc,
    Xytcz,
    Xyczt,
    Xyctz,
}

impl DimensionOrder {

    /// The axis letters of this order.
    pub fn as_str(self) -> &'static str {
        match self {
            DimensionOrder::Xyztc => "XYZTC",
            DimensionOrder::Xyzct => "XYZCT",
            DimensionOrder::Xytzc => "XYTZC",
            DimensionOrder::Xytcz => "XYTCZ",
            DimensionOrder::Xyczt => "XYCZT",
            DimensionOrder::Xyctz => "XYCTZ",
        }
    }
}

impl std::str::FromStr for DimensionOrder {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Error> {
        Ok(match text {
            "XYZTC" => DimensionOrder::Xyztc,
            "XYZCT" => DimensionOrder::Xyzct,
            "XYTZC" => DimensionOrder::Xytzc,
            "XYTCZ" => DimensionOrder::Xytcz,
            "XYCZT" => DimensionOrder::Xyczt,
            "XYCTZ" => DimensionOrder::Xyctz,
            other => return Err(Error::format(
                format!("invalid dimension order {:?}", other))),
        })
    }
}

impl std::fmt::Display for DimensionOrder {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A modulo annotation along one dimension: a dimension subdivided
/// into regular steps, for example a lifetime axis stored along Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Modulo {

    /// The first position along the subdivided axis.
    pub start: f64,

    /// The spacing between positions.
    pub step: f64,

    /// The last position along the subdivided axis.
    pub end: f64,
}

impl Modulo {

    /// The number of positions along the subdivided axis.
    pub fn size(&self) -> usize {
        if self.step <= 0.0 { return 1; }
        ((self.end - self.start) / self.step).floor() as usize + 1
    }
}

impl Default for Modulo {
    fn default() -> Self {
        Modulo { start: 0.0, step: 1.0, end: 0.0 }
    }
}

/// The minimal description of one image: dimensions, channel layout,
/// pixel format and flags.
#[derive(Clone, Debug, PartialEq)]
pub struct CoreMetadata {

    /// The width of the image plane.
    pub size_x: usize,

    /// The height of the image plane.
    pub size_y: usize,

    /// The number of focal planes.
    pub size_z: usize,

    /// The number of time points.
    pub size_t: usize,

    /// The number of samples in each channel. The total sample count of
    /// the image is the sum over all channels.
    pub size_c: SmallVec<[usize; 4]>,

    /// The pixel type of the image.
    pub pixel_type: PixelType,

    /// The number of significant bits per sample.
    /// Never more than the pixel type stores.
    pub bits_per_pixel: usize,

    /// The name of the image.
    pub image_name: String,

    /// The order planes are stored in.
    pub dimension_order: DimensionOrder,

    /// Whether the pixel data is little-endian.
    pub little_endian: bool,

    /// Whether channel samples are interleaved.
    pub interleaved: bool,

    /// Whether this image is a downsized preview of another.
    pub thumbnail: bool,

    /// Whether pixel values index a colour lookup table.
    pub indexed: bool,

    /// Whether the lookup table colours are artificial.
    pub false_color: bool,

    /// Subdivision of the Z axis.
    pub modulo_z: Modulo,

    /// Subdivision of the T axis.
    pub modulo_t: Modulo,

    /// Subdivision of the C axis.
    pub modulo_c: Modulo,
}

impl CoreMetadata {

    /// The total number of samples across all channels.
    pub fn size_c_total(&self) -> usize {
        self.size_c.iter().sum()
    }

    /// The number of channels.
    pub fn channel_count(&self) -> usize {
        self.size_c.len()
    }

    /// The number of planes in this image.
    pub fn plane_count(&self) -> usize {
        self.size_z * self.size_t * self.channel_count()
    }
}

impl Default for CoreMetadata {
    fn default() -> Self {
        CoreMetadata {
            size_x: 1,
            size_y: 1,
            size_z: 1,
            size_t: 1,
            size_c: smallvec::smallvec![1], // one channel with one sample
            pixel_type: PixelType::UInt8,
            bits_per_pixel: 8,
            image_name: String::new(),
            dimension_order: DimensionOrder::default(),
            little_endian: true,
            interleaved: false,
            thumbnail: false,
            indexed: false,
            false_color: false,
            modulo_z: Modulo::default(),
            modulo_t: Modulo::default(),
            modulo_c: Modulo::default(),
        }
    }
}

/// A list of lists: the primary index is the series,
/// the secondary index is the resolution level, zero being full size.
pub type MetadataList<T> = Vec<Vec<T>>;

/// Core metadata per series and resolution. Absent entries are
/// representable and rejected by the operations that need real ones.
pub type CoreMetadataList = MetadataList<Option<CoreMetadata>>;

/// For each series, order the resolutions from largest to smallest by
/// `(size_x, size_y, size_z)`. A missing entry is fatal.
pub fn order_resolutions(list: &mut CoreMetadataList) -> UnitResult {
    for series in list.iter_mut() {
        if series.iter().any(Option::is_none) {
            return Err(Error::state("core metadata cannot be null"));
        }

        series.sort_by(|first, second| {
            let first = first.as_ref().expect("checked above");
            let second = second.as_ref().expect("checked above");

            (second.size_x, second.size_y, second.size_z)
                .cmp(&(first.size_x, first.size_y, first.size_z))
        });
    }

    Ok(())
}


#[cfg(test)]
mod test {
    use super::*;

    fn entry(x: usize, y: usize, z: usize) -> Option<CoreMetadata> {
        Some(CoreMetadata { size_x: x, size_y: y, size_z: z, .. CoreMetadata::default() })
    }

    #[test]
    fn resolutions_are_ordered_largest_first() {
        let mut list: CoreMetadataList = vec![vec![
            entry(4096, 4096, 1024),
            entry(8192, 8192, 1024),
            entry(0, 0, 0),
            entry(2048, 2048, 512),
            entry(1024, 1024, 256),
        ]];

        order_resolutions(&mut list).unwrap();

        let sizes: Vec<_> = list[0].iter()
            .map(|entry| entry.as_ref().map(|core| (core.size_x, core.size_y, core.size_z)).unwrap())
            .collect();

        assert_eq!(sizes, vec![
            (8192, 8192, 1024),
            (4096, 4096, 1024),
            (2048, 2048, 512),
            (1024, 1024, 256),
            (0, 0, 0),
        ]);
    }

    #[test]
    fn ordering_is_descending_for_adjacent_pairs() {
        let mut list: CoreMetadataList = vec![vec![
            entry(512, 512, 1), entry(1024, 1024, 1), entry(256, 256, 1),
        ]];

        order_resolutions(&mut list).unwrap();

        for pair in list[0].windows(2) {
            let first = pair[0].as_ref().unwrap();
            let second = pair[1].as_ref().unwrap();
            assert!(
                first.size_x > second.size_x
                || first.size_y > second.size_y
                || first.size_z > second.size_z);
        }
    }

    #[test]
    fn missing_entries_are_fatal() {
        let mut list: CoreMetadataList = vec![vec![entry(512, 512, 1), None]];

        assert!(matches!(
            order_resolutions(&mut list),
            Err(Error::State(_))
        ));
    }

    #[test]
    fn defaults() {
        let core = CoreMetadata::default();
        assert_eq!(core.channel_count(), 1);
        assert_eq!(core.size_c_total(), 1);
        assert_eq!(core.plane_count(), 1);
        assert_eq!(core.dimension_order, DimensionOrder::Xyztc);
    }

    #[test]
    fn modulo_size() {
        assert_eq!(Modulo::default().size(), 1);
        assert_eq!(Modulo { start: 0.0, step: 1.0, end: 9.0 }.size(), 10);
        assert_eq!(Modulo { start: 1.0, step: 2.0, end: 9.0 }.size(), 5);
    }
}
