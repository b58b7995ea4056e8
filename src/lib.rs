
//! Read and write OME-TIFF microscopy images.
//! This library uses no foreign code or unsafe Rust.
//!
//! The pixel payload of an image lives in a TIFF or BigTIFF file and is
//! addressed tile by tile; the structured description lives in an OME-XML
//! metadata store. Start with [`tiff::Tiff`] for direct tile IO, or
//! [`writer::TiffWriter`] to write whole images from metadata.

#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_copy_implementations,
    missing_debug_implementations,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    trivial_numeric_casts,
    redundant_semicolons
)]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod io;

pub mod region;
pub mod coverage;
pub mod pixel;
pub mod tiff;
pub mod meta;
pub mod writer;

/// Export the most important items.
/// _Note: This includes a type called `Result`, possibly overwriting the default `std::Result` type usage._
pub mod prelude {

    pub use crate::coverage::TileCoverage;
    pub use crate::region::PlaneRegion;

    // pixel containers
    pub use crate::pixel::{
        Complex, Dim, Endian, PixelBuffer, PixelType, Sample,
        StorageOrder, VariantPixelBuffer,
    };

    // file and directory facades
    pub use crate::tiff::{
        enable_big_tiff, CompressionScheme, Ifd, Mode,
        PhotometricInterpretation, PlanarConfiguration, Tiff, TileInfo, TileType,
    };

    // the metadata model
    pub use crate::meta::{
        order_resolutions, CoreMetadata, CoreMetadataList,
        DimensionOrder, MetadataList, Modulo,
    };
    pub use crate::meta::ome::{
        add_resolutions, create_dimension_order, create_id, fill_metadata,
        get_resolutions, remove_resolutions, significant_pixel_size,
        validate_model, OmeXml, Resolution,
    };

    pub use crate::writer::TiffWriter;

    // error handling
    pub use crate::error::{Error, Result, UnitResult};

    // re-export external stuff
    pub use smallvec::SmallVec;
}
