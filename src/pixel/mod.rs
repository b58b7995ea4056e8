
//! Strongly typed N-dimensional pixel containers
//! and the pixel type registry they are built on.
//!
//! A [`PixelBuffer`] holds the samples of one image region for a single
//! element type. The [`VariantPixelBuffer`] erases that element type so
//! callers can pass buffers of any pixel type through one API.

pub mod types;
pub mod order;
pub mod buffer;
pub mod variant;

pub use types::{Complex, Endian, PixelType, Sample};
pub use order::{Dim, StorageOrder, DIMENSIONS};
pub use buffer::PixelBuffer;
pub use variant::VariantPixelBuffer;
