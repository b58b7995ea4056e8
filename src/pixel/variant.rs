
//! The type-erased pixel container.
//!
//! A [`VariantPixelBuffer`] is a tagged sum over all pixel-typed buffers.
//! Operations dispatch on the tag; the [`dispatch!`] macro generates the
//! per-variant match arms from one source of truth, so every capability
//! is defined exactly once.

use std::any::Any;

use crate::error::{Error, Result, UnitResult};
use crate::pixel::buffer::PixelBuffer;
use crate::pixel::order::{StorageOrder, DIMENSIONS};
use crate::pixel::types::{Complex, Endian, PixelType, Sample};

/// A pixel buffer of any of the eleven pixel types.
///
/// Mixed-type operations fail with a pixel type mismatch error;
/// equality across types is simply `false`.
#[derive(Clone, Debug)]
pub enum VariantPixelBuffer {
    /// A bilevel buffer.
    Bit(PixelBuffer<bool>),
    /// A signed 8-bit buffer.
    Int8(PixelBuffer<i8>),
    /// An unsigned 8-bit buffer.
    UInt8(PixelBuffer<u8>),
    /// A signed 16-bit buffer.
    Int16(PixelBuffer<i16>),
    /// An unsigned 16-bit buffer.
    UInt16(PixelBuffer<u16>),
    /// A signed 32-bit buffer.
    Int32(PixelBuffer<i32>),
    /// An unsigned 32-bit buffer.
    UInt32(PixelBuffer<u32>),
    /// A single-precision float buffer.
    Float(PixelBuffer<f32>),
    /// A double-precision float buffer.
    Double(PixelBuffer<f64>),
    /// A single-precision complex buffer.
    ComplexFloat(PixelBuffer<Complex<f32>>),
    /// A double-precision complex buffer.
    ComplexDouble(PixelBuffer<Complex<f64>>),
}

/// Visit the typed buffer inside a variant,
/// running the same expression for every pixel type.
macro_rules! dispatch {
    ($variant: expr, |$buffer: ident| $body: expr) => {
        match $variant {
            $crate::pixel::variant::VariantPixelBuffer::Bit($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::Int8($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::UInt8($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::Int16($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::UInt16($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::Int32($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::UInt32($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::Float($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::Double($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::ComplexFloat($buffer) => $body,
            $crate::pixel::variant::VariantPixelBuffer::ComplexDouble($buffer) => $body,
        }
    };
}

pub(crate) use dispatch;

impl VariantPixelBuffer {

    /// Create a zero-filled buffer of the specified pixel type and layout.
    pub fn new(shape: [usize; DIMENSIONS], pixel_type: PixelType, endian: Endian, order: StorageOrder) -> Self {
        use VariantPixelBuffer::*;

        match pixel_type {
            PixelType::Bit => Bit(PixelBuffer::new(shape, endian, order)),
            PixelType::Int8 => Int8(PixelBuffer::new(shape, endian, order)),
            PixelType::UInt8 => UInt8(PixelBuffer::new(shape, endian, order)),
            PixelType::Int16 => Int16(PixelBuffer::new(shape, endian, order)),
            PixelType::UInt16 => UInt16(PixelBuffer::new(shape, endian, order)),
            PixelType::Int32 => Int32(PixelBuffer::new(shape, endian, order)),
            PixelType::UInt32 => UInt32(PixelBuffer::new(shape, endian, order)),
            PixelType::Float => Float(PixelBuffer::new(shape, endian, order)),
            PixelType::Double => Double(PixelBuffer::new(shape, endian, order)),
            PixelType::ComplexFloat => ComplexFloat(PixelBuffer::new(shape, endian, order)),
            PixelType::ComplexDouble => ComplexDouble(PixelBuffer::new(shape, endian, order)),
        }
    }

    /// Replace the contents with a fresh zero-filled buffer
    /// of the specified pixel type and layout, in machine byte order.
    pub fn set_buffer(&mut self, shape: [usize; DIMENSIONS], pixel_type: PixelType, order: StorageOrder) {
        *self = Self::new(shape, pixel_type, Endian::Native, order);
    }

    /// The pixel type of the contained buffer.
    pub fn pixel_type(&self) -> PixelType {
        dispatch!(self, |buffer| buffer.pixel_type())
    }

    /// The byte order tag of the contained buffer.
    pub fn endian(&self) -> Endian {
        dispatch!(self, |buffer| buffer.endian())
    }

    /// The extent of each axis of the contained buffer.
    pub fn shape(&self) -> [usize; DIMENSIONS] {
        dispatch!(self, |buffer| buffer.shape())
    }

    /// The element stride of each axis of the contained buffer.
    pub fn strides(&self) -> [usize; DIMENSIONS] {
        dispatch!(self, |buffer| buffer.strides())
    }

    /// The first valid index of each axis. Always zero.
    pub fn index_bases(&self) -> [usize; DIMENSIONS] {
        dispatch!(self, |buffer| buffer.index_bases())
    }

    /// The total number of elements in the contained buffer.
    pub fn num_elements(&self) -> usize {
        dispatch!(self, |buffer| buffer.num_elements())
    }

    /// The number of axes of the contained buffer.
    pub fn num_dimensions(&self) -> usize {
        dispatch!(self, |buffer| buffer.num_dimensions())
    }

    /// The memory layout of the contained buffer.
    pub fn storage_order(&self) -> StorageOrder {
        dispatch!(self, |buffer| buffer.storage_order())
    }

    /// Borrow the contained buffer with its concrete element type.
    /// Fails when the requested type does not match the contained buffer.
    pub fn buffer<T: Sample>(&self) -> Result<&PixelBuffer<T>> {
        dispatch!(self, |buffer| (buffer as &dyn Any).downcast_ref())
            .ok_or_else(|| Error::unsupported("unsupported pixel type conversion for buffer"))
    }

    /// Mutably borrow the contained buffer with its concrete element type.
    /// Fails when the requested type does not match the contained buffer.
    pub fn buffer_mut<T: Sample>(&mut self) -> Result<&mut PixelBuffer<T>> {
        dispatch!(self, |buffer| (buffer as &mut dyn Any).downcast_mut())
            .ok_or_else(|| Error::unsupported("unsupported pixel type conversion for buffer"))
    }

    /// Deep-copy the contents of another buffer of the same pixel type
    /// and shape into this one. Cross-type assignment is not supported.
    pub fn assign_from(&mut self, source: &VariantPixelBuffer) -> UnitResult {
        if self.pixel_type() != source.pixel_type() {
            return Err(Error::unsupported("unsupported pixel type conversion for assignment"));
        }

        if self.shape() != source.shape() {
            return Err(Error::logic("buffer dimensions incompatible for assignment"));
        }

        *self = source.clone();
        Ok(())
    }
}

/// Buffers of different pixel types compare unequal without failing.
impl PartialEq for VariantPixelBuffer {
    fn eq(&self, other: &Self) -> bool {
        use VariantPixelBuffer::*;

        match (self, other) {
            (Bit(lhs), Bit(rhs)) => lhs == rhs,
            (Int8(lhs), Int8(rhs)) => lhs == rhs,
            (UInt8(lhs), UInt8(rhs)) => lhs == rhs,
            (Int16(lhs), Int16(rhs)) => lhs == rhs,
            (UInt16(lhs), UInt16(rhs)) => lhs == rhs,
            (Int32(lhs), Int32(rhs)) => lhs == rhs,
            (UInt32(lhs), UInt32(rhs)) => lhs == rhs,
            (Float(lhs), Float(rhs)) => lhs == rhs,
            (Double(lhs), Double(rhs)) => lhs == rhs,
            (ComplexFloat(lhs), ComplexFloat(rhs)) => lhs == rhs,
            (ComplexDouble(lhs), ComplexDouble(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl<T: Sample> From<PixelBuffer<T>> for VariantPixelBuffer {
    fn from(buffer: PixelBuffer<T>) -> Self {
        let mut variant = VariantPixelBuffer::new(
            buffer.shape(), T::PIXEL_TYPE, buffer.endian(), buffer.storage_order());

        *variant.buffer_mut::<T>()
            .expect("variant construction must match the element type") = buffer;

        variant
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn shape(w: usize, h: usize, s: usize) -> [usize; DIMENSIONS] {
        [w, h, 1, s]
    }

    #[test]
    fn construction_matches_pixel_type() {
        for &pixel_type in &crate::pixel::types::PIXEL_TYPES {
            let buffer = VariantPixelBuffer::new(
                shape(3, 2, 1), pixel_type, Endian::Native, StorageOrder::interleaved());

            assert_eq!(buffer.pixel_type(), pixel_type);
            assert_eq!(buffer.num_elements(), 6);
        }
    }

    #[test]
    fn typed_extraction() {
        let mut variant = VariantPixelBuffer::new(
            shape(2, 2, 1), PixelType::UInt16, Endian::Native, StorageOrder::interleaved());

        variant.buffer_mut::<u16>().unwrap().assign(1..=4).unwrap();
        assert_eq!(variant.buffer::<u16>().unwrap().data(), &[1, 2, 3, 4]);

        assert!(matches!(variant.buffer::<u8>(), Err(Error::Type(_))));
    }

    #[test]
    fn cross_type_assignment_fails() {
        let mut dest = VariantPixelBuffer::new(
            shape(2, 2, 1), PixelType::UInt8, Endian::Native, StorageOrder::interleaved());
        let source = VariantPixelBuffer::new(
            shape(2, 2, 1), PixelType::UInt16, Endian::Native, StorageOrder::interleaved());

        assert!(matches!(dest.assign_from(&source), Err(Error::Type(_))));
    }

    #[test]
    fn same_type_assignment_copies_deeply() {
        let mut source = VariantPixelBuffer::new(
            shape(2, 2, 1), PixelType::Float, Endian::Native, StorageOrder::interleaved());
        source.buffer_mut::<f32>().unwrap().assign([1.0, 2.0, 3.0, 4.0]).unwrap();

        let mut dest = VariantPixelBuffer::new(
            shape(2, 2, 1), PixelType::Float, Endian::Native, StorageOrder::interleaved());

        dest.assign_from(&source).unwrap();
        assert_eq!(dest, source);

        source.buffer_mut::<f32>().unwrap().assign([9.0, 9.0, 9.0, 9.0]).unwrap();
        assert_ne!(dest, source);
    }

    #[test]
    fn cross_type_equality_is_false() {
        let bytes = VariantPixelBuffer::new(
            shape(2, 2, 1), PixelType::UInt8, Endian::Native, StorageOrder::interleaved());
        let shorts = VariantPixelBuffer::new(
            shape(2, 2, 1), PixelType::UInt16, Endian::Native, StorageOrder::interleaved());

        assert_ne!(bytes, shorts);
    }

    #[test]
    fn from_typed_buffer() {
        let mut typed = PixelBuffer::<i32>::new(shape(2, 1, 1), Endian::Native, StorageOrder::planar());
        typed.assign([7, 8]).unwrap();

        let variant: VariantPixelBuffer = typed.into();
        assert_eq!(variant.pixel_type(), PixelType::Int32);
        assert_eq!(variant.buffer::<i32>().unwrap().data(), &[7, 8]);
    }
}
