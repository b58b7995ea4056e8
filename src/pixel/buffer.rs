
//! The strongly typed N-dimensional pixel container.

use crate::error::{Error, UnitResult};
use crate::pixel::order::{Dim, StorageOrder, DIMENSIONS};
use crate::pixel::types::{Endian, PixelType, Sample};

/// An owned N-dimensional container of samples of one element type.
///
/// The shape is indexed by [`Dim`]: width, height, depth, samples.
/// Elements live in one flat vector; the storage order determines the
/// stride of each axis. Copies are deep.
#[derive(Clone, Debug)]
pub struct PixelBuffer<T> {
    shape: [usize; DIMENSIONS],
    strides: [usize; DIMENSIONS],
    order: StorageOrder,
    endian: Endian,
    data: Vec<T>,
}

impl<T: Sample> PixelBuffer<T> {

    /// Create a zero-filled buffer of the specified shape and layout.
    /// A `Native` endian tag is resolved to the machine byte order.
    pub fn new(shape: [usize; DIMENSIONS], endian: Endian, order: StorageOrder) -> Self {
        let length = shape.iter().product();

        PixelBuffer {
            shape,
            strides: order.strides_for(shape),
            order,
            endian: endian.resolved(),
            data: vec![T::default(); length],
        }
    }

    /// The pixel type of the elements in this buffer.
    pub fn pixel_type(&self) -> PixelType {
        T::PIXEL_TYPE
    }

    /// The byte order tag of this buffer, never `Native`.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// The extent of each axis, indexed by [`Dim`].
    pub fn shape(&self) -> [usize; DIMENSIONS] {
        self.shape
    }

    /// The element stride of each axis, indexed by [`Dim`].
    pub fn strides(&self) -> [usize; DIMENSIONS] {
        self.strides
    }

    /// The first valid index of each axis. Always zero.
    pub fn index_bases(&self) -> [usize; DIMENSIONS] {
        [0; DIMENSIONS]
    }

    /// The total number of elements in this buffer.
    pub fn num_elements(&self) -> usize {
        self.data.len()
    }

    /// The number of axes of this buffer.
    pub fn num_dimensions(&self) -> usize {
        DIMENSIONS
    }

    /// The memory layout of this buffer.
    pub fn storage_order(&self) -> StorageOrder {
        self.order
    }

    /// All elements of this buffer, in storage order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// All elements of this buffer, in storage order, for writing.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// The flat element offset of the specified index.
    /// Panics in debug mode when the index is out of bounds.
    #[inline]
    pub fn offset_of(&self, index: [usize; DIMENSIONS]) -> usize {
        debug_assert!(
            index.iter().zip(&self.shape).all(|(i, extent)| i < extent),
            "index {:?} out of bounds for shape {:?}", index, self.shape
        );

        index.iter().zip(&self.strides)
            .map(|(i, stride)| i * stride)
            .sum()
    }

    /// The element at the specified index.
    #[inline]
    pub fn at(&self, index: [usize; DIMENSIONS]) -> &T {
        &self.data[self.offset_of(index)]
    }

    /// The element at the specified index, for writing.
    #[inline]
    pub fn at_mut(&mut self, index: [usize; DIMENSIONS]) -> &mut T {
        let offset = self.offset_of(index);
        &mut self.data[offset]
    }

    /// The width of this buffer.
    pub fn width(&self) -> usize {
        self.shape[Dim::X as usize]
    }

    /// The height of this buffer.
    pub fn height(&self) -> usize {
        self.shape[Dim::Y as usize]
    }

    /// The number of samples per pixel in this buffer.
    pub fn sample_count(&self) -> usize {
        self.shape[Dim::S as usize]
    }

    /// Copy one sample plane into a new single-sample buffer
    /// of the same spatial shape and storage order.
    pub fn clone_sample_plane(&self, sample: usize) -> PixelBuffer<T> {
        let mut shape = self.shape;
        shape[Dim::S as usize] = 1;

        let mut plane = PixelBuffer::new(shape, self.endian, self.order);

        for z in 0 .. shape[Dim::Z as usize] {
            for y in 0 .. shape[Dim::Y as usize] {
                for x in 0 .. shape[Dim::X as usize] {
                    *plane.at_mut([x, y, z, 0]) = *self.at([x, y, z, sample]);
                }
            }
        }

        plane
    }

    /// Fill this buffer from an iterator of elements in storage order.
    /// The iterator must yield exactly one value per element.
    pub fn assign(&mut self, values: impl IntoIterator<Item = T>) -> UnitResult {
        let mut count = 0;

        for (slot, value) in self.data.iter_mut().zip(values) {
            *slot = value;
            count += 1;
        }

        if count != self.data.len() {
            return Err(Error::logic("too few elements assigned to pixel buffer"));
        }

        Ok(())
    }
}

/// Compares pixel type, shape, storage order and element values.
/// The endian tag does not participate.
impl<T: Sample> PartialEq for PixelBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
            && self.order == other.order
            && self.data == other.data
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn shape(w: usize, h: usize, s: usize) -> [usize; DIMENSIONS] {
        [w, h, 1, s]
    }

    #[test]
    fn new_buffer_is_zeroed() {
        let buffer = PixelBuffer::<u16>::new(shape(4, 3, 2), Endian::Native, StorageOrder::interleaved());
        assert_eq!(buffer.num_elements(), 24);
        assert_eq!(buffer.num_dimensions(), 4);
        assert!(buffer.data().iter().all(|&value| value == 0));
        assert_ne!(buffer.endian(), Endian::Native);
        assert_eq!(buffer.index_bases(), [0; 4]);
    }

    #[test]
    fn interleaved_element_access() {
        let mut buffer = PixelBuffer::<u8>::new(shape(4, 4, 3), Endian::Native, StorageOrder::interleaved());

        *buffer.at_mut([2, 1, 0, 1]) = 42;

        // sample fastest, then x, then y
        let offset = 1 + 2 * 3 + 1 * 4 * 3;
        assert_eq!(buffer.data()[offset], 42);
        assert_eq!(*buffer.at([2, 1, 0, 1]), 42);
    }

    #[test]
    fn planar_element_access() {
        let mut buffer = PixelBuffer::<u8>::new(shape(4, 4, 3), Endian::Native, StorageOrder::planar());

        *buffer.at_mut([2, 1, 0, 1]) = 42;

        // x fastest, then y, then z, then sample
        let offset = 2 + 1 * 4 + 1 * 4 * 4;
        assert_eq!(buffer.data()[offset], 42);
    }

    #[test]
    fn assign_and_compare() {
        let mut first = PixelBuffer::<i16>::new(shape(2, 2, 1), Endian::Native, StorageOrder::interleaved());
        let mut second = first.clone();

        first.assign(1..=4).unwrap();
        assert_ne!(first, second);

        second.assign(1..=4).unwrap();
        assert_eq!(first, second);

        assert!(first.assign(1..=3).is_err());
    }

    #[test]
    fn equality_requires_same_order() {
        let mut interleaved = PixelBuffer::<u8>::new(shape(2, 2, 1), Endian::Native, StorageOrder::interleaved());
        let mut planar = PixelBuffer::<u8>::new(shape(2, 2, 1), Endian::Native, StorageOrder::planar());

        interleaved.assign(1..=4).unwrap();
        planar.assign(1..=4).unwrap();

        assert_ne!(interleaved, planar);
    }

    #[test]
    fn bilevel_buffer_holds_bools() {
        let mut buffer = PixelBuffer::<bool>::new(shape(9, 2, 1), Endian::Native, StorageOrder::interleaved());
        *buffer.at_mut([8, 1, 0, 0]) = true;
        assert!(*buffer.at([8, 1, 0, 0]));
        assert_eq!(buffer.data().iter().filter(|&&bit| bit).count(), 1);
    }
}
