
//! The axes of a pixel buffer and the order they are laid out in memory.

/// One axis of the core four-dimensional pixel buffer shape.
///
/// The extended nine-axis OME form (time, channel and the modulo axes)
/// collapses onto this set for single-plane IO: a buffer always describes
/// one spatial plane region with its samples.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Dim {

    /// The horizontal spatial axis.
    X = 0,

    /// The vertical spatial axis.
    Y = 1,

    /// The depth spatial axis.
    Z = 2,

    /// The sample (subchannel) axis.
    S = 3,
}

/// The number of axes of a pixel buffer.
pub const DIMENSIONS: usize = 4;

/// How the axes of a pixel buffer are laid out in memory.
///
/// Stores the axis permutation from fastest-varying to slowest-varying.
/// All axes are ascending. Two canonical orders exist: *chunky* places the
/// sample axis fastest, so samples of one pixel are adjacent (`RGBRGB…`),
/// and *planar* places it slowest, so each sample forms its own plane.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct StorageOrder {
    ordering: [Dim; DIMENSIONS],
}

impl StorageOrder {

    /// The chunky order `[S, X, Y, Z]`.
    pub fn interleaved() -> Self {
        StorageOrder { ordering: [Dim::S, Dim::X, Dim::Y, Dim::Z] }
    }

    /// The planar order `[X, Y, Z, S]`.
    pub fn planar() -> Self {
        StorageOrder { ordering: [Dim::X, Dim::Y, Dim::Z, Dim::S] }
    }

    /// The order for the specified sample placement.
    ///
    /// A dimension-order parameter is reserved for the extended nine-axis
    /// form; for the core four axes the layout reduces to this flag.
    pub fn new(interleaved: bool) -> Self {
        if interleaved { Self::interleaved() } else { Self::planar() }
    }

    /// The axis permutation, fastest-varying first.
    pub fn ordering(&self) -> [Dim; DIMENSIONS] {
        self.ordering
    }

    /// Whether the sample axis varies fastest.
    pub fn is_interleaved(&self) -> bool {
        self.ordering[0] == Dim::S
    }

    /// The per-axis element strides for the specified shape.
    pub fn strides_for(&self, shape: [usize; DIMENSIONS]) -> [usize; DIMENSIONS] {
        let mut strides = [0; DIMENSIONS];
        let mut stride = 1;

        for &axis in &self.ordering {
            strides[axis as usize] = stride;
            stride *= shape[axis as usize];
        }

        strides
    }
}

impl Default for StorageOrder {
    fn default() -> Self {
        Self::interleaved()
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonical_orders() {
        assert_eq!(StorageOrder::interleaved().ordering(), [Dim::S, Dim::X, Dim::Y, Dim::Z]);
        assert_eq!(StorageOrder::planar().ordering(), [Dim::X, Dim::Y, Dim::Z, Dim::S]);
        assert!(StorageOrder::new(true).is_interleaved());
        assert!(!StorageOrder::new(false).is_interleaved());
        assert!(StorageOrder::default().is_interleaved());
    }

    #[test]
    fn interleaved_strides() {
        // 4 wide, 3 high, 1 deep, 2 samples.
        let shape = [4, 3, 1, 2];
        let strides = StorageOrder::interleaved().strides_for(shape);

        assert_eq!(strides[Dim::S as usize], 1);
        assert_eq!(strides[Dim::X as usize], 2);
        assert_eq!(strides[Dim::Y as usize], 8);
        assert_eq!(strides[Dim::Z as usize], 24);
    }

    #[test]
    fn planar_strides() {
        let shape = [4, 3, 1, 2];
        let strides = StorageOrder::planar().strides_for(shape);

        assert_eq!(strides[Dim::X as usize], 1);
        assert_eq!(strides[Dim::Y as usize], 4);
        assert_eq!(strides[Dim::Z as usize], 12);
        assert_eq!(strides[Dim::S as usize], 12);
    }
}
