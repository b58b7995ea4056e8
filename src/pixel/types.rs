
//! The closed set of pixel types of the OME data model,
//! and the properties attached to each of them.

use crate::error::{Error, Result, UnitResult};
use crate::io::{FileEndian, Read, WireData, Write};

/// One pixel type of the OME data model.
///
/// Every type carries a byte size, a bit size, a significant-bit size,
/// signedness, and an integer/float/complex nature. `Bit` is stored
/// bit-packed on the wire, most significant bit first within each byte,
/// but occupies one byte per sample in memory.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PixelType {
    /// Bilevel, one significant bit per sample.
    Bit,

    /// Signed 8-bit integer.
    Int8,

    /// Unsigned 8-bit integer.
    UInt8,

    /// Signed 16-bit integer.
    Int16,

    /// Unsigned 16-bit integer.
    UInt16,

    /// Signed 32-bit integer.
    Int32,

    /// Unsigned 32-bit integer.
    UInt32,

    /// IEEE single-precision float.
    Float,

    /// IEEE double-precision float.
    Double,

    /// Two consecutive single-precision floats, real then imaginary.
    ComplexFloat,

    /// Two consecutive double-precision floats, real then imaginary.
    ComplexDouble,
}

/// All pixel types, in OME model order.
pub const PIXEL_TYPES: [PixelType; 11] = [
    PixelType::Bit,
    PixelType::Int8, PixelType::UInt8,
    PixelType::Int16, PixelType::UInt16,
    PixelType::Int32, PixelType::UInt32,
    PixelType::Float, PixelType::Double,
    PixelType::ComplexFloat, PixelType::ComplexDouble,
];

impl PixelType {

    /// The size of one sample in memory, in bytes.
    /// `Bit` samples occupy a whole byte in memory.
    pub fn byte_size(self) -> usize {
        match self {
            PixelType::Bit | PixelType::Int8 | PixelType::UInt8 => 1,
            PixelType::Int16 | PixelType::UInt16 => 2,
            PixelType::Int32 | PixelType::UInt32 | PixelType::Float => 4,
            PixelType::Double | PixelType::ComplexFloat => 8,
            PixelType::ComplexDouble => 16,
        }
    }

    /// The size of one sample on the wire, in bits.
    pub fn bit_size(self) -> usize {
        match self {
            PixelType::Bit => 1,
            other => other.byte_size() * 8,
        }
    }

    /// The number of significant bits in one sample.
    pub fn significant_bit_size(self) -> usize {
        self.bit_size()
    }

    /// Whether samples of this type can be negative.
    pub fn is_signed(self) -> bool {
        !matches!(self,
            PixelType::Bit | PixelType::UInt8 | PixelType::UInt16 | PixelType::UInt32)
    }

    /// Whether samples of this type are whole numbers.
    pub fn is_integer(self) -> bool {
        matches!(self,
            PixelType::Bit
            | PixelType::Int8 | PixelType::UInt8
            | PixelType::Int16 | PixelType::UInt16
            | PixelType::Int32 | PixelType::UInt32)
    }

    /// Whether samples of this type are floating point numbers.
    pub fn is_floating_point(self) -> bool {
        !self.is_integer()
    }

    /// Whether samples of this type have a real and an imaginary component.
    pub fn is_complex(self) -> bool {
        matches!(self, PixelType::ComplexFloat | PixelType::ComplexDouble)
    }

    /// The pixel type with the specified sample byte size and nature.
    ///
    /// `Bit` cannot be found this way; use [`PixelType::from_bits`] with a
    /// size of one bit instead. Impossible combinations (an unsigned float,
    /// a complex integer) are logic errors; possible combinations without
    /// a matching type are format errors.
    pub fn from_bytes(bytes: usize, signed: bool, integer: bool, complex: bool) -> Result<Self> {
        if !signed {
            if !integer || complex {
                return Err(Error::logic("unsigned pixel types cannot be floating point or complex"));
            }

            match bytes {
                1 => Ok(PixelType::UInt8),
                2 => Ok(PixelType::UInt16),
                4 => Ok(PixelType::UInt32),
                _ => Err(Error::format("no suitable unsigned integer pixel type found")),
            }
        }
        else if complex {
            if integer {
                return Err(Error::logic("complex pixel types must be floating point"));
            }

            match bytes {
                8 => Ok(PixelType::ComplexFloat),
                16 => Ok(PixelType::ComplexDouble),
                _ => Err(Error::format("no suitable complex pixel type found")),
            }
        }
        else if !integer {
            match bytes {
                4 => Ok(PixelType::Float),
                8 => Ok(PixelType::Double),
                _ => Err(Error::format("no suitable floating point pixel type found")),
            }
        }
        else {
            match bytes {
                1 => Ok(PixelType::Int8),
                2 => Ok(PixelType::Int16),
                4 => Ok(PixelType::Int32),
                _ => Err(Error::format("no suitable signed integer pixel type found")),
            }
        }
    }

    /// The pixel type with the specified sample bit size and nature.
    /// A single unsigned integer bit is `Bit`; any other size must be a
    /// whole number of bytes.
    pub fn from_bits(bits: usize, signed: bool, integer: bool, complex: bool) -> Result<Self> {
        if bits == 1 && !signed && integer && !complex {
            return Ok(PixelType::Bit);
        }

        if bits % 8 != 0 {
            return Err(Error::format("no pixel type with a fractional byte size"));
        }

        Self::from_bytes(bits / 8, signed, integer, complex)
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            PixelType::Bit => "bit",
            PixelType::Int8 => "int8",
            PixelType::UInt8 => "uint8",
            PixelType::Int16 => "int16",
            PixelType::UInt16 => "uint16",
            PixelType::Int32 => "int32",
            PixelType::UInt32 => "uint32",
            PixelType::Float => "float",
            PixelType::Double => "double",
            PixelType::ComplexFloat => "complex",
            PixelType::ComplexDouble => "double-complex",
        })
    }
}


/// Byte order tag of a pixel buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endian {

    /// Most significant byte first.
    Big,

    /// Least significant byte first.
    Little,

    /// The byte order of this machine.
    /// Resolved to `Big` or `Little` when a buffer is constructed.
    Native,
}

impl Endian {

    /// Resolve `Native` to the byte order of this machine.
    pub fn resolved(self) -> Endian {
        match self {
            Endian::Native => {
                if FileEndian::native() == FileEndian::Big { Endian::Big }
                else { Endian::Little }
            },
            other => other,
        }
    }
}


/// A complex number with two consecutive components of the same type,
/// real first, matching the wire layout of the complex pixel types.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex<T> {

    /// The real component.
    pub re: T,

    /// The imaginary component.
    pub im: T,
}

impl<T> Complex<T> {

    /// Create a complex number from its components.
    pub fn new(re: T, im: T) -> Self {
        Complex { re, im }
    }
}


/// An element type that can live inside a [`PixelBuffer`](super::PixelBuffer).
///
/// Ties the Rust type to its [`PixelType`] tag and converts slices of
/// elements to and from wire bytes in either byte order. Bilevel samples
/// are packed and unpacked bit by bit in the tile transfer code instead
/// and have no whole-byte wire form.
pub trait Sample: Copy + Default + PartialEq + std::fmt::Debug + 'static {

    /// The pixel type tag of this element type.
    const PIXEL_TYPE: PixelType;

    /// Read elements from decoded tile bytes.
    fn read_slice(read: &mut impl Read, slice: &mut [Self], endian: FileEndian) -> UnitResult;

    /// Write elements into an encoded tile byte buffer.
    fn write_slice(write: &mut impl Write, slice: &[Self], endian: FileEndian) -> UnitResult;
}

macro_rules! implement_sample_for_primitive {
    ($kind: ident, $pixel_type: expr) => {
        impl Sample for $kind {
            const PIXEL_TYPE: PixelType = $pixel_type;

            #[inline]
            fn read_slice(read: &mut impl Read, slice: &mut [Self], endian: FileEndian) -> UnitResult {
                WireData::read_slice(read, slice, endian)
            }

            #[inline]
            fn write_slice(write: &mut impl Write, slice: &[Self], endian: FileEndian) -> UnitResult {
                WireData::write_slice(write, slice, endian)
            }
        }
    };
}

implement_sample_for_primitive!(i8, PixelType::Int8);
implement_sample_for_primitive!(u8, PixelType::UInt8);
implement_sample_for_primitive!(i16, PixelType::Int16);
implement_sample_for_primitive!(u16, PixelType::UInt16);
implement_sample_for_primitive!(i32, PixelType::Int32);
implement_sample_for_primitive!(u32, PixelType::UInt32);
implement_sample_for_primitive!(f32, PixelType::Float);
implement_sample_for_primitive!(f64, PixelType::Double);

impl Sample for bool {
    const PIXEL_TYPE: PixelType = PixelType::Bit;

    fn read_slice(_: &mut impl Read, _: &mut [Self], _: FileEndian) -> UnitResult {
        Err(Error::logic("bilevel samples have no whole-byte wire form"))
    }

    fn write_slice(_: &mut impl Write, _: &[Self], _: FileEndian) -> UnitResult {
        Err(Error::logic("bilevel samples have no whole-byte wire form"))
    }
}

macro_rules! implement_sample_for_complex {
    ($component: ident, $pixel_type: expr) => {
        impl Sample for Complex<$component> {
            const PIXEL_TYPE: PixelType = $pixel_type;

            fn read_slice(read: &mut impl Read, slice: &mut [Self], endian: FileEndian) -> UnitResult {
                for value in slice {
                    value.re = <$component as WireData>::read(read, endian)?;
                    value.im = <$component as WireData>::read(read, endian)?;
                }
                Ok(())
            }

            fn write_slice(write: &mut impl Write, slice: &[Self], endian: FileEndian) -> UnitResult {
                for value in slice {
                    WireData::write(value.re, write, endian)?;
                    WireData::write(value.im, write, endian)?;
                }
                Ok(())
            }
        }
    };
}

implement_sample_for_complex!(f32, PixelType::ComplexFloat);
implement_sample_for_complex!(f64, PixelType::ComplexDouble);


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn byte_round_trip_for_all_non_bilevel_types() {
        for &pixel_type in &PIXEL_TYPES {
            if pixel_type == PixelType::Bit { continue; }

            let round_tripped = PixelType::from_bytes(
                pixel_type.byte_size(),
                pixel_type.is_signed(),
                pixel_type.is_integer(),
                pixel_type.is_complex(),
            ).unwrap();

            assert_eq!(round_tripped, pixel_type);
        }
    }

    #[test]
    fn bit_round_trip_for_all_types() {
        for &pixel_type in &PIXEL_TYPES {
            let round_tripped = PixelType::from_bits(
                pixel_type.bit_size(),
                pixel_type.is_signed(),
                pixel_type.is_integer(),
                pixel_type.is_complex(),
            ).unwrap();

            assert_eq!(round_tripped, pixel_type);
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(PixelType::Bit.byte_size(), 1);
        assert_eq!(PixelType::Bit.bit_size(), 1);
        assert_eq!(PixelType::Bit.significant_bit_size(), 1);
        assert_eq!(PixelType::UInt16.bit_size(), 16);
        assert_eq!(PixelType::ComplexFloat.byte_size(), 8);
        assert_eq!(PixelType::ComplexDouble.byte_size(), 16);
    }

    #[test]
    fn impossible_combinations_are_logic_errors() {
        assert!(matches!(
            PixelType::from_bytes(4, false, false, false),
            Err(Error::Logic(_))
        ));

        assert!(matches!(
            PixelType::from_bytes(8, true, true, true),
            Err(Error::Logic(_))
        ));
    }

    #[test]
    fn missing_widths_are_format_errors() {
        assert!(matches!(
            PixelType::from_bytes(3, false, true, false),
            Err(Error::Format(_))
        ));

        assert!(matches!(
            PixelType::from_bits(12, true, true, false),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn nature_flags() {
        assert!(PixelType::Float.is_signed());
        assert!(!PixelType::Float.is_integer());
        assert!(PixelType::Float.is_floating_point());
        assert!(!PixelType::UInt32.is_signed());
        assert!(PixelType::ComplexDouble.is_complex());
        assert!(!PixelType::ComplexDouble.is_integer());
        assert!(PixelType::Bit.is_integer());
    }

    #[test]
    fn complex_wire_layout() {
        let values = [Complex::new(1.0_f32, 2.0), Complex::new(3.0, 4.0)];
        let mut bytes = Vec::new();
        Sample::write_slice(&mut bytes, &values, FileEndian::Little).unwrap();
        assert_eq!(bytes.len(), 16);

        let mut read_back = [Complex::<f32>::default(); 2];
        Sample::read_slice(&mut bytes.as_slice(), &mut read_back, FileEndian::Little).unwrap();
        assert_eq!(read_back, values);
    }
}
