
//! Low-level byte stream primitives shared by the TIFF wire layer.
//! TIFF files declare their byte order at the start of the file,
//! so all primitive IO is parameterised by a runtime [`FileEndian`].

pub use std::io::{Read, Write};
use std::io::{Seek, SeekFrom};

use lebe::prelude::*;

use crate::error::{Result, UnitResult};

/// Byte order of a file on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileEndian {

    /// Intel order, `II` in the file header.
    Little,

    /// Motorola order, `MM` in the file header.
    Big,
}

impl FileEndian {

    /// The byte order of the machine this program runs on.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") { FileEndian::Big }
        else { FileEndian::Little }
    }

    /// Whether this is the byte order of the machine this program runs on.
    pub fn is_native(self) -> bool {
        self == Self::native()
    }
}

/// Keep track of what byte we are at.
/// Used to remember where directory offsets must be patched in later.
#[derive(Debug)]
pub struct Tracking<T> {
    inner: T,
    position: u64,
}

impl<T: Read> Read for Tracking<T> {
    fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        let count = self.inner.read(buffer)?;
        self.position += count as u64;
        Ok(count)
    }
}

impl<T: Write> Write for Tracking<T> {
    fn write(&mut self, buffer: &[u8]) -> std::io::Result<usize> {
        let count = self.inner.write(buffer)?;
        self.position += count as u64;
        Ok(count)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<T> Tracking<T> {
    pub fn new(inner: T) -> Self {
        Tracking { inner, position: 0 }
    }

    pub fn byte_position(&self) -> u64 {
        self.position
    }
}

impl<T: Seek> Tracking<T> {

    /// Seek to the absolute byte position, forwards or backwards.
    pub fn seek_to(&mut self, target_position: u64) -> std::io::Result<()> {
        if target_position != self.position {
            self.inner.seek(SeekFrom::Start(target_position))?;
            self.position = target_position;
        }

        Ok(())
    }

    /// Seek to the end of the stream and return the resulting position.
    pub fn seek_to_end(&mut self) -> std::io::Result<u64> {
        self.position = self.inner.seek(SeekFrom::End(0))?;
        Ok(self.position)
    }
}

/// Extension trait for primitive values
/// that TIFF stores in the byte order declared by the file header.
pub trait WireData: Sized + Default + Copy {

    fn read(read: &mut impl Read, endian: FileEndian) -> Result<Self>;

    fn read_slice(read: &mut impl Read, slice: &mut [Self], endian: FileEndian) -> UnitResult;

    fn write(self, write: &mut impl Write, endian: FileEndian) -> UnitResult;

    fn write_slice(write: &mut impl Write, slice: &[Self], endian: FileEndian) -> UnitResult;
}

macro_rules! implement_wire_data_for_primitive {
    ($kind: ident) => {
        impl WireData for $kind {
            #[inline]
            fn read(read: &mut impl Read, endian: FileEndian) -> Result<Self> {
                Ok(match endian {
                    FileEndian::Little => read.read_from_little_endian()?,
                    FileEndian::Big => read.read_from_big_endian()?,
                })
            }

            #[inline]
            fn read_slice(read: &mut impl Read, slice: &mut [Self], endian: FileEndian) -> UnitResult {
                match endian {
                    FileEndian::Little => read.read_from_little_endian_into(slice)?,
                    FileEndian::Big => read.read_from_big_endian_into(slice)?,
                }
                Ok(())
            }

            #[inline]
            fn write(self, write: &mut impl Write, endian: FileEndian) -> UnitResult {
                match endian {
                    FileEndian::Little => write.write_as_little_endian(&self)?,
                    FileEndian::Big => write.write_as_big_endian(&self)?,
                }
                Ok(())
            }

            #[inline]
            fn write_slice(write: &mut impl Write, slice: &[Self], endian: FileEndian) -> UnitResult {
                match endian {
                    FileEndian::Little => write.write_as_little_endian(slice)?,
                    FileEndian::Big => write.write_as_big_endian(slice)?,
                }
                Ok(())
            }
        }
    };
}

implement_wire_data_for_primitive!(u8);
implement_wire_data_for_primitive!(i8);
implement_wire_data_for_primitive!(u16);
implement_wire_data_for_primitive!(i16);
implement_wire_data_for_primitive!(u32);
implement_wire_data_for_primitive!(i32);
implement_wire_data_for_primitive!(u64);
implement_wire_data_for_primitive!(i64);
implement_wire_data_for_primitive!(f32);
implement_wire_data_for_primitive!(f64);


#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn tracking_write_positions() {
        let mut write = Tracking::new(Cursor::new(Vec::new()));
        42_u32.write(&mut write, FileEndian::Little).unwrap();
        assert_eq!(write.byte_position(), 4);

        write.seek_to(0).unwrap();
        assert_eq!(write.byte_position(), 0);

        43_u32.write(&mut write, FileEndian::Little).unwrap();
        assert_eq!(write.byte_position(), 4);
    }

    #[test]
    fn wire_data_either_order() {
        let mut bytes = Vec::new();
        0x0102_0304_u32.write(&mut bytes, FileEndian::Big).unwrap();
        assert_eq!(bytes, [1, 2, 3, 4]);

        let value = u32::read(&mut bytes.as_slice(), FileEndian::Big).unwrap();
        assert_eq!(value, 0x0102_0304);

        let value = u32::read(&mut bytes.as_slice(), FileEndian::Little).unwrap();
        assert_eq!(value, 0x0403_0201);
    }
}
