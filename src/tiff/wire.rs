
//! The TIFF 6.0 and BigTIFF wire structure:
//! file headers, typed field values, and directory parse and serialize.
//!
//! This layer knows nothing about pixels. It moves tagged values and raw
//! payload bytes to and from the stream, byte for byte as the TIFF
//! specification lays them out.

use std::collections::BTreeMap;
use std::io::Seek;

use smallvec::SmallVec;

use crate::error::{u64_to_usize, Error, Result, UnitResult};
use crate::io::{FileEndian, Read, Tracking, WireData, Write};
use crate::tiff::tags::describe_tag;

/// Magic number of a classic TIFF file.
pub const CLASSIC_MAGIC: u16 = 42;

/// Magic number of a BigTIFF file.
pub const BIG_MAGIC: u16 = 43;

/// Refuse to allocate more than this many bytes for a single field value.
const MAX_FIELD_BYTES: u64 = 1 << 26;

/// Refuse directories with more entries than this.
const MAX_DIRECTORY_ENTRIES: u64 = 1 << 16;

/// The wire type of a directory entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum FieldType {
    Byte, Ascii, Short, Long, Rational,
    SByte, Undefined, SShort, SLong, SRational,
    Float, Double,
    Long8, SLong8, Ifd8,
}

impl FieldType {

    /// The field type for a wire type number. Unknown numbers have no type.
    pub fn from_wire(value: u16) -> Option<Self> {
        use FieldType::*;

        Some(match value {
            1 => Byte, 2 => Ascii, 3 => Short, 4 => Long, 5 => Rational,
            6 => SByte, 7 => Undefined, 8 => SShort, 9 => SLong, 10 => SRational,
            11 => Float, 12 => Double,
            16 => Long8, 17 => SLong8, 18 => Ifd8,
            _ => return None,
        })
    }

    /// The wire type number of this field type.
    pub fn to_wire(self) -> u16 {
        use FieldType::*;

        match self {
            Byte => 1, Ascii => 2, Short => 3, Long => 4, Rational => 5,
            SByte => 6, Undefined => 7, SShort => 8, SLong => 9, SRational => 10,
            Float => 11, Double => 12,
            Long8 => 16, SLong8 => 17, Ifd8 => 18,
        }
    }

    /// The size of one value of this type, in bytes.
    pub fn byte_size(self) -> usize {
        use FieldType::*;

        match self {
            Byte | Ascii | SByte | Undefined => 1,
            Short | SShort => 2,
            Long | SLong | Float => 4,
            Rational | SRational | Double | Long8 | SLong8 | Ifd8 => 8,
        }
    }
}

/// A typed field value as stored in a directory entry.
///
/// The value forms this crate reads and writes. Field values of types it
/// has no use for are preserved as raw bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {

    /// `BYTE` or `UNDEFINED` data.
    Bytes(Vec<u8>),

    /// A NUL-terminated `ASCII` string (terminator not stored).
    Ascii(String),

    /// `SHORT` values.
    Shorts(SmallVec<[u16; 8]>),

    /// `LONG` values.
    Longs(SmallVec<[u32; 8]>),

    /// `LONG8` or `IFD8` values.
    Long8s(Vec<u64>),

    /// `RATIONAL` values as numerator and denominator.
    Rationals(Vec<(u32, u32)>),

    /// Values of a type this crate does not interpret,
    /// as raw bytes in file order.
    Raw(FieldType, u64, Vec<u8>),
}

impl FieldValue {

    /// A field holding a single integer, in the narrowest unsigned type.
    pub fn integer(value: u64) -> Self {
        if value <= u16::MAX as u64 { FieldValue::Shorts(smallvec::smallvec![value as u16]) }
        else if value <= u32::MAX as u64 { FieldValue::Longs(smallvec::smallvec![value as u32]) }
        else { FieldValue::Long8s(vec![value]) }
    }

    /// The number of values in this field.
    pub fn count(&self) -> u64 {
        (match self {
            FieldValue::Bytes(values) => values.len(),
            FieldValue::Ascii(text) => text.len() + 1, // NUL terminator
            FieldValue::Shorts(values) => values.len(),
            FieldValue::Longs(values) => values.len(),
            FieldValue::Long8s(values) => values.len(),
            FieldValue::Rationals(values) => values.len(),
            FieldValue::Raw(_, count, _) => return *count,
        }) as u64
    }

    /// The first value of an integer field, widened to 64 bits.
    pub fn first_integer(&self) -> Option<u64> {
        match self {
            FieldValue::Bytes(values) => values.first().map(|&value| value as u64),
            FieldValue::Shorts(values) => values.first().map(|&value| value as u64),
            FieldValue::Longs(values) => values.first().map(|&value| value as u64),
            FieldValue::Long8s(values) => values.first().copied(),
            _ => None,
        }
    }

    /// All values of an integer field, widened to 64 bits.
    pub fn integers(&self) -> Option<Vec<u64>> {
        match self {
            FieldValue::Bytes(values) => Some(values.iter().map(|&value| value as u64).collect()),
            FieldValue::Shorts(values) => Some(values.iter().map(|&value| value as u64).collect()),
            FieldValue::Longs(values) => Some(values.iter().map(|&value| value as u64).collect()),
            FieldValue::Long8s(values) => Some(values.clone()),
            _ => None,
        }
    }

    /// The wire type this value is written as.
    /// 64-bit offset lists require a BigTIFF file unless they fit 32 bits.
    fn wire_type(&self, big: bool) -> FieldType {
        match self {
            FieldValue::Bytes(_) => FieldType::Byte,
            FieldValue::Ascii(_) => FieldType::Ascii,
            FieldValue::Shorts(_) => FieldType::Short,
            FieldValue::Longs(_) => FieldType::Long,
            FieldValue::Long8s(_) => if big { FieldType::Long8 } else { FieldType::Long },
            FieldValue::Rationals(_) => FieldType::Rational,
            FieldValue::Raw(field_type, _, _) => *field_type,
        }
    }

    /// Serialize the values into wire bytes.
    fn payload(&self, endian: FileEndian, big: bool) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();

        match self {
            FieldValue::Bytes(values) => bytes.extend_from_slice(values),

            FieldValue::Ascii(text) => {
                bytes.extend_from_slice(text.as_bytes());
                bytes.push(0);
            },

            FieldValue::Shorts(values) => u16::write_slice(&mut bytes, values, endian)?,
            FieldValue::Longs(values) => u32::write_slice(&mut bytes, values, endian)?,

            FieldValue::Long8s(values) => {
                if big {
                    u64::write_slice(&mut bytes, values, endian)?;
                }
                else {
                    for &value in values {
                        let narrowed = u32::try_from(value).map_err(|_| Error::format(
                            "offset too large for classic TIFF; enable BigTIFF"))?;
                        narrowed.write(&mut bytes, endian)?;
                    }
                }
            },

            FieldValue::Rationals(values) => {
                for &(numerator, denominator) in values {
                    numerator.write(&mut bytes, endian)?;
                    denominator.write(&mut bytes, endian)?;
                }
            },

            FieldValue::Raw(_, _, raw) => bytes.extend_from_slice(raw),
        }

        Ok(bytes)
    }

    /// Parse a value of the specified type and count from wire bytes.
    fn parse(field_type: FieldType, count: u64, bytes: &[u8], endian: FileEndian) -> Result<Self> {
        let count_usize = u64_to_usize(count)?;
        let mut read = bytes;

        Ok(match field_type {
            FieldType::Byte | FieldType::Undefined =>
                FieldValue::Bytes(bytes[.. count_usize].to_vec()),

            FieldType::Ascii => {
                let terminated = &bytes[.. count_usize];
                let text = terminated.split(|&byte| byte == 0).next().unwrap_or(&[]);
                FieldValue::Ascii(String::from_utf8_lossy(text).into_owned())
            },

            FieldType::Short => {
                let mut values = smallvec::smallvec![0_u16; count_usize];
                u16::read_slice(&mut read, &mut values, endian)?;
                FieldValue::Shorts(values)
            },

            FieldType::Long => {
                let mut values = smallvec::smallvec![0_u32; count_usize];
                u32::read_slice(&mut read, &mut values, endian)?;
                FieldValue::Longs(values)
            },

            FieldType::Long8 | FieldType::Ifd8 => {
                let mut values = vec![0_u64; count_usize];
                u64::read_slice(&mut read, &mut values, endian)?;
                FieldValue::Long8s(values)
            },

            FieldType::Rational => {
                let mut values = Vec::with_capacity(count_usize);
                for _ in 0 .. count_usize {
                    let numerator = u32::read(&mut read, endian)?;
                    let denominator = u32::read(&mut read, endian)?;
                    values.push((numerator, denominator));
                }
                FieldValue::Rationals(values)
            },

            other => FieldValue::Raw(
                other, count,
                bytes[.. count_usize * other.byte_size()].to_vec()
            ),
        })
    }
}

/// The start of a TIFF file: byte order, variant, and first directory.
#[derive(Clone, Copy, Debug)]
pub struct TiffHeader {

    /// The byte order of everything in the file.
    pub endian: FileEndian,

    /// Whether this file uses the BigTIFF layout with 64-bit offsets.
    pub big: bool,

    /// The offset of the first top-level directory.
    pub first_ifd_offset: u64,
}

impl TiffHeader {

    /// Parse the header at the start of the stream.
    pub fn read(read: &mut impl Read) -> Result<Self> {
        let mut order = [0_u8; 2];
        read.read_exact(&mut order)?;

        let endian = match &order {
            b"II" => FileEndian::Little,
            b"MM" => FileEndian::Big,
            other => return Err(Error::format(
                format!("invalid byte order mark {:?}", other))),
        };

        let magic = u16::read(read, endian)?;

        match magic {
            CLASSIC_MAGIC => {
                let first_ifd_offset = u32::read(read, endian)? as u64;
                Ok(TiffHeader { endian, big: false, first_ifd_offset })
            },

            BIG_MAGIC => {
                let offset_size = u16::read(read, endian)?;
                let reserved = u16::read(read, endian)?;

                if offset_size != 8 || reserved != 0 {
                    return Err(Error::format("invalid BigTIFF header"));
                }

                let first_ifd_offset = u64::read(read, endian)?;
                Ok(TiffHeader { endian, big: true, first_ifd_offset })
            },

            other => Err(Error::format(format!("invalid magic number {}", other))),
        }
    }

    /// Write the header at the start of the stream.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        let order: &[u8; 2] = match self.endian {
            FileEndian::Little => b"II",
            FileEndian::Big => b"MM",
        };

        write.write_all(order)?;

        if self.big {
            BIG_MAGIC.write(write, self.endian)?;
            8_u16.write(write, self.endian)?;
            0_u16.write(write, self.endian)?;
            self.first_ifd_offset.write(write, self.endian)?;
        }
        else {
            CLASSIC_MAGIC.write(write, self.endian)?;
            u32::try_from(self.first_ifd_offset)
                .map_err(|_| Error::format("directory offset too large for classic TIFF"))?
                .write(write, self.endian)?;
        }

        Ok(())
    }

    /// The stream position of the first-directory offset field,
    /// where the first flushed directory is linked in.
    pub fn offset_field_position(&self) -> u64 {
        if self.big { 8 } else { 4 }
    }
}

/// One parsed directory: its typed fields and the link to its successor.
#[derive(Clone, Debug)]
pub struct RawDirectory {

    /// The offset this directory was read from.
    pub offset: u64,

    /// The typed field values, by tag.
    pub fields: BTreeMap<u16, FieldValue>,

    /// The offset of the next directory, or zero at the end of the chain.
    pub next_offset: u64,
}

/// Parse the directory at the specified offset,
/// resolving all out-of-line values.
pub fn read_directory<R: Read + Seek>(
    read: &mut Tracking<R>, endian: FileEndian, big: bool, offset: u64,
) -> Result<RawDirectory> {

    read.seek_to(offset)?;

    let entry_count =
        if big { u64::read(read, endian)? }
        else { u16::read(read, endian)? as u64 };

    if entry_count > MAX_DIRECTORY_ENTRIES {
        return Err(Error::format("too many directory entries"));
    }

    let inline_size: usize = if big { 8 } else { 4 };

    struct PendingEntry {
        tag: u16,
        field_type: FieldType,
        count: u64,
        inline: [u8; 8],
    }

    let mut entries = Vec::with_capacity(entry_count as usize);

    for _ in 0 .. entry_count {
        let tag = u16::read(read, endian)?;
        let wire_type = u16::read(read, endian)?;

        let count =
            if big { u64::read(read, endian)? }
            else { u32::read(read, endian)? as u64 };

        let mut inline = [0_u8; 8];
        read.read_exact(&mut inline[.. inline_size])?;

        match FieldType::from_wire(wire_type) {
            Some(field_type) => entries.push(PendingEntry { tag, field_type, count, inline }),

            // An unknown wire type makes the whole entry uninterpretable.
            None => tracing::debug!(
                "skipping {} with unknown field type {}", describe_tag(tag), wire_type),
        }
    }

    let next_offset =
        if big { u64::read(read, endian)? }
        else { u32::read(read, endian)? as u64 };

    let mut fields = BTreeMap::new();

    for entry in entries {
        let total_bytes = entry.count.saturating_mul(entry.field_type.byte_size() as u64);

        if total_bytes > MAX_FIELD_BYTES {
            return Err(Error::format(
                format!("oversized value for {}", describe_tag(entry.tag))));
        }

        let value = if total_bytes as usize <= inline_size {
            FieldValue::parse(entry.field_type, entry.count, &entry.inline, endian)?
        }
        else {
            let value_offset = {
                let mut inline = &entry.inline[..];
                if big { u64::read(&mut inline, endian)? }
                else { u32::read(&mut inline, endian)? as u64 }
            };

            read.seek_to(value_offset)?;

            let mut bytes = vec![0_u8; total_bytes as usize];
            read.read_exact(&mut bytes)?;

            FieldValue::parse(entry.field_type, entry.count, &bytes, endian)?
        };

        fields.insert(entry.tag, value);
    }

    Ok(RawDirectory { offset, fields, next_offset })
}

/// Where a flushed directory landed in the file.
#[derive(Clone, Copy, Debug)]
pub struct WrittenDirectory {

    /// The offset of the directory itself.
    pub offset: u64,

    /// The stream position of its next-directory link,
    /// patched when a successor directory is flushed.
    pub next_pointer_position: u64,
}

/// Serialize a directory at the current end of the stream.
/// Out-of-line values are placed before the entry table.
/// The next-directory link is written as zero.
pub fn write_directory<W: Write + Seek>(
    write: &mut Tracking<W>, endian: FileEndian, big: bool,
    fields: &BTreeMap<u16, FieldValue>,
) -> Result<WrittenDirectory> {

    let inline_size: usize = if big { 8 } else { 4 };

    struct Entry {
        tag: u16,
        field_type: FieldType,
        count: u64,
        inline: [u8; 8],
    }

    if !big && fields.len() > u16::MAX as usize {
        return Err(Error::format("too many directory entries for classic TIFF"));
    }

    let mut entries = Vec::with_capacity(fields.len());

    for (&tag, value) in fields {
        let field_type = value.wire_type(big);
        let payload = value.payload(endian, big)?;
        let mut inline = [0_u8; 8];

        if payload.len() <= inline_size {
            inline[.. payload.len()].copy_from_slice(&payload);
        }
        else {
            align_to_word(write)?;
            let value_offset = write.byte_position();
            write.write_all(&payload)?;

            let mut link = &mut inline[..];
            write_offset(&mut link, endian, big, value_offset)?;
        }

        entries.push(Entry { tag, field_type, count: value.count(), inline });
    }

    align_to_word(write)?;
    let directory_offset = write.byte_position();

    if big { (entries.len() as u64).write(write, endian)?; }
    else { (entries.len() as u16).write(write, endian)?; }

    for entry in &entries {
        entry.tag.write(write, endian)?;
        entry.field_type.to_wire().write(write, endian)?;

        if big { entry.count.write(write, endian)?; }
        else {
            u32::try_from(entry.count)
                .map_err(|_| Error::format("value count too large for classic TIFF"))?
                .write(write, endian)?;
        }

        write.write_all(&entry.inline[.. inline_size])?;
    }

    let next_pointer_position = write.byte_position();
    write_offset(write, endian, big, 0)?;

    Ok(WrittenDirectory { offset: directory_offset, next_pointer_position })
}

/// Overwrite a previously written directory link with a real offset.
/// Leaves the stream position at the patch location.
pub fn patch_offset<W: Write + Seek>(
    write: &mut Tracking<W>, endian: FileEndian, big: bool,
    position: u64, offset: u64,
) -> UnitResult {
    write.seek_to(position)?;
    write_offset(write, endian, big, offset)
}

fn write_offset(write: &mut impl Write, endian: FileEndian, big: bool, offset: u64) -> UnitResult {
    if big {
        offset.write(write, endian)
    }
    else {
        u32::try_from(offset)
            .map_err(|_| Error::format("offset too large for classic TIFF; enable BigTIFF"))?
            .write(write, endian)
    }
}

/// Directories and out-of-line values begin on word boundaries.
fn align_to_word<W: Write + Seek>(write: &mut Tracking<W>) -> UnitResult {
    if write.byte_position() % 2 == 1 {
        write.write_all(&[0])?;
    }

    Ok(())
}
