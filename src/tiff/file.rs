
//! The TIFF file facade: opening, the directory list, and directory
//! flushing.
//!
//! On read the top-level directory offsets are enumerated eagerly by
//! following the directory chain. On write the offset list grows as
//! directories are flushed; each flush stamps the software field,
//! materialises the payload index arrays, links the directory from its
//! predecessor and starts a fresh one.

use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result, UnitResult};
use crate::io::{FileEndian, Read, Tracking, Write};
use crate::tiff::ifd::{DirectoryState, Ifd};
use crate::tiff::tags::{
    BITS_PER_SAMPLE, SAMPLE_FORMAT, SOFTWARE,
    STRIP_BYTE_COUNTS, STRIP_OFFSETS, TILE_BYTE_COUNTS, TILE_OFFSETS,
};
use crate::tiff::wire::{self, FieldValue, TiffHeader};
use crate::tiff::TileType;

/// Pixel payloads at least this large are written as BigTIFF when the
/// caller leaves the choice open. Conservatively below the 4 GiB limit
/// of classic TIFF, leaving room for metadata and encoding overhead.
pub const BIG_TIFF_THRESHOLD: u64 = 3_800_000_000;

/// Decide whether a file should be written as BigTIFF.
/// `None` requests automatic selection from the expected pixel payload.
pub fn enable_big_tiff(requested: Option<bool>, pixel_payload_bytes: u64) -> bool {
    requested.unwrap_or(pixel_payload_bytes >= BIG_TIFF_THRESHOLD)
}

/// How a file was opened.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {

    /// Reading an existing file.
    Read,

    /// Writing a new file.
    Write,
}

/// The underlying byte stream with the wire parameters
/// everything else needs: byte order and offset width.
#[derive(Debug)]
pub(crate) struct Stream {
    pub file: Tracking<File>,
    pub endian: FileEndian,
    pub big: bool,
}

impl Stream {

    /// Read an encoded tile payload from the file.
    pub fn read_payload(&mut self, offset: u64, count: usize) -> Result<Vec<u8>> {
        self.file.seek_to(offset)?;

        let mut bytes = vec![0_u8; count];
        self.file.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Append an encoded tile payload at the end of the file
    /// and return its offset.
    pub fn append_payload(&mut self, bytes: &[u8]) -> Result<u64> {
        let position = self.file.seek_to_end()?;

        if !self.big && position + bytes.len() as u64 > u32::MAX as u64 {
            return Err(Error::format(
                "pixel payload exceeds the classic TIFF file size limit; enable BigTIFF"));
        }

        self.file.write_all(bytes)?;
        Ok(position)
    }
}

/// An open TIFF or BigTIFF file and its directories.
///
/// The file exclusively owns the state of its current directory,
/// including the tile cache and coverage index used while writing.
/// Dropping the file closes it; [`close`](Tiff::close) may be called
/// explicitly and repeatedly.
#[derive(Debug)]
pub struct Tiff {
    stream: Option<Stream>,
    mode: Mode,
    offsets: Vec<u64>,
    current: DirectoryState,
    current_index: Option<usize>,

    // Where the next flushed directory must be linked in.
    link_position: u64,
}

impl Tiff {

    /// Open an existing file for reading,
    /// enumerating all top-level directories.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut tracked = Tracking::new(file);

        let header = TiffHeader::read(&mut tracked)?;
        let mut stream = Stream { file: tracked, endian: header.endian, big: header.big };

        let mut offsets = Vec::new();
        let mut first = None;
        let mut offset = header.first_ifd_offset;

        while offset != 0 {
            if offsets.contains(&offset) {
                return Err(Error::format("circular directory chain"));
            }

            let raw = wire::read_directory(&mut stream.file, stream.endian, stream.big, offset)?;
            offsets.push(offset);
            offset = raw.next_offset;

            if first.is_none() { first = Some(raw); }
        }

        let first = first.ok_or_else(|| Error::format("file contains no directories"))?;

        tracing::debug!(
            path = %path.as_ref().display(), directories = offsets.len(),
            big = header.big, "opened for reading");

        Ok(Tiff {
            stream: Some(stream),
            mode: Mode::Read,
            offsets,
            current: DirectoryState::from_raw(first),
            current_index: Some(0),
            link_position: 0,
        })
    }

    /// Create a new file for writing, classic or BigTIFF,
    /// in the byte order of this machine.
    pub fn open_write(path: impl AsRef<Path>, big: bool) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        let mut tracked = Tracking::new(file);

        let header = TiffHeader {
            endian: FileEndian::native(),
            big,
            first_ifd_offset: 0, // patched when the first directory is flushed
        };

        header.write(&mut tracked)?;

        tracing::debug!(path = %path.as_ref().display(), big, "opened for writing");

        Ok(Tiff {
            stream: Some(Stream { file: tracked, endian: header.endian, big }),
            mode: Mode::Write,
            offsets: Vec::new(),
            current: DirectoryState::default(),
            current_index: None,
            link_position: header.offset_field_position(),
        })
    }

    /// How this file was opened.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether this file uses the BigTIFF layout.
    pub fn is_big(&self) -> bool {
        self.stream.as_ref().map(|stream| stream.big).unwrap_or(false)
    }

    /// Whether this file is still open.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The number of top-level directories. Immutable after opening for
    /// read; grows as directories are flushed when writing.
    pub fn directory_count(&self) -> usize {
        self.offsets.len()
    }

    /// The offsets of all top-level directories, in chain order.
    pub fn directory_offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// A handle on the current directory.
    pub fn current_directory(&mut self) -> Result<Ifd<'_>> {
        let Tiff { stream, current, .. } = self;
        let stream = stream.as_mut().ok_or_else(|| Error::state("file is closed"))?;
        Ok(Ifd { stream, dir: current })
    }

    /// Make the directory with the specified index current.
    pub fn set_directory(&mut self, index: usize) -> UnitResult {
        if self.current_index == Some(index) { return Ok(()); }

        let offset = *self.offsets.get(index).ok_or_else(||
            Error::logic(format!("no directory with index {}", index)))?;

        self.load_directory(offset)?;
        self.current_index = Some(index);
        Ok(())
    }

    /// Make the directory at the specified offset current.
    /// Also reaches sub-resolution directories, which are not part
    /// of the top-level chain.
    pub fn set_sub_directory(&mut self, offset: u64) -> UnitResult {
        self.load_directory(offset)?;
        self.current_index = self.offsets.iter().position(|&known| known == offset);
        Ok(())
    }

    fn load_directory(&mut self, offset: u64) -> UnitResult {
        if self.mode != Mode::Read {
            return Err(Error::state(
                "directories cannot be revisited while writing; flush them in order"));
        }

        let stream = self.stream.as_mut().ok_or_else(|| Error::state("file is closed"))?;
        let raw = wire::read_directory(&mut stream.file, stream.endian, stream.big, offset)?;
        self.current = DirectoryState::from_raw(raw);
        Ok(())
    }

    /// A handle on the directory with the specified index,
    /// making it current first.
    pub fn directory(&mut self, index: usize) -> Result<Ifd<'_>> {
        self.set_directory(index)?;
        self.current_directory()
    }

    /// A handle on the directory at the specified offset,
    /// making it current first.
    pub fn directory_at(&mut self, offset: u64) -> Result<Ifd<'_>> {
        self.set_sub_directory(offset)?;
        self.current_directory()
    }

    /// Commit the current directory to the file and start a fresh one.
    ///
    /// Stamps the software field, materialises the tile offset and byte
    /// count arrays, writes the directory, and links it from its
    /// predecessor, at which point its offset becomes known. Cached tiles
    /// whose valid area never became covered are dropped with a warning;
    /// the caller is responsible for covering the image before flushing.
    pub fn write_current_directory(&mut self) -> UnitResult {
        if self.mode != Mode::Write {
            return Err(Error::state("file is not open for writing"));
        }

        if !self.current.cache.is_empty() {
            tracing::warn!(
                tiles = self.current.cache.len(),
                "dropping partially covered tiles at directory flush");
            self.current.cache.clear();
        }

        static SOFTWARE_NAME: &str = concat!("OME Files (Rust) ", env!("CARGO_PKG_VERSION"));
        self.current.fields.insert(SOFTWARE, FieldValue::Ascii(SOFTWARE_NAME.to_string()));

        self.materialise_payload_index()?;

        let Tiff { stream, current, offsets, link_position, current_index, .. } = self;
        let stream = stream.as_mut().ok_or_else(|| Error::state("file is closed"))?;

        stream.file.seek_to_end()?;
        let written = wire::write_directory(&mut stream.file, stream.endian, stream.big, &current.fields)?;
        wire::patch_offset(&mut stream.file, stream.endian, stream.big, *link_position, written.offset)?;

        tracing::debug!(offset = written.offset, index = offsets.len(), "wrote directory");

        *link_position = written.next_pointer_position;
        offsets.push(written.offset);
        *current = DirectoryState::default();
        *current_index = None;

        Ok(())
    }

    /// Turn the per-tile bookkeeping of the current directory into the
    /// offset and byte count fields, and expand the per-sample fields to
    /// their sample count.
    fn materialise_payload_index(&mut self) -> UnitResult {
        let Tiff { stream, current, .. } = self;
        let stream = stream.as_mut().ok_or_else(|| Error::state("file is closed"))?;
        let mut ifd = Ifd { stream, dir: current };

        let samples = ifd.samples_per_pixel()? as usize;

        if samples > 1 {
            let bits = ifd.bits_per_sample()?;
            ifd.dir.fields.insert(BITS_PER_SAMPLE,
                FieldValue::Shorts(smallvec::smallvec![bits; samples]));

            if let Some(format) = ifd.dir.fields.get(&SAMPLE_FORMAT).and_then(FieldValue::first_integer) {
                ifd.dir.fields.insert(SAMPLE_FORMAT,
                    FieldValue::Shorts(smallvec::smallvec![format as u16; samples]));
            }
        }

        let info = ifd.tile_info()?;
        let expected = info.tile_count();

        ifd.dir.tile_offsets.resize(expected, 0);
        ifd.dir.tile_byte_counts.resize(expected, 0);

        let unwritten = ifd.dir.tile_offsets.iter().filter(|&&offset| offset == 0).count();
        if unwritten > 0 {
            tracing::warn!(unwritten, expected, "directory flushed with unwritten tiles");
        }

        let (offsets_tag, counts_tag) = match info.tile_type() {
            TileType::Tile => (TILE_OFFSETS, TILE_BYTE_COUNTS),
            TileType::Strip => (STRIP_OFFSETS, STRIP_BYTE_COUNTS),
        };

        ifd.dir.fields.insert(offsets_tag, FieldValue::Long8s(ifd.dir.tile_offsets.clone()));
        ifd.dir.fields.insert(counts_tag, FieldValue::Long8s(ifd.dir.tile_byte_counts.clone()));

        Ok(())
    }

    /// Close the file. Safe to call repeatedly; closing an already
    /// closed file does nothing. Unflushed directory state is dropped.
    pub fn close(&mut self) -> UnitResult {
        if let Some(mut stream) = self.stream.take() {
            if self.mode == Mode::Write {
                if self.current.dirty || !self.current.cache.is_empty() {
                    tracing::warn!("closing a file with an unflushed directory");
                }

                stream.file.flush()?;
            }
        }

        Ok(())
    }
}

impl Drop for Tiff {
    fn drop(&mut self) {
        let _ = self.close();
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn big_tiff_selection() {
        assert!(enable_big_tiff(Some(true), 0));
        assert!(!enable_big_tiff(Some(false), u64::MAX));
        assert!(!enable_big_tiff(None, 1024));
        assert!(enable_big_tiff(None, BIG_TIFF_THRESHOLD));
        assert!(enable_big_tiff(None, u64::MAX));
    }

    #[test]
    fn double_close_is_a_no_op() {
        let path = std::env::temp_dir().join("ome-files-double-close.tif");

        let mut tiff = Tiff::open_write(&path, false).unwrap();
        assert!(tiff.is_open());

        tiff.close().unwrap();
        assert!(!tiff.is_open());
        tiff.close().unwrap();

        assert!(matches!(tiff.current_directory(), Err(Error::State(_))));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn reading_missing_files_fails_with_io() {
        let missing = std::env::temp_dir().join("ome-files-does-not-exist.tif");
        assert!(matches!(Tiff::open_read(missing), Err(Error::Io(_))));
    }
}
