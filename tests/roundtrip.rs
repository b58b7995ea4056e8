
//! Write images tile by tile and read them back,
//! across tile shapes, planar configurations, codecs and file variants.

use std::path::PathBuf;

use ome_files::prelude::*;

fn temp_path(name: &str) -> PathBuf {
    let directory = std::env::temp_dir().join("ome-files-tests");
    std::fs::create_dir_all(&directory).unwrap();
    directory.join(format!("{}-{}.tif", name, std::process::id()))
}

/// A deterministic sample pattern that differs along every axis.
fn pattern(x: usize, y: usize, sample: usize) -> usize {
    x * 7 + y * 13 + sample * 29
}

fn filled_buffer<T: Sample + From<u8>>(
    width: usize, height: usize, samples: usize, order: StorageOrder,
) -> VariantPixelBuffer {
    let mut buffer = PixelBuffer::<T>::new([width, height, 1, samples], Endian::Native, order);

    for y in 0 .. height {
        for x in 0 .. width {
            for sample in 0 .. samples {
                *buffer.at_mut([x, y, 0, sample]) = T::from((pattern(x, y, sample) % 251) as u8);
            }
        }
    }

    buffer.into()
}

fn subregion<T: Sample>(
    master: &VariantPixelBuffer, x: usize, y: usize, w: usize, h: usize,
) -> VariantPixelBuffer {
    let master = master.buffer::<T>().unwrap();
    let samples = master.sample_count();

    let mut out = PixelBuffer::<T>::new([w, h, 1, samples], Endian::Native, master.storage_order());

    for yy in 0 .. h {
        for xx in 0 .. w {
            for sample in 0 .. samples {
                *out.at_mut([xx, yy, 0, sample]) = *master.at([x + xx, y + yy, 0, sample]);
            }
        }
    }

    out.into()
}

/// Fisher-Yates with a fixed multiplier, so failures reproduce.
fn shuffled(count: usize, mut state: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0 .. count).collect();

    for i in (1 .. count).rev() {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        indices.swap(i, (state >> 33) as usize % (i + 1));
    }

    indices
}

struct Layout {
    pixel_type: PixelType,
    bits: u16,
    samples: u16,
    planar: PlanarConfiguration,
    photometric: PhotometricInterpretation,
    tile: (TileType, u32, u32),
    compression: Option<CompressionScheme>,
}

fn setup_directory(ifd: &mut Ifd<'_>, width: u32, height: u32, layout: &Layout) {
    ifd.set_image_width(width);
    ifd.set_image_height(height);

    let (tile_type, tile_width, tile_height) = layout.tile;
    ifd.set_tile_type(tile_type);
    ifd.set_tile_width(tile_width);
    ifd.set_tile_height(tile_height);

    ifd.set_pixel_type(layout.pixel_type);
    ifd.set_bits_per_sample(layout.bits).unwrap();
    ifd.set_samples_per_pixel(layout.samples);
    ifd.set_planar_configuration(layout.planar);
    ifd.set_photometric_interpretation(layout.photometric);

    if let Some(compression) = layout.compression {
        ifd.set_compression(compression);
    }
}

fn rgb_contig_tiles() -> Layout {
    Layout {
        pixel_type: PixelType::UInt8,
        bits: 8,
        samples: 3,
        planar: PlanarConfiguration::Contig,
        photometric: PhotometricInterpretation::Rgb,
        tile: (TileType::Tile, 16, 16),
        compression: None,
    }
}

fn write_single_plane(
    path: &PathBuf, big: bool, width: u32, height: u32,
    layout: &Layout, buffer: &VariantPixelBuffer,
) {
    let mut tiff = Tiff::open_write(path, big).unwrap();

    {
        let mut ifd = tiff.current_directory().unwrap();
        setup_directory(&mut ifd, width, height, layout);
        ifd.write_full_image(buffer).unwrap();
    }

    tiff.write_current_directory().unwrap();
    tiff.close().unwrap();
}

fn read_single_plane(path: &PathBuf) -> VariantPixelBuffer {
    let mut tiff = Tiff::open_read(path).unwrap();
    assert_eq!(tiff.directory_count(), 1);

    let mut buffer = VariantPixelBuffer::new(
        [1, 1, 1, 1], PixelType::UInt8, Endian::Native, StorageOrder::default());

    tiff.directory(0).unwrap().read_full_image(&mut buffer).unwrap();
    tiff.close().unwrap();

    buffer
}

#[test]
fn single_tile_rgb_image() {
    let path = temp_path("single-tile-rgb");
    let layout = Layout { tile: (TileType::Tile, 64, 64), .. rgb_contig_tiles() };

    let master = filled_buffer::<u8>(64, 64, 3, StorageOrder::interleaved());
    write_single_plane(&path, false, 64, 64, &layout, &master);

    assert_eq!(read_single_plane(&path), master);
    std::fs::remove_file(&path).ok();
}

#[test]
fn unaligned_partial_writes_cover_exactly_once() {
    // A 32x32 plane of 16x16 tiles, written as 35 staggered 5x7 blocks.
    let path = temp_path("staggered-writes");
    let layout = rgb_contig_tiles();
    let master = filled_buffer::<u8>(32, 32, 3, StorageOrder::interleaved());

    let mut tiff = Tiff::open_write(&path, false).unwrap();

    {
        let mut ifd = tiff.current_directory().unwrap();
        setup_directory(&mut ifd, 32, 32, &layout);

        let mut blocks: Vec<(usize, usize)> = Vec::new();
        for block_y in 0 .. 5 {
            for block_x in 0 .. 7 {
                blocks.push((block_x * 5, block_y * 7));
            }
        }
        assert_eq!(blocks.len(), 35);

        for &index in &shuffled(blocks.len(), 35) {
            let (x, y) = blocks[index];
            let w = 5.min(32 - x);
            let h = 7.min(32 - y);

            let block = subregion::<u8>(&master, x, y, w, h);
            ifd.write_image(&block, x, y, w, h).unwrap();
        }
    }

    tiff.write_current_directory().unwrap();
    tiff.close().unwrap();

    assert_eq!(read_single_plane(&path), master);
    std::fs::remove_file(&path).ok();
}

#[test]
fn planar_strips_written_in_random_order() {
    // 43x37, three separate sample planes, strips of 5 rows.
    let path = temp_path("planar-strips");

    let layout = Layout {
        pixel_type: PixelType::UInt16,
        bits: 16,
        samples: 3,
        planar: PlanarConfiguration::Separate,
        photometric: PhotometricInterpretation::Rgb,
        tile: (TileType::Strip, 43, 5),
        compression: None,
    };

    let master = filled_buffer::<u16>(43, 37, 3, StorageOrder::planar());

    let mut tiff = Tiff::open_write(&path, false).unwrap();

    {
        let mut ifd = tiff.current_directory().unwrap();
        setup_directory(&mut ifd, 43, 37, &layout);

        let info = ifd.tile_info().unwrap();
        assert_eq!(info.tile_count(), 37_usize.div_ceil(5) * 3);

        // Each band write covers all three sample planes of that band.
        let bands = 37_usize.div_ceil(5);

        for &band in &shuffled(bands, 43) {
            let y = band * 5;
            let h = 5.min(37 - y);

            let block = subregion::<u16>(&master, 0, y, 43, h);
            ifd.write_image(&block, 0, y, 43, h).unwrap();
        }
    }

    tiff.write_current_directory().unwrap();
    tiff.close().unwrap();

    assert_eq!(read_single_plane(&path), master);
    std::fs::remove_file(&path).ok();
}

#[test]
fn unaligned_region_reads() {
    let path = temp_path("region-reads");
    let layout = rgb_contig_tiles();
    let master = filled_buffer::<u8>(32, 32, 3, StorageOrder::interleaved());

    write_single_plane(&path, false, 32, 32, &layout, &master);

    let mut tiff = Tiff::open_read(&path).unwrap();
    let mut ifd = tiff.directory(0).unwrap();

    for (x, y, w, h) in [(3, 2, 17, 9), (0, 0, 32, 1), (15, 15, 2, 2), (16, 16, 16, 16)] {
        let mut out = VariantPixelBuffer::new(
            [1, 1, 1, 1], PixelType::UInt8, Endian::Native, StorageOrder::default());

        ifd.read_image(&mut out, x, y, w, h).unwrap();
        assert_eq!(out, subregion::<u8>(&master, x, y, w, h), "region {},{} {}x{}", x, y, w, h);
    }

    assert!(ifd.read_image(
        &mut VariantPixelBuffer::new([1, 1, 1, 1], PixelType::UInt8, Endian::Native, StorageOrder::default()),
        20, 20, 16, 16).is_err()); // reaches outside the plane

    std::fs::remove_file(&path).ok();
}

#[test]
fn single_sample_reads() {
    let path = temp_path("sample-reads");
    let layout = rgb_contig_tiles();
    let master = filled_buffer::<u8>(32, 32, 3, StorageOrder::interleaved());

    write_single_plane(&path, false, 32, 32, &layout, &master);

    let mut tiff = Tiff::open_read(&path).unwrap();
    let mut ifd = tiff.directory(0).unwrap();

    let mut out = VariantPixelBuffer::new(
        [1, 1, 1, 1], PixelType::UInt8, Endian::Native, StorageOrder::default());
    ifd.read_image_sample(&mut out, 0, 0, 32, 32, 1).unwrap();

    let expected: VariantPixelBuffer = master.buffer::<u8>().unwrap().clone_sample_plane(1).into();
    assert_eq!(out, expected);

    assert!(ifd.read_image_sample(&mut out, 0, 0, 32, 32, 3).is_err());
    std::fs::remove_file(&path).ok();
}

#[test]
fn bilevel_strips() {
    let path = temp_path("bilevel-strips");

    let layout = Layout {
        pixel_type: PixelType::Bit,
        bits: 1,
        samples: 1,
        planar: PlanarConfiguration::Contig,
        photometric: PhotometricInterpretation::MinIsBlack,
        tile: (TileType::Strip, 40, 4),
        compression: None,
    };

    let mut master = PixelBuffer::<bool>::new([40, 12, 1, 1], Endian::Native, StorageOrder::interleaved());
    for y in 0 .. 12 {
        for x in 0 .. 40 {
            *master.at_mut([x, y, 0, 0]) = (x + y) % 3 == 0;
        }
    }
    let master: VariantPixelBuffer = master.into();

    write_single_plane(&path, false, 40, 12, &layout, &master);
    assert_eq!(read_single_plane(&path), master);
    std::fs::remove_file(&path).ok();
}

#[test]
fn bilevel_tiles_with_partial_writes() {
    let path = temp_path("bilevel-tiles");

    let layout = Layout {
        pixel_type: PixelType::Bit,
        bits: 1,
        samples: 1,
        planar: PlanarConfiguration::Contig,
        photometric: PhotometricInterpretation::MinIsBlack,
        tile: (TileType::Tile, 16, 16),
        compression: None,
    };

    let mut master = PixelBuffer::<bool>::new([32, 32, 1, 1], Endian::Native, StorageOrder::interleaved());
    for y in 0 .. 32 {
        for x in 0 .. 32 {
            *master.at_mut([x, y, 0, 0]) = pattern(x, y, 0) % 5 < 2;
        }
    }
    let master: VariantPixelBuffer = master.into();

    let mut tiff = Tiff::open_write(&path, false).unwrap();

    {
        let mut ifd = tiff.current_directory().unwrap();
        setup_directory(&mut ifd, 32, 32, &layout);

        // Two unaligned halves per tile row.
        for y in (0_usize .. 32).step_by(8) {
            for (x, w) in [(0_usize, 13), (13, 19)] {
                let block = subregion::<bool>(&master, x, y, w, 8);
                ifd.write_image(&block, x, y, w, 8).unwrap();
            }
        }
    }

    tiff.write_current_directory().unwrap();
    tiff.close().unwrap();

    assert_eq!(read_single_plane(&path), master);
    std::fs::remove_file(&path).ok();
}

#[test]
fn compressed_round_trips() {
    for (name, compression) in [
        ("lzw", CompressionScheme::Lzw),
        ("deflate", CompressionScheme::AdobeDeflate),
    ] {
        let path = temp_path(&format!("codec-{}", name));

        let layout = Layout {
            pixel_type: PixelType::UInt16,
            bits: 16,
            samples: 1,
            planar: PlanarConfiguration::Contig,
            photometric: PhotometricInterpretation::MinIsBlack,
            tile: (TileType::Tile, 16, 16),
            compression: Some(compression),
        };

        let master = filled_buffer::<u16>(48, 32, 1, StorageOrder::interleaved());
        write_single_plane(&path, false, 48, 32, &layout, &master);

        assert_eq!(read_single_plane(&path), master, "codec {}", name);
        std::fs::remove_file(&path).ok();
    }
}

#[test]
fn float_and_complex_payloads() {
    let path = temp_path("float-plane");

    let layout = Layout {
        pixel_type: PixelType::Float,
        bits: 32,
        samples: 1,
        planar: PlanarConfiguration::Contig,
        photometric: PhotometricInterpretation::MinIsBlack,
        tile: (TileType::Strip, 20, 6),
        compression: None,
    };

    let mut master = PixelBuffer::<f32>::new([20, 15, 1, 1], Endian::Native, StorageOrder::interleaved());
    for y in 0 .. 15 {
        for x in 0 .. 20 {
            *master.at_mut([x, y, 0, 0]) = (x as f32) * 0.5 - (y as f32) * 0.25;
        }
    }
    let master: VariantPixelBuffer = master.into();

    write_single_plane(&path, false, 20, 15, &layout, &master);
    assert_eq!(read_single_plane(&path), master);
    std::fs::remove_file(&path).ok();

    let path = temp_path("complex-plane");
    let layout = Layout {
        pixel_type: PixelType::ComplexFloat,
        bits: 64,
        .. layout
    };

    let mut master = PixelBuffer::<Complex<f32>>::new([20, 15, 1, 1], Endian::Native, StorageOrder::interleaved());
    for y in 0 .. 15 {
        for x in 0 .. 20 {
            *master.at_mut([x, y, 0, 0]) = Complex::new(x as f32, -(y as f32));
        }
    }
    let master: VariantPixelBuffer = master.into();

    write_single_plane(&path, false, 20, 15, &layout, &master);
    assert_eq!(read_single_plane(&path), master);
    std::fs::remove_file(&path).ok();
}

#[test]
fn big_tiff_round_trip() {
    let path = temp_path("bigtiff");
    let layout = rgb_contig_tiles();
    let master = filled_buffer::<u8>(32, 32, 3, StorageOrder::interleaved());

    write_single_plane(&path, true, 32, 32, &layout, &master);

    let mut tiff = Tiff::open_read(&path).unwrap();
    assert!(tiff.is_big());

    let mut out = VariantPixelBuffer::new(
        [1, 1, 1, 1], PixelType::UInt8, Endian::Native, StorageOrder::default());
    tiff.directory(0).unwrap().read_full_image(&mut out).unwrap();

    assert_eq!(out, master);
    std::fs::remove_file(&path).ok();
}

#[test]
fn multiple_directories_chain() {
    let path = temp_path("multi-directory");
    let layout = rgb_contig_tiles();

    let first = filled_buffer::<u8>(32, 32, 3, StorageOrder::interleaved());
    let second = filled_buffer::<u8>(48, 16, 3, StorageOrder::interleaved());

    let mut tiff = Tiff::open_write(&path, false).unwrap();

    {
        let mut ifd = tiff.current_directory().unwrap();
        setup_directory(&mut ifd, 32, 32, &layout);
        ifd.write_full_image(&first).unwrap();
    }
    tiff.write_current_directory().unwrap();

    {
        let mut ifd = tiff.current_directory().unwrap();
        setup_directory(&mut ifd, 48, 16, &layout);
        ifd.write_full_image(&second).unwrap();
    }
    tiff.write_current_directory().unwrap();

    assert_eq!(tiff.directory_count(), 2);
    tiff.close().unwrap();

    let mut tiff = Tiff::open_read(&path).unwrap();
    assert_eq!(tiff.directory_count(), 2);

    let second_offset = tiff.directory_offsets()[1];
    assert_eq!(tiff.directory(0).unwrap().next_offset(), Some(second_offset));

    let mut out = VariantPixelBuffer::new(
        [1, 1, 1, 1], PixelType::UInt8, Endian::Native, StorageOrder::default());

    tiff.directory(0).unwrap().read_full_image(&mut out).unwrap();
    assert_eq!(out, first);

    tiff.directory(1).unwrap().read_full_image(&mut out).unwrap();
    assert_eq!(out, second);
    assert_eq!(tiff.directory(1).unwrap().next_offset(), None);

    std::fs::remove_file(&path).ok();
}

#[test]
fn incompatible_writes_are_rejected() {
    let path = temp_path("write-validation");
    let layout = rgb_contig_tiles();

    let mut tiff = Tiff::open_write(&path, false).unwrap();
    let mut ifd = tiff.current_directory().unwrap();
    setup_directory(&mut ifd, 32, 32, &layout);

    // Wrong pixel type.
    let shorts = filled_buffer::<u16>(32, 32, 3, StorageOrder::interleaved());
    assert!(matches!(ifd.write_full_image(&shorts), Err(Error::Type(_))));

    // Wrong dimensions.
    let small = filled_buffer::<u8>(16, 16, 3, StorageOrder::interleaved());
    assert!(matches!(ifd.write_full_image(&small), Err(Error::Logic(_))));

    // Wrong storage order for a contiguous directory.
    let planar = filled_buffer::<u8>(32, 32, 3, StorageOrder::planar());
    assert!(matches!(ifd.write_full_image(&planar), Err(Error::Logic(_))));

    // Separate per-sample writes are not implemented.
    let good = filled_buffer::<u8>(32, 32, 3, StorageOrder::interleaved());
    assert!(matches!(
        ifd.write_image_sample(&good, 0, 0, 32, 32, 0),
        Err(Error::State(_))));

    // Overlapping writes are not permitted.
    ifd.write_full_image(&good).unwrap();
    let block = subregion::<u8>(&good, 0, 0, 4, 4);
    assert!(matches!(ifd.write_image(&block, 0, 0, 4, 4), Err(Error::State(_))));

    drop(ifd);
    tiff.close().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn incompatible_codec_is_rejected_before_writing() {
    let path = temp_path("codec-validation");

    let layout = Layout {
        pixel_type: PixelType::UInt16,
        bits: 16,
        samples: 1,
        planar: PlanarConfiguration::Contig,
        photometric: PhotometricInterpretation::MinIsBlack,
        tile: (TileType::Tile, 16, 16),
        compression: Some(CompressionScheme::Jpeg), // jpeg is 8-bit only
    };

    let master = filled_buffer::<u16>(16, 16, 1, StorageOrder::interleaved());

    let mut tiff = Tiff::open_write(&path, false).unwrap();
    let mut ifd = tiff.current_directory().unwrap();
    setup_directory(&mut ifd, 16, 16, &layout);

    assert!(matches!(ifd.write_full_image(&master), Err(Error::Type(_))));

    drop(ifd);
    tiff.close().unwrap();
    std::fs::remove_file(&path).ok();
}
