
//! Drive the format writer through multi-series, multi-resolution
//! images and verify the files it produces.

use std::path::PathBuf;

use ome_files::prelude::*;
use smallvec::smallvec;

fn temp_path(name: &str) -> PathBuf {
    let directory = std::env::temp_dir().join("ome-files-tests");
    std::fs::create_dir_all(&directory).unwrap();
    directory.join(format!("{}-{}.tif", name, std::process::id()))
}

fn gradient_plane(width: usize, height: usize) -> VariantPixelBuffer {
    let mut buffer = PixelBuffer::<u16>::new(
        [width, height, 1, 3], Endian::Native, StorageOrder::interleaved());

    for y in 0 .. height {
        for x in 0 .. width {
            *buffer.at_mut([x, y, 0, 0]) = ((x * 4096) / width) as u16;
            *buffer.at_mut([x, y, 0, 1]) = ((y * 4096) / height) as u16;
            *buffer.at_mut([x, y, 0, 2]) = (((x + y) * 4096) / (width + height)) as u16;
        }
    }

    buffer.into()
}

fn pyramid_store() -> OmeXml {
    let core = CoreMetadata {
        size_x: 256,
        size_y: 128,
        size_c: smallvec![3],
        pixel_type: PixelType::UInt16,
        bits_per_pixel: 16,
        interleaved: true,
        dimension_order: DimensionOrder::Xyztc,
        .. CoreMetadata::default()
    };

    let mut store = OmeXml::new();
    fill_metadata(&mut store, &[core.clone(), core]).unwrap();

    add_resolutions(&mut store, 0, &[[128, 64, 1], [64, 32, 1]]).unwrap();
    add_resolutions(&mut store, 1, &[[128, 64, 1]]).unwrap();

    store
}

#[test]
fn multi_series_pyramid() {
    let path = temp_path("writer-pyramid");
    let store = pyramid_store();

    let mut writer = TiffWriter::new(store.clone());
    writer.set_interleaved(true);
    writer.set_tile_size_x(64);
    writer.set_tile_size_y(64);
    writer.open(&path).unwrap();

    assert_eq!(writer.series_count(), 2);
    assert_eq!(writer.resolution_count(0), 3);
    assert_eq!(writer.resolution_count(1), 2);

    let mut planes = Vec::new();

    for series in 0 .. writer.series_count() {
        writer.set_series(series).unwrap();

        for resolution in 0 .. writer.resolution_count(series) {
            writer.set_resolution(resolution).unwrap();

            let width = writer.size_x().unwrap();
            let height = writer.size_y().unwrap();

            if resolution == 0 {
                assert_eq!(width, store.pixels_size_x(series).unwrap());
                assert_eq!(height, store.pixels_size_y(series).unwrap());
            }
            else {
                let level = get_resolutions(&store, series).unwrap()[resolution - 1];
                assert_eq!([width, height], [level[0], level[1]]);
            }

            let plane = gradient_plane(width, height);
            writer.save_plane(0, &plane).unwrap();
            planes.push(plane);
        }
    }

    writer.close().unwrap();

    // One directory per plane, in series-resolution order.
    let mut tiff = Tiff::open_read(&path).unwrap();
    assert_eq!(tiff.directory_count(), 5);

    let expected_sizes = [(256, 128), (128, 64), (64, 32), (256, 128), (128, 64)];

    for (index, ((width, height), plane)) in expected_sizes.iter().zip(&planes).enumerate() {
        let mut ifd = tiff.directory(index).unwrap();
        assert_eq!(ifd.image_width().unwrap() as usize, *width);
        assert_eq!(ifd.image_height().unwrap() as usize, *height);
        assert_eq!(ifd.samples_per_pixel().unwrap(), 3);
        assert_eq!(ifd.pixel_type().unwrap(), PixelType::UInt16);

        let mut out = VariantPixelBuffer::new(
            [1, 1, 1, 1], PixelType::UInt8, Endian::Native, StorageOrder::default());
        ifd.read_full_image(&mut out).unwrap();
        assert_eq!(out, *plane, "directory {}", index);
    }

    tiff.close().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn strip_defaults_for_narrow_images() {
    let path = temp_path("writer-strips");

    let core = CoreMetadata {
        size_x: 100,
        size_y: 80,
        size_c: smallvec![1],
        pixel_type: PixelType::UInt8,
        bits_per_pixel: 8,
        interleaved: true,
        .. CoreMetadata::default()
    };

    let mut store = OmeXml::new();
    fill_metadata(&mut store, &[core]).unwrap();

    let mut writer = TiffWriter::new(store);
    writer.open(&path).unwrap();

    let mut plane = PixelBuffer::<u8>::new([100, 80, 1, 1], Endian::Native, StorageOrder::interleaved());
    plane.assign((0 .. 100 * 80).map(|value| (value % 255) as u8)).unwrap();
    let plane: VariantPixelBuffer = plane.into();

    writer.save_plane(0, &plane).unwrap();
    writer.close().unwrap();

    let mut tiff = Tiff::open_read(&path).unwrap();
    let mut ifd = tiff.directory(0).unwrap();

    // Narrow images default to strips spanning the image width.
    assert_eq!(ifd.tile_type(), TileType::Strip);
    assert_eq!(ifd.tile_width().unwrap(), 100);

    let mut out = VariantPixelBuffer::new(
        [1, 1, 1, 1], PixelType::UInt8, Endian::Native, StorageOrder::default());
    ifd.read_full_image(&mut out).unwrap();
    assert_eq!(out, plane);

    tiff.close().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn compressed_writer_output() {
    let path = temp_path("writer-compressed");

    let core = CoreMetadata {
        size_x: 64,
        size_y: 64,
        size_c: smallvec![1],
        pixel_type: PixelType::UInt8,
        bits_per_pixel: 8,
        interleaved: true,
        .. CoreMetadata::default()
    };

    let mut store = OmeXml::new();
    fill_metadata(&mut store, &[core]).unwrap();

    let mut writer = TiffWriter::new(store);
    writer.set_compression("LZW").unwrap();
    writer.open(&path).unwrap();

    let mut plane = PixelBuffer::<u8>::new([64, 64, 1, 1], Endian::Native, StorageOrder::interleaved());
    plane.assign((0 .. 64 * 64).map(|value| (value / 64) as u8)).unwrap();
    let plane: VariantPixelBuffer = plane.into();

    writer.save_plane(0, &plane).unwrap();
    writer.close().unwrap();

    let mut tiff = Tiff::open_read(&path).unwrap();
    let mut ifd = tiff.directory(0).unwrap();
    assert_eq!(ifd.compression().unwrap(), CompressionScheme::Lzw);

    let mut out = VariantPixelBuffer::new(
        [1, 1, 1, 1], PixelType::UInt8, Endian::Native, StorageOrder::default());
    ifd.read_full_image(&mut out).unwrap();
    assert_eq!(out, plane);

    tiff.close().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn unknown_codec_names_are_rejected() {
    let mut writer = TiffWriter::new(OmeXml::new());
    assert!(writer.set_compression("definitely not a codec").is_err());
    assert!(writer.set_compression("LZW").is_ok());
}

#[test]
fn out_of_order_planes_are_rejected() {
    let path = temp_path("writer-order");
    let store = pyramid_store();

    let mut writer = TiffWriter::new(store);
    writer.set_interleaved(true);
    writer.set_tile_size_x(64);
    writer.set_tile_size_y(64);
    writer.open(&path).unwrap();

    // Jumping straight to the second series leaves the IFD
    // index behind the expected position.
    writer.set_series(1).unwrap();

    let width = writer.size_x().unwrap();
    let height = writer.size_y().unwrap();
    let plane = gradient_plane(width, height);

    assert!(matches!(
        writer.save_plane(0, &plane),
        Err(Error::State(_))));

    std::fs::remove_file(&path).ok();
}
