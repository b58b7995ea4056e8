
//! The OME-XML metadata store facade and its binding to core metadata.
//!
//! [`OmeXml`] is the in-memory typed facade over the external OME-XML
//! document model: Image, Pixels and Channel elements plus linked map
//! annotations. The binding functions translate between it and
//! [`CoreMetadata`](super::CoreMetadata), repair inconsistent channel
//! layouts, and persist sub-resolution pyramids as annotations.

use smallvec::SmallVec;

use crate::error::{Error, Result, UnitResult};
use crate::meta::{CoreMetadata, DimensionOrder};
use crate::pixel::PixelType;

/// The namespace of the map annotation that stores
/// the sub-resolution pyramid of an image.
pub const RESOLUTION_NAMESPACE: &str = "ome.files.resolution";

/// One sub-resolution level: width, height and depth.
pub type Resolution = [usize; 3];

#[derive(Clone, Debug, Default, PartialEq)]
struct Channel {
    id: String,
    samples_per_pixel: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
struct Pixels {
    id: String,
    dimension_order: DimensionOrder,
    pixel_type: PixelType,
    size_x: usize,
    size_y: usize,
    size_z: usize,
    size_t: usize,
    size_c: usize,
    significant_bits: Option<usize>,
    big_endian: bool,
    interleaved: bool,
    channels: Vec<Channel>,
}

impl Default for Pixels {
    fn default() -> Self {
        Pixels {
            id: String::new(),
            dimension_order: DimensionOrder::default(),
            pixel_type: PixelType::UInt8,
            size_x: 1, size_y: 1, size_z: 1, size_t: 1, size_c: 1,
            significant_bits: None,
            big_endian: false,
            interleaved: false,
            channels: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Image {
    id: String,
    name: String,
    pixels: Pixels,
    annotation_refs: Vec<String>,
}

/// A map annotation: an identified list of key-value pairs
/// under a namespace, linkable to images.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapAnnotation {

    /// The annotation identifier.
    pub id: String,

    /// The namespace describing what the pairs mean.
    pub namespace: String,

    /// The key-value pairs.
    pub pairs: Vec<(String, String)>,
}

/// The in-memory OME-XML metadata store, accessed through typed
/// getters and setters the way the external document model is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OmeXml {
    images: Vec<Image>,
    map_annotations: Vec<MapAnnotation>,
}

impl OmeXml {

    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn image(&self, image: usize) -> Result<&Image> {
        self.images.get(image).ok_or_else(||
            Error::format(format!("no image with index {}", image)))
    }

    fn image_mut(&mut self, image: usize) -> Result<&mut Image> {
        self.images.get_mut(image).ok_or_else(||
            Error::format(format!("no image with index {}", image)))
    }

    /// The number of images in the store.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Append an empty image and return its index.
    pub fn add_image(&mut self) -> usize {
        let index = self.images.len();

        self.images.push(Image {
            id: create_id("Image", &[index]),
            pixels: Pixels { id: create_id("Pixels", &[index]), .. Pixels::default() },
            .. Image::default()
        });

        index
    }

    /// The identifier of an image.
    pub fn image_id(&self, image: usize) -> Result<&str> {
        Ok(&self.image(image)?.id)
    }

    /// The name of an image.
    pub fn image_name(&self, image: usize) -> Result<&str> {
        Ok(&self.image(image)?.name)
    }

    /// Set the name of an image.
    pub fn set_image_name(&mut self, image: usize, name: &str) -> UnitResult {
        self.image_mut(image)?.name = name.to_string();
        Ok(())
    }

    /// The plane width of an image.
    pub fn pixels_size_x(&self, image: usize) -> Result<usize> {
        Ok(self.image(image)?.pixels.size_x)
    }

    /// The plane height of an image.
    pub fn pixels_size_y(&self, image: usize) -> Result<usize> {
        Ok(self.image(image)?.pixels.size_y)
    }

    /// The number of focal planes of an image.
    pub fn pixels_size_z(&self, image: usize) -> Result<usize> {
        Ok(self.image(image)?.pixels.size_z)
    }

    /// The number of time points of an image.
    pub fn pixels_size_t(&self, image: usize) -> Result<usize> {
        Ok(self.image(image)?.pixels.size_t)
    }

    /// The total number of samples across all channels of an image.
    pub fn pixels_size_c(&self, image: usize) -> Result<usize> {
        Ok(self.image(image)?.pixels.size_c)
    }

    /// Set the plane width of an image.
    pub fn set_pixels_size_x(&mut self, image: usize, size: usize) -> UnitResult {
        self.image_mut(image)?.pixels.size_x = size;
        Ok(())
    }

    /// Set the plane height of an image.
    pub fn set_pixels_size_y(&mut self, image: usize, size: usize) -> UnitResult {
        self.image_mut(image)?.pixels.size_y = size;
        Ok(())
    }

    /// Set the number of focal planes of an image.
    pub fn set_pixels_size_z(&mut self, image: usize, size: usize) -> UnitResult {
        self.image_mut(image)?.pixels.size_z = size;
        Ok(())
    }

    /// Set the number of time points of an image.
    pub fn set_pixels_size_t(&mut self, image: usize, size: usize) -> UnitResult {
        self.image_mut(image)?.pixels.size_t = size;
        Ok(())
    }

    /// Set the total number of samples across all channels of an image.
    pub fn set_pixels_size_c(&mut self, image: usize, size: usize) -> UnitResult {
        self.image_mut(image)?.pixels.size_c = size;
        Ok(())
    }

    /// The pixel type of an image.
    pub fn pixels_type(&self, image: usize) -> Result<PixelType> {
        Ok(self.image(image)?.pixels.pixel_type)
    }

    /// Set the pixel type of an image.
    pub fn set_pixels_type(&mut self, image: usize, pixel_type: PixelType) -> UnitResult {
        self.image_mut(image)?.pixels.pixel_type = pixel_type;
        Ok(())
    }

    /// The dimension order of an image.
    pub fn pixels_dimension_order(&self, image: usize) -> Result<DimensionOrder> {
        Ok(self.image(image)?.pixels.dimension_order)
    }

    /// Set the dimension order of an image.
    pub fn set_pixels_dimension_order(&mut self, image: usize, order: DimensionOrder) -> UnitResult {
        self.image_mut(image)?.pixels.dimension_order = order;
        Ok(())
    }

    /// Whether the pixel data of an image is big-endian.
    pub fn pixels_big_endian(&self, image: usize) -> Result<bool> {
        Ok(self.image(image)?.pixels.big_endian)
    }

    /// Set whether the pixel data of an image is big-endian.
    pub fn set_pixels_big_endian(&mut self, image: usize, big_endian: bool) -> UnitResult {
        self.image_mut(image)?.pixels.big_endian = big_endian;
        Ok(())
    }

    /// Whether the channel samples of an image are interleaved.
    pub fn pixels_interleaved(&self, image: usize) -> Result<bool> {
        Ok(self.image(image)?.pixels.interleaved)
    }

    /// Set whether the channel samples of an image are interleaved.
    pub fn set_pixels_interleaved(&mut self, image: usize, interleaved: bool) -> UnitResult {
        self.image_mut(image)?.pixels.interleaved = interleaved;
        Ok(())
    }

    /// The number of significant bits per sample of an image.
    pub fn pixels_significant_bits(&self, image: usize) -> Result<Option<usize>> {
        Ok(self.image(image)?.pixels.significant_bits)
    }

    /// Set the number of significant bits per sample of an image.
    pub fn set_pixels_significant_bits(&mut self, image: usize, bits: usize) -> UnitResult {
        self.image_mut(image)?.pixels.significant_bits = Some(bits);
        Ok(())
    }

    /// The number of channels of an image.
    pub fn channel_count(&self, image: usize) -> Result<usize> {
        Ok(self.image(image)?.pixels.channels.len())
    }

    /// Append a channel to an image and return its index.
    pub fn add_channel(&mut self, image: usize) -> Result<usize> {
        let channels = &mut self.image_mut(image)?.pixels.channels;
        let index = channels.len();

        channels.push(Channel {
            id: create_id("Channel", &[image, index]),
            samples_per_pixel: None,
        });

        Ok(index)
    }

    /// The identifier of a channel.
    pub fn channel_id(&self, image: usize, channel: usize) -> Result<&str> {
        self.image(image)?.pixels.channels.get(channel)
            .map(|channel| channel.id.as_str())
            .ok_or_else(|| Error::format(format!("no channel with index {}", channel)))
    }

    /// The number of samples of a channel, if declared.
    pub fn channel_samples_per_pixel(&self, image: usize, channel: usize) -> Result<Option<usize>> {
        self.image(image)?.pixels.channels.get(channel)
            .map(|channel| channel.samples_per_pixel)
            .ok_or_else(|| Error::format(format!("no channel with index {}", channel)))
    }

    /// Set the number of samples of a channel.
    pub fn set_channel_samples_per_pixel(&mut self, image: usize, channel: usize, samples: usize) -> UnitResult {
        self.image_mut(image)?.pixels.channels.get_mut(channel)
            .map(|channel| channel.samples_per_pixel = Some(samples))
            .ok_or_else(|| Error::format(format!("no channel with index {}", channel)))
    }

    /// Remove all channels of an image.
    pub fn clear_channels(&mut self, image: usize) -> UnitResult {
        self.image_mut(image)?.pixels.channels.clear();
        Ok(())
    }

    /// The number of map annotations in the store.
    pub fn map_annotation_count(&self) -> usize {
        self.map_annotations.len()
    }

    /// Append a map annotation and return its identifier.
    pub fn add_map_annotation(&mut self, namespace: &str, pairs: Vec<(String, String)>) -> String {
        let id = create_id("Annotation", &[self.map_annotations.len()]);

        self.map_annotations.push(MapAnnotation {
            id: id.clone(),
            namespace: namespace.to_string(),
            pairs,
        });

        id
    }

    /// Link an annotation to an image.
    pub fn link_image_annotation(&mut self, image: usize, annotation_id: &str) -> UnitResult {
        let refs = &mut self.image_mut(image)?.annotation_refs;

        if !refs.iter().any(|linked| linked == annotation_id) {
            refs.push(annotation_id.to_string());
        }

        Ok(())
    }

    /// Unlink an annotation from an image.
    pub fn unlink_image_annotation(&mut self, image: usize, annotation_id: &str) -> UnitResult {
        self.image_mut(image)?.annotation_refs.retain(|linked| linked != annotation_id);
        Ok(())
    }

    /// The annotations of the specified namespace linked to an image.
    pub fn image_annotations(&self, image: usize, namespace: &str) -> Result<Vec<&MapAnnotation>> {
        let image = self.image(image)?;

        Ok(self.map_annotations.iter()
            .filter(|annotation| annotation.namespace == namespace)
            .filter(|annotation| image.annotation_refs.iter().any(|linked| *linked == annotation.id))
            .collect())
    }

    /// Remove an annotation from the store entirely,
    /// unlinking it from every image.
    pub fn remove_map_annotation(&mut self, annotation_id: &str) {
        self.map_annotations.retain(|annotation| annotation.id != annotation_id);

        for image in &mut self.images {
            image.annotation_refs.retain(|linked| linked != annotation_id);
        }
    }
}

/// Build a canonical identifier string: `prefix:i0[:i1…]`.
pub fn create_id(prefix: &str, indices: &[usize]) -> String {
    let mut id = String::from(prefix);

    for index in indices {
        id.push(':');
        id.push_str(&index.to_string());
    }

    id
}

/// Derive a canonical dimension order from a free-form axis hint.
///
/// The distinct plane axes are taken from the hint in order, then the
/// remaining axes are appended in `XYZTC` precedence. The result must be
/// one of the six canonical orders, so a hint that does not lead with
/// the spatial plane fails.
pub fn create_dimension_order(hint: &str) -> Result<DimensionOrder> {
    let mut order = String::with_capacity(5);

    for axis in hint.chars() {
        if "XYZTC".contains(axis) && !order.contains(axis) {
            order.push(axis);
        }
    }

    for axis in "XYZTC".chars() {
        if !order.contains(axis) {
            order.push(axis);
        }
    }

    order.parse()
}

/// Populate the store with Image, Pixels and Channel elements
/// from a list of per-series core metadata.
pub fn fill_metadata(store: &mut OmeXml, series_list: &[CoreMetadata]) -> UnitResult {
    for core in series_list {
        let image = store.add_image();

        if core.image_name.is_empty() {
            let name = format!("Series {}", image);
            store.set_image_name(image, &name)?;
        }
        else {
            store.set_image_name(image, &core.image_name)?;
        }

        store.set_pixels_dimension_order(image, core.dimension_order)?;
        store.set_pixels_type(image, core.pixel_type)?;
        store.set_pixels_big_endian(image, !core.little_endian)?;
        store.set_pixels_interleaved(image, core.interleaved)?;
        store.set_pixels_significant_bits(image, core.bits_per_pixel)?;

        store.set_pixels_size_x(image, core.size_x)?;
        store.set_pixels_size_y(image, core.size_y)?;
        store.set_pixels_size_z(image, core.size_z)?;
        store.set_pixels_size_t(image, core.size_t)?;
        store.set_pixels_size_c(image, core.size_c_total())?;

        for &samples in &core.size_c {
            let channel = store.add_channel(image)?;
            store.set_channel_samples_per_pixel(image, channel, samples)?;
        }
    }

    Ok(())
}

/// Check every image's channel layout against its sample count,
/// optionally repairing correctable inconsistencies in the store.
///
/// Returns whether the model was valid on entry. An uncorrectable
/// layout fails only when a correction was requested; without one the
/// verdict is simply `false`.
pub fn validate_model(store: &mut OmeXml, correct: bool) -> Result<bool> {
    let mut valid = true;

    for image in 0 .. store.image_count() {
        let image_valid = image_layout_valid(store, image)?;
        valid = valid && image_valid;

        if !image_valid && correct {
            correct_image_layout(store, image)?;
            debug_assert!(image_layout_valid(store, image)?, "correction must converge");
        }
    }

    Ok(valid)
}

/// A layout is valid when there is at least one channel, every channel
/// declares at least one sample, and the samples sum to the image total.
fn image_layout_valid(store: &OmeXml, image: usize) -> Result<bool> {
    let size_c = store.pixels_size_c(image)?;
    let channel_count = store.channel_count(image)?;

    if channel_count == 0 {
        return Ok(false);
    }

    let mut sum = 0;

    for channel in 0 .. channel_count {
        match store.channel_samples_per_pixel(image, channel)? {
            Some(samples) if samples >= 1 => sum += samples,
            _ => return Ok(false),
        }
    }

    Ok(sum == size_c)
}

fn correct_image_layout(store: &mut OmeXml, image: usize) -> UnitResult {
    let size_c = store.pixels_size_c(image)?;
    let channel_count = store.channel_count(image)?;

    if size_c == 0 {
        return Err(Error::format(format!(
            "image {}: no samples declared", image)));
    }

    // No channels at all: synthesise one single-sample channel per sample.
    if channel_count == 0 {
        for _ in 0 .. size_c {
            let channel = store.add_channel(image)?;
            store.set_channel_samples_per_pixel(image, channel, 1)?;
        }

        return Ok(());
    }

    let samples: Vec<Option<usize>> = (0 .. channel_count)
        .map(|channel| store.channel_samples_per_pixel(image, channel))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .map(|samples| samples.filter(|&count| count >= 1))
        .collect();

    let known: usize = samples.iter().flatten().sum();
    let unset = samples.iter().filter(|samples| samples.is_none()).count();

    if unset == 0 {
        // Every channel is declared; trust the channels over the total.
        return store.set_pixels_size_c(image, known);
    }

    // Distribute the remaining samples evenly over the undeclared
    // channels. An uneven remainder cannot be reconciled.
    let remaining = size_c.checked_sub(known)
        .filter(|&remaining| remaining > 0 && remaining % unset == 0)
        .ok_or_else(|| Error::format(format!(
            "image {}: {} channel samples cannot be distributed over {} channels",
            image, size_c, channel_count)))?;

    let each = remaining / unset;

    for channel in 0 .. channel_count {
        if samples[channel].is_none() {
            store.set_channel_samples_per_pixel(image, channel, each)?;
        }
    }

    Ok(())
}

/// Record the sub-resolution pyramid of an image as a map annotation in
/// the resolution namespace, one key per level, linked to the image.
pub fn add_resolutions(store: &mut OmeXml, image: usize, levels: &[Resolution]) -> UnitResult {
    if levels.is_empty() {
        return Ok(());
    }

    let pairs = levels.iter().enumerate()
        .map(|(level, [x, y, z])| (level.to_string(), format!("{} {} {}", x, y, z)))
        .collect();

    let id = store.add_map_annotation(RESOLUTION_NAMESPACE, pairs);
    store.link_image_annotation(image, &id)
}

/// Read the sub-resolution pyramid of an image back from its
/// annotation. An image without one has a single full resolution
/// and yields an empty list.
pub fn get_resolutions(store: &OmeXml, image: usize) -> Result<Vec<Resolution>> {
    let annotations = store.image_annotations(image, RESOLUTION_NAMESPACE)?;

    let annotation = match annotations.first() {
        Some(annotation) => annotation,
        None => return Ok(Vec::new()),
    };

    let mut levels: Vec<(usize, Resolution)> = annotation.pairs.iter()
        .map(|(key, value)| {
            let level: usize = key.parse().map_err(|_| Error::format(
                format!("invalid resolution level key {:?}", key)))?;

            let sizes: SmallVec<[usize; 3]> = value.split_whitespace()
                .map(|size| size.parse().map_err(|_| Error::format(
                    format!("invalid resolution size {:?}", value))))
                .collect::<Result<_>>()?;

            match sizes.as_slice() {
                &[x, y, z] => Ok((level, [x, y, z])),
                _ => Err(Error::format(format!("invalid resolution value {:?}", value))),
            }
        })
        .collect::<Result<_>>()?;

    levels.sort_by_key(|&(level, _)| level);
    Ok(levels.into_iter().map(|(_, resolution)| resolution).collect())
}

/// Remove the resolution annotations of one image, or of every image.
pub fn remove_resolutions(store: &mut OmeXml, image: Option<usize>) -> UnitResult {
    let images = match image {
        Some(image) => vec![image],
        None => (0 .. store.image_count()).collect(),
    };

    for image in images {
        let ids: Vec<String> = store.image_annotations(image, RESOLUTION_NAMESPACE)?
            .into_iter()
            .map(|annotation| annotation.id.clone())
            .collect();

        for id in ids {
            store.unlink_image_annotation(image, &id)?;
            store.remove_map_annotation(&id);
        }
    }

    Ok(())
}

/// The number of significant pixel payload bytes the store describes,
/// across all images. Used to select BigTIFF before writing.
pub fn significant_pixel_size(store: &OmeXml) -> u64 {
    (0 .. store.image_count())
        .map(|image| {
            let pixels = (store.pixels_size_x(image).unwrap_or(0)
                * store.pixels_size_y(image).unwrap_or(0)
                * store.pixels_size_z(image).unwrap_or(0)
                * store.pixels_size_t(image).unwrap_or(0)
                * store.pixels_size_c(image).unwrap_or(0)) as u64;

            let bits = store.pixels_significant_bits(image).ok().flatten()
                .unwrap_or_else(|| store.pixels_type(image)
                    .map(|pixel_type| pixel_type.bit_size())
                    .unwrap_or(8));

            pixels * (bits as u64).div_ceil(8)
        })
        .sum()
}
