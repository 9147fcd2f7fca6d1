use std::io::Cursor;

use candle_core::{Device, Tensor};
use image::imageops::{self, FilterType};
use image::{ImageReader, Limits, RgbImage};

use crate::config::VisionConfig;
use crate::error::ModelError;

/// Largest width or height accepted from an encoded image.
pub const MAX_SOURCE_SIDE: u32 = 16_384;
/// Longer side over shorter side kept before resizing. Only the centre
/// square survives cropping, so a wider window changes nothing.
const MAX_ASPECT: u32 = 4;

/// Image bytes to normalised `[3, size, size]` pixel data.
#[derive(Debug, Clone)]
pub struct VisionPreprocessor {
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl VisionPreprocessor {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            size: config.image_size as u32,
            mean: config.mean,
            std: config.std,
        }
    }

    /// Decode any format `image` recognises, resize the shorter side with
    /// bicubic filtering, centre-crop, and normalise channel-first.
    pub fn process(&self, bytes: &[u8]) -> Result<Vec<f32>, ModelError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(image::ImageError::IoError)?;
        let mut limits = Limits::default();
        limits.max_image_width = Some(MAX_SOURCE_SIDE);
        limits.max_image_height = Some(MAX_SOURCE_SIDE);
        reader.limits(limits);
        let rgb = reader.decode()?.to_rgb8();
        let cropped = self.resize_and_crop(&rgb)?;
        Ok(self.normalise(&cropped))
    }

    pub fn process_batch(&self, images: &[Vec<u8>], device: &Device) -> Result<Tensor, ModelError> {
        let side = self.size as usize;
        let mut flat = Vec::with_capacity(images.len() * 3 * side * side);
        for (index, bytes) in images.iter().enumerate() {
            let pixels = self
                .process(bytes)
                .map_err(|e| e.at_item(bindserve_core::Modality::Vision, index))?;
            flat.extend(pixels);
        }
        Ok(Tensor::from_vec(flat, (images.len(), 3, side, side), device)?)
    }

    fn resize_and_crop(&self, rgb: &RgbImage) -> Result<RgbImage, ModelError> {
        let (w, h) = rgb.dimensions();
        if w == 0 || h == 0 {
            return Err(ModelError::Dimension(format!("image has zero extent ({w}x{h})")));
        }
        let (x, y, w, h) = centre_window(w, h);
        let window = imageops::crop_imm(rgb, x, y, w, h).to_image();
        let (new_w, new_h) = shorter_side_to(w, h, self.size)?;
        let resized = imageops::resize(&window, new_w, new_h, FilterType::CatmullRom);
        let left = centre_offset(new_w, self.size);
        let top = centre_offset(new_h, self.size);
        Ok(imageops::crop_imm(&resized, left, top, self.size, self.size).to_image())
    }

    fn normalise(&self, img: &RgbImage) -> Vec<f32> {
        let (w, h) = img.dimensions();
        let plane = (w * h) as usize;
        let mut out = vec![0f32; 3 * plane];
        for (x, y, pixel) in img.enumerate_pixels() {
            let offset = (y * w + x) as usize;
            for c in 0..3 {
                let value = f32::from(pixel.0[c]) / 255.0;
                out[c * plane + offset] = (value - self.mean[c]) / self.std[c];
            }
        }
        out
    }
}

/// Centred `(x, y, w, h)` whose longer side is at most `MAX_ASPECT` times
/// the shorter.
fn centre_window(w: u32, h: u32) -> (u32, u32, u32, u32) {
    if w <= h {
        let keep = h.min(w.saturating_mul(MAX_ASPECT));
        (0, (h - keep) / 2, w, keep)
    } else {
        let keep = w.min(h.saturating_mul(MAX_ASPECT));
        ((w - keep) / 2, 0, keep, h)
    }
}

/// Scale so the shorter side equals `size`, truncating the longer side.
fn shorter_side_to(w: u32, h: u32, size: u32) -> Result<(u32, u32), ModelError> {
    let (short, long) = if w <= h { (w, h) } else { (h, w) };
    let scaled = u64::from(size) * u64::from(long) / u64::from(short);
    let scaled = u32::try_from(scaled)
        .map_err(|_| ModelError::Dimension(format!("{w}x{h} cannot be resized to {size}")))?
        .max(size);
    Ok(if w <= h { (size, scaled) } else { (scaled, size) })
}

fn centre_offset(extent: u32, size: u32) -> u32 {
    ((f64::from(extent) - f64::from(size)) / 2.0).round().max(0.0) as u32
}
