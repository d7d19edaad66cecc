// SPDX-License-Identifier: Apache-2.0
//
// Region segmentation — crops the passport photo and MRZ strip out of a
// captured frame and prepares each for its downstream consumer.
//
// The crops assume a roughly framed passport data page: the portrait sits in
// the top portion and the machine-readable zone occupies the bottom strip.
// The MRZ crop gets an OCR-oriented enhancement pass (grayscale, contrast,
// blur, adaptive binarization); the photo crop only a mild contrast boost so
// the face encoder keeps its tonal information.

use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, instrument, warn};
use veriport_core::config::RegionConfig;
use veriport_core::error::{Result, VeriportError};
use veriport_core::types::RawFrame;

/// The two regions of interest cut from a document frame.
#[derive(Debug, Clone)]
pub struct DocumentRegions {
    /// Portrait crop, mildly contrast-boosted.
    pub photo: DynamicImage,
    /// MRZ strip, binarized for OCR. Falls back to the plain crop when
    /// enhancement is not possible (degenerate dimensions).
    pub mrz: DynamicImage,
}

/// Cuts and enhances document regions according to a [`RegionConfig`].
#[derive(Debug, Clone)]
pub struct RegionPreprocessor {
    config: RegionConfig,
}

impl RegionPreprocessor {
    pub fn new(config: RegionConfig) -> Self {
        Self { config }
    }

    /// Segment a frame into its photo and MRZ regions.
    ///
    /// The photo region is the top `photo_fraction` of the frame, the MRZ
    /// region the bottom `mrz_fraction`. Both fractions are clamped so that
    /// each crop is at least one pixel tall.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn segment(&self, frame: &RawFrame) -> Result<DocumentRegions> {
        let image = frame_to_image(frame)?;
        let (width, height) = (frame.width, frame.height);

        let photo_height = fraction_of(height, self.config.photo_fraction);
        let mrz_height = fraction_of(height, self.config.mrz_fraction);

        let photo_crop = image.crop_imm(0, 0, width, photo_height);
        let mrz_crop = image.crop_imm(0, height - mrz_height, width, mrz_height);

        debug!(photo_height, mrz_height, "segmented document regions");

        let photo = photo_crop.adjust_contrast(1.1);
        let mrz = match enhance_mrz(&mrz_crop) {
            Some(enhanced) => enhanced,
            None => {
                warn!("MRZ enhancement skipped, using plain crop");
                mrz_crop
            }
        };

        Ok(DocumentRegions { photo, mrz })
    }
}

/// Convert a raw RGBA frame into a [`DynamicImage`].
pub fn frame_to_image(frame: &RawFrame) -> Result<DynamicImage> {
    let buffer = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
        .ok_or_else(|| {
            VeriportError::Image(format!(
                "frame buffer does not match {}x{} RGBA dimensions",
                frame.width, frame.height
            ))
        })?;
    Ok(DynamicImage::ImageRgba8(buffer))
}

/// Clamp a fractional crop height into [1, height].
fn fraction_of(height: u32, fraction: f32) -> u32 {
    ((height as f32 * fraction) as u32).clamp(1, height)
}

/// OCR-oriented enhancement of the MRZ strip.
///
/// Grayscale, contrast boost (factor 1.4), light Gaussian blur to suppress
/// sensor noise, then local-mean adaptive binarization. Returns `None` when
/// the crop is too small to binarize meaningfully.
fn enhance_mrz(crop: &DynamicImage) -> Option<DynamicImage> {
    let (width, height) = (crop.width(), crop.height());
    if width < 8 || height < 8 {
        return None;
    }

    let gray = crop.adjust_contrast(1.4).to_luma8();
    let blurred = gaussian_blur_f32(&gray, 0.8);
    let binary = binarize_adaptive(&blurred, 15, 10);
    Some(DynamicImage::ImageLuma8(binary))
}

/// Local-mean adaptive binarization.
///
/// For each pixel the threshold is the mean intensity of a square
/// neighbourhood of `block_radius`, minus the constant `c`. An integral
/// image keeps the local mean O(1) per pixel.
fn binarize_adaptive(gray: &GrayImage, block_radius: u32, c: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let integral = compute_integral_image(gray);

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let local_mean = region_mean(&integral, width, height, x, y, block_radius);
            let threshold = (local_mean as i32 - c).clamp(0, 255) as u8;
            let value = gray.get_pixel(x, y).0[0];
            let binary = if value < threshold { 0u8 } else { 255u8 };
            output.put_pixel(x, y, Luma([binary]));
        }
    }
    output
}

/// Compute the integral (summed-area table) of a grayscale image.
///
/// `integral[y * (width+1) + x]` holds the sum of all pixel values in the
/// rectangle from the origin to (x, y), exclusive on both axes. The table is
/// `(width+1) x (height+1)` with a zero-padded border.
fn compute_integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            row_sum += gray.get_pixel(x, y).0[0] as u64;
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Mean pixel value in a square region centred on (cx, cy), clamped to the
/// image bounds, via the precomputed integral image.
fn region_mean(
    integral: &[u64],
    img_width: u32,
    img_height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f64 {
    let stride = (img_width + 1) as usize;

    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1) as usize).min(img_width as usize);
    let y2 = ((cy + radius + 1) as usize).min(img_height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    if area == 0.0 {
        return 128.0;
    }

    let sum = integral[y2 * stride + x2] as f64
        - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;

    sum / area
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> RawFrame {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = ((x + y) % 256) as u8;
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        RawFrame::new(width, height, rgba).unwrap()
    }

    #[test]
    fn segment_produces_expected_geometry() {
        let frame = gradient_frame(640, 480);
        let pre = RegionPreprocessor::new(RegionConfig::default());
        let regions = pre.segment(&frame).unwrap();

        // 40% of 480 for the photo, bottom 30% for the MRZ.
        assert_eq!(regions.photo.width(), 640);
        assert_eq!(regions.photo.height(), 192);
        assert_eq!(regions.mrz.width(), 640);
        assert_eq!(regions.mrz.height(), 144);
    }

    #[test]
    fn mrz_region_is_binarized() {
        let frame = gradient_frame(320, 240);
        let pre = RegionPreprocessor::new(RegionConfig::default());
        let regions = pre.segment(&frame).unwrap();

        let luma = regions.mrz.to_luma8();
        assert!(luma.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn tiny_frame_falls_back_to_plain_crop() {
        let frame = gradient_frame(6, 6);
        let pre = RegionPreprocessor::new(RegionConfig::default());
        let regions = pre.segment(&frame).unwrap();
        // Bottom-30% crop of a 6px frame is 1px tall, too small to binarize.
        assert_eq!(regions.mrz.height(), 1);
        assert!(
            regions
                .mrz
                .to_luma8()
                .pixels()
                .any(|p| p.0[0] != 0 && p.0[0] != 255)
        );
    }

    #[test]
    fn segmentation_is_pure() {
        let frame = gradient_frame(320, 240);
        let pre = RegionPreprocessor::new(RegionConfig::default());
        let a = pre.segment(&frame).unwrap();
        let b = pre.segment(&frame).unwrap();
        assert_eq!(a.mrz.to_luma8().as_raw(), b.mrz.to_luma8().as_raw());
        assert_eq!(a.photo.to_rgba8().as_raw(), b.photo.to_rgba8().as_raw());
    }
}
