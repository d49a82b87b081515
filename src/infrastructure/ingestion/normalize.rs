//! Image normalization to fixed-size bit grids

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageFormat, Luma};

use crate::domain::sample::{SAMPLE_HEIGHT, SAMPLE_WIDTH};
use crate::domain::{BitGrid, DomainError};

/// Luma values above this count as paper, not ink
pub const DEFAULT_THRESHOLD: u8 = 225;

const WHITE: u8 = 255;

/// Turns drawn images into sample grids
///
/// Grayscale, crop the white margin, nearest-neighbour resize, then
/// threshold. A set bit is a white pixel.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    width: u32,
    height: u32,
    threshold: u8,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageNormalizer {
    pub fn new() -> Self {
        Self {
            width: SAMPLE_WIDTH as u32,
            height: SAMPLE_HEIGHT as u32,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// Decodes a PNG or JPEG and normalizes it
    pub fn normalize(&self, bytes: &[u8]) -> Result<BitGrid, DomainError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| DomainError::invalid_input(format!("Unsupported image: {}", e)))?;

        self.normalize_gray(&image.to_luma8())
    }

    pub fn normalize_gray(&self, gray: &GrayImage) -> Result<BitGrid, DomainError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(DomainError::invalid_input("Image has no pixels"));
        }

        let trimmed = match ink_bounds(gray) {
            Some((x, y, w, h)) => imageops::crop_imm(gray, x, y, w, h).to_image(),
            None => gray.clone(),
        };

        let resized = imageops::resize(&trimmed, self.width, self.height, FilterType::Nearest);
        let bits = resized.pixels().map(|p| p.0[0] > self.threshold).collect();

        BitGrid::from_bits(self.width as usize, self.height as usize, bits)
    }
}

/// Bounding box `(x, y, w, h)` of every non-white pixel
fn ink_bounds(gray: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel.0[0] == WHITE {
            continue;
        }

        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Renders a grid as a black-on-white PNG
pub fn encode_png(grid: &BitGrid) -> Result<Vec<u8>, DomainError> {
    let image = GrayImage::from_fn(grid.width() as u32, grid.height() as u32, |x, y| {
        match grid.get(x as usize, y as usize) {
            Some(true) => Luma([WHITE]),
            _ => Luma([0]),
        }
    });

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| DomainError::internal(format!("Failed to encode PNG: {}", e)))?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_of(image: &GrayImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_trims_margin_before_resizing() {
        // 80x40 ink block centred on a 200x100 white canvas
        let canvas = GrayImage::from_fn(200, 100, |x, y| {
            if (60..140).contains(&x) && (30..70).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        });

        let grid = ImageNormalizer::new().normalize(&png_of(&canvas)).unwrap();

        assert_eq!((grid.width(), grid.height()), (SAMPLE_WIDTH, SAMPLE_HEIGHT));
        assert_eq!(grid.count_ones(), 0);
    }

    #[test]
    fn test_threshold_splits_ink_from_paper() {
        // left half light grey (paper), right half dark (ink)
        let image = GrayImage::from_fn(40, 20, |x, _| if x < 20 { Luma([230]) } else { Luma([10]) });
        let grid = ImageNormalizer::new().normalize_gray(&image).unwrap();

        assert_eq!(grid.get(0, 0), Some(true));
        assert_eq!(grid.get(39, 19), Some(false));
        assert_eq!(grid.count_ones(), 20 * 20);
    }

    #[test]
    fn test_blank_image_is_kept_whole() {
        let image = GrayImage::from_pixel(120, 60, Luma([255]));
        let grid = ImageNormalizer::new().normalize_gray(&image).unwrap();
        assert_eq!(grid.count_ones(), SAMPLE_WIDTH * SAMPLE_HEIGHT);
    }

    #[test]
    fn test_rejects_non_image_bytes() {
        let result = ImageNormalizer::new().normalize(b"definitely not an image");
        assert!(matches!(result, Err(DomainError::InvalidInput { .. })));
    }

    #[test]
    fn test_png_round_trip_preserves_grid() {
        let mut grid = BitGrid::sample();
        for x in 0..SAMPLE_WIDTH {
            for y in 0..SAMPLE_HEIGHT {
                grid.set(x, y, (x + y) % 3 == 0);
            }
        }
        // a full-bleed grid has ink touching every edge, so trimming is a no-op
        grid.set(0, 0, false);
        grid.set(SAMPLE_WIDTH - 1, SAMPLE_HEIGHT - 1, false);

        let png = encode_png(&grid).unwrap();
        let decoded = ImageNormalizer::new().normalize(&png).unwrap();
        assert_eq!(decoded, grid);
    }
}
