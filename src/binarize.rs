use image::{GrayImage, Luma, RgbImage};
use imageproc::integral_image::{integral_image, sum_image_pixels};

/// Convert an RGB photo to grayscale using BT.601 luma weights
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let luma = 0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
        gray.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }

    gray
}

/// Adaptive mean threshold with inverted output.
///
/// A pixel becomes foreground (255) when it is at least `offset` below the
/// mean of the `block_size` x `block_size` window centred on it; everything
/// else is background (0). The window is clipped at the image border.
pub fn adaptive_threshold_inv(gray: &GrayImage, block_size: u32, offset: f64) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut out = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }

    let integral = integral_image::<_, u64>(gray);
    let radius = block_size / 2;

    for y in 0..height {
        let top = y.saturating_sub(radius);
        let bottom = (y + radius).min(height - 1);
        for x in 0..width {
            let left = x.saturating_sub(radius);
            let right = (x + radius).min(width - 1);
            let count = ((right - left + 1) * (bottom - top + 1)) as f64;
            let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
            let mean = sum as f64 / count;
            if gray.get_pixel(x, y)[0] as f64 <= mean - offset {
                out.put_pixel(x, y, Luma([255]));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_grayscale_weights() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let gray = to_grayscale(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
    }

    #[test]
    fn test_uniform_image_has_no_foreground() {
        let gray = GrayImage::from_pixel(40, 40, Luma([200]));
        let mask = adaptive_threshold_inv(&gray, 19, 5.0);
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_dark_edge_becomes_foreground() {
        let mut gray = GrayImage::from_pixel(60, 60, Luma([230]));
        for y in 20..40 {
            for x in 20..40 {
                gray.put_pixel(x, y, Luma([20]));
            }
        }
        let mask = adaptive_threshold_inv(&gray, 19, 5.0);
        // Dark pixels at the boundary of the square are below the local mean
        assert_eq!(mask.get_pixel(20, 30)[0], 255);
        // Bright background next to it is not
        assert_eq!(mask.get_pixel(19, 30)[0], 0);
        // Deep inside the dark square the neighbourhood is uniformly dark
        assert_eq!(mask.get_pixel(30, 30)[0], 0);
    }

    #[test]
    fn test_offset_is_minimum_darkness_below_mean() {
        // Single pixel 10 below a flat 200 field; the 3x3 mean is 198.9
        let mut gray = GrayImage::from_pixel(9, 9, Luma([200]));
        gray.put_pixel(4, 4, Luma([190]));

        assert_eq!(adaptive_threshold_inv(&gray, 3, 5.0).get_pixel(4, 4)[0], 255);
        assert_eq!(adaptive_threshold_inv(&gray, 3, 8.8).get_pixel(4, 4)[0], 255);
        assert_eq!(adaptive_threshold_inv(&gray, 3, 9.0).get_pixel(4, 4)[0], 0);
    }
}
