use image::RgbImage;
use imageproc::contours::{find_contours, BorderType};
use tracing::debug;

use crate::binarize::{adaptive_threshold_inv, to_grayscale};
use crate::config::PipelineConfig;
use crate::geometry::{from_contour_point, polygon_area, Point};

/// A connected foreground outline large enough to be measured
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRegion {
    pub contour: Vec<Point>,
    /// Enclosed area in square pixels
    pub area: f64,
}

/// Splits a photo into candidate object regions
pub trait Segmenter {
    /// Regions in contour discovery order
    fn segment(&self, img: &RgbImage) -> Vec<CandidateRegion>;
}

/// Foreground segmentation for objects lying on a roughly uniform background
#[derive(Debug, Clone)]
pub struct AdaptiveSegmenter {
    pub block_size: u32,
    pub offset: f64,
    pub min_area: f64,
}

impl Default for AdaptiveSegmenter {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl AdaptiveSegmenter {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            block_size: config.block_size,
            offset: config.offset,
            min_area: config.min_area,
        }
    }
}

impl Segmenter for AdaptiveSegmenter {
    fn segment(&self, img: &RgbImage) -> Vec<CandidateRegion> {
        let gray = to_grayscale(img);
        let mask = adaptive_threshold_inv(&gray, self.block_size, self.offset);

        let contours = find_contours::<i32>(&mask);
        let mut discarded = 0;
        let mut regions = Vec::new();

        // Only outermost outlines; objects are not expected to nest
        for contour in contours
            .iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        {
            let points: Vec<Point> = contour.points.iter().map(from_contour_point).collect();
            let area = polygon_area(&points);
            if area >= self.min_area {
                regions.push(CandidateRegion {
                    contour: points,
                    area,
                });
            } else {
                discarded += 1;
            }
        }

        debug!(
            "Segmented {} regions ({} below {} px²)",
            regions.len(),
            discarded,
            self.min_area
        );
        regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{blank_scene, draw_object};

    #[test]
    fn test_empty_background() {
        let img = blank_scene(200, 200);
        assert!(AdaptiveSegmenter::default().segment(&img).is_empty());
    }

    #[test]
    fn test_objects_found_and_noise_discarded() {
        let mut img = blank_scene(400, 300);
        draw_object(&mut img, 40, 40, 100, 60);
        draw_object(&mut img, 200, 120, 80, 150);
        draw_object(&mut img, 300, 20, 30, 30);

        let regions = AdaptiveSegmenter::default().segment(&img);
        assert_eq!(regions.len(), 2);
        // Discovery order is raster order of each outline's first pixel
        assert!((regions[0].area - 99.0 * 59.0).abs() < 1.0);
        assert!((regions[1].area - 79.0 * 149.0).abs() < 1.0);
    }

    #[test]
    fn test_lower_threshold_never_reports_fewer_regions() {
        let mut img = blank_scene(400, 300);
        draw_object(&mut img, 40, 40, 100, 60);
        draw_object(&mut img, 300, 20, 30, 30);
        draw_object(&mut img, 200, 200, 50, 50);

        let mut previous = 0;
        for min_area in [10_000.0, 3000.0, 1500.0, 500.0, 0.0] {
            let segmenter = AdaptiveSegmenter {
                min_area,
                ..AdaptiveSegmenter::default()
            };
            let count = segmenter.segment(&img).len();
            assert!(count >= previous);
            previous = count;
        }
        assert_eq!(previous, 3);
    }

    #[test]
    fn test_nested_outline_ignored() {
        let mut img = blank_scene(300, 300);
        draw_object(&mut img, 20, 20, 260, 260);
        imageproc::drawing::draw_filled_rect_mut(
            &mut img,
            imageproc::rect::Rect::at(60, 60).of_size(180, 180),
            crate::test_utils::BACKGROUND,
        );
        draw_object(&mut img, 100, 100, 100, 100);

        let regions = AdaptiveSegmenter::default().segment(&img);
        assert_eq!(regions.len(), 1);
        assert!((regions[0].area - 259.0 * 259.0).abs() < 1.0);
    }
}
