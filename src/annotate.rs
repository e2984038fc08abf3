use std::path::Path;

use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};
use tracing::{debug, info, warn};

use crate::config::AnnotationConfig;
use crate::geometry::Point;
use crate::measurement::{BoundingBox, Measurement};

const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const CENTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 200, 100]);

const MARKER_THICKNESS: i32 = 5;
const BOX_THICKNESS: i32 = 2;
const CENTER_RADIUS: i32 = 5;
/// Label anchor offsets from an object's center
const LABEL_DX: i32 = -100;
const WIDTH_LABEL_DY: i32 = -20;
const HEIGHT_LABEL_DY: i32 = 15;

const SYSTEM_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A text label anchored at its baseline-left point
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub x: i32,
    pub y: i32,
    pub text: String,
}

/// Everything drawn on the output image, in pixel coordinates
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationLayout {
    pub marker_outline: Vec<Point>,
    pub boxes: Vec<[Point; 4]>,
    pub centers: Vec<(i32, i32)>,
    pub labels: Vec<Label>,
}

/// Format a length the way labels show it
pub fn format_cm(value: f64) -> String {
    format!("{:.1} cm", value)
}

/// Compute what to draw for the marker and every measured object
pub fn layout(marker: &[Point], objects: &[(BoundingBox, Measurement)]) -> AnnotationLayout {
    let mut out = AnnotationLayout {
        marker_outline: marker.to_vec(),
        ..AnnotationLayout::default()
    };

    for (bbox, m) in objects {
        let (cx, cy) = (bbox.center.x as i32, bbox.center.y as i32);
        out.boxes.push(bbox.corners());
        out.centers.push((cx, cy));
        out.labels.push(Label {
            x: cx + LABEL_DX,
            y: cy + WIDTH_LABEL_DY,
            text: format!("Width {}", format_cm(m.width_cm)),
        });
        out.labels.push(Label {
            x: cx + LABEL_DX,
            y: cy + HEIGHT_LABEL_DY,
            text: format!("Height {}", format_cm(m.height_cm)),
        });
    }

    out
}

/// Draw a closed polygon with lines `thickness` pixels wide
fn draw_closed_polygon(img: &mut RgbImage, points: &[Point], thickness: i32, color: Rgb<u8>) {
    let n = points.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        draw_thick_segment(img, points[i], points[(i + 1) % n], thickness, color);
    }
}

fn draw_thick_segment(img: &mut RgbImage, a: Point, b: Point, thickness: i32, color: Rgb<u8>) {
    let dir = b - a;
    let len = dir.norm();
    let normal = if len > f64::EPSILON {
        nalgebra::Vector2::new(-dir.y / len, dir.x / len)
    } else {
        nalgebra::Vector2::new(0.0, 0.0)
    };

    let half = (thickness - 1) as f64 / 2.0;
    let mut offset = -half;
    while offset <= half + 1e-9 {
        let (pa, pb) = (a + normal * offset, b + normal * offset);
        draw_line_segment_mut(img, (pa.x as f32, pa.y as f32), (pb.x as f32, pb.y as f32), color);
        offset += 0.5;
    }
}

/// Renders measurement overlays onto a copy of the photo
pub struct Annotator {
    /// Labels are skipped when no font could be loaded
    font: Option<FontVec>,
    font_scale: f32,
}

impl Annotator {
    pub fn new(font: Option<FontVec>, font_scale: f32) -> Self {
        Self { font, font_scale }
    }

    /// Load the configured font, falling back to common system fonts
    pub fn from_config(config: &AnnotationConfig) -> Self {
        let font = match &config.font_path {
            Some(path) => {
                let font = load_font(path);
                if font.is_none() {
                    warn!("Could not load font {:?}, labels will be skipped", path);
                }
                font
            }
            None => system_font(),
        };
        Self::new(font, config.font_scale)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw the layout on a copy of `img`
    pub fn render(&self, img: &RgbImage, layout: &AnnotationLayout) -> RgbImage {
        let mut canvas = img.clone();

        draw_closed_polygon(&mut canvas, &layout.marker_outline, MARKER_THICKNESS, MARKER_COLOR);

        for corners in &layout.boxes {
            draw_closed_polygon(&mut canvas, corners, BOX_THICKNESS, BOX_COLOR);
        }
        for &center in &layout.centers {
            draw_filled_circle_mut(&mut canvas, center, CENTER_RADIUS, CENTER_COLOR);
        }

        if let Some(font) = &self.font {
            // draw_text_mut anchors at the top-left; labels are anchored at the baseline
            let rise = self.font_scale.round() as i32;
            for label in &layout.labels {
                draw_text_mut(
                    &mut canvas,
                    TEXT_COLOR,
                    label.x,
                    label.y - rise,
                    self.font_scale,
                    font,
                    &label.text,
                );
            }
        }

        canvas
    }
}

fn load_font(path: &Path) -> Option<FontVec> {
    let data = std::fs::read(path).ok()?;
    FontVec::try_from_vec(data).ok()
}

fn system_font() -> Option<FontVec> {
    for path in SYSTEM_FONTS {
        if let Some(font) = load_font(Path::new(path)) {
            info!("Loaded system font: {}", path);
            return Some(font);
        }
    }
    debug!("No system font found, labels will be skipped");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_objects() -> Vec<(BoundingBox, Measurement)> {
        vec![(
            BoundingBox {
                center: Point::new(150.0, 120.0),
                width: 60.0,
                height: 40.0,
                angle: 0.0,
            },
            Measurement {
                width_cm: 3.04,
                height_cm: 12.96,
            },
        )]
    }

    fn marker() -> Vec<Point> {
        vec![
            Point::new(20.0, 20.0),
            Point::new(60.0, 20.0),
            Point::new(60.0, 60.0),
            Point::new(20.0, 60.0),
        ]
    }

    #[test]
    fn test_label_text_and_offsets() {
        let layout = layout(&marker(), &sample_objects());
        assert_eq!(layout.centers, vec![(150, 120)]);
        assert_eq!(
            layout.labels,
            vec![
                Label {
                    x: 50,
                    y: 100,
                    text: "Width 3.0 cm".to_string(),
                },
                Label {
                    x: 50,
                    y: 135,
                    text: "Height 13.0 cm".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_render_leaves_input_untouched() {
        let img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        let annotator = Annotator::new(None, 26.0);
        let out = annotator.render(&img, &layout(&marker(), &sample_objects()));

        assert!(img.pixels().all(|p| *p == Rgb([255, 255, 255])));
        assert_eq!(*out.get_pixel(40, 20), MARKER_COLOR);
        assert_eq!(*out.get_pixel(150, 120), CENTER_COLOR);
        // Left edge of the object box
        assert_eq!(*out.get_pixel(120, 130), BOX_COLOR);
    }

    #[test]
    fn test_missing_font_path_skips_labels() {
        let config = AnnotationConfig {
            font_path: Some("/nonexistent/font.ttf".into()),
            font_scale: 26.0,
        };
        assert!(!Annotator::from_config(&config).has_font());
    }
}
