use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use tracing::{debug, warn};

use crate::binarize::{adaptive_threshold_inv, to_grayscale};
use crate::config::{MarkerConfig, MarkerPolicy};
use crate::error::{MeasureError, Result};
use crate::geometry::{
    centroid, closed_perimeter, contains_point, from_contour_point, homography, is_convex,
    order_clockwise, transform_point, Point,
};

/// Cells per side including the one-cell black border
const GRID: usize = 7;
/// Data cells per side
const BITS: usize = 5;

/// A located square fiducial
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDetection {
    /// Clockwise on screen, starting at the marker's top-left
    pub corners: [Point; 4],
    /// Index into the configured codebook, if one was used
    pub id: Option<usize>,
    /// Decoded 25-bit payload in canonical orientation
    pub payload: u32,
}

impl MarkerDetection {
    /// Closed perimeter of the marker quad in pixels
    pub fn perimeter(&self) -> f64 {
        closed_perimeter(&self.corners)
    }
}

/// Finds fiducial markers in a photo
pub trait MarkerLocator {
    /// All markers of the configured family, in discovery order
    fn locate(&self, img: &RgbImage) -> Vec<MarkerDetection>;
}

/// Detector for square binary markers with a 5x5 payload inside a black border
#[derive(Debug, Clone, Default)]
pub struct SquareMarkerLocator {
    config: MarkerConfig,
}

impl SquareMarkerLocator {
    pub fn new(config: MarkerConfig) -> Self {
        Self { config }
    }

    /// Quads that could be markers, before decoding
    fn candidate_quads(&self, gray: &GrayImage) -> Vec<[Point; 4]> {
        let mask = adaptive_threshold_inv(gray, self.config.block_size, self.config.offset);
        let min_points = self.config.min_perimeter_rate * gray.width().max(gray.height()) as f64;

        let mut quads = Vec::new();
        for contour in find_contours::<i32>(&mask) {
            if !matches!(contour.border_type, BorderType::Outer)
                || (contour.points.len() as f64) < min_points
            {
                continue;
            }

            let epsilon = self.config.approx_accuracy_rate * arc_length(&contour.points, true);
            if epsilon <= 0.0 {
                continue;
            }
            let approx: Vec<Point> = approximate_polygon_dp(&contour.points, epsilon, true)
                .iter()
                .map(from_contour_point)
                .collect();
            if approx.len() != 4 || !is_convex(&approx) {
                continue;
            }

            let quad = order_clockwise([approx[0], approx[1], approx[2], approx[3]]);
            let shortest = (0..4)
                .map(|i| nalgebra::distance(&quad[i], &quad[(i + 1) % 4]))
                .fold(f64::INFINITY, f64::min);
            if shortest < self.config.min_side_px {
                continue;
            }

            quads.push(quad);
        }
        quads
    }

    /// Read the 7x7 cell grid (true = white) through the quad's perspective
    fn read_cells(&self, gray: &GrayImage, quad: &[Point; 4]) -> Option<[[bool; GRID]; GRID]> {
        let g = GRID as f64;
        let unit = [
            Point::new(0.0, 0.0),
            Point::new(g, 0.0),
            Point::new(g, g),
            Point::new(0.0, g),
        ];
        let h = homography(&unit, quad)?;

        let (w, hgt) = (gray.width() as f64, gray.height() as f64);
        let mut means = [[0.0f64; GRID]; GRID];
        for (r, row) in means.iter_mut().enumerate() {
            for (c, mean) in row.iter_mut().enumerate() {
                let mut sum = 0.0;
                let mut n = 0.0;
                for dy in [-0.25, 0.0, 0.25] {
                    for dx in [-0.25, 0.0, 0.25] {
                        let (x, y) = transform_point(&h, c as f64 + 0.5 + dx, r as f64 + 0.5 + dy);
                        let px = x.round().clamp(0.0, w - 1.0) as u32;
                        let py = y.round().clamp(0.0, hgt - 1.0) as u32;
                        sum += gray.get_pixel(px, py)[0] as f64;
                        n += 1.0;
                    }
                }
                *mean = sum / n;
            }
        }

        let (lo, hi) = means
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| (lo.min(m), hi.max(m)));
        if hi - lo < self.config.min_cell_contrast {
            return None;
        }
        let mid = (lo + hi) / 2.0;

        let mut cells = [[false; GRID]; GRID];
        for r in 0..GRID {
            for c in 0..GRID {
                cells[r][c] = means[r][c] > mid;
            }
        }
        Some(cells)
    }

    /// Validate border and payload; returns the detection in canonical orientation
    fn decode(&self, quad: [Point; 4], cells: &[[bool; GRID]; GRID]) -> Option<MarkerDetection> {
        let border_cells = 4 * (GRID - 1);
        let white_border = (0..GRID)
            .flat_map(|r| (0..GRID).map(move |c| (r, c)))
            .filter(|&(r, c)| r == 0 || c == 0 || r == GRID - 1 || c == GRID - 1)
            .filter(|&(r, c)| cells[r][c])
            .count();
        if white_border as f64 > self.config.max_border_error_rate * border_cells as f64 {
            return None;
        }

        let mut grid = [[false; BITS]; BITS];
        for r in 0..BITS {
            for c in 0..BITS {
                grid[r][c] = cells[r + 1][c + 1];
            }
        }

        if self.config.codebook.is_empty() {
            let payload = pack(&grid);
            if payload == 0
                || payload == (1 << (BITS * BITS)) - 1
                || rotation_distance(&grid) < self.config.min_rotation_distance
            {
                return None;
            }
            return Some(MarkerDetection {
                corners: quad,
                id: None,
                payload,
            });
        }

        for turns in 0..4 {
            let payload = pack(&grid);
            let matched = self
                .config
                .codebook
                .iter()
                .position(|&code| (code ^ payload).count_ones() <= self.config.max_hamming);
            if let Some(id) = matched {
                let mut corners = quad;
                corners.rotate_left(turns);
                return Some(MarkerDetection {
                    corners,
                    id: Some(id),
                    payload: self.config.codebook[id],
                });
            }
            grid = rotate_ccw(&grid);
        }
        None
    }
}

impl MarkerLocator for SquareMarkerLocator {
    fn locate(&self, img: &RgbImage) -> Vec<MarkerDetection> {
        let gray = to_grayscale(img);
        let quads = self.candidate_quads(&gray);
        debug!("Marker candidates: {}", quads.len());

        let mut found: Vec<MarkerDetection> = Vec::new();
        for quad in quads {
            let center = centroid(&quad);
            if found.iter().any(|m| contains_point(&m.corners, &center)) {
                continue;
            }
            let Some(cells) = self.read_cells(&gray, &quad) else {
                continue;
            };
            if let Some(detection) = self.decode(quad, &cells) {
                debug!(
                    "Marker {:?} at ({:.1}, {:.1}), perimeter {:.1}px",
                    detection.id,
                    center.x,
                    center.y,
                    detection.perimeter()
                );
                found.push(detection);
            }
        }
        found
    }
}

/// Row-major, most significant bit first
fn pack(grid: &[[bool; BITS]; BITS]) -> u32 {
    grid.iter()
        .flatten()
        .fold(0u32, |acc, &bit| (acc << 1) | bit as u32)
}

fn rotate_ccw(grid: &[[bool; BITS]; BITS]) -> [[bool; BITS]; BITS] {
    let mut out = [[false; BITS]; BITS];
    for r in 0..BITS {
        for c in 0..BITS {
            out[r][c] = grid[c][BITS - 1 - r];
        }
    }
    out
}

/// Fewest bits by which the payload differs from its own quarter turns
fn rotation_distance(grid: &[[bool; BITS]; BITS]) -> u32 {
    let payload = pack(grid);
    let mut turned = *grid;
    (0..3)
        .map(|_| {
            turned = rotate_ccw(&turned);
            (pack(&turned) ^ payload).count_ones()
        })
        .min()
        .unwrap_or(0)
}

/// Reduce detections to the single marker used for calibration
pub fn select_marker(
    mut detections: Vec<MarkerDetection>,
    policy: MarkerPolicy,
) -> Result<MarkerDetection> {
    match (detections.len(), policy) {
        (0, _) => Err(MeasureError::MarkerNotFound),
        (1, _) => Ok(detections.remove(0)),
        (count, MarkerPolicy::RequireSingle) => Err(MeasureError::AmbiguousMarker { count }),
        (count, MarkerPolicy::First) => {
            warn!("Found {} markers, using the first one", count);
            Ok(detections.remove(0))
        }
    }
}
