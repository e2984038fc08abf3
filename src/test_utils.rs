//! Synthetic scenes for unit tests: a light, uniform background with a
//! square 5x5 fiducial and dark rectangular objects.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::geometry::{homography, transform_point, Point};

pub(crate) const BACKGROUND: Rgb<u8> = Rgb([235, 235, 235]);
pub(crate) const INK: Rgb<u8> = Rgb([15, 15, 15]);
pub(crate) const PAPER: Rgb<u8> = Rgb([245, 245, 245]);
pub(crate) const OBJECT: Rgb<u8> = Rgb([50, 45, 70]);

/// Payload that looks different under each quarter turn
pub(crate) const TEST_PAYLOAD: u32 = 0b10110_01100_11010_00111_10001;

pub(crate) fn blank_scene(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, BACKGROUND)
}

/// 7x7 cell grid (true = white) of a marker turned clockwise `quarter_turns` times
pub(crate) fn marker_grid(payload: u32, quarter_turns: u8) -> [[bool; 7]; 7] {
    let mut grid = [[false; 7]; 7];
    for r in 0..5 {
        for c in 0..5 {
            let bit = 24 - (r * 5 + c);
            grid[r + 1][c + 1] = (payload >> bit) & 1 == 1;
        }
    }
    for _ in 0..quarter_turns % 4 {
        let mut turned = [[false; 7]; 7];
        for r in 0..7 {
            for c in 0..7 {
                turned[r][c] = grid[6 - c][r];
            }
        }
        grid = turned;
    }
    grid
}

/// Paint a marker with its top-left corner at (x, y); side is 7 * cell pixels
pub(crate) fn draw_marker(
    img: &mut RgbImage,
    x: i32,
    y: i32,
    cell: u32,
    payload: u32,
    quarter_turns: u8,
) {
    let grid = marker_grid(payload, quarter_turns);
    for (r, row) in grid.iter().enumerate() {
        for (c, &white) in row.iter().enumerate() {
            let (cx, cy) = (x + c as i32 * cell as i32, y + r as i32 * cell as i32);
            let rect = Rect::at(cx, cy).of_size(cell, cell);
            draw_filled_rect_mut(img, rect, if white { PAPER } else { INK });
        }
    }
}

/// Paint an upright marker onto an arbitrary convex quad given as
/// top-left, top-right, bottom-right, bottom-left
pub(crate) fn draw_marker_quad(img: &mut RgbImage, quad: [Point; 4], payload: u32) {
    let grid = marker_grid(payload, 0);
    let unit = [
        Point::new(0.0, 0.0),
        Point::new(7.0, 0.0),
        Point::new(7.0, 7.0),
        Point::new(0.0, 7.0),
    ];
    let to_grid = homography(&quad, &unit).expect("non-degenerate quad");

    let (w, h) = img.dimensions();
    let x_max = quad.iter().map(|p| p.x.ceil() as u32).max().unwrap_or(0).min(w);
    let y_max = quad.iter().map(|p| p.y.ceil() as u32).max().unwrap_or(0).min(h);
    let x_min = quad.iter().map(|p| p.x.max(0.0) as u32).min().unwrap_or(0);
    let y_min = quad.iter().map(|p| p.y.max(0.0) as u32).min().unwrap_or(0);

    for y in y_min..y_max {
        for x in x_min..x_max {
            let (u, v) = transform_point(&to_grid, x as f64 + 0.5, y as f64 + 0.5);
            if (0.0..7.0).contains(&u) && (0.0..7.0).contains(&v) {
                let white = grid[v as usize][u as usize];
                img.put_pixel(x, y, if white { PAPER } else { INK });
            }
        }
    }
}

/// Paint a solid dark object
pub(crate) fn draw_object(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32) {
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(width, height), OBJECT);
}
