//! Raster primitives over an RGB image
//!
//! Coordinates are signed so callers can pass shapes that hang off the
//! canvas; everything is clipped here.

use image::RgbImage;

use crate::color::Color;

/// Blend one pixel; out-of-bounds coordinates are ignored
pub fn blend_pixel(image: &mut RgbImage, x: i64, y: i64, color: Color, alpha: f64) {
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return;
    };
    if x >= image.width() || y >= image.height() {
        return;
    }

    let pixel = image.get_pixel_mut(x, y);
    let blended = if alpha >= 1.0 {
        color
    } else {
        color.over(Color::from_pixel(*pixel), alpha)
    };
    *pixel = blended.to_pixel();
}

/// Fill the half-open rectangle `[x0, x1) × [y0, y1)`
pub fn fill_rect(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Color, alpha: f64) {
    let (x0, x1) = clip_span(x0.min(x1), x0.max(x1), image.width());
    let (y0, y1) = clip_span(y0.min(y1), y0.max(y1), image.height());

    for y in y0..y1 {
        for x in x0..x1 {
            blend_pixel(image, x, y, color, alpha);
        }
    }
}

fn clip_span(start: i64, end: i64, limit: u32) -> (i64, i64) {
    let limit = i64::from(limit);
    (start.clamp(0, limit), end.clamp(0, limit))
}

/// Bresenham line with a square pen of `thickness` pixels
pub fn draw_line(
    image: &mut RgbImage,
    (x0, y0): (i64, i64),
    (x1, y1): (i64, i64),
    color: Color,
    thickness: u32,
) {
    let pen = i64::from(thickness.max(1));
    let offset = (pen - 1) / 2;

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        fill_rect(image, x - offset, y - offset, x - offset + pen, y - offset + pen, color, 1.0);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Horizontal dashed line from `x0` to `x1` (inclusive) at row `y`
pub fn draw_dashed_hline(image: &mut RgbImage, x0: i64, x1: i64, y: i64, color: Color, dash: i64, gap: i64) {
    let period = (dash + gap).max(1);
    for x in x0.min(x1)..=x0.max(x1) {
        if (x - x0.min(x1)) % period < dash {
            fill_rect(image, x, y, x + 1, y + 2, color, 1.0);
        }
    }
}

/// Filled disc of radius `r` centred on `(cx, cy)`
pub fn fill_circle(image: &mut RgbImage, cx: i64, cy: i64, r: i64, color: Color) {
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                blend_pixel(image, cx + dx, cy + dy, color, 1.0);
            }
        }
    }
}
