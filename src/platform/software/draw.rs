// hostgl/src/platform/software/draw.rs
//
//! CPU pixel routines for the software backend. Storage is always RGBA8.

use crate::color_buffer::bytes_per_pixel;
use crate::Error;

use euclid::default::{Rect, Size2D};

pub(crate) const CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];

/// Copies `rect` of an RGBA image out as tightly packed pixels in `format`.
pub(crate) fn read_rect(
    src: &[u8],
    src_size: Size2D<i32>,
    rect: Rect<i32>,
    format: u32,
    ty: u32,
    out: &mut [u8],
) -> Result<(), Error> {
    let bpp = bytes_per_pixel(format, ty)?;
    let mut dst = 0;
    for y in rect.min_y()..rect.max_y() {
        for x in rect.min_x()..rect.max_x() {
            let pixel = &src[pixel_offset(src_size, x, y)..][..4];
            out[dst..dst + bpp].copy_from_slice(&pixel[..bpp]);
            dst += bpp;
        }
    }
    Ok(())
}

/// Writes tightly packed pixels in `format` into `rect` of an RGBA image.
pub(crate) fn write_rect(
    dst: &mut [u8],
    dst_size: Size2D<i32>,
    rect: Rect<i32>,
    format: u32,
    ty: u32,
    pixels: &[u8],
) -> Result<(), Error> {
    let bpp = bytes_per_pixel(format, ty)?;
    let mut src = 0;
    for y in rect.min_y()..rect.max_y() {
        for x in rect.min_x()..rect.max_x() {
            let offset = pixel_offset(dst_size, x, y);
            let pixel = &mut dst[offset..offset + 4];
            pixel[..bpp].copy_from_slice(&pixels[src..src + bpp]);
            if bpp == 3 {
                pixel[3] = 255;
            }
            src += bpp;
        }
    }
    Ok(())
}

/// Copies the overlapping top-left region of one RGBA image into another.
pub(crate) fn copy_overlap(
    src: &[u8],
    src_size: Size2D<i32>,
    dst: &mut [u8],
    dst_size: Size2D<i32>,
) {
    let width = src_size.width.min(dst_size.width) as usize * 4;
    let height = src_size.height.min(dst_size.height);
    for y in 0..height {
        let from = pixel_offset(src_size, 0, y);
        let to = pixel_offset(dst_size, 0, y);
        dst[to..to + width].copy_from_slice(&src[from..from + width]);
    }
}

/// Draws `src` stretched over `viewport` of `dst`, rotated by `rotation` degrees
/// counter-clockwise about the viewport center. Nearest-neighbor sampling.
pub(crate) fn draw_rotated(
    src: &[u8],
    src_size: Size2D<i32>,
    dst: &mut [u8],
    dst_size: Size2D<i32>,
    viewport: Rect<i32>,
    rotation: f32,
) {
    let radians = (rotation as f64).to_radians();
    let snap = |value: f64| if value.abs() < 1e-9 { 0.0 } else { value };
    let (sin, cos) = (snap(radians.sin()), snap(radians.cos()));

    let bounds = Rect::from_size(dst_size);
    let target = match bounds.intersection(&viewport) {
        Some(target) => target,
        None => return,
    };

    let (vw, vh) = (viewport.size.width as f64, viewport.size.height as f64);
    for y in target.min_y()..target.max_y() {
        for x in target.min_x()..target.max_x() {
            // Normalized device coordinates of the pixel center.
            let nx = ((x - viewport.origin.x) as f64 + 0.5) / vw * 2.0 - 1.0;
            let ny = ((y - viewport.origin.y) as f64 + 0.5) / vh * 2.0 - 1.0;
            let sx = cos * nx + sin * ny;
            let sy = -sin * nx + cos * ny;
            if !(-1.0..=1.0).contains(&sx) || !(-1.0..=1.0).contains(&sy) {
                continue;
            }

            let u = (((sx + 1.0) / 2.0) * src_size.width as f64) as i32;
            let v = (((sy + 1.0) / 2.0) * src_size.height as f64) as i32;
            let u = u.clamp(0, src_size.width - 1);
            let v = v.clamp(0, src_size.height - 1);
            let from = pixel_offset(src_size, u, v);
            let to = pixel_offset(dst_size, x, y);
            dst[to..to + 4].copy_from_slice(&src[from..from + 4]);
        }
    }
}

pub(crate) fn fill(pixels: &mut [u8], color: [u8; 4]) {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
}

#[inline]
pub(crate) fn storage_len(size: Size2D<i32>) -> usize {
    size.width as usize * size.height as usize * 4
}

#[inline]
fn pixel_offset(size: Size2D<i32>, x: i32, y: i32) -> usize {
    (y as usize * size.width as usize + x as usize) * 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use euclid::default::Point2D;
    use glow as gl;

    // A 2x2 image with distinct corners.
    fn corners() -> Vec<u8> {
        vec![
            1, 0, 0, 255, 2, 0, 0, 255, //
            3, 0, 0, 255, 4, 0, 0, 255,
        ]
    }

    fn reds(pixels: &[u8]) -> Vec<u8> {
        pixels.chunks_exact(4).map(|pixel| pixel[0]).collect()
    }

    #[test]
    fn test_draw_without_rotation_copies() {
        let size = Size2D::new(2, 2);
        let mut dst = vec![0; storage_len(size)];
        draw_rotated(&corners(), size, &mut dst, size, Rect::from_size(size), 0.0);
        assert_eq!(dst, corners());
    }

    #[test]
    fn test_draw_half_turn_reverses() {
        let size = Size2D::new(2, 2);
        let mut dst = vec![0; storage_len(size)];
        draw_rotated(&corners(), size, &mut dst, size, Rect::from_size(size), 180.0);
        assert_eq!(reds(&dst), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_draw_quarter_turn() {
        let size = Size2D::new(2, 2);
        let mut dst = vec![0; storage_len(size)];
        draw_rotated(&corners(), size, &mut dst, size, Rect::from_size(size), 90.0);
        assert_eq!(reds(&dst), vec![3, 1, 4, 2]);
    }

    #[test]
    fn test_rgb_round_trip_keeps_alpha_opaque() {
        let size = Size2D::new(2, 1);
        let mut image = vec![0; storage_len(size)];
        let rect = Rect::new(Point2D::new(0, 0), size);
        let rgb = [9, 8, 7, 6, 5, 4];
        write_rect(&mut image, size, rect, gl::RGB, gl::UNSIGNED_BYTE, &rgb).unwrap();
        assert_eq!(image, vec![9, 8, 7, 255, 6, 5, 4, 255]);

        let mut out = [0; 6];
        read_rect(&image, size, rect, gl::RGB, gl::UNSIGNED_BYTE, &mut out).unwrap();
        assert_eq!(out, [9, 8, 7, 6, 5, 4]);
    }
}
