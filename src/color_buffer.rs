// hostgl/src/color_buffer.rs
//
//! Reference-counted pixel storage.

use crate::driver::Driver;
use crate::Error;

use euclid::default::{Point2D, Rect, Size2D};
use glow as gl;
use log::debug;

/// Returns the size in bytes of one pixel in the given client format.
pub(crate) fn bytes_per_pixel(format: u32, ty: u32) -> Result<usize, Error> {
    match (format, ty) {
        (gl::RGBA, gl::UNSIGNED_BYTE) => Ok(4),
        (gl::RGB, gl::UNSIGNED_BYTE) => Ok(3),
        _ => Err(Error::UnsupportedFormat { format, ty }),
    }
}

fn check_internal_format(internal_format: u32) -> Result<(), Error> {
    match internal_format {
        gl::RGBA | gl::RGBA8 | gl::RGB | gl::RGB8 => Ok(()),
        _ => Err(Error::UnsupportedFormat {
            format: internal_format,
            ty: gl::UNSIGNED_BYTE,
        }),
    }
}

// Offset of `point` in a tightly packed buffer laid out as rows of `rect`.
#[inline]
fn packed_offset(rect: &Rect<i32>, point: Point2D<i32>, bpp: usize) -> usize {
    let row = (point.y - rect.origin.y) as usize;
    let column = (point.x - rect.origin.x) as usize;
    (row * rect.size.width as usize + column) * bpp
}

/// Host-resident pixel storage.
pub struct ColorBuffer<D: Driver> {
    image: D::Image,
    size: Size2D<i32>,
    internal_format: u32,
}

impl<D: Driver> ColorBuffer<D> {
    /// Allocates storage. The caller must have a context current.
    pub(crate) fn create(
        driver: &mut D,
        size: Size2D<i32>,
        internal_format: u32,
    ) -> Result<ColorBuffer<D>, Error> {
        if size.width <= 0 || size.height <= 0 {
            return Err(Error::InvalidSize);
        }
        check_internal_format(internal_format)?;
        let image = driver.create_image(size, internal_format)?;
        Ok(ColorBuffer {
            image,
            size,
            internal_format,
        })
    }

    pub(crate) fn destroy(self, driver: &mut D) -> Result<(), Error> {
        driver.destroy_image(self.image)
    }

    #[inline]
    pub fn size(&self) -> Size2D<i32> {
        self.size
    }

    #[inline]
    pub fn internal_format(&self) -> u32 {
        self.internal_format
    }

    #[inline]
    pub(crate) fn image(&self) -> D::Image {
        self.image
    }

    /// The part of `rect` inside the buffer, or `None` if they don't overlap.
    ///
    /// A rectangle whose far edge overflows `i32` lies entirely outside.
    fn clip(&self, rect: &Rect<i32>) -> Option<Rect<i32>> {
        rect.origin.x.checked_add(rect.size.width)?;
        rect.origin.y.checked_add(rect.size.height)?;
        Rect::new(Point2D::zero(), self.size)
            .intersection(rect)
            .filter(|clip| !clip.is_empty())
    }

    fn check_transfer(rect: &Rect<i32>, format: u32, ty: u32, len: usize) -> Result<usize, Error> {
        if rect.size.width < 0 || rect.size.height < 0 {
            return Err(Error::InvalidSize);
        }
        let bpp = bytes_per_pixel(format, ty)?;
        let needed = rect.size.width as usize * rect.size.height as usize * bpp;
        if len < needed {
            return Err(Error::BufferTooSmall {
                needed,
                supplied: len,
            });
        }
        Ok(bpp)
    }

    /// Reads `rect` into `pixels`, which is laid out as tightly packed rows of `rect`.
    ///
    /// Only the part of `rect` that intersects the buffer is written; the rest of `pixels` is left
    /// untouched.
    pub(crate) fn read_pixels(
        &self,
        driver: &mut D,
        rect: Rect<i32>,
        format: u32,
        ty: u32,
        pixels: &mut [u8],
    ) -> Result<(), Error> {
        let bpp = Self::check_transfer(&rect, format, ty, pixels.len())?;
        let clip = match self.clip(&rect) {
            Some(clip) => clip,
            None => return Ok(()),
        };

        if clip == rect {
            return driver.read_pixels(self.image, rect, format, ty, pixels);
        }

        let row_len = clip.size.width as usize * bpp;
        let mut clipped = vec![0; row_len * clip.size.height as usize];
        driver.read_pixels(self.image, clip, format, ty, &mut clipped)?;
        for (row, src) in clipped.chunks_exact(row_len).enumerate() {
            let origin = Point2D::new(clip.origin.x, clip.origin.y + row as i32);
            let start = packed_offset(&rect, origin, bpp);
            pixels[start..start + row_len].copy_from_slice(src);
        }
        Ok(())
    }

    /// Writes `pixels`, laid out as tightly packed rows of `rect`, into the buffer.
    ///
    /// Pixels falling outside the buffer are dropped.
    pub(crate) fn update(
        &self,
        driver: &mut D,
        rect: Rect<i32>,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) -> Result<(), Error> {
        let bpp = Self::check_transfer(&rect, format, ty, pixels.len())?;
        let clip = match self.clip(&rect) {
            Some(clip) => clip,
            None => return Ok(()),
        };

        if clip == rect {
            return driver.write_pixels(self.image, rect, format, ty, pixels);
        }

        debug!("Clipping update of {:?} to {:?}", rect, clip);
        let row_len = clip.size.width as usize * bpp;
        let mut clipped = Vec::with_capacity(row_len * clip.size.height as usize);
        for row in 0..clip.size.height {
            let origin = Point2D::new(clip.origin.x, clip.origin.y + row);
            let start = packed_offset(&rect, origin, bpp);
            clipped.extend_from_slice(&pixels[start..start + row_len]);
        }
        driver.write_pixels(self.image, clip, format, ty, &clipped)
    }
}

/// A color buffer together with the number of outstanding references to it.
///
/// The creator holds the first reference. Storage is freed exactly when the count drops to zero.
pub struct ColorBufferRef<D: Driver> {
    pub(crate) cb: ColorBuffer<D>,
    refcount: u32,
}

impl<D: Driver> ColorBufferRef<D> {
    pub(crate) fn new(cb: ColorBuffer<D>) -> ColorBufferRef<D> {
        ColorBufferRef { cb, refcount: 1 }
    }

    #[inline]
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    #[inline]
    pub(crate) fn open(&mut self) {
        self.refcount += 1;
    }

    /// Drops one reference. Returns `true` if that was the last one.
    #[inline]
    pub(crate) fn close(&mut self) -> bool {
        self.refcount = self.refcount.saturating_sub(1);
        self.refcount == 0
    }
}
