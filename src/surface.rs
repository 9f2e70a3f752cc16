// hostgl/src/surface.rs
//
//! Client window surfaces.

use crate::driver::Driver;
use crate::{Error, FbConfig, Handle};

use euclid::default::Size2D;
use log::debug;

/// A client drawable, backed by a host pbuffer surface.
///
/// The surface remembers which color buffer is attached as its render target. The attachment is
/// a back-reference only; the reference it accounts for lives in the color buffer's count.
pub struct WindowSurface<D: Driver> {
    pub(crate) surface: D::Surface,
    config: FbConfig,
    size: Size2D<i32>,
    pub(crate) attached: Handle,
}

impl<D: Driver> WindowSurface<D> {
    pub(crate) fn create(
        driver: &mut D,
        config: &FbConfig,
        size: Size2D<i32>,
    ) -> Result<WindowSurface<D>, Error> {
        if size.width <= 0 || size.height <= 0 {
            return Err(Error::InvalidSize);
        }
        let surface = driver.create_pbuffer_surface(config, size)?;
        Ok(WindowSurface {
            surface,
            config: *config,
            size,
            attached: Handle::NONE,
        })
    }

    #[inline]
    pub fn size(&self) -> Size2D<i32> {
        self.size
    }

    /// The color buffer currently attached as the render target, or `Handle::NONE`.
    #[inline]
    pub fn attached_color_buffer(&self) -> Handle {
        self.attached
    }

    /// Recreates the host surface at `size`.
    ///
    /// Returns the old host surface and its size. The caller must destroy the old surface once it
    /// is no longer current, or put it back with [`WindowSurface::replace`].
    pub(crate) fn resize(
        &mut self,
        driver: &mut D,
        size: Size2D<i32>,
    ) -> Result<Option<(D::Surface, Size2D<i32>)>, Error> {
        if size == self.size {
            return Ok(None);
        }
        debug!("Resizing surface {:?} from {:?} to {:?}", self.surface, self.size, size);
        let surface = driver.create_pbuffer_surface(&self.config, size)?;
        Ok(Some(self.replace(surface, size)))
    }

    /// Swaps in a host surface of the given size, returning the previous one and its size.
    pub(crate) fn replace(
        &mut self,
        surface: D::Surface,
        size: Size2D<i32>,
    ) -> (D::Surface, Size2D<i32>) {
        let old_size = std::mem::replace(&mut self.size, size);
        (std::mem::replace(&mut self.surface, surface), old_size)
    }
}
