// hostgl/src/driver.rs
//
//! The abstract interface that all host graphics drivers conform to.

use crate::{Error, FbConfig, GLApi, GLVersion, StringName};

use euclid::default::{Rect, Size2D};
use rwh_06::RawWindowHandle;
use std::fmt::Debug;

/// A (context, draw surface, read surface) triple made current on the host driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostBinding<C, S> {
    pub context: C,
    pub draw: S,
    pub read: S,
}

/// The binding a driver can be asked to make current; `None` means nothing is current.
pub type CurrentBinding<D> = Option<HostBinding<<D as Driver>::Context, <D as Driver>::Surface>>;

/// A host graphics driver.
///
/// Host objects are referred to by the copyable ids the driver hands out, the way EGL hands out
/// `EGLContext` and `EGLSurface` values. The driver offers no concurrency safety of its own;
/// `FrameBuffer` serializes every call.
pub trait Driver: Send {
    /// The id of a host rendering context.
    type Context: Copy + Eq + Debug + Send;
    /// The id of a host drawable (window or pbuffer surface).
    type Surface: Copy + Eq + Debug + Send;
    /// The id of host-resident pixel storage backing a color buffer.
    type Image: Copy + Eq + Debug + Send;

    // display

    /// Opens the display connection and returns its version.
    fn initialize(&mut self) -> Result<GLVersion, Error>;

    /// Closes the display connection, releasing anything still attached to it.
    fn terminate(&mut self);

    /// Enumerates the pixel-format configurations the display supports.
    fn configs(&self) -> Result<Vec<FbConfig>, Error>;

    /// Queries an identity or extension string.
    ///
    /// GL strings are only meaningful while a context is current.
    fn query_string(&self, name: StringName) -> String;

    // contexts

    /// Creates a context, sharing the object namespace of `share_with` if given.
    fn create_context(
        &mut self,
        config: &FbConfig,
        share_with: Option<Self::Context>,
        api: GLApi,
    ) -> Result<Self::Context, Error>;

    /// Destroys a context. It must not be current.
    fn destroy_context(&mut self, context: Self::Context) -> Result<(), Error>;

    /// Makes a binding current, or unbinds everything if `binding` is `None`.
    fn make_current(&mut self, binding: CurrentBinding<Self>) -> Result<(), Error>;

    // surfaces

    /// Creates an off-screen surface of the given size.
    fn create_pbuffer_surface(
        &mut self,
        config: &FbConfig,
        size: Size2D<i32>,
    ) -> Result<Self::Surface, Error>;

    /// Creates an on-screen surface drawing into a native window.
    fn create_window_surface(
        &mut self,
        config: &FbConfig,
        window: RawWindowHandle,
        size: Size2D<i32>,
    ) -> Result<Self::Surface, Error>;

    /// Destroys a surface. It must not be current.
    fn destroy_surface(&mut self, surface: Self::Surface) -> Result<(), Error>;

    /// Displays the contents of a window surface.
    fn swap_buffers(&mut self, surface: Self::Surface) -> Result<(), Error>;

    // images

    /// Allocates pixel storage. Requires a current context.
    fn create_image(
        &mut self,
        size: Size2D<i32>,
        internal_format: u32,
    ) -> Result<Self::Image, Error>;

    /// Frees pixel storage.
    fn destroy_image(&mut self, image: Self::Image) -> Result<(), Error>;

    /// Reads `rect` of an image into tightly packed `pixels`.
    ///
    /// `rect` must lie within the image.
    fn read_pixels(
        &mut self,
        image: Self::Image,
        rect: Rect<i32>,
        format: u32,
        ty: u32,
        pixels: &mut [u8],
    ) -> Result<(), Error>;

    /// Writes tightly packed `pixels` into `rect` of an image.
    ///
    /// `rect` must lie within the image.
    fn write_pixels(
        &mut self,
        image: Self::Image,
        rect: Rect<i32>,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) -> Result<(), Error>;

    /// Resolves the rendered contents of a surface into an image.
    fn copy_surface_to_image(
        &mut self,
        surface: Self::Surface,
        image: Self::Image,
    ) -> Result<(), Error>;

    /// Binds an image as the 2D texture of the current context.
    fn bind_image_to_texture(&mut self, image: Self::Image) -> Result<(), Error>;

    /// Binds an image as the renderbuffer storage of the current context.
    fn bind_image_to_renderbuffer(&mut self, image: Self::Image) -> Result<(), Error>;

    // drawing

    /// Clears the current draw surface.
    fn clear(&mut self) -> Result<(), Error>;

    /// Draws an image into `viewport` of the current draw surface, rotated by `rotation` degrees
    /// about the viewport center.
    fn draw_image(
        &mut self,
        image: Self::Image,
        viewport: Rect<i32>,
        rotation: f32,
    ) -> Result<(), Error>;
}
