// hostgl/src/error.rs
//
//! Various errors that methods can produce.

use crate::Handle;

/// Various errors that methods can produce.
///
/// These never cross the `FrameBuffer` boundary: public operations log them and collapse them
/// into a sentinel (`None`, `false`, or nothing at all).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Error {
    /// The framebuffer was already initialized.
    AlreadyInitialized,
    /// A connection to the display could not be opened.
    ConnectionFailed(WindowingApiError),
    /// No configuration satisfying the framebuffer's requirements was found.
    NoPixelFormatFound,
    /// The configuration index does not name an entry of the configuration list.
    InvalidConfig(usize),
    /// An extension necessary for this library to function isn't supported.
    RequiredExtensionUnavailable(&'static str),
    /// The system couldn't create a context.
    ContextCreationFailed(WindowingApiError),
    /// The system couldn't destroy a context.
    ContextDestructionFailed(WindowingApiError),
    /// The system couldn't make a context current or not current.
    MakeCurrentFailed(WindowingApiError),
    /// The system couldn't create a surface.
    SurfaceCreationFailed(WindowingApiError),
    /// The system couldn't destroy a surface.
    SurfaceDestructionFailed(WindowingApiError),
    /// The system couldn't allocate pixel storage.
    ImageCreationFailed(WindowingApiError),
    /// A pixel transfer to or from driver storage failed.
    PixelTransferFailed(WindowingApiError),
    /// The system couldn't present a window surface.
    PresentFailed(WindowingApiError),
    /// The handle does not name a live resource of the expected kind.
    UnknownHandle(Handle),
    /// Every handle slot is in use or retired.
    HandlesExhausted,
    /// The pixel format and type combination is not supported.
    UnsupportedFormat { format: u32, ty: u32 },
    /// The requested size is empty or too large.
    InvalidSize,
    /// The caller-supplied pixel storage is too small for the transfer.
    BufferTooSmall { needed: usize, supplied: usize },
    /// There is no client context current to bind into.
    NoCurrentContext,
    /// A native presentation surface already exists.
    SubWindowExists,
    /// The driver doesn't support images of this kind.
    UnsupportedCapability,
}

/// Abstraction of the errors that EGL and friends return.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowingApiError {
    /// EGL is not initialized, or could not be initialized, for the specified display.
    NotInitialized,
    /// EGL cannot access a requested resource.
    BadAccess,
    /// EGL failed to allocate resources for the requested operation.
    BadAlloc,
    /// The configuration is unsupported.
    BadConfig,
    /// An argument does not name a valid rendering context.
    BadContext,
    /// The current surface of the calling thread is no longer valid.
    BadCurrentSurface,
    /// A native window argument does not refer to a valid native window.
    BadNativeWindow,
    /// One or more argument values are invalid.
    BadParameter,
    /// An argument does not name a valid surface.
    BadSurface,
}
