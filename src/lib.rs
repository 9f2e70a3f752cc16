//! Host-side virtualization of a single graphics display.
//!
//! Many guest clients each believe they own their own rendering contexts, window surfaces and
//! color buffers. The [`FrameBuffer`] multiplexes them onto one host driver: it hands out opaque
//! [`Handle`]s, keeps color buffers alive for as long as anything references them, juggles which
//! host context is current, and presents finished frames into a native sub-window.
//!
//! The host graphics stack sits behind the [`Driver`] trait. [`platform::software`] provides a
//! driver that keeps every pixel in CPU memory.

pub mod platform;

pub mod error;
pub use crate::error::{Error, WindowingApiError};

mod handle;
pub use crate::handle::Handle;

mod config;
pub use crate::config::{FbConfig, FbConfigList, Options, RenderableFlags, SurfaceTypeFlags};

mod info;
pub use crate::info::{CapabilityFlags, Caps, GLApi, GLStrings, GLVersion, StringName};

mod driver;
pub use crate::driver::{CurrentBinding, Driver, HostBinding};

mod color_buffer;
pub use crate::color_buffer::{ColorBuffer, ColorBufferRef};

mod context;
pub use crate::context::{Binding, CurrentContextGuard, RenderContext};

mod surface;
pub use crate::surface::WindowSurface;

mod registry;

mod framebuffer;
pub use crate::framebuffer::{FrameBuffer, State};

mod present;
pub use crate::present::PostCallback;

mod slot;
pub use crate::slot::FrameBufferSlot;

#[cfg(test)]
mod tests;
