// hostgl/src/slot.rs
//
//! An explicitly owned holder for at most one framebuffer.

use crate::driver::Driver;
use crate::{Error, FrameBuffer, Options};

use log::warn;
use std::sync::{Arc, RwLock};

/// Holds the framebuffer a dispatch layer routes client calls to.
///
/// Initialization is rejected while a framebuffer is held, and `get` returns `None` before
/// initialization and after finalization.
pub struct FrameBufferSlot<D: Driver> {
    framebuffer: RwLock<Option<Arc<FrameBuffer<D>>>>,
}

impl<D: Driver> Default for FrameBufferSlot<D> {
    fn default() -> Self {
        FrameBufferSlot::new()
    }
}

impl<D: Driver> FrameBufferSlot<D> {
    pub fn new() -> FrameBufferSlot<D> {
        FrameBufferSlot {
            framebuffer: RwLock::new(None),
        }
    }

    /// Initializes a framebuffer into the slot.
    ///
    /// Returns `Error::AlreadyInitialized`, leaving the held framebuffer alone, if the slot is
    /// occupied.
    pub fn initialize(
        &self,
        driver: D,
        width: i32,
        height: i32,
        options: Options,
    ) -> Result<(), Error> {
        let mut slot = self.framebuffer.write().unwrap_or_else(|err| err.into_inner());
        if slot.is_some() {
            warn!("Framebuffer is already initialized");
            return Err(Error::AlreadyInitialized);
        }
        *slot = Some(Arc::new(FrameBuffer::initialize(driver, width, height, options)?));
        Ok(())
    }

    /// The held framebuffer, if any.
    pub fn get(&self) -> Option<Arc<FrameBuffer<D>>> {
        self.framebuffer
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    /// Empties the slot.
    ///
    /// The framebuffer is torn down once the last outstanding reference from `get` is dropped.
    /// Returns `false` if the slot was already empty.
    pub fn finalize(&self) -> bool {
        self.framebuffer
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .take()
            .is_some()
    }
}
