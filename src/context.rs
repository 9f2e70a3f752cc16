// hostgl/src/context.rs
//
//! Render contexts and the bind/restore discipline.

use crate::driver::{CurrentBinding, Driver};
use crate::framebuffer::State;
use crate::{Error, FbConfig, GLApi, Handle};

use log::warn;
use std::ops::{Deref, DerefMut};

/// A client rendering context, backed by one host context.
pub struct RenderContext<D: Driver> {
    pub(crate) context: D::Context,
    api: GLApi,
    share: Handle,
}

impl<D: Driver> RenderContext<D> {
    pub(crate) fn create(
        driver: &mut D,
        config: &FbConfig,
        share: Option<(Handle, D::Context)>,
        api: GLApi,
    ) -> Result<RenderContext<D>, Error> {
        let context = driver.create_context(config, share.map(|(_, context)| context), api)?;
        Ok(RenderContext {
            context,
            api,
            share: share.map_or(Handle::NONE, |(handle, _)| handle),
        })
    }

    /// The API flavor this context was created for.
    #[inline]
    pub fn api(&self) -> GLApi {
        self.api
    }

    /// The context whose object namespace this one shares, or `Handle::NONE`.
    #[inline]
    pub fn share(&self) -> Handle {
        self.share
    }
}

/// The (context, draw surface, read surface) triple a client has bound.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Binding {
    pub context: Handle,
    pub draw: Handle,
    pub read: Handle,
}

impl Binding {
    /// The null binding.
    pub const NONE: Binding = Binding {
        context: Handle::NONE,
        draw: Handle::NONE,
        read: Handle::NONE,
    };

    #[inline]
    pub fn is_none(&self) -> bool {
        self.context.is_none()
    }

    /// Returns true if `handle` is any member of the triple.
    #[inline]
    pub fn involves(&self, handle: Handle) -> bool {
        !handle.is_none() && (self.context == handle || self.draw == handle || self.read == handle)
    }
}

/// Keeps a binding current for as long as it lives.
///
/// Acquiring the guard records the binding that was current and binds another; dropping it
/// restores the recorded binding on every exit path. Guards nest: an inner guard restores the
/// outer guard's binding, and the outermost restores whatever the client had bound.
#[must_use]
pub struct CurrentContextGuard<'a, D: Driver> {
    state: &'a mut State<D>,
    previous: CurrentBinding<D>,
}

impl<'a, D: Driver> CurrentContextGuard<'a, D> {
    pub(crate) fn bind(
        state: &'a mut State<D>,
        target: CurrentBinding<D>,
    ) -> Result<CurrentContextGuard<'a, D>, Error> {
        let previous = state.current;
        state.make_current(target)?;
        Ok(CurrentContextGuard { state, previous })
    }

    /// The binding that will be restored when this guard drops.
    #[inline]
    pub fn previous(&self) -> CurrentBinding<D> {
        self.previous
    }
}

impl<'a, D: Driver> Drop for CurrentContextGuard<'a, D> {
    fn drop(&mut self) {
        if let Err(err) = self.state.make_current(self.previous) {
            warn!("Failed to restore binding {:?}: {:?}", self.previous, err);
        }
    }
}

impl<'a, D: Driver> Deref for CurrentContextGuard<'a, D> {
    type Target = State<D>;

    #[inline]
    fn deref(&self) -> &State<D> {
        self.state
    }
}

impl<'a, D: Driver> DerefMut for CurrentContextGuard<'a, D> {
    #[inline]
    fn deref_mut(&mut self) -> &mut State<D> {
        self.state
    }
}
