// hostgl/src/registry.rs
//
//! Handle-keyed tables of live resources.

use crate::color_buffer::{ColorBuffer, ColorBufferRef};
use crate::context::RenderContext;
use crate::driver::Driver;
use crate::handle::HandleAllocator;
use crate::surface::WindowSurface;
use crate::{Error, Handle};

use fnv::{FnvHashMap, FnvHashSet};
use std::collections::hash_map::Entry;
use std::thread::ThreadId;

// Handles of one resource kind, indexed by the thread that created them.
#[derive(Default)]
struct Owners {
    by_owner: FnvHashMap<ThreadId, FnvHashSet<Handle>>,
    owner_of: FnvHashMap<Handle, ThreadId>,
}

impl Owners {
    fn insert(&mut self, owner: ThreadId, handle: Handle) {
        self.by_owner.entry(owner).or_default().insert(handle);
        self.owner_of.insert(handle, owner);
    }

    fn remove(&mut self, handle: Handle) {
        let owner = match self.owner_of.remove(&handle) {
            Some(owner) => owner,
            None => return,
        };
        if let Entry::Occupied(mut entry) = self.by_owner.entry(owner) {
            entry.get_mut().remove(&handle);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    fn owned_by(&self, owner: ThreadId) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self
            .by_owner
            .get(&owner)
            .into_iter()
            .flat_map(|handles| handles.iter().copied())
            .collect();
        handles.sort();
        handles
    }
}

/// The three resource tables and the allocator their handles come from.
pub(crate) struct Registry<D: Driver> {
    handles: HandleAllocator,
    contexts: FnvHashMap<Handle, RenderContext<D>>,
    surfaces: FnvHashMap<Handle, WindowSurface<D>>,
    color_buffers: FnvHashMap<Handle, ColorBufferRef<D>>,
    context_owners: Owners,
    surface_owners: Owners,
}

impl<D: Driver> Registry<D> {
    pub(crate) fn new() -> Registry<D> {
        Registry {
            handles: HandleAllocator::new(),
            contexts: FnvHashMap::default(),
            surfaces: FnvHashMap::default(),
            color_buffers: FnvHashMap::default(),
            context_owners: Owners::default(),
            surface_owners: Owners::default(),
        }
    }

    #[inline]
    pub(crate) fn gen_handle(&mut self) -> Result<Handle, Error> {
        self.handles.allocate()
    }

    #[inline]
    pub(crate) fn live_handles(&self) -> usize {
        self.handles.live_count()
    }

    // contexts

    pub(crate) fn insert_context(
        &mut self,
        owner: ThreadId,
        context: RenderContext<D>,
    ) -> Result<Handle, Error> {
        let handle = self.gen_handle()?;
        self.contexts.insert(handle, context);
        self.context_owners.insert(owner, handle);
        Ok(handle)
    }

    #[inline]
    pub(crate) fn context(&self, handle: Handle) -> Result<&RenderContext<D>, Error> {
        self.contexts.get(&handle).ok_or(Error::UnknownHandle(handle))
    }

    pub(crate) fn remove_context(&mut self, handle: Handle) -> Option<RenderContext<D>> {
        let context = self.contexts.remove(&handle)?;
        self.context_owners.remove(handle);
        self.handles.free(handle);
        Some(context)
    }

    pub(crate) fn contexts_owned_by(&self, owner: ThreadId) -> Vec<Handle> {
        self.context_owners.owned_by(owner)
    }

    pub(crate) fn context_handles(&self) -> Vec<Handle> {
        self.contexts.keys().copied().collect()
    }

    // surfaces

    pub(crate) fn insert_surface(
        &mut self,
        owner: ThreadId,
        surface: WindowSurface<D>,
    ) -> Result<Handle, Error> {
        let handle = self.gen_handle()?;
        self.surfaces.insert(handle, surface);
        self.surface_owners.insert(owner, handle);
        Ok(handle)
    }

    #[inline]
    pub(crate) fn surface(&self, handle: Handle) -> Result<&WindowSurface<D>, Error> {
        self.surfaces.get(&handle).ok_or(Error::UnknownHandle(handle))
    }

    #[inline]
    pub(crate) fn surface_mut(&mut self, handle: Handle) -> Result<&mut WindowSurface<D>, Error> {
        self.surfaces
            .get_mut(&handle)
            .ok_or(Error::UnknownHandle(handle))
    }

    pub(crate) fn remove_surface(&mut self, handle: Handle) -> Option<WindowSurface<D>> {
        let surface = self.surfaces.remove(&handle)?;
        self.surface_owners.remove(handle);
        self.handles.free(handle);
        Some(surface)
    }

    pub(crate) fn surfaces_owned_by(&self, owner: ThreadId) -> Vec<Handle> {
        self.surface_owners.owned_by(owner)
    }

    pub(crate) fn surface_handles(&self) -> Vec<Handle> {
        self.surfaces.keys().copied().collect()
    }

    // color buffers

    pub(crate) fn insert_color_buffer(&mut self, cb: ColorBuffer<D>) -> Result<Handle, Error> {
        let handle = self.gen_handle()?;
        self.color_buffers.insert(handle, ColorBufferRef::new(cb));
        Ok(handle)
    }

    #[inline]
    pub(crate) fn color_buffer(&self, handle: Handle) -> Result<&ColorBufferRef<D>, Error> {
        self.color_buffers
            .get(&handle)
            .ok_or(Error::UnknownHandle(handle))
    }

    #[inline]
    pub(crate) fn color_buffer_mut(
        &mut self,
        handle: Handle,
    ) -> Result<&mut ColorBufferRef<D>, Error> {
        self.color_buffers
            .get_mut(&handle)
            .ok_or(Error::UnknownHandle(handle))
    }

    pub(crate) fn remove_color_buffer(&mut self, handle: Handle) -> Option<ColorBuffer<D>> {
        let entry = self.color_buffers.remove(&handle)?;
        self.handles.free(handle);
        Some(entry.cb)
    }

    pub(crate) fn color_buffer_handles(&self) -> Vec<Handle> {
        self.color_buffers.keys().copied().collect()
    }
}
