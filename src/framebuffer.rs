// hostgl/src/framebuffer.rs
//
//! The framebuffer: one host display multiplexed among many client contexts.
//!
//! Every operation takes the framebuffer's single lock, resolves handles, binds whatever the
//! driver needs current, performs the driver call, and restores the prior binding before the
//! lock is released. Public methods never propagate errors: they log them and return a sentinel.

use crate::color_buffer::ColorBuffer;
use crate::context::{Binding, CurrentContextGuard, RenderContext};
use crate::driver::{CurrentBinding, Driver, HostBinding};
use crate::present::{PostCallback, Presenter};
use crate::registry::Registry;
use crate::surface::WindowSurface;
use crate::{Caps, Error, FbConfig, FbConfigList, GLApi, GLStrings, Handle, Options, StringName};

use euclid::default::{Point2D, Rect, Size2D};
use log::{debug, error, info, warn};
use rwh_06::RawWindowHandle;
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

/// The framebuffer's own off-screen context and surface.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Offscreen<C, S> {
    pub(crate) context: C,
    pub(crate) surface: S,
}

/// Everything the framebuffer's lock protects.
///
/// Obtained through [`FrameBuffer::lock`]; holders of the lock call the methods here directly
/// instead of the locking wrappers on `FrameBuffer`.
pub struct State<D: Driver> {
    pub(crate) driver: D,
    pub(crate) registry: Registry<D>,
    pub(crate) base_context: D::Context,
    pub(crate) pbuffer: Offscreen<D::Context, D::Surface>,
    pub(crate) current: CurrentBinding<D>,
    pub(crate) bound: Binding,
    pub(crate) presenter: Presenter<D>,
}

pub(crate) fn report<T>(operation: &str, result: Result<T, Error>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("{} failed: {:?}", operation, err);
            None
        }
    }
}

impl<D: Driver> State<D> {
    /// Makes `target` current on the driver unless it already is.
    pub(crate) fn make_current(&mut self, target: CurrentBinding<D>) -> Result<(), Error> {
        if self.current == target {
            return Ok(());
        }
        self.driver.make_current(target)?;
        self.current = target;
        Ok(())
    }

    /// Binds the framebuffer's off-screen context until the returned guard drops.
    ///
    /// Use this around driver work that needs a current context but must not disturb the binding
    /// a client has established.
    pub fn bind_locked(&mut self) -> Result<CurrentContextGuard<'_, D>, Error> {
        let target = Some(HostBinding {
            context: self.pbuffer.context,
            draw: self.pbuffer.surface,
            read: self.pbuffer.surface,
        });
        CurrentContextGuard::bind(self, target)
    }

    /// Restores the binding recorded by a guard from [`State::bind_locked`].
    #[inline]
    pub fn unbind_locked(guard: CurrentContextGuard<'_, D>) {
        drop(guard)
    }

    /// The driver, for work done under [`State::bind_locked`].
    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// The triple the client most recently bound.
    #[inline]
    pub fn bound(&self) -> Binding {
        self.bound
    }

    /// The triple currently made current on the driver.
    #[inline]
    pub fn current(&self) -> CurrentBinding<D> {
        self.current
    }

    // creation and destruction

    pub(crate) fn create_render_context(
        &mut self,
        owner: ThreadId,
        config: &FbConfig,
        share: Handle,
        api: GLApi,
    ) -> Result<Handle, Error> {
        let share = if share.is_none() {
            None
        } else {
            match self.registry.context(share) {
                Ok(context) => Some((share, context.context)),
                Err(_) => {
                    warn!("Share context {} is unknown; creating an unshared context", share);
                    None
                }
            }
        };

        let context = RenderContext::create(&mut self.driver, config, share, api)?;
        let host_context = context.context;
        match self.registry.insert_context(owner, context) {
            Ok(handle) => {
                debug!("Created context {} ({:?}) for {:?}", handle, api, owner);
                Ok(handle)
            }
            Err(err) => {
                let _ = self.driver.destroy_context(host_context);
                Err(err)
            }
        }
    }

    pub(crate) fn create_window_surface(
        &mut self,
        owner: ThreadId,
        config: &FbConfig,
        size: Size2D<i32>,
    ) -> Result<Handle, Error> {
        let surface = WindowSurface::create(&mut self.driver, config, size)?;
        let host_surface = surface.surface;
        match self.registry.insert_surface(owner, surface) {
            Ok(handle) => {
                debug!("Created surface {} ({:?}) for {:?}", handle, size, owner);
                Ok(handle)
            }
            Err(err) => {
                let _ = self.driver.destroy_surface(host_surface);
                Err(err)
            }
        }
    }

    pub(crate) fn create_color_buffer(
        &mut self,
        size: Size2D<i32>,
        internal_format: u32,
    ) -> Result<Handle, Error> {
        let mut guard = self.bind_locked()?;
        let state = &mut *guard;
        let cb = ColorBuffer::create(&mut state.driver, size, internal_format)?;
        let image = cb.image();
        match state.registry.insert_color_buffer(cb) {
            Ok(handle) => {
                debug!("Created color buffer {} ({:?})", handle, size);
                Ok(handle)
            }
            Err(err) => {
                let _ = state.driver.destroy_image(image);
                Err(err)
            }
        }
    }

    // Drops the client binding if it involves `handle`.
    fn unbind_if_bound(&mut self, handle: Handle) -> Result<(), Error> {
        if self.bound.involves(handle) {
            debug!("Unbinding {:?} before destroying {}", self.bound, handle);
            self.make_current(None)?;
            self.bound = Binding::NONE;
        }
        Ok(())
    }

    pub(crate) fn destroy_render_context(&mut self, handle: Handle) -> Result<(), Error> {
        self.registry.context(handle)?;
        self.unbind_if_bound(handle)?;
        if let Some(context) = self.registry.remove_context(handle) {
            debug!("Destroying context {}", handle);
            self.driver.destroy_context(context.context)?;
        }
        Ok(())
    }

    pub(crate) fn destroy_window_surface(&mut self, handle: Handle) -> Result<(), Error> {
        self.registry.surface(handle)?;
        self.unbind_if_bound(handle)?;
        let surface = match self.registry.remove_surface(handle) {
            Some(surface) => surface,
            None => return Ok(()),
        };
        debug!("Destroying surface {}", handle);
        let result = self.driver.destroy_surface(surface.surface);
        if !surface.attached.is_none() {
            self.close_color_buffer(surface.attached);
        }
        result
    }

    pub(crate) fn drain_render_contexts(&mut self, owner: ThreadId) {
        for handle in self.registry.contexts_owned_by(owner) {
            report("Draining a context", self.destroy_render_context(handle));
        }
    }

    pub(crate) fn drain_window_surfaces(&mut self, owner: ThreadId) {
        for handle in self.registry.surfaces_owned_by(owner) {
            report("Draining a surface", self.destroy_window_surface(handle));
        }
    }

    // reference counting

    pub(crate) fn open_color_buffer(&mut self, handle: Handle) -> Result<(), Error> {
        self.registry.color_buffer_mut(handle)?.open();
        Ok(())
    }

    /// Drops one reference; the last one frees the storage. Unknown handles are ignored.
    pub(crate) fn close_color_buffer(&mut self, handle: Handle) {
        let last = match self.registry.color_buffer_mut(handle) {
            Ok(entry) => entry.close(),
            Err(err) => {
                warn!("Closing color buffer failed: {:?}", err);
                return;
            }
        };
        if !last {
            return;
        }

        let cb = match self.registry.remove_color_buffer(handle) {
            Some(cb) => cb,
            None => return,
        };
        debug!("Destroying color buffer {}", handle);
        let image = cb.image();
        let attempt = match self.bind_locked() {
            Ok(mut guard) => Ok(guard.driver.destroy_image(image)),
            Err(err) => Err(err),
        };
        let result = match attempt {
            Ok(result) => result,
            Err(err) => {
                warn!("Destroying color buffer {} with no context current: {:?}", handle, err);
                self.driver.destroy_image(image)
            }
        };
        report("Destroying color buffer storage", result);
    }

    // binding

    pub(crate) fn bind_context(
        &mut self,
        context: Handle,
        draw: Handle,
        read: Handle,
    ) -> Result<(), Error> {
        if context.is_none() {
            self.make_current(None)?;
            self.bound = Binding::NONE;
            return Ok(());
        }

        let target = HostBinding {
            context: self.registry.context(context)?.context,
            draw: self.registry.surface(draw)?.surface,
            read: self.registry.surface(read)?.surface,
        };
        self.make_current(Some(target))?;
        self.bound = Binding {
            context,
            draw,
            read,
        };
        Ok(())
    }

    // surface and buffer association

    pub(crate) fn set_window_surface_color_buffer(
        &mut self,
        surface: Handle,
        color_buffer: Handle,
    ) -> Result<(), Error> {
        let size = self.registry.color_buffer(color_buffer)?.cb.size();
        let previous = self.registry.surface(surface)?.attached;
        if previous == color_buffer {
            return Ok(());
        }

        // Resize first so that a failure leaves both counts untouched.
        let replaced = {
            let window = self.registry.surface_mut(surface)?;
            window.resize(&mut self.driver, size)?
        };
        if let Some((old_surface, old_size)) = replaced {
            let new_surface = self.registry.surface(surface)?.surface;
            if let Some(mut binding) = self.current {
                if binding.draw == old_surface || binding.read == old_surface {
                    if binding.draw == old_surface {
                        binding.draw = new_surface;
                    }
                    if binding.read == old_surface {
                        binding.read = new_surface;
                    }
                    if let Err(err) = self.make_current(Some(binding)) {
                        // The old surface is still current; put it back.
                        let window = self.registry.surface_mut(surface)?;
                        let (new_surface, _) = window.replace(old_surface, old_size);
                        let result = self.driver.destroy_surface(new_surface);
                        report("Destroying resized surface", result);
                        return Err(err);
                    }
                }
            }
            report("Destroying resized surface", self.driver.destroy_surface(old_surface));
        }

        self.registry.color_buffer_mut(color_buffer)?.open();
        self.registry.surface_mut(surface)?.attached = color_buffer;
        if !previous.is_none() {
            self.close_color_buffer(previous);
        }
        Ok(())
    }

    pub(crate) fn flush_window_surface_color_buffer(
        &mut self,
        surface: Handle,
    ) -> Result<(), Error> {
        let window = self.registry.surface(surface)?;
        if window.attached.is_none() {
            return Ok(());
        }
        let host_surface = window.surface;
        let image = self.registry.color_buffer(window.attached)?.cb.image();
        let mut guard = self.bind_locked()?;
        guard.driver.copy_surface_to_image(host_surface, image)
    }

    pub(crate) fn bind_color_buffer_to_texture(
        &mut self,
        caps: &Caps,
        handle: Handle,
    ) -> Result<(), Error> {
        let image = self.registry.color_buffer(handle)?.cb.image();
        if !caps.has_eglimage_texture_2d() {
            return Err(Error::UnsupportedCapability);
        }
        if self.bound.is_none() {
            return Err(Error::NoCurrentContext);
        }
        self.driver.bind_image_to_texture(image)
    }

    pub(crate) fn bind_color_buffer_to_renderbuffer(
        &mut self,
        caps: &Caps,
        handle: Handle,
    ) -> Result<(), Error> {
        let image = self.registry.color_buffer(handle)?.cb.image();
        if !caps.has_eglimage_renderbuffer() {
            return Err(Error::UnsupportedCapability);
        }
        if self.bound.is_none() {
            return Err(Error::NoCurrentContext);
        }
        self.driver.bind_image_to_renderbuffer(image)
    }

    // pixel transfer

    pub(crate) fn read_color_buffer(
        &mut self,
        handle: Handle,
        rect: Rect<i32>,
        format: u32,
        ty: u32,
        pixels: &mut [u8],
    ) -> Result<(), Error> {
        self.registry.color_buffer(handle)?;
        let mut guard = self.bind_locked()?;
        let state = &mut *guard;
        let cb = &state.registry.color_buffer(handle)?.cb;
        cb.read_pixels(&mut state.driver, rect, format, ty, pixels)
    }

    pub(crate) fn update_color_buffer(
        &mut self,
        handle: Handle,
        rect: Rect<i32>,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) -> Result<(), Error> {
        self.registry.color_buffer(handle)?;
        let mut guard = self.bind_locked()?;
        let state = &mut *guard;
        let cb = &state.registry.color_buffer(handle)?.cb;
        cb.update(&mut state.driver, rect, format, ty, pixels)
    }

    // Releases every resource. The display connection stays open.
    fn release_all(&mut self) {
        if let Err(err) = self.make_current(None) {
            warn!("Failed to unbind during teardown: {:?}", err);
        }
        self.bound = Binding::NONE;
        self.remove_sub_window_locked();

        for handle in self.registry.surface_handles() {
            if let Some(surface) = self.registry.remove_surface(handle) {
                report("Destroying surface", self.driver.destroy_surface(surface.surface));
            }
        }
        for handle in self.registry.context_handles() {
            if let Some(context) = self.registry.remove_context(handle) {
                report("Destroying context", self.driver.destroy_context(context.context));
            }
        }
        for handle in self.registry.color_buffer_handles() {
            if let Some(cb) = self.registry.remove_color_buffer(handle) {
                report("Destroying color buffer", cb.destroy(&mut self.driver));
            }
        }

        report("Destroying off-screen surface", self.driver.destroy_surface(self.pbuffer.surface));
        report("Destroying off-screen context", self.driver.destroy_context(self.pbuffer.context));
        report("Destroying base context", self.driver.destroy_context(self.base_context));
    }
}

// Resources acquired while initializing, released in reverse if a later step fails.
struct Partial<D: Driver> {
    base_context: Option<D::Context>,
    pbuffer_context: Option<D::Context>,
    pbuffer_surface: Option<D::Surface>,
}

impl<D: Driver> Partial<D> {
    fn release(self, driver: &mut D) {
        let _ = driver.make_current(None);
        if let Some(surface) = self.pbuffer_surface {
            let _ = driver.destroy_surface(surface);
        }
        if let Some(context) = self.pbuffer_context {
            let _ = driver.destroy_context(context);
        }
        if let Some(context) = self.base_context {
            let _ = driver.destroy_context(context);
        }
    }
}

struct Probed<D: Driver> {
    configs: FbConfigList,
    caps: Caps,
    strings: GLStrings,
    base_context: D::Context,
    pbuffer: Offscreen<D::Context, D::Surface>,
}

/// The host framebuffer.
///
/// Created with [`FrameBuffer::initialize`] and torn down with [`FrameBuffer::finalize`] (or by
/// dropping it). Share it between client workers behind an `Arc`.
pub struct FrameBuffer<D: Driver> {
    state: Mutex<State<D>>,
    configs: FbConfigList,
    caps: Caps,
    strings: GLStrings,
}

impl<D: Driver> FrameBuffer<D> {
    /// Opens the display, selects a configuration, creates the framebuffer's own contexts and
    /// probes the driver.
    ///
    /// On failure every partially acquired resource is released and the display is closed.
    pub fn initialize(
        mut driver: D,
        width: i32,
        height: i32,
        options: Options,
    ) -> Result<FrameBuffer<D>, Error> {
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidSize);
        }

        let display_version = match driver.initialize() {
            Ok(version) => version,
            Err(err) => {
                error!("Failed to open the display: {:?}", err);
                return Err(err);
            }
        };

        let mut partial = Partial {
            base_context: None,
            pbuffer_context: None,
            pbuffer_surface: None,
        };
        let probed = match Self::probe(&mut driver, display_version, &mut partial) {
            Ok(probed) => probed,
            Err(err) => {
                error!("Failed to initialize the framebuffer: {:?}", err);
                partial.release(&mut driver);
                driver.terminate();
                return Err(err);
            }
        };

        info!(
            "Framebuffer {}x{} on {} {} ({}); display {}.{}, {:?}",
            width,
            height,
            probed.strings.vendor,
            probed.strings.renderer,
            probed.strings.version,
            probed.caps.display_version.major,
            probed.caps.display_version.minor,
            probed.caps.flags,
        );

        let geometry = Rect::new(Point2D::zero(), Size2D::new(width, height));
        Ok(FrameBuffer {
            state: Mutex::new(State {
                driver,
                registry: Registry::new(),
                base_context: probed.base_context,
                pbuffer: probed.pbuffer,
                current: None,
                bound: Binding::NONE,
                presenter: Presenter::new(geometry, options),
            }),
            configs: probed.configs,
            caps: probed.caps,
            strings: probed.strings,
        })
    }

    fn probe(
        driver: &mut D,
        display_version: crate::GLVersion,
        partial: &mut Partial<D>,
    ) -> Result<Probed<D>, Error> {
        let configs = FbConfigList::new(driver.configs()?)?;
        let config = *configs.framebuffer_config();
        debug!("Selected framebuffer config {:?}", config);

        let base_context = driver.create_context(&config, None, GLApi::GLES2)?;
        partial.base_context = Some(base_context);
        let pbuffer_context = driver.create_context(&config, Some(base_context), GLApi::GLES2)?;
        partial.pbuffer_context = Some(pbuffer_context);
        let pbuffer_surface = driver.create_pbuffer_surface(&config, Size2D::new(1, 1))?;
        partial.pbuffer_surface = Some(pbuffer_surface);

        driver.make_current(Some(HostBinding {
            context: pbuffer_context,
            draw: pbuffer_surface,
            read: pbuffer_surface,
        }))?;
        let strings = GLStrings {
            vendor: driver.query_string(StringName::Vendor),
            renderer: driver.query_string(StringName::Renderer),
            version: driver.query_string(StringName::Version),
        };
        let caps = Caps::probe(
            display_version,
            &driver.query_string(StringName::DisplayExtensions),
            &driver.query_string(StringName::Extensions),
        );
        driver.make_current(None)?;

        if !caps.has_eglimage_texture_2d() {
            return Err(Error::RequiredExtensionUnavailable("GL_OES_EGL_image"));
        }

        Ok(Probed {
            configs,
            caps,
            strings,
            base_context,
            pbuffer: Offscreen {
                context: pbuffer_context,
                surface: pbuffer_surface,
            },
        })
    }

    /// Releases every context, surface and color buffer, and closes the display.
    pub fn finalize(self) {
        drop(self)
    }

    /// Takes the framebuffer's lock.
    ///
    /// Holders of the lock use the methods of [`State`] directly; the locking methods of
    /// `FrameBuffer` would deadlock.
    pub fn lock(&self) -> MutexGuard<'_, State<D>> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    // queries

    #[inline]
    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    /// The configurations clients may create contexts and surfaces with.
    #[inline]
    pub fn configs(&self) -> &FbConfigList {
        &self.configs
    }

    #[inline]
    pub fn gl_strings(&self) -> &GLStrings {
        &self.strings
    }

    pub fn width(&self) -> i32 {
        self.lock().presenter.geometry().size.width
    }

    pub fn height(&self) -> i32 {
        self.lock().presenter.geometry().size.height
    }

    /// The native window the framebuffer presents into, if any.
    pub fn sub_window(&self) -> Option<RawWindowHandle> {
        self.lock().presenter.sub_window()
    }

    /// The reference count of a color buffer, or `None` if the handle is unknown.
    pub fn color_buffer_refcount(&self, handle: Handle) -> Option<u32> {
        self.lock()
            .registry
            .color_buffer(handle)
            .ok()
            .map(|entry| entry.refcount())
    }

    /// The triple most recently bound with [`FrameBuffer::bind_context`].
    pub fn bound(&self) -> Binding {
        self.lock().bound
    }

    // handles

    /// Allocates a handle without attaching a resource to it.
    pub fn gen_handle(&self) -> Option<Handle> {
        report("Allocating a handle", self.lock().registry.gen_handle())
    }

    // creation and destruction

    /// Creates a render context with the configuration at index `config`.
    ///
    /// A non-null `share` that names no live context is ignored, and the new context is
    /// unshared.
    pub fn create_render_context(
        &self,
        config: usize,
        share: Handle,
        api: GLApi,
    ) -> Option<Handle> {
        let owner = thread::current().id();
        let result = self
            .configs
            .lookup(config)
            .and_then(|config| self.lock().create_render_context(owner, &config, share, api));
        report("Creating a render context", result)
    }

    pub fn create_window_surface(&self, config: usize, width: i32, height: i32) -> Option<Handle> {
        let owner = thread::current().id();
        let size = Size2D::new(width, height);
        let result = self
            .configs
            .lookup(config)
            .and_then(|config| self.lock().create_window_surface(owner, &config, size));
        report("Creating a window surface", result)
    }

    /// Creates a color buffer holding one reference for the caller.
    pub fn create_color_buffer(
        &self,
        width: i32,
        height: i32,
        internal_format: u32,
    ) -> Option<Handle> {
        let result = self
            .lock()
            .create_color_buffer(Size2D::new(width, height), internal_format);
        report("Creating a color buffer", result)
    }

    /// Destroys a render context, unbinding it first if it is bound.
    pub fn destroy_render_context(&self, handle: Handle) {
        report("Destroying a render context", self.lock().destroy_render_context(handle));
    }

    /// Destroys a window surface, unbinding it first if it is bound.
    ///
    /// The surface's reference to its attached color buffer is released.
    pub fn destroy_window_surface(&self, handle: Handle) {
        report("Destroying a window surface", self.lock().destroy_window_surface(handle));
    }

    /// Destroys every render context created by the calling thread.
    pub fn drain_render_contexts(&self) {
        self.lock().drain_render_contexts(thread::current().id())
    }

    /// Destroys every window surface created by the calling thread.
    pub fn drain_window_surfaces(&self) {
        self.lock().drain_window_surfaces(thread::current().id())
    }

    // reference counting

    /// Adds a reference to a color buffer. Returns `false` if the handle is unknown.
    pub fn open_color_buffer(&self, handle: Handle) -> bool {
        report("Opening a color buffer", self.lock().open_color_buffer(handle)).is_some()
    }

    /// Drops a reference to a color buffer, destroying it when none remain.
    pub fn close_color_buffer(&self, handle: Handle) {
        self.lock().close_color_buffer(handle)
    }

    // binding

    /// Binds a context with its draw and read surfaces; a null context unbinds.
    pub fn bind_context(&self, context: Handle, draw: Handle, read: Handle) -> bool {
        let result = self.lock().bind_context(context, draw, read);
        report("Binding a context", result).is_some()
    }

    // surface and buffer association

    /// Attaches a color buffer as a window surface's render target.
    ///
    /// The new buffer gains a reference and the previously attached one loses its reference, in
    /// one critical section.
    pub fn set_window_surface_color_buffer(&self, surface: Handle, color_buffer: Handle) -> bool {
        let result = self.lock().set_window_surface_color_buffer(surface, color_buffer);
        report("Attaching a color buffer", result).is_some()
    }

    /// Resolves a window surface's rendered content into its attached color buffer.
    pub fn flush_window_surface_color_buffer(&self, surface: Handle) -> bool {
        let result = self.lock().flush_window_surface_color_buffer(surface);
        report("Flushing a window surface", result).is_some()
    }

    /// Binds a color buffer as the 2D texture of the bound client context.
    pub fn bind_color_buffer_to_texture(&self, handle: Handle) -> bool {
        let result = self.lock().bind_color_buffer_to_texture(&self.caps, handle);
        report("Binding a color buffer to a texture", result).is_some()
    }

    /// Binds a color buffer as the renderbuffer of the bound client context.
    pub fn bind_color_buffer_to_renderbuffer(&self, handle: Handle) -> bool {
        let result = self.lock().bind_color_buffer_to_renderbuffer(&self.caps, handle);
        report("Binding a color buffer to a renderbuffer", result).is_some()
    }

    // pixel transfer

    /// Reads a sub-rectangle of a color buffer into `pixels`, laid out as tightly packed rows of
    /// the requested rectangle.
    ///
    /// The rectangle is clipped to the buffer; pixels outside the clip are left untouched.
    /// Failures are logged and otherwise silent.
    #[allow(clippy::too_many_arguments)]
    pub fn read_color_buffer(
        &self,
        handle: Handle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &mut [u8],
    ) {
        let rect = Rect::new(Point2D::new(x, y), Size2D::new(width, height));
        let result = self.lock().read_color_buffer(handle, rect, format, ty, pixels);
        report("Reading a color buffer", result);
    }

    /// Uploads `pixels`, laid out as tightly packed rows of the rectangle, into a color buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn update_color_buffer(
        &self,
        handle: Handle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) -> bool {
        let rect = Rect::new(Point2D::new(x, y), Size2D::new(width, height));
        let result = self.lock().update_color_buffer(handle, rect, format, ty, pixels);
        report("Updating a color buffer", result).is_some()
    }

    // presentation

    /// Presents a color buffer. See [`State::post`].
    pub fn post(&self, handle: Handle) -> bool {
        self.lock().post(handle)
    }

    /// Presents the last-posted color buffer again. See [`State::repost`].
    pub fn repost(&self) -> bool {
        self.lock().repost()
    }

    /// Sets the presentation rotation in degrees and presents again.
    pub fn set_display_rotation(&self, rotation: f32) {
        self.lock().set_display_rotation(rotation)
    }

    /// Registers the observer handed every posted frame, or clears it.
    ///
    /// The callback runs with the framebuffer's lock held: it must not block or call back into
    /// the framebuffer.
    pub fn set_post_callback(&self, callback: Option<PostCallback>) {
        self.lock().presenter.set_callback(callback)
    }

    /// Creates the on-screen presentation surface inside a native window.
    ///
    /// Fails if one already exists.
    pub fn setup_sub_window(
        &self,
        window: RawWindowHandle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        rotation: f32,
    ) -> bool {
        let config = *self.configs.framebuffer_config();
        let geometry = Rect::new(Point2D::new(x, y), Size2D::new(width, height));
        let result = self.lock().setup_sub_window(&config, window, geometry, rotation);
        report("Setting up the sub-window", result).is_some()
    }

    /// Destroys the on-screen presentation surface. Returns `false` if there was none.
    pub fn remove_sub_window(&self) -> bool {
        self.lock().remove_sub_window_locked()
    }
}

impl<D: Driver> Drop for FrameBuffer<D> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|err| err.into_inner());
        debug!(
            "Finalizing framebuffer with {} live handles",
            state.registry.live_handles()
        );
        state.release_all();
        state.driver.terminate();
    }
}

impl<D: Driver> Debug for FrameBuffer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("caps", &self.caps)
            .field("strings", &self.strings)
            .finish()
    }
}
