// hostgl/src/platform/software/mod.rs
//
//! A software driver that keeps every surface and image in CPU memory.
//!
//! Useful for headless hosts and for testing: a [`Monitor`] obtained before the driver is handed
//! to a framebuffer observes live objects and the current binding afterwards, and failures can be
//! injected into individual operations.

mod draw;

use crate::driver::{CurrentBinding, Driver, HostBinding};
use crate::{Error, FbConfig, GLApi, GLVersion, RenderableFlags, StringName, SurfaceTypeFlags};
use crate::WindowingApiError;

use euclid::default::{Rect, Size2D};
use fnv::FnvHashMap;
use log::debug;
use rwh_06::RawWindowHandle;
use std::sync::{Arc, Mutex, MutexGuard};

const DISPLAY_EXTENSIONS: &str =
    "EGL_KHR_image_base EGL_KHR_gl_texture_2D_image EGL_KHR_gl_renderbuffer_image";
const GL_EXTENSIONS: &str = "GL_OES_EGL_image GL_OES_EGL_image_external GL_OES_rgb8_rgba8";

/// A host context created by the software driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u32);

/// A host surface created by the software driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(u32);

/// Pixel storage created by the software driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageId(u32);

/// Driver operations that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Initialize,
    CreateContext,
    CreateSurface,
    CreateImage,
    MakeCurrent,
    Draw,
}

struct ContextData {
    api: GLApi,
    share_group: u32,
    texture: Option<ImageId>,
    renderbuffer: Option<ImageId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SurfaceKind {
    Pbuffer,
    Window,
}

struct SurfaceData {
    kind: SurfaceKind,
    size: Size2D<i32>,
    back: Vec<u8>,
    front: Vec<u8>,
}

struct ImageData {
    size: Size2D<i32>,
    pixels: Vec<u8>,
}

struct Inner {
    initialized: bool,
    configs: Vec<FbConfig>,
    display_extensions: String,
    gl_extensions: String,
    next_id: u32,
    contexts: FnvHashMap<ContextId, ContextData>,
    surfaces: FnvHashMap<SurfaceId, SurfaceData>,
    images: FnvHashMap<ImageId, ImageData>,
    current: Option<HostBinding<ContextId, SurfaceId>>,
    // Remaining successful calls before an operation fails once.
    failures: FnvHashMap<Operation, usize>,
    make_current_calls: usize,
    draw_calls: usize,
    leaked: usize,
}

impl Inner {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&mut self, operation: Operation) -> Result<(), WindowingApiError> {
        if !self.initialized && operation != Operation::Initialize {
            return Err(WindowingApiError::NotInitialized);
        }
        match self.failures.get_mut(&operation) {
            Some(0) => {
                self.failures.remove(&operation);
                Err(WindowingApiError::BadAlloc)
            }
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn is_current_surface(&self, surface: SurfaceId) -> bool {
        self.current
            .map_or(false, |binding| binding.draw == surface || binding.read == surface)
    }

    fn current_draw_surface(&mut self) -> Result<&mut SurfaceData, Error> {
        let binding = self.current.ok_or(Error::NoCurrentContext)?;
        self.surfaces
            .get_mut(&binding.draw)
            .ok_or(Error::MakeCurrentFailed(WindowingApiError::BadCurrentSurface))
    }

    fn image(&self, image: ImageId) -> Result<&ImageData, Error> {
        self.images
            .get(&image)
            .ok_or(Error::PixelTransferFailed(WindowingApiError::BadParameter))
    }

    fn image_mut(&mut self, image: ImageId) -> Result<&mut ImageData, Error> {
        self.images
            .get_mut(&image)
            .ok_or(Error::PixelTransferFailed(WindowingApiError::BadParameter))
    }

    fn check_rect(size: Size2D<i32>, rect: &Rect<i32>) -> Result<(), Error> {
        if Rect::from_size(size).contains_rect(rect) {
            Ok(())
        } else {
            Err(Error::PixelTransferFailed(WindowingApiError::BadParameter))
        }
    }
}

fn default_configs() -> Vec<FbConfig> {
    let both = SurfaceTypeFlags::WINDOW | SurfaceTypeFlags::PBUFFER;
    let gles = RenderableFlags::GLES1 | RenderableFlags::GLES2;
    let config = |id, rgba: (u8, u8, u8, u8), depth, stencil, surface_types, renderable| {
        let (red, green, blue, alpha) = rgba;
        FbConfig {
            id,
            red_size: red,
            green_size: green,
            blue_size: blue,
            alpha_size: alpha,
            depth_size: depth,
            stencil_size: stencil,
            surface_types,
            renderable,
        }
    };
    vec![
        config(1, (8, 8, 8, 8), 24, 8, both, gles),
        config(2, (8, 8, 8, 0), 24, 8, both, gles),
        config(3, (5, 6, 5, 0), 16, 0, both, gles),
        config(4, (8, 8, 8, 8), 0, 0, SurfaceTypeFlags::PBUFFER, gles),
        config(5, (8, 8, 8, 8), 24, 8, both, RenderableFlags::GLES1),
    ]
}

/// The software driver.
pub struct SoftwareDriver {
    inner: Arc<Mutex<Inner>>,
}

/// A handle on a software driver's state that stays usable after the driver is handed over.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|err| err.into_inner())
}

impl Default for SoftwareDriver {
    fn default() -> Self {
        SoftwareDriver::new()
    }
}

impl SoftwareDriver {
    pub fn new() -> SoftwareDriver {
        SoftwareDriver {
            inner: Arc::new(Mutex::new(Inner {
                initialized: false,
                configs: default_configs(),
                display_extensions: DISPLAY_EXTENSIONS.to_owned(),
                gl_extensions: GL_EXTENSIONS.to_owned(),
                next_id: 0,
                contexts: FnvHashMap::default(),
                surfaces: FnvHashMap::default(),
                images: FnvHashMap::default(),
                current: None,
                failures: FnvHashMap::default(),
                make_current_calls: 0,
                draw_calls: 0,
                leaked: 0,
            })),
        }
    }

    /// Replaces the configurations the driver reports.
    pub fn with_configs(self, configs: Vec<FbConfig>) -> SoftwareDriver {
        lock(&self.inner).configs = configs;
        self
    }

    /// Replaces the display and GL extension strings the driver reports.
    pub fn with_extensions(self, display: &str, gl: &str) -> SoftwareDriver {
        {
            let mut inner = lock(&self.inner);
            inner.display_extensions = display.to_owned();
            inner.gl_extensions = gl.to_owned();
        }
        self
    }

    /// Makes `operation` fail once, after `after` further successful calls.
    pub fn fail_after(&self, operation: Operation, after: usize) {
        lock(&self.inner).failures.insert(operation, after);
    }

    pub fn monitor(&self) -> Monitor {
        Monitor {
            inner: self.inner.clone(),
        }
    }
}

impl Monitor {
    pub fn is_initialized(&self) -> bool {
        lock(&self.inner).initialized
    }

    pub fn live_contexts(&self) -> usize {
        lock(&self.inner).contexts.len()
    }

    pub fn live_surfaces(&self) -> usize {
        lock(&self.inner).surfaces.len()
    }

    pub fn live_images(&self) -> usize {
        lock(&self.inner).images.len()
    }

    pub fn current(&self) -> Option<HostBinding<ContextId, SurfaceId>> {
        lock(&self.inner).current
    }

    pub fn make_current_calls(&self) -> usize {
        lock(&self.inner).make_current_calls
    }

    pub fn draw_calls(&self) -> usize {
        lock(&self.inner).draw_calls
    }

    /// The number of objects still alive when the display was last terminated.
    pub fn leaked_at_terminate(&self) -> usize {
        lock(&self.inner).leaked
    }

    /// Makes `operation` fail once, after `after` further successful calls.
    pub fn fail_after(&self, operation: Operation, after: usize) {
        lock(&self.inner).failures.insert(operation, after);
    }

    /// The window surfaces currently alive.
    pub fn window_surfaces(&self) -> Vec<SurfaceId> {
        let inner = lock(&self.inner);
        let mut surfaces: Vec<SurfaceId> = inner
            .surfaces
            .iter()
            .filter(|(_, surface)| surface.kind == SurfaceKind::Window)
            .map(|(&id, _)| id)
            .collect();
        surfaces.sort_by_key(|id| id.0);
        surfaces
    }

    /// The last frame swapped to a window surface, as RGBA.
    pub fn presented(&self, surface: SurfaceId) -> Option<Vec<u8>> {
        lock(&self.inner)
            .surfaces
            .get(&surface)
            .map(|surface| surface.front.clone())
    }

    /// The contents of a surface's back buffer, as RGBA.
    pub fn surface_pixels(&self, surface: SurfaceId) -> Option<Vec<u8>> {
        lock(&self.inner)
            .surfaces
            .get(&surface)
            .map(|surface| surface.back.clone())
    }

    pub fn surface_size(&self, surface: SurfaceId) -> Option<Size2D<i32>> {
        lock(&self.inner).surfaces.get(&surface).map(|surface| surface.size)
    }

    /// Fills a surface's back buffer, standing in for client rendering.
    pub fn paint_surface(&self, surface: SurfaceId, color: [u8; 4]) -> bool {
        match lock(&self.inner).surfaces.get_mut(&surface) {
            Some(surface) => {
                draw::fill(&mut surface.back, color);
                true
            }
            None => false,
        }
    }

    pub fn context_api(&self, context: ContextId) -> Option<GLApi> {
        lock(&self.inner).contexts.get(&context).map(|context| context.api)
    }

    /// Returns true if two contexts share one object namespace.
    pub fn shares_objects(&self, a: ContextId, b: ContextId) -> bool {
        let inner = lock(&self.inner);
        match (inner.contexts.get(&a), inner.contexts.get(&b)) {
            (Some(a), Some(b)) => a.share_group == b.share_group,
            _ => false,
        }
    }

    /// The images bound as texture and renderbuffer in a context.
    pub fn context_images(
        &self,
        context: ContextId,
    ) -> Option<(Option<ImageId>, Option<ImageId>)> {
        lock(&self.inner)
            .contexts
            .get(&context)
            .map(|context| (context.texture, context.renderbuffer))
    }
}

impl Driver for SoftwareDriver {
    type Context = ContextId;
    type Surface = SurfaceId;
    type Image = ImageId;

    fn initialize(&mut self) -> Result<GLVersion, Error> {
        let mut inner = lock(&self.inner);
        inner
            .check(Operation::Initialize)
            .map_err(Error::ConnectionFailed)?;
        inner.initialized = true;
        Ok(GLVersion::new(1, 4))
    }

    fn terminate(&mut self) {
        let mut inner = lock(&self.inner);
        debug!(
            "Terminating software display: {} contexts, {} surfaces, {} images left",
            inner.contexts.len(),
            inner.surfaces.len(),
            inner.images.len()
        );
        inner.leaked = inner.contexts.len() + inner.surfaces.len() + inner.images.len();
        inner.contexts.clear();
        inner.surfaces.clear();
        inner.images.clear();
        inner.current = None;
        inner.initialized = false;
    }

    fn configs(&self) -> Result<Vec<FbConfig>, Error> {
        let inner = lock(&self.inner);
        if !inner.initialized {
            return Err(Error::ConnectionFailed(WindowingApiError::NotInitialized));
        }
        Ok(inner.configs.clone())
    }

    fn query_string(&self, name: StringName) -> String {
        let inner = lock(&self.inner);
        match name {
            StringName::DisplayExtensions => inner.display_extensions.clone(),
            _ if inner.current.is_none() => String::new(),
            StringName::Vendor => "hostgl".to_owned(),
            StringName::Renderer => "hostgl software rasterizer".to_owned(),
            StringName::Version => "OpenGL ES 2.0 (software)".to_owned(),
            StringName::Extensions => inner.gl_extensions.clone(),
        }
    }

    fn create_context(
        &mut self,
        config: &FbConfig,
        share_with: Option<ContextId>,
        api: GLApi,
    ) -> Result<ContextId, Error> {
        let mut inner = lock(&self.inner);
        inner
            .check(Operation::CreateContext)
            .map_err(Error::ContextCreationFailed)?;
        let renderable = match api {
            GLApi::GLES1 => RenderableFlags::GLES1,
            GLApi::GLES2 => RenderableFlags::GLES2,
        };
        if !config.renderable.contains(renderable) {
            return Err(Error::ContextCreationFailed(WindowingApiError::BadConfig));
        }

        let id = ContextId(inner.next_id());
        let share_group = match share_with {
            Some(share) => match inner.contexts.get(&share) {
                Some(share) => share.share_group,
                None => return Err(Error::ContextCreationFailed(WindowingApiError::BadContext)),
            },
            None => id.0,
        };
        inner.contexts.insert(
            id,
            ContextData {
                api,
                share_group,
                texture: None,
                renderbuffer: None,
            },
        );
        Ok(id)
    }

    fn destroy_context(&mut self, context: ContextId) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        if inner.current.map_or(false, |binding| binding.context == context) {
            return Err(Error::ContextDestructionFailed(WindowingApiError::BadAccess));
        }
        match inner.contexts.remove(&context) {
            Some(_) => Ok(()),
            None => Err(Error::ContextDestructionFailed(WindowingApiError::BadContext)),
        }
    }

    fn make_current(&mut self, binding: CurrentBinding<Self>) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        inner
            .check(Operation::MakeCurrent)
            .map_err(Error::MakeCurrentFailed)?;
        if let Some(binding) = binding {
            if !inner.contexts.contains_key(&binding.context) {
                return Err(Error::MakeCurrentFailed(WindowingApiError::BadContext));
            }
            if !inner.surfaces.contains_key(&binding.draw)
                || !inner.surfaces.contains_key(&binding.read)
            {
                return Err(Error::MakeCurrentFailed(WindowingApiError::BadSurface));
            }
        }
        inner.current = binding;
        inner.make_current_calls += 1;
        Ok(())
    }

    fn create_pbuffer_surface(
        &mut self,
        config: &FbConfig,
        size: Size2D<i32>,
    ) -> Result<SurfaceId, Error> {
        let mut inner = lock(&self.inner);
        inner
            .check(Operation::CreateSurface)
            .map_err(Error::SurfaceCreationFailed)?;
        if !config.surface_types.contains(SurfaceTypeFlags::PBUFFER) {
            return Err(Error::SurfaceCreationFailed(WindowingApiError::BadConfig));
        }
        if size.width <= 0 || size.height <= 0 {
            return Err(Error::SurfaceCreationFailed(WindowingApiError::BadParameter));
        }

        let id = SurfaceId(inner.next_id());
        let mut back = vec![0; draw::storage_len(size)];
        draw::fill(&mut back, draw::CLEAR_COLOR);
        inner.surfaces.insert(
            id,
            SurfaceData {
                kind: SurfaceKind::Pbuffer,
                size,
                back,
                front: Vec::new(),
            },
        );
        Ok(id)
    }

    fn create_window_surface(
        &mut self,
        config: &FbConfig,
        _: RawWindowHandle,
        size: Size2D<i32>,
    ) -> Result<SurfaceId, Error> {
        let mut inner = lock(&self.inner);
        inner
            .check(Operation::CreateSurface)
            .map_err(Error::SurfaceCreationFailed)?;
        if !config.surface_types.contains(SurfaceTypeFlags::WINDOW) {
            return Err(Error::SurfaceCreationFailed(WindowingApiError::BadConfig));
        }
        if size.width <= 0 || size.height <= 0 {
            return Err(Error::SurfaceCreationFailed(WindowingApiError::BadNativeWindow));
        }

        let id = SurfaceId(inner.next_id());
        let mut back = vec![0; draw::storage_len(size)];
        draw::fill(&mut back, draw::CLEAR_COLOR);
        inner.surfaces.insert(
            id,
            SurfaceData {
                kind: SurfaceKind::Window,
                size,
                front: back.clone(),
                back,
            },
        );
        Ok(id)
    }

    fn destroy_surface(&mut self, surface: SurfaceId) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        if inner.is_current_surface(surface) {
            return Err(Error::SurfaceDestructionFailed(WindowingApiError::BadAccess));
        }
        match inner.surfaces.remove(&surface) {
            Some(_) => Ok(()),
            None => Err(Error::SurfaceDestructionFailed(WindowingApiError::BadSurface)),
        }
    }

    fn swap_buffers(&mut self, surface: SurfaceId) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        let surface = inner
            .surfaces
            .get_mut(&surface)
            .ok_or(Error::PresentFailed(WindowingApiError::BadSurface))?;
        if surface.kind == SurfaceKind::Window {
            surface.front.copy_from_slice(&surface.back);
        }
        Ok(())
    }

    fn create_image(&mut self, size: Size2D<i32>, _: u32) -> Result<ImageId, Error> {
        let mut inner = lock(&self.inner);
        inner
            .check(Operation::CreateImage)
            .map_err(Error::ImageCreationFailed)?;
        if inner.current.is_none() {
            return Err(Error::NoCurrentContext);
        }

        let id = ImageId(inner.next_id());
        inner.images.insert(
            id,
            ImageData {
                size,
                pixels: vec![0; draw::storage_len(size)],
            },
        );
        Ok(id)
    }

    fn destroy_image(&mut self, image: ImageId) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        if inner.images.remove(&image).is_none() {
            return Err(Error::ImageCreationFailed(WindowingApiError::BadParameter));
        }
        for context in inner.contexts.values_mut() {
            if context.texture == Some(image) {
                context.texture = None;
            }
            if context.renderbuffer == Some(image) {
                context.renderbuffer = None;
            }
        }
        Ok(())
    }

    fn read_pixels(
        &mut self,
        image: ImageId,
        rect: Rect<i32>,
        format: u32,
        ty: u32,
        pixels: &mut [u8],
    ) -> Result<(), Error> {
        let inner = lock(&self.inner);
        let image = inner.image(image)?;
        Inner::check_rect(image.size, &rect)?;
        draw::read_rect(&image.pixels, image.size, rect, format, ty, pixels)
    }

    fn write_pixels(
        &mut self,
        image: ImageId,
        rect: Rect<i32>,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        let image = inner.image_mut(image)?;
        Inner::check_rect(image.size, &rect)?;
        draw::write_rect(&mut image.pixels, image.size, rect, format, ty, pixels)
    }

    fn copy_surface_to_image(&mut self, surface: SurfaceId, image: ImageId) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        let inner = &mut *inner;
        let surface = inner
            .surfaces
            .get(&surface)
            .ok_or(Error::PixelTransferFailed(WindowingApiError::BadSurface))?;
        let image = inner
            .images
            .get_mut(&image)
            .ok_or(Error::PixelTransferFailed(WindowingApiError::BadParameter))?;
        draw::copy_overlap(&surface.back, surface.size, &mut image.pixels, image.size);
        Ok(())
    }

    fn bind_image_to_texture(&mut self, image: ImageId) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        inner.image(image)?;
        let binding = inner.current.ok_or(Error::NoCurrentContext)?;
        if let Some(context) = inner.contexts.get_mut(&binding.context) {
            context.texture = Some(image);
        }
        Ok(())
    }

    fn bind_image_to_renderbuffer(&mut self, image: ImageId) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        inner.image(image)?;
        let binding = inner.current.ok_or(Error::NoCurrentContext)?;
        if let Some(context) = inner.contexts.get_mut(&binding.context) {
            context.renderbuffer = Some(image);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        let surface = inner.current_draw_surface()?;
        draw::fill(&mut surface.back, draw::CLEAR_COLOR);
        Ok(())
    }

    fn draw_image(
        &mut self,
        image: ImageId,
        viewport: Rect<i32>,
        rotation: f32,
    ) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        inner
            .check(Operation::Draw)
            .map_err(Error::PresentFailed)?;
        let binding = inner.current.ok_or(Error::NoCurrentContext)?;
        let inner = &mut *inner;
        let image = inner
            .images
            .get(&image)
            .ok_or(Error::PresentFailed(WindowingApiError::BadParameter))?;
        let surface = inner
            .surfaces
            .get_mut(&binding.draw)
            .ok_or(Error::PresentFailed(WindowingApiError::BadCurrentSurface))?;
        draw::draw_rotated(
            &image.pixels,
            image.size,
            &mut surface.back,
            surface.size,
            viewport,
            rotation,
        );
        inner.draw_calls += 1;
        Ok(())
    }
}
