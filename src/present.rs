// hostgl/src/present.rs
//
//! Presentation of color buffers to the on-screen sub-window.

use crate::context::CurrentContextGuard;
use crate::driver::{Driver, HostBinding};
use crate::framebuffer::{report, State};
use crate::{Error, FbConfig, Handle, Options};

use euclid::default::{Point2D, Rect, Size2D};
use glow as gl;
use log::{debug, info, warn};
use rwh_06::RawWindowHandle;
use std::time::{Duration, Instant};

/// Observer of posted frames: `(size, format, type, pixels)`.
///
/// Runs synchronously with the framebuffer's lock held.
pub type PostCallback = Box<dyn FnMut(Size2D<i32>, u32, u32, &[u8]) + Send>;

const STATS_INTERVAL: Duration = Duration::from_secs(1);

// The native presentation surface.
struct SubWindow<S> {
    window: RawWindowHandle,
    surface: S,
}

// The native window is only handed back to callers, never dereferenced here.
unsafe impl<S: Send> Send for SubWindow<S> {}

#[derive(Debug)]
struct FrameStats {
    enabled: bool,
    total: u64,
    frames: u32,
    window_start: Option<Instant>,
}

impl FrameStats {
    fn record_frame(&mut self) {
        self.total += 1;
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.duration_since(start);
        if elapsed >= STATS_INTERVAL {
            info!("{:.1} fps", self.frames as f64 / elapsed.as_secs_f64());
            self.frames = 0;
            self.window_start = Some(now);
        }
    }
}

/// Presentation state: geometry, rotation, the sub-window and the post observer.
pub(crate) struct Presenter<D: Driver> {
    geometry: Rect<i32>,
    rotation: f32,
    sub_window: Option<SubWindow<D::Surface>>,
    last_posted: Handle,
    callback: Option<PostCallback>,
    frame: Vec<u8>,
    stats: FrameStats,
}

impl<D: Driver> Presenter<D> {
    pub(crate) fn new(geometry: Rect<i32>, options: Options) -> Presenter<D> {
        Presenter {
            geometry,
            rotation: 0.0,
            sub_window: None,
            last_posted: Handle::NONE,
            callback: None,
            frame: Vec::new(),
            stats: FrameStats {
                enabled: options.fps_stats,
                total: 0,
                frames: 0,
                window_start: None,
            },
        }
    }

    #[inline]
    pub(crate) fn geometry(&self) -> Rect<i32> {
        self.geometry
    }

    #[inline]
    pub(crate) fn sub_window(&self) -> Option<RawWindowHandle> {
        self.sub_window.as_ref().map(|sub_window| sub_window.window)
    }

    #[inline]
    pub(crate) fn set_callback(&mut self, callback: Option<PostCallback>) {
        self.callback = callback;
    }
}

impl<D: Driver> State<D> {
    /// The color buffer most recently posted, or `Handle::NONE`.
    #[inline]
    pub fn last_posted(&self) -> Handle {
        self.presenter.last_posted
    }

    /// The presentation rotation, in degrees.
    #[inline]
    pub fn rotation(&self) -> f32 {
        self.presenter.rotation
    }

    /// The number of frames drawn to the sub-window so far.
    #[inline]
    pub fn presented_frames(&self) -> u64 {
        self.presenter.stats.total
    }

    // Binds the base context to the sub-window surface until the guard drops.
    fn bind_sub_window_locked(
        &mut self,
        surface: D::Surface,
    ) -> Result<CurrentContextGuard<'_, D>, Error> {
        let target = Some(HostBinding {
            context: self.base_context,
            draw: surface,
            read: surface,
        });
        CurrentContextGuard::bind(self, target)
    }

    /// Presents a color buffer.
    ///
    /// The buffer becomes the last-posted one and is drawn into the sub-window with the current
    /// rotation. If a post callback is registered it then receives the buffer's pixels, clipped
    /// to the presentation geometry, as RGBA. Without a sub-window the draw is skipped but the
    /// callback still runs. Returns `false` if the handle is unknown or the draw fails.
    ///
    /// Callers must hold the lock; [`crate::FrameBuffer::post`] takes it for them.
    pub fn post(&mut self, handle: Handle) -> bool {
        report("Posting a color buffer", self.post_locked(handle)).is_some()
    }

    fn post_locked(&mut self, handle: Handle) -> Result<(), Error> {
        let image = self.registry.color_buffer(handle)?.cb.image();
        self.presenter.last_posted = handle;

        match self.presenter.sub_window.as_ref().map(|sub_window| sub_window.surface) {
            Some(surface) => {
                let viewport = Rect::new(Point2D::zero(), self.presenter.geometry.size);
                let rotation = self.presenter.rotation;
                let mut guard = self.bind_sub_window_locked(surface)?;
                guard.driver.clear()?;
                guard.driver.draw_image(image, viewport, rotation)?;
                guard.driver.swap_buffers(surface)?;
                guard.presenter.stats.record_frame();
            }
            None => debug!("No sub-window; not drawing color buffer {}", handle),
        }

        if self.presenter.callback.is_some() {
            self.deliver_frame(handle)?;
        }
        Ok(())
    }

    fn deliver_frame(&mut self, handle: Handle) -> Result<(), Error> {
        let size = self.presenter.geometry.size;
        let mut guard = self.bind_locked()?;
        let state = &mut *guard;
        let presenter = &mut state.presenter;
        presenter.frame.clear();
        presenter
            .frame
            .resize(size.width as usize * size.height as usize * 4, 0);

        let cb = &state.registry.color_buffer(handle)?.cb;
        let rect = Rect::new(Point2D::zero(), size);
        cb.read_pixels(
            &mut state.driver,
            rect,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            &mut presenter.frame,
        )?;
        if let Some(callback) = presenter.callback.as_mut() {
            callback(size, gl::RGBA, gl::UNSIGNED_BYTE, &presenter.frame);
        }
        Ok(())
    }

    /// Presents the last-posted color buffer again with the current geometry and rotation.
    ///
    /// Does nothing and returns `false` if nothing has been posted yet.
    pub fn repost(&mut self) -> bool {
        let last_posted = self.presenter.last_posted;
        if last_posted.is_none() {
            return false;
        }
        self.post(last_posted)
    }

    /// Sets the presentation rotation in degrees and presents again.
    pub fn set_display_rotation(&mut self, rotation: f32) {
        self.presenter.rotation = rotation;
        self.repost();
    }

    pub(crate) fn setup_sub_window(
        &mut self,
        config: &FbConfig,
        window: RawWindowHandle,
        geometry: Rect<i32>,
        rotation: f32,
    ) -> Result<(), Error> {
        if self.presenter.sub_window.is_some() {
            return Err(Error::SubWindowExists);
        }
        if geometry.size.width <= 0 || geometry.size.height <= 0 {
            return Err(Error::InvalidSize);
        }

        let surface = self.driver.create_window_surface(config, window, geometry.size)?;
        debug!("Created sub-window surface {:?} at {:?}", surface, geometry);
        self.presenter.sub_window = Some(SubWindow { window, surface });
        let previous = (self.presenter.geometry, self.presenter.rotation);
        self.presenter.geometry = geometry;
        self.presenter.rotation = rotation;

        if let Err(err) = self.paint_sub_window(surface) {
            self.remove_sub_window_locked();
            (self.presenter.geometry, self.presenter.rotation) = previous;
            return Err(err);
        }
        Ok(())
    }

    // Shows the last-posted buffer in a fresh sub-window, or clears it.
    fn paint_sub_window(&mut self, surface: D::Surface) -> Result<(), Error> {
        let last_posted = self.presenter.last_posted;
        if self.registry.color_buffer(last_posted).is_ok() {
            return self.post_locked(last_posted);
        }
        let mut guard = self.bind_sub_window_locked(surface)?;
        guard.driver.clear()?;
        guard.driver.swap_buffers(surface)
    }

    /// Destroys the sub-window surface. Returns `false` if there was none.
    pub(crate) fn remove_sub_window_locked(&mut self) -> bool {
        let sub_window = match self.presenter.sub_window.take() {
            Some(sub_window) => sub_window,
            None => return false,
        };

        if let Some(current) = self.current {
            if current.draw == sub_window.surface || current.read == sub_window.surface {
                if let Err(err) = self.make_current(None) {
                    warn!("Failed to unbind the sub-window: {:?}", err);
                }
            }
        }
        debug!("Destroying sub-window surface {:?}", sub_window.surface);
        report(
            "Destroying the sub-window surface",
            self.driver.destroy_surface(sub_window.surface),
        );
        true
    }
}
