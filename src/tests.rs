// hostgl/src/tests.rs
//
//! Unit tests.

use crate::platform::software::{Monitor, Operation, SoftwareDriver};
use crate::{Binding, Error, FrameBuffer, FrameBufferSlot, GLApi, Handle, Options};

use euclid::default::Size2D;
use fnv::FnvHashSet;
use glow as gl;
use rand::seq::SliceRandom;
use rand::Rng;
use rwh_06::{RawWindowHandle, XlibWindowHandle};
use std::sync::{Arc, Mutex};
use std::thread;

const RED: [u8; 4] = [255, 0, 0, 255];
const SENTINEL: u8 = 0xaa;

fn framebuffer(width: i32, height: i32) -> (FrameBuffer<SoftwareDriver>, Monitor) {
    framebuffer_with(SoftwareDriver::new(), width, height)
}

fn framebuffer_with(
    driver: SoftwareDriver,
    width: i32,
    height: i32,
) -> (FrameBuffer<SoftwareDriver>, Monitor) {
    let monitor = driver.monitor();
    let framebuffer = FrameBuffer::initialize(driver, width, height, Options::default()).unwrap();
    (framebuffer, monitor)
}

fn window() -> RawWindowHandle {
    RawWindowHandle::Xlib(XlibWindowHandle::new(1))
}

fn solid(width: i32, height: i32, color: [u8; 4]) -> Vec<u8> {
    color.repeat(width as usize * height as usize)
}

// A buffer whose pixel at (x, y) is [x, y, 7, 255].
fn gradient(framebuffer: &FrameBuffer<SoftwareDriver>, width: i32, height: i32) -> Handle {
    let cb = framebuffer.create_color_buffer(width, height, gl::RGBA).unwrap();
    let mut pixels = vec![];
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[x as u8, y as u8, 7, 255]);
        }
    }
    assert!(framebuffer.update_color_buffer(
        cb,
        0,
        0,
        width,
        height,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        &pixels
    ));
    cb
}

fn read_all(
    framebuffer: &FrameBuffer<SoftwareDriver>,
    cb: Handle,
    width: i32,
    height: i32,
) -> Vec<u8> {
    let mut pixels = vec![SENTINEL; width as usize * height as usize * 4];
    let (format, ty) = (gl::RGBA, gl::UNSIGNED_BYTE);
    framebuffer.read_color_buffer(cb, 0, 0, width, height, format, ty, &mut pixels);
    pixels
}

// Binds a fresh context and surface; returns (context, surface).
fn bind_client(
    framebuffer: &FrameBuffer<SoftwareDriver>,
    width: i32,
    height: i32,
) -> (Handle, Handle) {
    let context = framebuffer.create_render_context(0, Handle::NONE, GLApi::GLES2).unwrap();
    let surface = framebuffer.create_window_surface(0, width, height).unwrap();
    assert!(framebuffer.bind_context(context, surface, surface));
    (context, surface)
}

#[test]
fn test_initialize_probes_driver() {
    let (framebuffer, monitor) = framebuffer(64, 32);
    assert_eq!(framebuffer.width(), 64);
    assert_eq!(framebuffer.height(), 32);

    // Pbuffer-only and GLES1-only configurations are not offered to clients.
    assert_eq!(framebuffer.configs().len(), 3);
    assert_eq!(framebuffer.configs().framebuffer_config().id, 1);
    assert!(framebuffer.caps().has_eglimage_texture_2d());
    assert!(framebuffer.caps().has_eglimage_renderbuffer());
    assert_eq!(framebuffer.gl_strings().vendor, "hostgl");
    assert!(!framebuffer.gl_strings().renderer.is_empty());

    // The base context, the off-screen context and its surface.
    assert_eq!(monitor.live_contexts(), 2);
    assert_eq!(monitor.live_surfaces(), 1);
    assert_eq!(monitor.current(), None);
    assert_eq!(framebuffer.bound(), Binding::NONE);
}

#[test]
fn test_initialize_rejects_empty_size() {
    let driver = SoftwareDriver::new();
    let monitor = driver.monitor();
    match FrameBuffer::initialize(driver, 0, 600, Options::default()) {
        Err(Error::InvalidSize) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!monitor.is_initialized());
}

#[test]
fn test_initialize_requires_image_extension() {
    let driver = SoftwareDriver::new().with_extensions("EGL_KHR_image_base", "GL_OES_rgb8_rgba8");
    let monitor = driver.monitor();
    match FrameBuffer::initialize(driver, 8, 8, Options::default()) {
        Err(Error::RequiredExtensionUnavailable(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!monitor.is_initialized());
    assert_eq!(monitor.leaked_at_terminate(), 0);
}

#[test]
fn test_initialize_without_renderbuffer_images() {
    let driver = SoftwareDriver::new().with_extensions("EGL_KHR_image_base", "GL_OES_EGL_image");
    let (framebuffer, _) = framebuffer_with(driver, 8, 8);
    assert!(framebuffer.caps().has_eglimage_texture_2d());
    assert!(!framebuffer.caps().has_eglimage_renderbuffer());

    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
    bind_client(&framebuffer, 4, 4);
    assert!(framebuffer.bind_color_buffer_to_texture(cb));
    assert!(!framebuffer.bind_color_buffer_to_renderbuffer(cb));
}

#[test]
fn test_initialize_rolls_back_on_failure() {
    let failures = [
        (Operation::Initialize, 0),
        (Operation::CreateContext, 0),
        (Operation::CreateContext, 1),
        (Operation::CreateSurface, 0),
        (Operation::MakeCurrent, 0),
    ];
    for &(operation, after) in &failures {
        let driver = SoftwareDriver::new();
        driver.fail_after(operation, after);
        let monitor = driver.monitor();
        assert!(FrameBuffer::initialize(driver, 8, 8, Options::default()).is_err());
        assert!(!monitor.is_initialized(), "{:?} left the display open", operation);
        assert_eq!(monitor.leaked_at_terminate(), 0, "{:?} leaked", operation);
    }
}

#[test]
fn test_initialize_rejects_missing_config() {
    let driver = SoftwareDriver::new().with_configs(vec![]);
    let monitor = driver.monitor();
    match FrameBuffer::initialize(driver, 8, 8, Options::default()) {
        Err(Error::NoPixelFormatFound) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!monitor.is_initialized());
}

#[test]
fn test_finalize_releases_everything() {
    let (framebuffer, monitor) = framebuffer(16, 16);
    let (_, surface) = bind_client(&framebuffer, 16, 16);
    let cb = framebuffer.create_color_buffer(16, 16, gl::RGBA).unwrap();
    framebuffer.create_color_buffer(2, 2, gl::RGB).unwrap();
    assert!(framebuffer.set_window_surface_color_buffer(surface, cb));
    assert!(framebuffer.setup_sub_window(window(), 0, 0, 16, 16, 0.0));
    assert!(framebuffer.post(cb));

    framebuffer.finalize();
    assert!(!monitor.is_initialized());
    assert_eq!(monitor.leaked_at_terminate(), 0);
}

#[test]
fn test_color_buffer_refcount() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let images = monitor.live_images();
    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
    assert_eq!(framebuffer.color_buffer_refcount(cb), Some(1));
    assert_eq!(monitor.live_images(), images + 1);

    for _ in 0..3 {
        assert!(framebuffer.open_color_buffer(cb));
    }
    assert_eq!(framebuffer.color_buffer_refcount(cb), Some(4));

    for remaining in (1..4).rev() {
        framebuffer.close_color_buffer(cb);
        assert_eq!(framebuffer.color_buffer_refcount(cb), Some(remaining));
        assert_eq!(monitor.live_images(), images + 1);
    }
    framebuffer.close_color_buffer(cb);
    assert_eq!(framebuffer.color_buffer_refcount(cb), None);
    assert_eq!(monitor.live_images(), images);

    // Stale handles are rejected, not resurrected.
    framebuffer.close_color_buffer(cb);
    assert!(!framebuffer.open_color_buffer(cb));
    assert_eq!(read_all(&framebuffer, cb, 4, 4), vec![SENTINEL; 64]);
    assert!(!framebuffer.update_color_buffer(
        cb,
        0,
        0,
        1,
        1,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        &RED
    ));
}

#[test]
fn test_color_buffer_refcount_random_order() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let images = monitor.live_images();
    let mut rng = rand::thread_rng();

    let mut closes = vec![];
    let mut opened = vec![];
    for _ in 0..8 {
        let cb = framebuffer.create_color_buffer(2, 2, gl::RGBA).unwrap();
        let opens = rng.gen_range(0..5);
        for _ in 0..opens {
            assert!(framebuffer.open_color_buffer(cb));
        }
        closes.extend(std::iter::repeat(cb).take(opens + 1));
        opened.push((cb, opens as u32 + 1));
    }
    closes.shuffle(&mut rng);

    let mut outstanding: Vec<(Handle, u32)> = opened;
    for cb in closes {
        framebuffer.close_color_buffer(cb);
        let entry = outstanding.iter_mut().find(|(handle, _)| *handle == cb).unwrap();
        entry.1 -= 1;
        let expected = if entry.1 == 0 { None } else { Some(entry.1) };
        assert_eq!(framebuffer.color_buffer_refcount(cb), expected);
        let live = outstanding.iter().filter(|(_, count)| *count > 0).count();
        assert_eq!(monitor.live_images(), images + live);
    }
}

#[test]
fn test_close_color_buffer_without_context() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let images = monitor.live_images();
    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();

    // The off-screen context can't be bound, but the storage is still freed.
    monitor.fail_after(Operation::MakeCurrent, 0);
    framebuffer.close_color_buffer(cb);
    assert_eq!(framebuffer.color_buffer_refcount(cb), None);
    assert_eq!(monitor.live_images(), images);
    assert_eq!(monitor.current(), None);
}

#[test]
fn test_color_buffer_rejects_bad_arguments() {
    let (framebuffer, _) = framebuffer(8, 8);
    assert_eq!(framebuffer.create_color_buffer(0, 4, gl::RGBA), None);
    assert_eq!(framebuffer.create_color_buffer(4, -1, gl::RGBA), None);
    assert_eq!(framebuffer.create_color_buffer(4, 4, gl::DEPTH_COMPONENT), None);
    assert!(framebuffer.create_color_buffer(4, 4, gl::RGB8).is_some());
}

#[test]
fn test_handles_are_unique() {
    let (framebuffer, _) = framebuffer(8, 8);
    let mut handles = FnvHashSet::default();
    for _ in 0..4 {
        let (context, surface) = bind_client(&framebuffer, 4, 4);
        let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
        let bare = framebuffer.gen_handle().unwrap();
        for handle in [context, surface, cb, bare] {
            assert!(!handle.is_none());
            assert!(handles.insert(handle), "{} issued twice", handle);
        }
    }

    // Destroyed handles are never reissued.
    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
    framebuffer.close_color_buffer(cb);
    assert!(handles.insert(cb));
    for _ in 0..16 {
        let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
        assert!(handles.insert(cb));
        framebuffer.close_color_buffer(cb);
    }
}

#[test]
fn test_bind_context() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let (context, surface) = bind_client(&framebuffer, 4, 4);
    let read = framebuffer.create_window_surface(0, 2, 2).unwrap();
    assert!(framebuffer.bind_context(context, surface, read));
    assert_eq!(
        framebuffer.bound(),
        Binding {
            context,
            draw: surface,
            read,
        }
    );
    let current = monitor.current().unwrap();
    assert_ne!(current.draw, current.read);

    // A failed bind leaves the previous binding alone.
    assert!(!framebuffer.bind_context(context, Handle(0xdead), read));
    assert_eq!(framebuffer.bound().draw, surface);
    assert_eq!(monitor.current(), Some(current));

    assert!(framebuffer.bind_context(Handle::NONE, Handle::NONE, Handle::NONE));
    assert_eq!(framebuffer.bound(), Binding::NONE);
    assert_eq!(monitor.current(), None);
}

#[test]
fn test_bind_locked_restores_binding() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    bind_client(&framebuffer, 4, 4);
    let client = monitor.current();
    assert!(client.is_some());

    let mut state = framebuffer.lock();
    let mut guard = state.bind_locked().unwrap();
    let offscreen = guard.current();
    assert_ne!(offscreen, client);
    assert_eq!(guard.previous(), client);
    assert_eq!(monitor.current(), offscreen);

    // Nested guards restore the outer guard's binding.
    let inner = guard.bind_locked().unwrap();
    assert_eq!(inner.previous(), offscreen);
    drop(inner);
    assert_eq!(guard.current(), offscreen);

    crate::State::unbind_locked(guard);
    assert_eq!(state.current(), client);
    assert_eq!(monitor.current(), client);
}

#[test]
fn test_bind_locked_restores_unbound_state() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
    read_all(&framebuffer, cb, 4, 4);
    assert_eq!(monitor.current(), None);
}

#[test]
fn test_destroying_bound_resources_unbinds() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let contexts = monitor.live_contexts();
    let (context, surface) = bind_client(&framebuffer, 4, 4);

    framebuffer.destroy_render_context(context);
    assert_eq!(framebuffer.bound(), Binding::NONE);
    assert_eq!(monitor.current(), None);
    assert_eq!(monitor.live_contexts(), contexts);
    assert!(!framebuffer.bind_context(context, surface, surface));

    let (_, surface) = bind_client(&framebuffer, 4, 4);
    let surfaces = monitor.live_surfaces();
    framebuffer.destroy_window_surface(surface);
    assert_eq!(framebuffer.bound(), Binding::NONE);
    assert_eq!(monitor.current(), None);
    assert_eq!(monitor.live_surfaces(), surfaces - 1);
}

#[test]
fn test_destroying_unbound_resources_keeps_binding() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let other = framebuffer.create_render_context(0, Handle::NONE, GLApi::GLES1).unwrap();
    let (context, surface) = bind_client(&framebuffer, 4, 4);
    let current = monitor.current();

    framebuffer.destroy_render_context(other);
    assert_eq!(framebuffer.bound().context, context);
    assert_eq!(framebuffer.bound().draw, surface);
    assert_eq!(monitor.current(), current);
}

#[test]
fn test_render_context_sharing() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let first = framebuffer.create_render_context(0, Handle::NONE, GLApi::GLES2).unwrap();
    let shared = framebuffer.create_render_context(0, first, GLApi::GLES2).unwrap();
    let stale = framebuffer.gen_handle().unwrap();
    let unshared = framebuffer.create_render_context(1, stale, GLApi::GLES1).unwrap();

    let state = framebuffer.lock();
    let host = |handle| state.registry.context(handle).unwrap().context;
    assert_eq!(state.registry.context(shared).unwrap().share(), first);
    assert_eq!(state.registry.context(unshared).unwrap().share(), Handle::NONE);
    assert_eq!(state.registry.context(unshared).unwrap().api(), GLApi::GLES1);
    assert!(monitor.shares_objects(host(first), host(shared)));
    assert!(!monitor.shares_objects(host(first), host(unshared)));
    assert_eq!(monitor.context_api(host(unshared)), Some(GLApi::GLES1));
}

#[test]
fn test_invalid_config_index() {
    let (framebuffer, _) = framebuffer(8, 8);
    let count = framebuffer.configs().len();
    assert_eq!(framebuffer.create_render_context(count, Handle::NONE, GLApi::GLES2), None);
    assert_eq!(framebuffer.create_window_surface(count, 4, 4), None);
    assert_eq!(framebuffer.create_window_surface(0, 0, 4), None);
}

#[test]
fn test_read_color_buffer_clips() {
    let (framebuffer, _) = framebuffer(8, 8);
    let cb = gradient(&framebuffer, 4, 4);

    // Straddling the bottom-right corner: only the top-left quadrant of the request is written.
    let mut pixels = vec![SENTINEL; 4 * 4 * 4];
    framebuffer.read_color_buffer(cb, 2, 2, 4, 4, gl::RGBA, gl::UNSIGNED_BYTE, &mut pixels);
    for (index, pixel) in pixels.chunks_exact(4).enumerate() {
        let (x, y) = (index % 4, index / 4);
        if x < 2 && y < 2 {
            assert_eq!(pixel, [x as u8 + 2, y as u8 + 2, 7, 255]);
        } else {
            assert_eq!(pixel, [SENTINEL; 4]);
        }
    }

    // Straddling the top-left corner.
    let mut pixels = vec![SENTINEL; 2 * 2 * 4];
    framebuffer.read_color_buffer(cb, -1, -1, 2, 2, gl::RGBA, gl::UNSIGNED_BYTE, &mut pixels);
    assert_eq!(&pixels[..12], &[SENTINEL; 12]);
    assert_eq!(&pixels[12..], &[0, 0, 7, 255]);

    // Entirely outside.
    let mut pixels = vec![SENTINEL; 2 * 2 * 4];
    framebuffer.read_color_buffer(cb, 10, 10, 2, 2, gl::RGBA, gl::UNSIGNED_BYTE, &mut pixels);
    assert_eq!(pixels, vec![SENTINEL; 16]);

    // Far edges past `i32::MAX` are outside too.
    let (format, ty) = (gl::RGBA, gl::UNSIGNED_BYTE);
    let mut pixels = vec![SENTINEL; 4 * 4 * 4];
    framebuffer.read_color_buffer(cb, i32::MAX - 1, 0, 4, 4, format, ty, &mut pixels);
    framebuffer.read_color_buffer(cb, 0, i32::MAX - 1, 4, 4, format, ty, &mut pixels);
    framebuffer.read_color_buffer(cb, i32::MAX, i32::MAX, 4, 4, format, ty, &mut pixels);
    assert_eq!(pixels, vec![SENTINEL; 64]);
}

#[test]
fn test_read_color_buffer_rgb() {
    let (framebuffer, _) = framebuffer(8, 8);
    let cb = gradient(&framebuffer, 2, 2);
    let mut pixels = vec![SENTINEL; 2 * 2 * 3];
    framebuffer.read_color_buffer(cb, 0, 0, 2, 2, gl::RGB, gl::UNSIGNED_BYTE, &mut pixels);
    assert_eq!(pixels, vec![0, 0, 7, 1, 0, 7, 0, 1, 7, 1, 1, 7]);
}

#[test]
fn test_read_color_buffer_rejects_short_storage() {
    let (framebuffer, _) = framebuffer(8, 8);
    let cb = gradient(&framebuffer, 4, 4);
    let mut pixels = vec![SENTINEL; 2 * 2 * 4 - 1];
    framebuffer.read_color_buffer(cb, 0, 0, 2, 2, gl::RGBA, gl::UNSIGNED_BYTE, &mut pixels);
    assert!(pixels.iter().all(|&byte| byte == SENTINEL));

    let mut pixels = vec![SENTINEL; 16];
    framebuffer.read_color_buffer(cb, 0, 0, 2, 2, gl::RGBA, gl::FLOAT, &mut pixels);
    assert!(pixels.iter().all(|&byte| byte == SENTINEL));
}

#[test]
fn test_update_color_buffer_clips() {
    let (framebuffer, _) = framebuffer(8, 8);
    let cb = gradient(&framebuffer, 4, 4);
    let before = read_all(&framebuffer, cb, 4, 4);

    let green = solid(2, 2, [0, 255, 0, 255]);
    assert!(framebuffer.update_color_buffer(
        cb,
        3,
        3,
        2,
        2,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        &green
    ));
    let after = read_all(&framebuffer, cb, 4, 4);
    for (index, (old, new)) in before.chunks_exact(4).zip(after.chunks_exact(4)).enumerate() {
        if index == 15 {
            assert_eq!(new, [0, 255, 0, 255]);
        } else {
            assert_eq!(old, new);
        }
    }

    assert!(!framebuffer.update_color_buffer(
        cb,
        0,
        0,
        2,
        2,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        &green[..15]
    ));

    // Rectangles whose far edge overflows are dropped.
    let (format, ty) = (gl::RGBA, gl::UNSIGNED_BYTE);
    for &(x, y) in &[(i32::MAX - 1, 0), (0, i32::MAX - 1), (i32::MAX, i32::MAX)] {
        assert!(framebuffer.update_color_buffer(cb, x, y, 2, 2, format, ty, &green));
    }
    assert_eq!(read_all(&framebuffer, cb, 4, 4), after);
}

#[test]
fn test_set_window_surface_color_buffer() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let images = monitor.live_images();
    let (_, surface) = bind_client(&framebuffer, 4, 4);
    let first = framebuffer.create_color_buffer(8, 6, gl::RGBA).unwrap();
    let second = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();

    assert!(framebuffer.set_window_surface_color_buffer(surface, first));
    assert_eq!(framebuffer.color_buffer_refcount(first), Some(2));

    // The bound surface follows the buffer's size and stays bound.
    let current = monitor.current().unwrap();
    assert_eq!(monitor.surface_size(current.draw), Some(Size2D::new(8, 6)));
    assert_eq!(framebuffer.bound().draw, surface);

    // Attaching the same buffer again changes nothing.
    assert!(framebuffer.set_window_surface_color_buffer(surface, first));
    assert_eq!(framebuffer.color_buffer_refcount(first), Some(2));

    assert!(framebuffer.set_window_surface_color_buffer(surface, second));
    assert_eq!(framebuffer.color_buffer_refcount(first), Some(1));
    assert_eq!(framebuffer.color_buffer_refcount(second), Some(2));

    // The creator's reference was the last one to the first buffer.
    framebuffer.close_color_buffer(first);
    assert_eq!(framebuffer.color_buffer_refcount(first), None);
    assert_eq!(read_all(&framebuffer, first, 2, 2), vec![SENTINEL; 16]);

    // Destroying the surface drops its reference to the second.
    framebuffer.destroy_window_surface(surface);
    assert_eq!(framebuffer.color_buffer_refcount(second), Some(1));
    framebuffer.close_color_buffer(second);
    assert_eq!(monitor.live_images(), images);
}

#[test]
fn test_set_window_surface_color_buffer_rebind_failure() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let (_, surface) = bind_client(&framebuffer, 4, 4);
    let cb = framebuffer.create_color_buffer(8, 6, gl::RGBA).unwrap();
    let surfaces = monitor.live_surfaces();
    let client = monitor.current().unwrap();

    // Moving the binding onto the resized surface fails: the old surface stays in place.
    monitor.fail_after(Operation::MakeCurrent, 0);
    assert!(!framebuffer.set_window_surface_color_buffer(surface, cb));
    assert_eq!(monitor.live_surfaces(), surfaces);
    assert_eq!(monitor.current(), Some(client));
    assert_eq!(monitor.surface_size(client.draw), Some(Size2D::new(4, 4)));
    assert_eq!(framebuffer.color_buffer_refcount(cb), Some(1));
    assert_eq!(framebuffer.bound().draw, surface);

    assert!(framebuffer.set_window_surface_color_buffer(surface, cb));
    assert_eq!(monitor.live_surfaces(), surfaces);
    let current = monitor.current().unwrap();
    assert_eq!(monitor.surface_size(current.draw), Some(Size2D::new(8, 6)));

    framebuffer.destroy_window_surface(surface);
    assert_eq!(monitor.live_surfaces(), surfaces - 1);
}

#[test]
fn test_set_window_surface_color_buffer_rejects_unknown() {
    let (framebuffer, _) = framebuffer(8, 8);
    let surface = framebuffer.create_window_surface(0, 4, 4).unwrap();
    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
    assert!(!framebuffer.set_window_surface_color_buffer(surface, Handle(0xbad)));
    assert!(!framebuffer.set_window_surface_color_buffer(Handle(0xbad), cb));
    assert_eq!(framebuffer.color_buffer_refcount(cb), Some(1));
}

#[test]
fn test_flush_window_surface_color_buffer() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let (_, surface) = bind_client(&framebuffer, 4, 4);

    // Nothing attached yet.
    assert!(framebuffer.flush_window_surface_color_buffer(surface));

    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
    assert!(framebuffer.set_window_surface_color_buffer(surface, cb));
    let client = monitor.current().unwrap();
    assert!(monitor.paint_surface(client.draw, [1, 2, 3, 4]));

    assert!(framebuffer.flush_window_surface_color_buffer(surface));
    assert_eq!(read_all(&framebuffer, cb, 4, 4), solid(4, 4, [1, 2, 3, 4]));
    assert_eq!(monitor.current(), Some(client));

    assert!(!framebuffer.flush_window_surface_color_buffer(Handle(0xbad)));
}

#[test]
fn test_bind_color_buffer_to_texture() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();

    // No client context is bound.
    assert!(!framebuffer.bind_color_buffer_to_texture(cb));
    assert!(!framebuffer.bind_color_buffer_to_renderbuffer(cb));

    bind_client(&framebuffer, 4, 4);
    assert!(framebuffer.bind_color_buffer_to_texture(cb));
    assert!(framebuffer.bind_color_buffer_to_renderbuffer(cb));
    assert!(!framebuffer.bind_color_buffer_to_texture(Handle(0xbad)));

    let image = framebuffer.lock().registry.color_buffer(cb).unwrap().cb.image();
    let context = monitor.current().unwrap().context;
    assert_eq!(monitor.context_images(context), Some((Some(image), Some(image))));
}

#[test]
fn test_drain_is_per_owner() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let framebuffer = Arc::new(framebuffer);
    let contexts = monitor.live_contexts();
    let surfaces = monitor.live_surfaces();

    let mine = (
        framebuffer.create_render_context(0, Handle::NONE, GLApi::GLES2).unwrap(),
        framebuffer.create_window_surface(0, 4, 4).unwrap(),
    );

    // The first worker drains everything it created.
    let worker = {
        let framebuffer = framebuffer.clone();
        thread::spawn(move || {
            let drained = (
                framebuffer.create_render_context(0, Handle::NONE, GLApi::GLES2).unwrap(),
                framebuffer.create_window_surface(0, 4, 4).unwrap(),
            );
            framebuffer.create_render_context(0, drained.0, GLApi::GLES1).unwrap();
            framebuffer.drain_render_contexts();
            framebuffer.drain_window_surfaces();
            drained
        })
    };
    let drained = worker.join().unwrap();
    assert_eq!(monitor.live_contexts(), contexts + 1);
    assert_eq!(monitor.live_surfaces(), surfaces + 1);
    assert!(!framebuffer.bind_context(drained.0, mine.1, mine.1));
    assert!(!framebuffer.bind_context(mine.0, drained.1, drained.1));
    assert!(framebuffer.bind_context(mine.0, mine.1, mine.1));

    // The second leaves its resources behind.
    let worker = {
        let framebuffer = framebuffer.clone();
        thread::spawn(move || {
            (
                framebuffer.create_render_context(0, Handle::NONE, GLApi::GLES2).unwrap(),
                framebuffer.create_window_surface(0, 2, 2).unwrap(),
            )
        })
    };
    let kept = worker.join().unwrap();

    // Draining the main thread never touches what a worker created.
    framebuffer.drain_render_contexts();
    framebuffer.drain_window_surfaces();
    assert_eq!(framebuffer.bound(), Binding::NONE);
    assert_eq!(monitor.live_contexts(), contexts + 1);
    assert_eq!(monitor.live_surfaces(), surfaces + 1);
    assert!(framebuffer.bind_context(kept.0, kept.1, kept.1));
}

#[test]
fn test_concurrent_clients() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    let framebuffer = Arc::new(framebuffer);
    let images = monitor.live_images();
    let shared = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let framebuffer = framebuffer.clone();
            thread::spawn(move || {
                let (context, surface) = bind_client(&framebuffer, 4, 4);
                for _ in 0..16 {
                    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
                    assert!(framebuffer.set_window_surface_color_buffer(surface, cb));
                    framebuffer.close_color_buffer(cb);
                    assert!(framebuffer.open_color_buffer(shared));
                    assert!(framebuffer.flush_window_surface_color_buffer(surface));
                    framebuffer.close_color_buffer(shared);
                }
                framebuffer.destroy_render_context(context);
                framebuffer.drain_window_surfaces();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(framebuffer.color_buffer_refcount(shared), Some(1));
    assert_eq!(monitor.live_images(), images + 1);
}

#[test]
fn test_drain_releases_attached_color_buffers() {
    let (framebuffer, _) = framebuffer(8, 8);
    let surface = framebuffer.create_window_surface(0, 4, 4).unwrap();
    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
    assert!(framebuffer.set_window_surface_color_buffer(surface, cb));
    assert_eq!(framebuffer.color_buffer_refcount(cb), Some(2));

    framebuffer.drain_window_surfaces();
    assert_eq!(framebuffer.color_buffer_refcount(cb), Some(1));
}

#[test]
fn test_sub_window_lifecycle() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    assert_eq!(framebuffer.sub_window(), None);
    assert!(!framebuffer.remove_sub_window());
    assert!(!framebuffer.setup_sub_window(window(), 0, 0, 0, 8, 0.0));

    assert!(framebuffer.setup_sub_window(window(), 0, 0, 8, 8, 0.0));
    assert_eq!(framebuffer.sub_window(), Some(window()));
    let surfaces = monitor.window_surfaces();
    assert_eq!(surfaces.len(), 1);
    assert_eq!(monitor.presented(surfaces[0]), Some(solid(8, 8, [0, 0, 0, 255])));

    // Only one sub-window at a time.
    assert!(!framebuffer.setup_sub_window(window(), 0, 0, 8, 8, 0.0));
    assert_eq!(monitor.window_surfaces(), surfaces);

    assert!(framebuffer.remove_sub_window());
    assert_eq!(framebuffer.sub_window(), None);
    assert!(monitor.window_surfaces().is_empty());
}

#[test]
fn test_failed_sub_window_keeps_geometry() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    monitor.fail_after(Operation::MakeCurrent, 0);
    assert!(!framebuffer.setup_sub_window(window(), 0, 0, 16, 12, 90.0));
    assert_eq!(framebuffer.sub_window(), None);
    assert!(monitor.window_surfaces().is_empty());
    assert_eq!(framebuffer.width(), 8);
    assert_eq!(framebuffer.height(), 8);
    assert_eq!(framebuffer.lock().rotation(), 0.0);

    assert!(framebuffer.setup_sub_window(window(), 0, 0, 16, 12, 90.0));
    assert_eq!(framebuffer.width(), 16);
    assert_eq!(framebuffer.height(), 12);
}

#[test]
fn test_repost_before_post() {
    let (framebuffer, monitor) = framebuffer(8, 8);
    assert!(framebuffer.setup_sub_window(window(), 0, 0, 8, 8, 0.0));
    let draws = monitor.draw_calls();
    assert!(!framebuffer.repost());
    assert_eq!(monitor.draw_calls(), draws);
}

#[test]
fn test_post_and_rotation() {
    let (framebuffer, monitor) = framebuffer(2, 2);
    let cb = framebuffer.create_color_buffer(2, 2, gl::RGBA).unwrap();
    let corners: Vec<u8> = [1, 2, 3, 4].iter().flat_map(|&red| [red, 0, 0, 255]).collect();
    assert!(framebuffer.update_color_buffer(
        cb,
        0,
        0,
        2,
        2,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        &corners
    ));

    assert!(framebuffer.setup_sub_window(window(), 0, 0, 2, 2, 0.0));
    let window_surface = monitor.window_surfaces()[0];
    assert!(framebuffer.post(cb));
    assert_eq!(framebuffer.lock().last_posted(), cb);
    assert_eq!(monitor.presented(window_surface), Some(corners.clone()));

    let reds = |pixels: Vec<u8>| -> Vec<u8> { pixels.chunks_exact(4).map(|p| p[0]).collect() };
    framebuffer.set_display_rotation(180.0);
    assert_eq!(framebuffer.lock().rotation(), 180.0);
    assert_eq!(reds(monitor.presented(window_surface).unwrap()), vec![4, 3, 2, 1]);

    // Reposting reproduces the same frame.
    let draws = monitor.draw_calls();
    assert!(framebuffer.repost());
    assert_eq!(monitor.draw_calls(), draws + 1);
    assert_eq!(reds(monitor.presented(window_surface).unwrap()), vec![4, 3, 2, 1]);

    // A fresh sub-window shows the last-posted buffer straight away.
    assert!(framebuffer.remove_sub_window());
    assert!(framebuffer.setup_sub_window(window(), 0, 0, 2, 2, 0.0));
    let window_surface = monitor.window_surfaces()[0];
    assert_eq!(monitor.presented(window_surface), Some(corners));
}

#[test]
fn test_post_rejects_unknown_handle() {
    let (framebuffer, monitor) = framebuffer(4, 4);
    assert!(framebuffer.setup_sub_window(window(), 0, 0, 4, 4, 0.0));
    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();
    assert!(framebuffer.post(cb));

    let draws = monitor.draw_calls();
    assert!(!framebuffer.post(Handle(0xbad)));
    assert_eq!(monitor.draw_calls(), draws);
    assert_eq!(framebuffer.lock().last_posted(), cb);
}

#[test]
fn test_post_failure_restores_binding() {
    let (framebuffer, monitor) = framebuffer(4, 4);
    assert!(framebuffer.setup_sub_window(window(), 0, 0, 4, 4, 0.0));
    bind_client(&framebuffer, 4, 4);
    let client = monitor.current();
    let cb = framebuffer.create_color_buffer(4, 4, gl::RGBA).unwrap();

    monitor.fail_after(Operation::Draw, 0);
    assert!(!framebuffer.post(cb));
    assert_eq!(monitor.current(), client);

    assert!(framebuffer.post(cb));
    assert_eq!(monitor.current(), client);
}

#[test]
fn test_post_callback() {
    let (framebuffer, _) = framebuffer(4, 2);
    let frames = Arc::new(Mutex::new(vec![]));
    {
        let frames = frames.clone();
        let callback = move |size: Size2D<i32>, format: u32, ty: u32, pixels: &[u8]| {
            frames.lock().unwrap().push((size, format, ty, pixels.to_vec()));
        };
        framebuffer.set_post_callback(Some(Box::new(callback)));
    }

    // Larger than the display: the frame is clipped to the presentation geometry.
    let cb = framebuffer.create_color_buffer(8, 8, gl::RGBA).unwrap();
    let blue = solid(8, 8, [0, 0, 255, 255]);
    assert!(framebuffer.update_color_buffer(
        cb,
        0,
        0,
        8,
        8,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        &blue
    ));

    // Delivered even without a sub-window.
    assert!(framebuffer.post(cb));
    {
        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        let (size, format, ty, ref pixels) = frames[0];
        assert_eq!(size, Size2D::new(4, 2));
        assert_eq!((format, ty), (gl::RGBA, gl::UNSIGNED_BYTE));
        assert_eq!(*pixels, solid(4, 2, [0, 0, 255, 255]));
    }

    framebuffer.set_post_callback(None);
    assert!(framebuffer.post(cb));
    assert_eq!(frames.lock().unwrap().len(), 1);
}

#[test]
fn test_frame_statistics() {
    let driver = SoftwareDriver::new();
    let framebuffer = FrameBuffer::initialize(driver, 2, 2, Options { fps_stats: true }).unwrap();
    let cb = framebuffer.create_color_buffer(2, 2, gl::RGBA).unwrap();
    assert!(framebuffer.post(cb));
    assert_eq!(framebuffer.lock().presented_frames(), 0);

    assert!(framebuffer.setup_sub_window(window(), 0, 0, 2, 2, 0.0));
    for _ in 0..3 {
        assert!(framebuffer.post(cb));
    }
    // The sub-window's initial paint counts as well.
    assert_eq!(framebuffer.lock().presented_frames(), 4);
}

#[test]
fn test_options_default() {
    assert!(!Options::default().fps_stats);
}

#[test]
fn test_slot_lifecycle() {
    let slot = FrameBufferSlot::new();
    assert!(slot.get().is_none());
    assert!(!slot.finalize());

    let first = SoftwareDriver::new();
    let first_monitor = first.monitor();
    slot.initialize(first, 8, 8, Options::default()).unwrap();
    assert!(first_monitor.is_initialized());

    // A second initialization is rejected and leaves the first framebuffer alone.
    let second = SoftwareDriver::new();
    let second_monitor = second.monitor();
    assert_eq!(
        slot.initialize(second, 8, 8, Options::default()),
        Err(Error::AlreadyInitialized)
    );
    assert!(!second_monitor.is_initialized());
    assert!(slot.get().unwrap().create_color_buffer(2, 2, gl::RGBA).is_some());

    assert!(slot.finalize());
    assert!(slot.get().is_none());
    assert!(!first_monitor.is_initialized());
    assert_eq!(first_monitor.leaked_at_terminate(), 0);
}

#[test]
fn test_slot_defers_teardown_until_released() {
    let slot = FrameBufferSlot::new();
    let driver = SoftwareDriver::new();
    let monitor = driver.monitor();
    slot.initialize(driver, 8, 8, Options::default()).unwrap();

    let framebuffer = slot.get().unwrap();
    assert!(slot.finalize());
    assert!(monitor.is_initialized());
    drop(framebuffer);
    assert!(!monitor.is_initialized());
}

// A guest boots, renders one frame into a window surface, and the host presents it.
#[test]
fn test_render_and_present_frame() {
    let (framebuffer, monitor) = framebuffer(800, 600);
    let frames = Arc::new(Mutex::new(vec![]));
    {
        let frames = frames.clone();
        let callback = move |size: Size2D<i32>, _: u32, _: u32, pixels: &[u8]| {
            frames.lock().unwrap().push((size, pixels.to_vec()));
        };
        framebuffer.set_post_callback(Some(Box::new(callback)));
    }
    assert!(framebuffer.setup_sub_window(window(), 0, 0, 800, 600, 0.0));

    let (context, surface) = bind_client(&framebuffer, 800, 600);
    let cb = framebuffer.create_color_buffer(800, 600, gl::RGBA).unwrap();
    assert!(framebuffer.set_window_surface_color_buffer(surface, cb));
    assert!(framebuffer.bind_context(context, surface, surface));
    let client = monitor.current().unwrap();
    assert!(monitor.paint_surface(client.draw, RED));

    assert!(framebuffer.flush_window_surface_color_buffer(surface));
    assert!(framebuffer.post(cb));
    assert_eq!(monitor.current(), Some(client));

    let window_surface = monitor.window_surfaces()[0];
    let expected = solid(800, 600, RED);
    assert_eq!(monitor.presented(window_surface), Some(expected.clone()));
    {
        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, Size2D::new(800, 600));
        assert!(frames[0].1 == expected);
    }

    framebuffer.destroy_window_surface(surface);
    framebuffer.destroy_render_context(context);
    framebuffer.close_color_buffer(cb);
    assert_eq!(framebuffer.color_buffer_refcount(cb), None);

    framebuffer.finalize();
    assert_eq!(monitor.leaked_at_terminate(), 0);
}
