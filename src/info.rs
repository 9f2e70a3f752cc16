// hostgl/src/info.rs
//
//! Driver capability and identity information gathered at initialization.

use bitflags::bitflags;

/// The client API flavor a render context is created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GLApi {
    /// OpenGL ES 1.x.
    GLES1,
    /// OpenGL ES 2.0 and later.
    GLES2,
}

impl GLApi {
    #[inline]
    pub fn from_modern(is_modern: bool) -> GLApi {
        if is_modern {
            GLApi::GLES2
        } else {
            GLApi::GLES1
        }
    }
}

/// A display or API version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GLVersion {
    pub major: u8,
    pub minor: u8,
}

impl GLVersion {
    #[inline]
    pub fn new(major: u8, minor: u8) -> GLVersion {
        GLVersion { major, minor }
    }
}

bitflags! {
    /// Optional driver features the framebuffer relies on.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CapabilityFlags: u8 {
        /// Color buffer images can be bound as 2D textures.
        const EGL_IMAGE_TEXTURE_2D   = 0x01;
        /// Color buffer images can be bound as renderbuffers.
        const EGL_IMAGE_RENDERBUFFER = 0x02;
    }
}

/// Capabilities probed once at initialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Caps {
    pub flags: CapabilityFlags,
    pub display_version: GLVersion,
}

impl Caps {
    pub(crate) fn probe(
        display_version: GLVersion,
        display_extensions: &str,
        gl_extensions: &str,
    ) -> Caps {
        let has = |list: &str, name: &str| list.split_whitespace().any(|ext| ext == name);

        let mut flags = CapabilityFlags::empty();
        if has(display_extensions, "EGL_KHR_image_base") && has(gl_extensions, "GL_OES_EGL_image")
        {
            flags.insert(CapabilityFlags::EGL_IMAGE_TEXTURE_2D);
            if has(display_extensions, "EGL_KHR_gl_renderbuffer_image") {
                flags.insert(CapabilityFlags::EGL_IMAGE_RENDERBUFFER);
            }
        }

        Caps {
            flags,
            display_version,
        }
    }

    #[inline]
    pub fn has_eglimage_texture_2d(&self) -> bool {
        self.flags.contains(CapabilityFlags::EGL_IMAGE_TEXTURE_2D)
    }

    #[inline]
    pub fn has_eglimage_renderbuffer(&self) -> bool {
        self.flags.contains(CapabilityFlags::EGL_IMAGE_RENDERBUFFER)
    }
}

/// The strings a driver can be asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringName {
    Vendor,
    Renderer,
    Version,
    DisplayExtensions,
    Extensions,
}

/// Driver identity strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GLStrings {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
}
