// hostgl/src/config.rs
//
//! Pixel-format configurations and framebuffer options.

use crate::Error;

use bitflags::bitflags;

bitflags! {
    /// The kinds of surface a configuration can back.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SurfaceTypeFlags: u8 {
        const WINDOW  = 0x01;
        const PBUFFER = 0x02;
    }
}

bitflags! {
    /// The client APIs a configuration can render with.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RenderableFlags: u8 {
        const GLES1 = 0x01;
        const GLES2 = 0x02;
    }
}

/// A pixel-format configuration, as reported by the host driver.
///
/// Some APIs call this a "config" or a "pixel format".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FbConfig {
    /// The driver's own identifier for this configuration.
    pub id: u32,
    pub red_size: u8,
    pub green_size: u8,
    pub blue_size: u8,
    pub alpha_size: u8,
    pub depth_size: u8,
    pub stencil_size: u8,
    pub surface_types: SurfaceTypeFlags,
    pub renderable: RenderableFlags,
}

impl FbConfig {
    // Configurations clients may pick must back both window and pbuffer surfaces.
    fn is_client_compatible(&self) -> bool {
        self.surface_types
            .contains(SurfaceTypeFlags::WINDOW | SurfaceTypeFlags::PBUFFER)
            && self.renderable.contains(RenderableFlags::GLES2)
    }

    fn is_framebuffer_compatible(&self) -> bool {
        self.is_client_compatible()
            && self.red_size >= 8
            && self.green_size >= 8
            && self.blue_size >= 8
    }
}

/// The immutable list of configurations offered to clients.
///
/// Built once at initialization; clients name configurations by index into this list.
#[derive(Clone, Debug)]
pub struct FbConfigList {
    configs: Vec<FbConfig>,
    framebuffer_config: usize,
}

impl FbConfigList {
    /// Filters the driver's configurations and selects the one the framebuffer itself uses.
    pub(crate) fn new(host_configs: Vec<FbConfig>) -> Result<FbConfigList, Error> {
        let configs: Vec<FbConfig> = host_configs
            .into_iter()
            .filter(FbConfig::is_client_compatible)
            .collect();
        let framebuffer_config = configs
            .iter()
            .position(FbConfig::is_framebuffer_compatible)
            .ok_or(Error::NoPixelFormatFound)?;
        Ok(FbConfigList {
            configs,
            framebuffer_config,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&FbConfig> {
        self.configs.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FbConfig> {
        self.configs.iter()
    }

    pub(crate) fn lookup(&self, index: usize) -> Result<FbConfig, Error> {
        self.get(index).copied().ok_or(Error::InvalidConfig(index))
    }

    /// The configuration used for the framebuffer's own contexts and surfaces.
    #[inline]
    pub fn framebuffer_config(&self) -> &FbConfig {
        &self.configs[self.framebuffer_config]
    }
}

/// Tunables for a framebuffer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Options {
    /// Log the presentation rate roughly once per second.
    pub fps_stats: bool,
}

impl Options {
    /// Reads options from the environment.
    ///
    /// `HOSTGL_SHOW_FPS_STATS` enables frame statistics when set.
    pub fn from_env() -> Options {
        Options {
            fps_stats: std::env::var_os("HOSTGL_SHOW_FPS_STATS").is_some(),
        }
    }
}
