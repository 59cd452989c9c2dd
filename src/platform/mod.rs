//! Concrete capability adapters for the host operating system.
//!
//! Only Windows is supported: the master volume comes from the default render
//! endpoint (WASAPI) and the playing media from the Global System Media
//! Transport Controls session manager. Elsewhere [`connect`] fails.

use crate::session::MediaSessionWatcher;
use crate::volume::VolumeDevice;
use anyhow::Result;
use std::sync::Arc;

#[cfg(target_os = "windows")]
mod win32;

/// Both capabilities of the running system.
pub struct Platform {
    pub device: Arc<dyn VolumeDevice>,
    pub media: Arc<dyn MediaSessionWatcher>,
}

/// Acquires the default output endpoint and the media session manager.
#[cfg(target_os = "windows")]
pub fn connect() -> Result<Platform> {
    win32::connect()
}

/// Acquires the default output endpoint and the media session manager.
#[cfg(not(target_os = "windows"))]
pub fn connect() -> Result<Platform> {
    anyhow::bail!(
        "Volume enforcement is not supported on {}: it needs the Windows audio endpoint and media session APIs",
        std::env::consts::OS
    )
}
