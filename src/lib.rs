//! Keyword-driven volume enforcement for whatever is currently playing.
//!
//! Core modules:
//! - [`text`] - Diacritic folding and word-aligned substring generation
//! - [`keywords`] - Keyword set and matcher
//! - [`controller`] - Volume enforcement state machine
//! - [`volume`] - Volume device capability and origin-token filtering
//! - [`session`] - Media session capability and playback tracking
//!
//! ### Supporting Modules
//!
//! - [`platform`] - Windows audio endpoint and media session adapters
//! - [`fake`] - In-memory volume device for tests
//! - [`config`] - Configuration file handling
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Behavior
//!
//! When a track starts playing, its artist (then its title) is searched for
//! one of the built-in keywords:
//!
//! - **Match**: the output is unmuted and set to full volume, and both are
//!   held there until the track stops; volume or mute changes made by the user
//!   or other applications are immediately undone
//! - **No match**: the volume is held at a low background level, mute is left
//!   to the user
//! - **Nothing playing**: the controller releases the mixer entirely
//!
//! ## Quick Start Example
//!
//! ```
//! use std::sync::Arc;
//! use manelemax::controller::{EnforcerSettings, VolumeEnforcer};
//! use manelemax::fake::FakeVolumeDevice;
//! use manelemax::keywords::KeywordSet;
//! use manelemax::session::{MediaProperties, SessionTracker};
//!
//! let device = Arc::new(FakeVolumeDevice::new(0.5, false));
//! let session = Arc::new(SessionTracker::new());
//! let enforcer = VolumeEnforcer::new(
//!     device.clone(),
//!     session.clone(),
//!     KeywordSet::new(["guta"]),
//!     EnforcerSettings::default(),
//! )?;
//!
//! session.update_properties(MediaProperties::new("Nicolae Guță", "Hit"));
//! session.update_playback(true);
//!
//! assert_eq!(enforcer.current_match(), "guta");
//! assert_eq!(device.level(), 1.0);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All public functions return `Result<T, anyhow::Error>`. Failing volume
//! commands inside notification handlers are logged and retried on the next
//! notification; failures while connecting to the platform are returned from
//! [`initialize`].

pub mod cli;
pub mod completion;
pub mod config;
pub mod controller;
pub mod fake;
pub mod keywords;
pub mod platform;
pub mod session;
pub mod text;
pub mod volume;

use anyhow::{Context, Result};
use log::info;

/// Connects to the system mixer and media session and starts enforcing.
///
/// Uses the built-in keyword set and applies the policy for whatever is
/// playing right now.
///
/// # Errors
///
/// Fails if either platform capability cannot be acquired or the volume
/// listener cannot be registered.
pub fn initialize(config: &config::Config) -> Result<controller::VolumeEnforcer> {
    let platform = platform::connect().context("Failed to connect to the audio platform")?;
    let keywords = keywords::KeywordSet::builtin();
    info!("Loaded {} built-in keywords", keywords.len());

    controller::VolumeEnforcer::new(
        platform.device,
        platform.media,
        keywords,
        controller::EnforcerSettings::from(config),
    )
}
