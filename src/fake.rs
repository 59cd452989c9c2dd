//! In-memory capability implementations for tests.
//!
//! [`FakeVolumeDevice`] behaves like a mixer endpoint: it keeps a level and a
//! mute flag, reports every change through a [`VolumeNotifier`] with the
//! change's origin, and therefore filters its own commands exactly like the
//! platform device does. Commands issued through the [`VolumeDevice`] trait are
//! recorded so tests can assert on what the controller did. External changes
//! (a user dragging the slider, another application) are simulated with the
//! `external_*` methods.
//!
//! For the media side, [`crate::session::SessionTracker`] is driven directly.

use crate::volume::{OriginToken, VolumeChange, VolumeDevice, VolumeListener, VolumeNotifier};
use anyhow::{bail, Result};
use std::sync::{Arc, Mutex, PoisonError};

/// A command received through the [`VolumeDevice`] trait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCommand {
    SetVolume(f32),
    SetMuted(bool),
}

#[derive(Debug)]
struct MixerState {
    level: f32,
    muted: bool,
    commands: Vec<DeviceCommand>,
    failing_volume: bool,
    failing_mute: bool,
}

pub struct FakeVolumeDevice {
    notifier: VolumeNotifier,
    state: Mutex<MixerState>,
}

impl FakeVolumeDevice {
    pub fn new(level: f32, muted: bool) -> Self {
        Self {
            notifier: VolumeNotifier::new(OriginToken::new()),
            state: Mutex::new(MixerState {
                level,
                muted,
                commands: Vec::new(),
                failing_volume: false,
                failing_mute: false,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MixerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a change and notifies outside the lock, so the listener can
    /// call straight back into the device.
    fn apply(&self, origin: OriginToken, update: impl FnOnce(&mut MixerState)) {
        let change = {
            let mut state = self.state();
            update(&mut *state);
            VolumeChange {
                level: state.level,
                muted: state.muted,
            }
        };
        self.notifier.notify(origin, change);
    }

    fn record(&self, command: DeviceCommand) -> Result<()> {
        let mut state = self.state();
        let failing = match command {
            DeviceCommand::SetVolume(_) => state.failing_volume,
            DeviceCommand::SetMuted(_) => state.failing_mute,
        };
        if failing {
            bail!("Simulated device failure for {command:?}");
        }
        state.commands.push(command);
        Ok(())
    }

    /// Someone else moved the volume slider.
    pub fn external_set_volume(&self, level: f32) {
        self.apply(OriginToken::new(), |state| state.level = level);
    }

    /// Someone else toggled mute.
    pub fn external_set_muted(&self, muted: bool) {
        self.apply(OriginToken::new(), |state| state.muted = muted);
    }

    /// Replays a change as if it came from this device's own command.
    pub fn echo_own_change(&self) {
        self.apply(self.notifier.token(), |_| {});
    }

    /// Makes every following command fail until reset.
    pub fn set_failing(&self, failing: bool) {
        let mut state = self.state();
        state.failing_volume = failing;
        state.failing_mute = failing;
    }

    /// Makes only mute commands fail until reset.
    pub fn set_mute_failing(&self, failing: bool) {
        self.state().failing_mute = failing;
    }

    pub fn level(&self) -> f32 {
        self.state().level
    }

    pub fn muted(&self) -> bool {
        self.state().muted
    }

    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.state().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }

    pub fn has_listener(&self) -> bool {
        self.notifier.has_listener()
    }
}

impl VolumeDevice for FakeVolumeDevice {
    fn set_volume(&self, level: f32) -> Result<()> {
        self.record(DeviceCommand::SetVolume(level))?;
        self.apply(self.notifier.token(), |state| state.level = level);
        Ok(())
    }

    fn set_muted(&self, muted: bool) -> Result<()> {
        self.record(DeviceCommand::SetMuted(muted))?;
        self.apply(self.notifier.token(), |state| state.muted = muted);
        Ok(())
    }

    fn register_listener(&self, listener: Arc<dyn VolumeListener>) -> Result<()> {
        self.notifier.set_listener(listener);
        Ok(())
    }

    fn clear_listener(&self) {
        self.notifier.clear_listener();
    }
}
