//! # Volume Device Capability
//!
//! The controller only ever talks to the system mixer through [`VolumeDevice`]:
//! two commands (`set_volume`, `set_muted`) and one listener registration.
//!
//! ## Origin Tokens
//!
//! Every command a device issues on behalf of the controller is tagged with
//! the device's private [`OriginToken`]. When the mixer reports a change, the
//! device hands the change and its origin to a [`VolumeNotifier`], which drops
//! it if the origin is the device's own token. The controller therefore never
//! sees the echo of its own enforcement and cannot loop on it.
//!
//! One device instance is expected per controller. Two controllers with
//! separate devices on the same endpoint would each see the other's commands
//! as external changes.

use anyhow::Result;
use log::{debug, trace, warn};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Receives externally caused mixer changes.
///
/// Callbacks may arrive on any thread, concurrently with each other.
pub trait VolumeListener: Send + Sync {
    /// Master volume changed. `level` is the new scalar in `[0, 1]`.
    fn on_volume_changed(&self, level: f32);

    /// Mute state changed, or was reported alongside a volume change.
    fn on_muted_changed(&self, muted: bool);
}

/// Master volume / mute control of the default output endpoint.
pub trait VolumeDevice: Send + Sync {
    /// Sets the master volume scalar, tagged with this device's origin token.
    fn set_volume(&self, level: f32) -> Result<()>;

    /// Sets the mute state, tagged with this device's origin token.
    fn set_muted(&self, muted: bool) -> Result<()>;

    /// Registers the change listener. Only the first registration is kept.
    fn register_listener(&self, listener: Arc<dyn VolumeListener>) -> Result<()>;

    /// Detaches the listener. Notifications arriving afterwards are dropped.
    fn clear_listener(&self);
}

/// Opaque identifier attached to commands issued by one device instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginToken(u128);

impl OriginToken {
    /// A fresh random token.
    pub fn new() -> Self {
        Self(rand::random())
    }

    /// Wraps a token chosen by the platform, e.g. a GUID.
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// The raw value, for handing back to the platform.
    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl Default for OriginToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OriginToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OriginToken({:032x})", self.0)
    }
}

/// A change reported by the mixer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeChange {
    pub level: f32,
    pub muted: bool,
}

/// Listener slot plus origin filtering, shared by every device implementation.
pub struct VolumeNotifier {
    token: OriginToken,
    listener: RwLock<Option<Arc<dyn VolumeListener>>>,
}

impl VolumeNotifier {
    /// Creates an empty listener slot for a device whose commands carry
    /// `token`.
    ///
    /// Every change later passed to [`VolumeNotifier::notify`] with this same
    /// token is treated as the device's own and dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use manelemax::volume::{OriginToken, VolumeChange, VolumeNotifier};
    ///
    /// let token = OriginToken::new();
    /// let notifier = VolumeNotifier::new(token);
    /// assert_eq!(notifier.token(), token);
    /// assert!(!notifier.has_listener());
    ///
    /// // nobody listening yet, nothing forwarded
    /// let change = VolumeChange { level: 0.5, muted: false };
    /// assert!(!notifier.notify(OriginToken::new(), change));
    /// ```
    pub fn new(token: OriginToken) -> Self {
        Self {
            token,
            listener: RwLock::new(None),
        }
    }

    /// The token commands from the owning device must carry.
    pub fn token(&self) -> OriginToken {
        self.token
    }

    /// Stores the listener unless one is already registered.
    ///
    /// Returns `false` if the registration was ignored.
    pub fn set_listener(&self, listener: Arc<dyn VolumeListener>) -> bool {
        let mut slot = self.listener.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            warn!("Volume listener already registered, ignoring new registration");
            return false;
        }
        *slot = Some(listener);
        debug!("Volume listener registered");
        true
    }

    /// Empties the listener slot.
    ///
    /// Notifications arriving afterwards are dropped, and a new listener may
    /// be registered again. Clearing an empty slot does nothing.
    pub fn clear_listener(&self) {
        let mut slot = self.listener.write().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            debug!("Volume listener detached");
        }
    }

    /// # Returns
    ///
    /// `true` while a listener is registered.
    pub fn has_listener(&self) -> bool {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Forwards a mixer change unless it was caused by this device.
    ///
    /// The listener is cloned out of the slot before it is called, so it may
    /// issue commands (and trigger nested notifications) from inside the
    /// callback. Returns whether the change was forwarded.
    pub fn notify(&self, origin: OriginToken, change: VolumeChange) -> bool {
        if origin == self.token {
            trace!("Suppressed self-originated change {change:?}");
            return false;
        }

        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match listener {
            Some(listener) => {
                trace!("Forwarding external change {change:?} from {origin:?}");
                listener.on_volume_changed(change.level);
                listener.on_muted_changed(change.muted);
                true
            }
            None => false,
        }
    }
}
