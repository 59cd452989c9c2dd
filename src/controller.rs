//! # Volume Enforcement Controller
//!
//! Watches the media session and holds the system volume where the current
//! track wants it:
//!
//! - a track whose artist or title matches a keyword is forced to full volume
//!   and kept unmuted
//! - any other playing track is held at the background volume
//! - when nothing plays, the controller lets go and never touches the mixer
//!
//! ## Enforcement
//!
//! While a policy is active every externally caused volume change is answered
//! by re-issuing the target volume, and every external mute is answered by
//! unmuting if the policy demands it. The device suppresses notifications for
//! the controller's own commands (see [`crate::volume`]), so re-issuing a
//! command from inside a notification handler cannot feed back into itself.
//!
//! ## Concurrency
//!
//! Media events, mixer notifications and UI reads may all arrive on different
//! threads at once. [`Policy`] is `Copy` and lives with the current match
//! behind one mutex that is only held to copy them in or out, so readers
//! always see a policy and match that belong together, and no lock is held
//! while calling into the device.
//!
//! Play/stop transitions are serialized separately. A stop that lands while
//! a play transition is still sending commands is queued; the play transition
//! notices it, sends nothing more, and the stop is applied next. Once the
//! controller has let go, no transition command reaches the mixer.

use crate::config::Config;
use crate::keywords::{self, KeywordSet};
use crate::session::{MediaListener, MediaProperties, MediaSessionWatcher};
use crate::volume::{VolumeDevice, VolumeListener};
use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Volume for matching tracks.
pub const MAX_VOLUME: f32 = 1.0;

/// Volume for everything else.
pub const NORMAL_VOLUME: f32 = 0.25;

/// What the controller currently enforces.
///
/// `force_unmute` and `force_volume` are only ever set together with `active`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    pub active: bool,
    pub force_unmute: bool,
    pub force_volume: bool,
    pub target_volume: f32,
}

impl Policy {
    /// Nothing enforced.
    pub const fn idle(target_volume: f32) -> Self {
        Self {
            active: false,
            force_unmute: false,
            force_volume: false,
            target_volume,
        }
    }

    /// Matching track: full volume, never muted.
    pub const fn max(target_volume: f32) -> Self {
        Self {
            active: true,
            force_unmute: true,
            force_volume: true,
            target_volume,
        }
    }

    /// Non-matching track: background volume, mute left alone.
    pub const fn background(target_volume: f32) -> Self {
        Self {
            active: true,
            force_unmute: false,
            force_volume: true,
            target_volume,
        }
    }
}

/// Volume levels and matcher settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnforcerSettings {
    pub max_volume: f32,
    pub normal_volume: f32,
    pub max_words: usize,
}

impl Default for EnforcerSettings {
    fn default() -> Self {
        Self {
            max_volume: MAX_VOLUME,
            normal_volume: NORMAL_VOLUME,
            max_words: keywords::DEFAULT_MAX_WORDS,
        }
    }
}

impl From<&Config> for EnforcerSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_volume: config.max_volume,
            normal_volume: config.normal_volume,
            max_words: config.max_words,
        }
    }
}

/// Policy and keyword match, always replaced together.
#[derive(Debug)]
struct Enforcement {
    policy: Policy,
    current_match: String,
}

/// A media event waiting to be applied.
#[derive(Debug)]
enum MediaEvent {
    Play(MediaProperties),
    Stop,
}

/// Serializes play/stop transitions.
///
/// Only one caller drains `pending` at a time. Events arriving meanwhile,
/// from another thread or re-entrantly from inside a device command, are
/// parked here and replace any older event still waiting.
#[derive(Debug, Default)]
struct Transitions {
    pending: Option<MediaEvent>,
    running: bool,
}

/// State shared between the controller handle and its listeners.
struct EnforcerState {
    device: Arc<dyn VolumeDevice>,
    keywords: KeywordSet,
    settings: EnforcerSettings,
    enforcement: Arc<Mutex<Enforcement>>,
    transitions: Mutex<Transitions>,
}

impl EnforcerState {
    fn enforcement(&self) -> MutexGuard<'_, Enforcement> {
        self.enforcement.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transitions(&self) -> MutexGuard<'_, Transitions> {
        self.transitions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn policy(&self) -> Policy {
        self.enforcement().policy
    }

    fn replace(&self, policy: Policy, found: &str) {
        let mut enforcement = self.enforcement();
        enforcement.policy = policy;
        enforcement.current_match.clear();
        enforcement.current_match.push_str(found);
    }

    /// True once a newer media event is waiting; remaining commands of the
    /// current transition must not be sent.
    fn superseded(&self) -> bool {
        self.transitions().pending.is_some()
    }

    /// Artist first, then title.
    fn match_properties(&self, properties: &MediaProperties) -> Option<String> {
        let max_words = self.settings.max_words;
        keywords::find_match(&properties.artist, &self.keywords, max_words)
            .or_else(|| keywords::find_match(&properties.title, &self.keywords, max_words))
    }

    /// Queues `event` and, unless a transition is already running, applies
    /// queued events until none is left.
    ///
    /// Returns the first command error of the transitions run by this call.
    /// A caller whose event was queued behind a running transition returns
    /// `Ok` immediately; the running caller applies and reports it.
    fn apply_media(&self, properties: Option<&MediaProperties>) -> Result<()> {
        let event = match properties {
            Some(properties) => MediaEvent::Play(properties.clone()),
            None => MediaEvent::Stop,
        };

        {
            let mut transitions = self.transitions();
            transitions.pending = Some(event);
            if transitions.running {
                trace!("Transition in progress, media event queued");
                return Ok(());
            }
            transitions.running = true;
        }

        let mut result = Ok(());
        loop {
            let event = {
                let mut transitions = self.transitions();
                match transitions.pending.take() {
                    Some(event) => event,
                    None => {
                        transitions.running = false;
                        break;
                    }
                }
            };

            let applied = self.transition(&event);
            if result.is_ok() {
                result = applied;
            }
        }
        result
    }

    fn transition(&self, event: &MediaEvent) -> Result<()> {
        let MediaEvent::Play(properties) = event else {
            self.replace(Policy::idle(self.settings.normal_volume), "");
            info!("Nothing playing, volume control released");
            return Ok(());
        };

        match self.match_properties(properties) {
            Some(found) => {
                let policy = Policy::max(self.settings.max_volume);
                self.replace(policy, &found);
                info!(
                    "Matched '{found}' in '{}' - '{}', forcing volume {}",
                    properties.artist, properties.title, policy.target_volume
                );

                // both commands are attempted; the first failure is reported
                let unmuted = self.device.set_muted(false).context("Failed to unmute");
                if self.superseded() {
                    debug!("Transition superseded after unmute");
                    return unmuted;
                }
                let raised = self
                    .device
                    .set_volume(policy.target_volume)
                    .context("Failed to force volume");
                unmuted.and(raised)
            }
            None => {
                let policy = Policy::background(self.settings.normal_volume);
                self.replace(policy, "");
                info!(
                    "No keyword in '{}' - '{}', holding volume at {}",
                    properties.artist, properties.title, policy.target_volume
                );

                self.device
                    .set_volume(policy.target_volume)
                    .context("Failed to set background volume")
            }
        }
    }

    fn enforce_volume(&self, reported: f32) -> Result<()> {
        let policy = self.policy();
        if !policy.force_volume {
            trace!("External volume change to {reported} ignored, not enforcing");
            return Ok(());
        }

        debug!(
            "External volume change to {reported}, restoring {}",
            policy.target_volume
        );
        self.device
            .set_volume(policy.target_volume)
            .context("Failed to restore enforced volume")
    }

    fn enforce_unmute(&self, muted: bool) -> Result<()> {
        if !muted {
            return Ok(());
        }

        let policy = self.policy();
        if !policy.force_unmute {
            trace!("External mute ignored, not enforcing unmute");
            return Ok(());
        }

        debug!("External mute, unmuting");
        self.device
            .set_muted(false)
            .context("Failed to undo external mute")
    }
}

/// Listener adapter for the volume device. Holds only a weak reference so
/// callbacks arriving after teardown do nothing.
struct VolumeHook {
    state: Weak<EnforcerState>,
}

impl VolumeListener for VolumeHook {
    fn on_volume_changed(&self, level: f32) {
        if let Some(state) = self.state.upgrade() {
            if let Err(e) = state.enforce_volume(level) {
                warn!("{e:#}");
            }
        }
    }

    fn on_muted_changed(&self, muted: bool) {
        if let Some(state) = self.state.upgrade() {
            if let Err(e) = state.enforce_unmute(muted) {
                warn!("{e:#}");
            }
        }
    }
}

/// Listener adapter for the media session watcher.
struct MediaHook {
    state: Weak<EnforcerState>,
}

impl MediaListener for MediaHook {
    fn on_play(&self, properties: &MediaProperties) {
        if let Some(state) = self.state.upgrade() {
            if let Err(e) = state.apply_media(Some(properties)) {
                warn!("Failed to apply volume policy: {e:#}");
            }
        }
    }

    fn on_stop(&self) {
        if let Some(state) = self.state.upgrade() {
            if let Err(e) = state.apply_media(None) {
                warn!("Failed to release volume policy: {e:#}");
            }
        }
    }
}

/// Read-only view of the current keyword match, for display.
///
/// Cheap to clone and safe to read from any thread.
#[derive(Clone)]
pub struct MatchHandle {
    enforcement: Arc<Mutex<Enforcement>>,
}

impl MatchHandle {
    /// The last keyword match, or an empty string.
    ///
    /// Empty whenever no policy is active or the playing track matched
    /// nothing.
    pub fn current_match(&self) -> String {
        self.enforcement
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_match
            .clone()
    }
}

/// The volume enforcement controller.
///
/// Dropping it detaches both listeners.
pub struct VolumeEnforcer {
    state: Arc<EnforcerState>,
    media: Arc<dyn MediaSessionWatcher>,
}

impl VolumeEnforcer {
    /// Wires the controller to both capabilities and applies the policy for
    /// whatever is already playing.
    ///
    /// # Errors
    ///
    /// Fails if the volume listener cannot be registered. A failed volume
    /// command while applying the startup policy is only logged; enforcement
    /// is retried on the next notification.
    pub fn new(
        device: Arc<dyn VolumeDevice>,
        media: Arc<dyn MediaSessionWatcher>,
        keywords: KeywordSet,
        settings: EnforcerSettings,
    ) -> Result<Self> {
        let state = Arc::new(EnforcerState {
            device,
            keywords,
            settings,
            enforcement: Arc::new(Mutex::new(Enforcement {
                policy: Policy::idle(settings.normal_volume),
                current_match: String::new(),
            })),
            transitions: Mutex::new(Transitions::default()),
        });

        debug!(
            "Starting volume enforcer with {} keywords, {settings:?}",
            state.keywords.len()
        );

        state
            .device
            .register_listener(Arc::new(VolumeHook {
                state: Arc::downgrade(&state),
            }))
            .context("Failed to register volume change listener")?;

        media.set_listener(Arc::new(MediaHook {
            state: Arc::downgrade(&state),
        }));

        let enforcer = Self { state, media };

        let playing = enforcer.media.current_properties();
        if let Err(e) = enforcer.state.apply_media(playing.as_ref()) {
            warn!("Failed to apply startup volume policy: {e:#}");
        }

        info!("Volume enforcer running");
        Ok(enforcer)
    }

    /// Applies the policy for `properties` (`None` = nothing playing).
    ///
    /// This is what the media listener does on every play/stop event. The
    /// policy is replaced even when the following device command fails.
    ///
    /// Transitions never overlap. An event that arrives while another
    /// transition is sending its commands is applied right after it, and
    /// the older transition sends nothing further once it is superseded.
    ///
    /// # Errors
    ///
    /// Returns the first failed device command. On a match both the unmute
    /// and the volume command are attempted even if the unmute fails.
    pub fn apply_media(&self, properties: Option<&MediaProperties>) -> Result<()> {
        self.state.apply_media(properties)
    }

    /// Snapshot of the enforced policy.
    pub fn policy(&self) -> Policy {
        self.state.policy()
    }

    /// The last keyword match, or an empty string.
    pub fn current_match(&self) -> String {
        self.match_handle().current_match()
    }

    /// A handle for UI code that only needs [`Self::current_match`].
    pub fn match_handle(&self) -> MatchHandle {
        MatchHandle {
            enforcement: Arc::clone(&self.state.enforcement),
        }
    }

    pub fn settings(&self) -> EnforcerSettings {
        self.state.settings
    }
}

impl Drop for VolumeEnforcer {
    fn drop(&mut self) {
        self.media.clear_listener();
        self.state.device.clear_listener();
        debug!("Volume enforcer detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{DeviceCommand, FakeVolumeDevice};
    use crate::session::SessionTracker;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Device whose first unmute stops playback before returning, the way a
    /// playback event can land on another thread mid-transition.
    struct StopsOnUnmute {
        inner: FakeVolumeDevice,
        session: Arc<SessionTracker>,
        fired: AtomicBool,
    }

    impl VolumeDevice for StopsOnUnmute {
        fn set_volume(&self, level: f32) -> Result<()> {
            self.inner.set_volume(level)
        }

        fn set_muted(&self, muted: bool) -> Result<()> {
            self.inner.set_muted(muted)?;
            if !self.fired.swap(true, Ordering::SeqCst) {
                self.session.update_playback(false);
            }
            Ok(())
        }

        fn register_listener(&self, listener: Arc<dyn VolumeListener>) -> Result<()> {
            self.inner.register_listener(listener)
        }

        fn clear_listener(&self) {
            self.inner.clear_listener();
        }
    }

    fn enforcer_with(keywords: &[&str]) -> Result<(VolumeEnforcer, Arc<FakeVolumeDevice>, Arc<SessionTracker>)> {
        let device = Arc::new(FakeVolumeDevice::new(0.5, false));
        let session = Arc::new(SessionTracker::new());
        let enforcer = VolumeEnforcer::new(
            device.clone(),
            session.clone(),
            KeywordSet::new(keywords.iter().copied()),
            EnforcerSettings::default(),
        )?;
        Ok((enforcer, device, session))
    }

    #[test]
    fn test_policy_constructors_keep_invariant() {
        for policy in [Policy::idle(0.25), Policy::max(1.0), Policy::background(0.25)] {
            if policy.force_unmute || policy.force_volume {
                assert!(policy.active);
            }
        }
    }

    #[test]
    fn test_starts_idle_when_nothing_plays() -> Result<()> {
        let (enforcer, device, _session) = enforcer_with(&["guta"])?;
        assert_eq!(enforcer.policy(), Policy::idle(NORMAL_VOLUME));
        assert_eq!(enforcer.current_match(), "");
        assert!(device.commands().is_empty());
        Ok(())
    }

    #[test]
    fn test_artist_takes_precedence_over_title() -> Result<()> {
        let (enforcer, _device, _session) = enforcer_with(&["guta", "hit"])?;
        enforcer.apply_media(Some(&MediaProperties::new("Nicolae Guță", "Hit")))?;
        assert_eq!(enforcer.current_match(), "guta");

        enforcer.apply_media(Some(&MediaProperties::new("Someone", "Hit")))?;
        assert_eq!(enforcer.current_match(), "hit");
        Ok(())
    }

    #[test]
    fn test_match_forces_unmute_then_max() -> Result<()> {
        let (enforcer, device, _session) = enforcer_with(&["guta"])?;
        device.external_set_muted(true);

        enforcer.apply_media(Some(&MediaProperties::new("", "Nicolae Guță - Hit")))?;

        assert_eq!(enforcer.policy(), Policy::max(MAX_VOLUME));
        assert_eq!(
            device.commands(),
            vec![DeviceCommand::SetMuted(false), DeviceCommand::SetVolume(MAX_VOLUME)]
        );
        assert!(!device.muted());
        assert_eq!(device.level(), MAX_VOLUME);
        Ok(())
    }

    #[test]
    fn test_no_match_leaves_mute_alone() -> Result<()> {
        let (enforcer, device, _session) = enforcer_with(&["guta"])?;
        device.external_set_muted(true);

        enforcer.apply_media(Some(&MediaProperties::new("", "Random Song")))?;

        assert_eq!(enforcer.policy(), Policy::background(NORMAL_VOLUME));
        assert_eq!(device.commands(), vec![DeviceCommand::SetVolume(NORMAL_VOLUME)]);
        assert!(device.muted());

        // external mute is tolerated in background mode
        device.clear_commands();
        device.external_set_muted(true);
        assert!(device.commands().iter().all(|c| *c != DeviceCommand::SetMuted(false)));
        Ok(())
    }

    #[test]
    fn test_command_failure_keeps_policy() {
        let (enforcer, device, _session) = enforcer_with(&["guta"]).unwrap();
        device.set_failing(true);

        let result = enforcer.apply_media(Some(&MediaProperties::new("Guta", "")));
        assert!(result.is_err());
        assert_eq!(enforcer.policy(), Policy::max(MAX_VOLUME));
        assert_eq!(enforcer.current_match(), "guta");

        // next external change retries
        device.set_failing(false);
        device.external_set_volume(0.3);
        assert_eq!(device.level(), MAX_VOLUME);
    }

    #[test]
    fn test_unmute_failure_still_forces_volume() -> Result<()> {
        let (enforcer, device, _session) = enforcer_with(&["guta"])?;
        device.external_set_muted(true);
        device.set_mute_failing(true);

        let result = enforcer.apply_media(Some(&MediaProperties::new("Guta", "")));

        assert!(result.is_err());
        assert_eq!(device.commands(), vec![DeviceCommand::SetVolume(MAX_VOLUME)]);
        assert_eq!(device.level(), MAX_VOLUME);
        assert_eq!(enforcer.policy(), Policy::max(MAX_VOLUME));
        Ok(())
    }

    #[test]
    fn test_stop_during_play_transition_wins() -> Result<()> {
        let session = Arc::new(SessionTracker::new());
        let device = Arc::new(StopsOnUnmute {
            inner: FakeVolumeDevice::new(0.5, false),
            session: session.clone(),
            fired: AtomicBool::new(false),
        });
        let enforcer = VolumeEnforcer::new(
            device.clone(),
            session.clone(),
            KeywordSet::new(["guta"]),
            EnforcerSettings::default(),
        )?;

        session.update_properties(MediaProperties::new("Guta", ""));
        session.update_playback(true);

        assert_eq!(enforcer.policy(), Policy::idle(NORMAL_VOLUME));
        assert_eq!(enforcer.current_match(), "");
        assert_eq!(device.inner.commands(), vec![DeviceCommand::SetMuted(false)]);
        assert_eq!(device.inner.level(), 0.5);

        // the controller has let go: external changes stand
        device.inner.external_set_volume(0.3);
        assert_eq!(device.inner.level(), 0.3);
        Ok(())
    }

    #[test]
    fn test_queued_event_is_applied_after_running_transition() -> Result<()> {
        let session = Arc::new(SessionTracker::new());
        let device = Arc::new(StopsOnUnmute {
            inner: FakeVolumeDevice::new(0.5, false),
            session: session.clone(),
            fired: AtomicBool::new(false),
        });
        let enforcer = VolumeEnforcer::new(
            device.clone(),
            session.clone(),
            KeywordSet::new(["guta"]),
            EnforcerSettings::default(),
        )?;

        session.update_properties(MediaProperties::new("Guta", ""));
        session.update_playback(true);
        assert!(!enforcer.policy().active);

        // later transitions run normally
        session.update_playback(true);
        assert_eq!(enforcer.policy(), Policy::max(MAX_VOLUME));
        assert_eq!(enforcer.current_match(), "guta");
        assert_eq!(device.inner.level(), MAX_VOLUME);
        Ok(())
    }

    #[test]
    fn test_match_handle_tracks_controller() -> Result<()> {
        let (enforcer, _device, session) = enforcer_with(&["salam"])?;
        let handle = enforcer.match_handle();

        session.update_properties(MediaProperties::new("Florin Salam", "Saint Tropez"));
        session.update_playback(true);
        assert_eq!(handle.current_match(), "salam");

        session.update_playback(false);
        assert_eq!(handle.current_match(), "");
        Ok(())
    }

    #[test]
    fn test_custom_settings() -> Result<()> {
        let device = Arc::new(FakeVolumeDevice::new(0.5, false));
        let session = Arc::new(SessionTracker::new());
        let settings = EnforcerSettings {
            max_volume: 0.9,
            normal_volume: 0.1,
            max_words: 1,
        };
        let enforcer = VolumeEnforcer::new(
            device.clone(),
            session,
            KeywordSet::new(["florin salam"]),
            settings,
        )?;

        // two-word keyword is out of reach with max_words = 1
        enforcer.apply_media(Some(&MediaProperties::new("Florin Salam", "")))?;
        assert_eq!(enforcer.policy(), Policy::background(0.1));
        assert_eq!(device.level(), 0.1);
        Ok(())
    }
}
