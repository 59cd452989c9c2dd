//! # Media Session Capability
//!
//! Reports what the system is currently playing. A platform session service
//! delivers two independent kinds of notifications, metadata changes and
//! playback status changes, and [`SessionTracker`] folds them into the two
//! events the controller cares about:
//!
//! - `on_play(properties)` - something started playing, or the metadata of
//!   the playing item changed
//! - `on_stop()` - nothing is playing anymore
//!
//! ## Locking
//!
//! The tracker keeps "last metadata" and "currently playing" behind one
//! read/write lock, separate from the listener slot. Updates take the write
//! lock only long enough to swap the record; listeners are always invoked
//! after the lock is released.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Metadata of the playing media item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProperties {
    pub artist: String,
    pub title: String,
}

impl MediaProperties {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }
}

/// Receives play/stop events. Callbacks may arrive on any thread.
pub trait MediaListener: Send + Sync {
    fn on_play(&self, properties: &MediaProperties);
    fn on_stop(&self);
}

/// Source of "what is playing" information.
pub trait MediaSessionWatcher: Send + Sync {
    /// Metadata of the playing item, or `None` if nothing is playing.
    fn current_properties(&self) -> Option<MediaProperties>;

    /// Replaces the listener.
    fn set_listener(&self, listener: Arc<dyn MediaListener>);

    /// Detaches the listener. Events arriving afterwards are dropped.
    fn clear_listener(&self);
}

#[derive(Debug, Default)]
struct SessionState {
    properties: MediaProperties,
    playing: bool,
}

/// Platform-independent session bookkeeping.
///
/// Platform adapters feed it raw notifications; tests drive it directly.
#[derive(Default)]
pub struct SessionTracker {
    state: RwLock<SessionState>,
    listener: RwLock<Option<Arc<dyn MediaListener>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn listener(&self) -> Option<Arc<dyn MediaListener>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// New metadata for the current session.
    ///
    /// Emits `on_play` with the new metadata if the session is playing.
    pub fn update_properties(&self, properties: MediaProperties) {
        let playing = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.properties = properties.clone();
            state.playing
        };

        debug!(
            "Media properties changed: '{}' - '{}' (playing: {playing})",
            properties.artist, properties.title
        );

        if playing {
            if let Some(listener) = self.listener() {
                listener.on_play(&properties);
            }
        }
    }

    /// New playback status for the current session.
    ///
    /// Emits `on_play`/`on_stop` only when the playing flag flips.
    pub fn update_playback(&self, playing: bool) {
        let (changed, properties) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let changed = state.playing != playing;
            state.playing = playing;
            (changed, state.properties.clone())
        };

        if !changed {
            trace!("Playback status unchanged (playing: {playing})");
            return;
        }

        debug!("Playback status changed (playing: {playing})");

        let Some(listener) = self.listener() else {
            return;
        };

        if playing {
            listener.on_play(&properties);
        } else {
            listener.on_stop();
        }
    }

    /// The current session went away entirely.
    pub fn session_lost(&self) {
        let was_playing = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut state.playing, false)
        };

        debug!("Media session lost (was playing: {was_playing})");

        if was_playing {
            if let Some(listener) = self.listener() {
                listener.on_stop();
            }
        }
    }

    /// Whether the last playback status reported was "playing".
    pub fn is_playing(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .playing
    }
}

impl MediaSessionWatcher for SessionTracker {
    fn current_properties(&self) -> Option<MediaProperties> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.playing.then(|| state.properties.clone())
    }

    fn set_listener(&self, listener: Arc<dyn MediaListener>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    fn clear_listener(&self) {
        self.listener
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl MediaListener for Recorder {
        fn on_play(&self, properties: &MediaProperties) {
            self.events
                .lock()
                .unwrap()
                .push(format!("play {} - {}", properties.artist, properties.title));
        }

        fn on_stop(&self) {
            self.events.lock().unwrap().push("stop".to_string());
        }
    }

    fn tracker_with_recorder() -> (SessionTracker, Arc<Recorder>) {
        let tracker = SessionTracker::new();
        let recorder = Arc::new(Recorder::default());
        tracker.set_listener(recorder.clone());
        (tracker, recorder)
    }

    #[test]
    fn test_properties_while_stopped_do_not_emit() {
        let (tracker, recorder) = tracker_with_recorder();
        tracker.update_properties(MediaProperties::new("Guță", "Hit"));
        assert!(recorder.events.lock().unwrap().is_empty());
        assert_eq!(tracker.current_properties(), None);
    }

    #[test]
    fn test_play_emits_latest_properties() {
        let (tracker, recorder) = tracker_with_recorder();
        tracker.update_properties(MediaProperties::new("Guță", "Hit"));
        tracker.update_playback(true);

        assert_eq!(*recorder.events.lock().unwrap(), vec!["play Guță - Hit"]);
        assert_eq!(
            tracker.current_properties(),
            Some(MediaProperties::new("Guță", "Hit"))
        );
    }

    #[test]
    fn test_playback_only_emits_on_flip() {
        let (tracker, recorder) = tracker_with_recorder();
        tracker.update_playback(true);
        tracker.update_playback(true);
        tracker.update_playback(false);
        tracker.update_playback(false);

        assert_eq!(*recorder.events.lock().unwrap(), vec!["play  - ", "stop"]);
    }

    #[test]
    fn test_metadata_change_while_playing_emits_play() {
        let (tracker, recorder) = tracker_with_recorder();
        tracker.update_playback(true);
        tracker.update_properties(MediaProperties::new("A", "One"));
        tracker.update_properties(MediaProperties::new("B", "Two"));

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], "play B - Two");
    }

    #[test]
    fn test_session_lost() {
        let (tracker, recorder) = tracker_with_recorder();
        tracker.session_lost();
        assert!(recorder.events.lock().unwrap().is_empty());

        tracker.update_playback(true);
        tracker.session_lost();
        assert!(!tracker.is_playing());
        assert_eq!(recorder.events.lock().unwrap().last().map(String::as_str), Some("stop"));
    }

    #[test]
    fn test_cleared_listener_receives_nothing() {
        let (tracker, recorder) = tracker_with_recorder();
        tracker.clear_listener();
        tracker.update_playback(true);
        tracker.update_properties(MediaProperties::new("A", "B"));
        assert!(recorder.events.lock().unwrap().is_empty());
        assert!(tracker.is_playing());
    }
}
