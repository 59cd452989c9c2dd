//! Windows adapters: WASAPI endpoint volume and the system media session.

use super::Platform;
use crate::session::{MediaListener, MediaProperties, MediaSessionWatcher, SessionTracker};
use crate::volume::{OriginToken, VolumeChange, VolumeDevice, VolumeListener, VolumeNotifier};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use windows::core::{implement, GUID};
use windows::Foundation::{EventRegistrationToken, TypedEventHandler};
use windows::Media::Control::{
    CurrentSessionChangedEventArgs, GlobalSystemMediaTransportControlsSession as Session,
    GlobalSystemMediaTransportControlsSessionManager as SessionManager,
    GlobalSystemMediaTransportControlsSessionPlaybackStatus as PlaybackStatus,
    MediaPropertiesChangedEventArgs, PlaybackInfoChangedEventArgs,
};
use windows::Win32::Foundation::{BOOL, E_INVALIDARG};
use windows::Win32::Media::Audio::Endpoints::{
    IAudioEndpointVolume, IAudioEndpointVolumeCallback, IAudioEndpointVolumeCallback_Impl,
};
use windows::Win32::Media::Audio::{
    eMultimedia, eRender, IMMDeviceEnumerator, MMDeviceEnumerator, AUDIO_VOLUME_NOTIFICATION_DATA,
};
use windows::Win32::System::Com::{
    CoCreateGuid, CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED,
};

pub(super) fn connect() -> Result<Platform> {
    unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }
        .ok()
        .context("CoInitializeEx failed")?;

    let device = Arc::new(EndpointVolume::open()?);
    let media = Arc::new(SmtcWatcher::open()?);

    info!("Connected to default audio endpoint and media session manager");
    Ok(Platform { device, media })
}

/// Receives endpoint notifications on a system thread.
#[implement(IAudioEndpointVolumeCallback)]
struct EndpointCallback {
    notifier: Arc<VolumeNotifier>,
}

impl IAudioEndpointVolumeCallback_Impl for EndpointCallback_Impl {
    fn OnNotify(&self, pnotify: *mut AUDIO_VOLUME_NOTIFICATION_DATA) -> windows::core::Result<()> {
        let Some(data) = (unsafe { pnotify.as_ref() }) else {
            return Err(E_INVALIDARG.into());
        };

        let origin = OriginToken::from_u128(data.guidEventContext.to_u128());
        self.notifier.notify(
            origin,
            VolumeChange {
                level: data.fMasterVolume,
                muted: data.bMuted.as_bool(),
            },
        );
        Ok(())
    }
}

/// Master volume of the default multimedia render endpoint.
struct EndpointVolume {
    endpoint: IAudioEndpointVolume,
    context: GUID,
    notifier: Arc<VolumeNotifier>,
    callback: Mutex<Option<IAudioEndpointVolumeCallback>>,
}

// SAFETY: the endpoint volume interface is free-threaded and COM is
// initialized in the multithreaded apartment before it is created.
unsafe impl Send for EndpointVolume {}
unsafe impl Sync for EndpointVolume {}

impl EndpointVolume {
    fn open() -> Result<Self> {
        let context = unsafe { CoCreateGuid() }.context("CoCreateGuid failed")?;

        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
                .context("CoCreateInstance(MMDeviceEnumerator) failed")?;

        let device = unsafe { enumerator.GetDefaultAudioEndpoint(eRender, eMultimedia) }
            .context("IMMDeviceEnumerator::GetDefaultAudioEndpoint failed")?;

        let endpoint: IAudioEndpointVolume = unsafe { device.Activate(CLSCTX_ALL, None) }
            .context("IMMDevice::Activate(IAudioEndpointVolume) failed")?;

        debug!("Opened default render endpoint, event context {context:?}");

        Ok(Self {
            endpoint,
            context,
            notifier: Arc::new(VolumeNotifier::new(OriginToken::from_u128(context.to_u128()))),
            callback: Mutex::new(None),
        })
    }
}

impl VolumeDevice for EndpointVolume {
    fn set_volume(&self, level: f32) -> Result<()> {
        unsafe { self.endpoint.SetMasterVolumeLevelScalar(level, &self.context) }
            .context("IAudioEndpointVolume::SetMasterVolumeLevelScalar failed")
    }

    fn set_muted(&self, muted: bool) -> Result<()> {
        unsafe { self.endpoint.SetMute(BOOL::from(muted), &self.context) }
            .context("IAudioEndpointVolume::SetMute failed")
    }

    fn register_listener(&self, listener: Arc<dyn VolumeListener>) -> Result<()> {
        let mut callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        if callback.is_some() {
            warn!("Endpoint callback already registered");
            return Ok(());
        }

        let registered: IAudioEndpointVolumeCallback = EndpointCallback {
            notifier: Arc::clone(&self.notifier),
        }
        .into();

        unsafe { self.endpoint.RegisterControlChangeNotify(&registered) }
            .context("IAudioEndpointVolume::RegisterControlChangeNotify failed")?;

        self.notifier.set_listener(listener);
        *callback = Some(registered);
        Ok(())
    }

    fn clear_listener(&self) {
        self.notifier.clear_listener();

        let registered = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(registered) = registered {
            if let Err(e) = unsafe { self.endpoint.UnregisterControlChangeNotify(&registered) } {
                warn!("IAudioEndpointVolume::UnregisterControlChangeNotify failed: {e}");
            }
        }
    }
}

impl Drop for EndpointVolume {
    fn drop(&mut self) {
        self.clear_listener();
    }
}

/// Event subscriptions on the current media session.
struct SessionSubscription {
    session: Session,
    properties_token: EventRegistrationToken,
    playback_token: EventRegistrationToken,
}

impl SessionSubscription {
    fn remove(self) {
        if let Err(e) = self.session.RemoveMediaPropertiesChanged(self.properties_token) {
            debug!("RemoveMediaPropertiesChanged failed: {e}");
        }
        if let Err(e) = self.session.RemovePlaybackInfoChanged(self.playback_token) {
            debug!("RemovePlaybackInfoChanged failed: {e}");
        }
    }
}

/// Follows whichever session the system considers current.
struct SessionLink {
    manager: SessionManager,
    tracker: Arc<SessionTracker>,
    subscription: Mutex<Option<SessionSubscription>>,
}

impl SessionLink {
    fn on_session_changed(self: &Arc<Self>) {
        let previous = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            previous.remove();
        }

        let Ok(session) = self.manager.GetCurrentSession() else {
            debug!("No current media session");
            self.tracker.session_lost();
            return;
        };

        match self.subscribe(&session) {
            Ok(subscription) => {
                *self.subscription.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(subscription);
            }
            Err(e) => warn!("Failed to subscribe to media session events: {e:#}"),
        }

        if let Err(e) = self.refresh_properties(&session) {
            warn!("{e:#}");
        }
        if let Err(e) = self.refresh_playback(&session) {
            warn!("{e:#}");
        }
    }

    fn subscribe(self: &Arc<Self>, session: &Session) -> Result<SessionSubscription> {
        let link = Arc::downgrade(self);
        let properties_token = session
            .MediaPropertiesChanged(&TypedEventHandler::<Session, MediaPropertiesChangedEventArgs>::new(
                move |sender: &Option<Session>, _| {
                    if let (Some(link), Some(session)) = (link.upgrade(), sender.as_ref()) {
                        if let Err(e) = link.refresh_properties(session) {
                            warn!("{e:#}");
                        }
                    }
                    Ok(())
                },
            ))
            .context("Failed to subscribe to MediaPropertiesChanged")?;

        let link = Arc::downgrade(self);
        let playback_token = session
            .PlaybackInfoChanged(&TypedEventHandler::<Session, PlaybackInfoChangedEventArgs>::new(
                move |sender: &Option<Session>, _| {
                    if let (Some(link), Some(session)) = (link.upgrade(), sender.as_ref()) {
                        if let Err(e) = link.refresh_playback(session) {
                            warn!("{e:#}");
                        }
                    }
                    Ok(())
                },
            ))
            .context("Failed to subscribe to PlaybackInfoChanged")?;

        Ok(SessionSubscription {
            session: session.clone(),
            properties_token,
            playback_token,
        })
    }

    fn refresh_properties(&self, session: &Session) -> Result<()> {
        let media = session
            .TryGetMediaPropertiesAsync()
            .and_then(|operation| operation.get())
            .context("Failed to read media properties")?;

        self.tracker.update_properties(MediaProperties::new(
            media.Artist()?.to_string_lossy(),
            media.Title()?.to_string_lossy(),
        ));
        Ok(())
    }

    fn refresh_playback(&self, session: &Session) -> Result<()> {
        let status = session
            .GetPlaybackInfo()
            .and_then(|info| info.PlaybackStatus())
            .context("Failed to read playback status")?;

        self.tracker.update_playback(status == PlaybackStatus::Playing);
        Ok(())
    }
}

/// Media session watcher backed by the system media transport controls.
struct SmtcWatcher {
    link: Arc<SessionLink>,
    session_changed_token: EventRegistrationToken,
}

impl SmtcWatcher {
    fn open() -> Result<Self> {
        let manager = SessionManager::RequestAsync()
            .and_then(|operation| operation.get())
            .context("GlobalSystemMediaTransportControlsSessionManager::RequestAsync failed")?;

        let link = Arc::new(SessionLink {
            manager,
            tracker: Arc::new(SessionTracker::new()),
            subscription: Mutex::new(None),
        });

        let weak: Weak<SessionLink> = Arc::downgrade(&link);
        let session_changed_token = link
            .manager
            .CurrentSessionChanged(&TypedEventHandler::<SessionManager, CurrentSessionChangedEventArgs>::new(
                move |_, _| {
                    if let Some(link) = weak.upgrade() {
                        link.on_session_changed();
                    }
                    Ok(())
                },
            ))
            .context("Failed to subscribe to CurrentSessionChanged")?;

        link.on_session_changed();

        Ok(Self {
            link,
            session_changed_token,
        })
    }
}

impl MediaSessionWatcher for SmtcWatcher {
    fn current_properties(&self) -> Option<MediaProperties> {
        self.link.tracker.current_properties()
    }

    fn set_listener(&self, listener: Arc<dyn MediaListener>) {
        self.link.tracker.set_listener(listener);
    }

    fn clear_listener(&self) {
        self.link.tracker.clear_listener();
    }
}

impl Drop for SmtcWatcher {
    fn drop(&mut self) {
        self.link.tracker.clear_listener();

        if let Err(e) = self
            .link
            .manager
            .RemoveCurrentSessionChanged(self.session_changed_token)
        {
            debug!("RemoveCurrentSessionChanged failed: {e}");
        }

        let subscription = self
            .link
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.remove();
        }
    }
}
