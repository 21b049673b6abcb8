//! Call Controller
//!
//! Hängt an genau einem Call-Handle. Wendet Lifecycle-Events über die
//! Übergangsfunktion an und übersetzt Benutzeraktionen (accept, reject,
//! end, mute, video) in Handle-Operationen.

use super::lifecycle::{transition, CallLifecycleState, LifecycleEvent};
use crate::sdk::{CallDirection, CallHandle, CallId, CallOption, MediaKind, SdkError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: CallLifecycleState,
    },

    #[error("Video controls are only available in video calls")]
    NotVideoCall,

    #[error("SDK error: {0}")]
    Sdk(#[from] SdkError),
}

// ============================================================================
// MEDIA TOGGLES
// ============================================================================

/// Lokale Media-Schalter. Ändern nie den Lifecycle-Zustand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MediaToggles {
    pub microphone_muted: bool,
    pub video_disabled: bool,
}

// ============================================================================
// CALL CONTROLLER
// ============================================================================

pub struct CallController<H: CallHandle> {
    handle: H,
    state: CallLifecycleState,
    toggles: MediaToggles,
    created_at: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
}

impl<H: CallHandle> CallController<H> {
    /// Controller für einen eingehenden, klingelnden Anruf
    pub fn inbound(handle: H) -> Self {
        Self::with_event(handle, LifecycleEvent::Ringing)
    }

    /// Controller für einen gerade gewählten Anruf
    pub fn outbound(handle: H) -> Self {
        Self::with_event(handle, LifecycleEvent::Dialed)
    }

    fn with_event(handle: H, event: LifecycleEvent) -> Self {
        Self {
            handle,
            state: transition(CallLifecycleState::Idle, event),
            toggles: MediaToggles::default(),
            created_at: Utc::now(),
            connected_at: None,
        }
    }

    pub fn id(&self) -> &CallId {
        self.handle.id()
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn state(&self) -> CallLifecycleState {
        self.state
    }

    pub fn toggles(&self) -> MediaToggles {
        self.toggles
    }

    pub fn direction(&self) -> CallDirection {
        self.handle.direction()
    }

    pub fn media_kind(&self) -> MediaKind {
        self.handle.media_kind()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    /// Wendet ein Lifecycle-Event an und gibt den neuen Zustand zurück
    pub fn apply(&mut self, event: LifecycleEvent) -> CallLifecycleState {
        let previous = self.state;
        self.state = transition(previous, event);

        match event {
            LifecycleEvent::RemoteAudioSettingsChanged => {
                tracing::info!("Call {}: remote audio settings changed", self.id());
            }
            LifecycleEvent::RemoteVideoSettingsChanged => {
                tracing::info!("Call {}: remote video settings changed", self.id());
            }
            _ if previous != self.state => {
                tracing::info!("Call {}: {} -> {} ({:?})", self.id(), previous, self.state, event);
            }
            _ => {
                tracing::debug!("Call {}: {:?} kept state {}", self.id(), event, self.state);
            }
        }

        if self.state == CallLifecycleState::Connected && self.connected_at.is_none() {
            self.connected_at = Some(Utc::now());
        }
        if self.state == CallLifecycleState::Ended {
            self.log_duration();
        }

        self.state
    }

    /// Nimmt einen klingelnden Anruf an.
    ///
    /// Ein SDK-Fehler beendet den Anruf sofort (`Ended`).
    pub fn accept(&mut self, option: &CallOption) -> Result<CallLifecycleState, CallError> {
        self.require(CallLifecycleState::RingingInbound, "accept")?;

        if let Err(e) = self.handle.accept(option) {
            tracing::error!("Call {}: accept failed: {}", self.id(), e);
            self.apply(LifecycleEvent::Failed);
            return Err(e.into());
        }

        Ok(self.apply(LifecycleEvent::Accepted))
    }

    /// Lehnt einen klingelnden Anruf ab
    pub fn reject(&mut self) -> Result<CallLifecycleState, CallError> {
        self.require(CallLifecycleState::RingingInbound, "reject")?;
        Ok(self.end())
    }

    /// Beendet den Anruf, unabhängig vom aktuellen Zustand
    pub fn end(&mut self) -> CallLifecycleState {
        if self.state == CallLifecycleState::Ended {
            return self.state;
        }
        self.handle.end();
        self.apply(LifecycleEvent::Ended)
    }

    /// Schaltet das Mikrofon stumm/laut, gibt den neuen Mute-Status zurück
    pub fn toggle_microphone(&mut self) -> Result<bool, CallError> {
        self.require(CallLifecycleState::Connected, "toggle the microphone")?;

        let muted = !self.toggles.microphone_muted;
        if muted {
            self.handle.mute_microphone();
        } else {
            self.handle.unmute_microphone();
        }
        self.toggles.microphone_muted = muted;

        tracing::debug!("Call {}: microphone muted = {}", self.id(), muted);
        Ok(muted)
    }

    /// Schaltet die Kamera ab/an, gibt zurück ob Video jetzt deaktiviert ist
    pub fn toggle_video(&mut self) -> Result<bool, CallError> {
        if !self.handle.is_video_call() {
            return Err(CallError::NotVideoCall);
        }
        self.require(CallLifecycleState::Connected, "toggle the camera")?;

        let disabled = !self.toggles.video_disabled;
        if disabled {
            self.handle.stop_video();
        } else {
            self.handle.start_video();
        }
        self.toggles.video_disabled = disabled;

        tracing::debug!("Call {}: video disabled = {}", self.id(), disabled);
        Ok(disabled)
    }

    fn require(
        &self,
        expected: CallLifecycleState,
        action: &'static str,
    ) -> Result<(), CallError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CallError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn log_duration(&self) {
        match self.connected_at {
            Some(connected_at) => tracing::info!(
                "Call {} ended after {}s",
                self.id(),
                (Utc::now() - connected_at).num_seconds()
            ),
            None => tracing::info!("Call {} ended before connecting", self.id()),
        }
    }
}

impl<H: CallHandle + std::fmt::Debug> std::fmt::Debug for CallController<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("id", self.id())
            .field("state", &self.state)
            .field("toggles", &self.toggles)
            .finish()
    }
}
