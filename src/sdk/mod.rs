//! SDK Module - Schnittstelle zum externen Calling-SDK
//!
//! Das SDK besitzt Authentifizierung, Signaling, Media-Transport und
//! Reconnection. Dieses Modul beschreibt nur die Grenze:
//! - `CallingSdk` für Session-Operationen (authenticate, connect, listener, dial)
//! - `CallHandle` für Operationen auf einem einzelnen Anruf
//! - `SdkEvent` für asynchron gelieferte Lifecycle-Events
//!
//! `loopback` ist ein In-Process-Backend für Demo und Tests.

pub mod loopback;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("Signaling channel failed: {0}")]
    Connection(String),

    #[error("Dial failed: {0}")]
    Dial(String),

    #[error("Call rejected by SDK: {0}")]
    Rejected(String),

    #[error("Call already closed")]
    Closed,
}

// ============================================================================
// CALL TYPES
// ============================================================================

/// Eindeutige ID eines Anrufs (vom SDK vergeben)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Richtung eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// Art des Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_video_flag(is_video_call: bool) -> Self {
        if is_video_call {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }

    pub fn is_video(self) -> bool {
        self == MediaKind::Video
    }

    /// Label für die UI ("Video" / "Audio")
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Audio => "Audio",
            MediaKind::Video => "Video",
        }
    }
}

/// Lokale Media-Konfiguration für dial/accept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOption {
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl Default for CallOption {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            video_enabled: true,
        }
    }
}

/// Parameter für einen ausgehenden Anruf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialParams {
    pub user_id: String,
    pub media_kind: MediaKind,
    pub option: CallOption,
}

/// Zugangsdaten für `CallingSdk::authenticate`
#[derive(Clone)]
pub struct Credentials {
    pub app_id: String,
    pub user_id: String,
    pub access_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Ergebnis einer erfolgreichen Authentifizierung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

// ============================================================================
// SDK EVENTS
// ============================================================================

/// Lifecycle-Events eines einzelnen Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEvent {
    Established,
    Connected,
    Reconnecting,
    Reconnected,
    Ended,
    RemoteAudioSettingsChanged,
    RemoteVideoSettingsChanged,
}

/// Events die vom SDK ausgelöst werden
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkEvent {
    /// Lifecycle-Event für einen Anruf
    Call { call_id: CallId, event: CallEvent },

    /// Asynchroner Fehler beim Verbindungsaufbau eines ausgehenden Anrufs
    DialFailed { call_id: CallId, reason: String },
}

// ============================================================================
// TRAITS
// ============================================================================

/// Handle auf einen laufenden oder wartenden Anruf.
///
/// Alle Operationen kehren sofort zurück; ihre Wirkung kommt später als
/// `SdkEvent` an.
pub trait CallHandle: Clone + Send + Sync + 'static {
    fn id(&self) -> &CallId;

    fn direction(&self) -> CallDirection;

    fn media_kind(&self) -> MediaKind;

    fn is_video_call(&self) -> bool {
        self.media_kind().is_video()
    }

    fn remote_user_id(&self) -> &str;

    fn accept(&self, option: &CallOption) -> Result<(), SdkError>;

    fn end(&self);

    fn mute_microphone(&self);

    fn unmute_microphone(&self);

    fn start_video(&self);

    fn stop_video(&self);
}

/// Session-Operationen des Calling-SDKs
#[async_trait]
pub trait CallingSdk: Send + Sync + 'static {
    type Call: CallHandle;

    /// Authentifiziert einen Benutzer beim Backend
    async fn authenticate(&self, credentials: &Credentials)
        -> Result<AuthenticatedUser, SdkError>;

    /// Öffnet den Signaling-Kanal der authentifizierten Session
    async fn connect(&self) -> Result<(), SdkError>;

    /// Registriert einen Listener für eingehende Anrufe.
    ///
    /// Ein bestehender Listener mit demselben Key wird ersetzt.
    fn add_listener(&self, key: &str, listener: mpsc::UnboundedSender<Self::Call>);

    /// Entfernt einen Listener, gibt `true` zurück wenn er existierte
    fn remove_listener(&self, key: &str) -> bool;

    /// Startet einen ausgehenden Anruf. Das Handle kommt vor dem Aufbau zurück.
    fn dial(&self, params: DialParams) -> Result<Self::Call, SdkError>;

    /// Gibt einen Event-Receiver für Call-Events zurück
    fn events(&self) -> broadcast::Receiver<SdkEvent>;
}
