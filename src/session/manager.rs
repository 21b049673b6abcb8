//! Session Manager
//!
//! Hält genau eine authentifizierte Session und höchstens ein Call-Handle:
//! - Authentifizierung und Signaling-Kanal
//! - Genau ein Listener für eingehende Anrufe
//! - Weiterleitung von SDK-Events an den Call Controller
//! - Benutzeraktionen (dial, accept, reject, end, mute, video)

use super::listener::ListenerRegistration;
use crate::call::{CallController, CallError, CallLifecycleState, LifecycleEvent, MediaToggles};
use crate::config::AppConfig;
use crate::sdk::{
    CallHandle, CallId, CallOption, CallingSdk, Credentials, DialParams, MediaKind, SdkError,
    SdkEvent,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Identity must not be empty")]
    InvalidIdentity,

    #[error("Unable to authenticate: {0}")]
    Authentication(SdkError),

    #[error("Unable to open signaling channel: {0}")]
    Connection(SdkError),

    #[error("Unable to place call: {0}")]
    Dial(SdkError),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Already in a call")]
    CallInProgress,

    #[error("No active call")]
    NoActiveCall,

    #[error(transparent)]
    Call(#[from] CallError),
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Closed,
    Open,
}

/// Session-Deskriptor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Session {
    pub identity: Option<String>,
    pub auth: AuthStatus,
    pub channel: ChannelStatus,
}

impl Session {
    /// Authentifiziert und Signaling-Kanal offen
    pub fn is_ready(&self) -> bool {
        self.auth == AuthStatus::Authenticated && self.channel == ChannelStatus::Open
    }

    fn fail(&mut self) {
        self.auth = AuthStatus::Failed;
        self.channel = ChannelStatus::Closed;
    }
}

/// Eingehende Benachrichtigung vom SDK
#[derive(Debug, Clone)]
pub enum Notification<H> {
    /// Ein neuer Anruf klingelt
    Ringing(H),
    /// Lifecycle-Event oder Dial-Fehler
    Sdk(SdkEvent),
    /// Der Event-Empfänger hat Events verpasst (Broadcast-Puffer übergelaufen)
    Missed(u64),
}

// ============================================================================
// SESSION MANAGER
// ============================================================================

pub struct SessionManager<S: CallingSdk> {
    sdk: Arc<S>,
    config: AppConfig,
    session: Session,
    listener: Option<ListenerRegistration<S>>,
    inbound_rx: Option<mpsc::UnboundedReceiver<S::Call>>,
    sdk_events: broadcast::Receiver<SdkEvent>,
    call: Option<CallController<S::Call>>,
    call_option: CallOption,
}

impl<S: CallingSdk> SessionManager<S> {
    pub fn new(sdk: Arc<S>, config: AppConfig) -> Self {
        let sdk_events = sdk.events();

        Self {
            sdk,
            config,
            session: Session::default(),
            listener: None,
            inbound_rx: None,
            sdk_events,
            call: None,
            call_option: CallOption::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn call(&self) -> Option<&CallController<S::Call>> {
        self.call.as_ref()
    }

    /// Aktueller Lifecycle-Zustand, `Idle` ohne Call-Handle
    pub fn call_state(&self) -> CallLifecycleState {
        self.call
            .as_ref()
            .map(|c| c.state())
            .unwrap_or(CallLifecycleState::Idle)
    }

    pub fn toggles(&self) -> MediaToggles {
        self.call.as_ref().map(|c| c.toggles()).unwrap_or_default()
    }

    pub fn listener_key(&self) -> Option<&str> {
        self.listener.as_ref().map(|l| l.key())
    }

    // ========================================================================
    // SESSION OPERATIONS
    // ========================================================================

    /// Authentifiziert eine Identität mit dem statischen Access Token.
    ///
    /// Kein automatischer Retry: bei Fehler ist die Session `Failed`.
    pub async fn authenticate(&mut self, identity: &str) -> Result<Session, SessionError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(SessionError::InvalidIdentity);
        }

        self.session = Session {
            identity: Some(identity.to_string()),
            auth: AuthStatus::Authenticating,
            channel: ChannelStatus::Closed,
        };

        let credentials = Credentials {
            app_id: self.config.app_id.clone(),
            user_id: identity.to_string(),
            access_token: self.config.access_token.clone(),
        };

        match self.sdk.authenticate(&credentials).await {
            Ok(user) => {
                tracing::info!("Authenticated as {}", user.user_id);
                self.session.auth = AuthStatus::Authenticated;
                Ok(self.session.clone())
            }
            Err(e) => {
                tracing::warn!("Error authenticating as {}: {}", identity, e);
                self.session.fail();
                Err(SessionError::Authentication(e))
            }
        }
    }

    /// Öffnet den Signaling-Kanal einer authentifizierten Session
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.session.auth != AuthStatus::Authenticated {
            return Err(SessionError::NotAuthenticated);
        }

        match self.sdk.connect().await {
            Ok(()) => {
                tracing::info!("Signaling channel open");
                self.session.channel = ChannelStatus::Open;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Error connecting signaling channel: {}", e);
                self.session.fail();
                Err(SessionError::Connection(e))
            }
        }
    }

    /// Registriert den Listener für eingehende Anrufe.
    ///
    /// Eine bestehende Registrierung wird vorher verworfen.
    pub fn register_inbound_listener(&mut self, identity: &str) {
        // Erst abmelden: gleicher Key würde sonst den neuen Listener entfernen
        self.listener = None;
        self.inbound_rx = None;

        let (registration, rx) = ListenerRegistration::register(Arc::clone(&self.sdk), identity);
        self.listener = Some(registration);
        self.inbound_rx = Some(rx);
    }

    /// Startsequenz: authenticate, connect, Listener registrieren
    pub async fn login(&mut self, identity: &str) -> Result<(), SessionError> {
        let identity = identity.trim();
        // Ungültige Eingabe lässt die bestehende Session unangetastet
        if identity.is_empty() {
            return Err(SessionError::InvalidIdentity);
        }

        tracing::info!("Logging in as '{}'...", identity);

        // Eine neue Identität ersetzt die alte Session vollständig
        self.drop_call();
        self.listener = None;
        self.inbound_rx = None;

        self.authenticate(identity).await?;
        self.connect().await?;

        let identity = self
            .session
            .identity
            .clone()
            .ok_or(SessionError::NotAuthenticated)?;
        self.register_inbound_listener(&identity);

        Ok(())
    }

    /// Beendet einen laufenden Anruf und setzt die Session zurück
    pub fn logout(&mut self) {
        if let Some(mut call) = self.call.take() {
            call.end();
        }
        self.listener = None;
        self.inbound_rx = None;
        self.session = Session::default();
        tracing::info!("Logged out");
    }

    // ========================================================================
    // CALL OPERATIONS
    // ========================================================================

    /// Startet einen ausgehenden Anruf.
    ///
    /// Der Zustand ist sofort `ConnectingOutbound`; ein späterer Dial-Fehler
    /// kommt als `SdkEvent::DialFailed`.
    pub fn dial(&mut self, target: &str, media_kind: MediaKind) -> Result<CallId, SessionError> {
        if !self.session.is_ready() {
            return Err(SessionError::NotAuthenticated);
        }
        if self.call.is_some() {
            return Err(SessionError::CallInProgress);
        }

        let params = DialParams {
            user_id: target.trim().to_string(),
            media_kind,
            option: self.call_option.clone(),
        };

        tracing::info!("Dialing {} ({} call)", params.user_id, media_kind.label());

        let handle = self.sdk.dial(params).map_err(|e| {
            tracing::warn!("Dial rejected: {}", e);
            SessionError::Dial(e)
        })?;

        let controller = CallController::outbound(handle);
        let call_id = controller.id().clone();
        self.call = Some(controller);

        Ok(call_id)
    }

    /// Nimmt den klingelnden Anruf an
    pub fn accept(&mut self) -> Result<CallLifecycleState, SessionError> {
        let option = self.call_option.clone();
        self.with_call(|call| call.accept(&option))
    }

    /// Lehnt den klingelnden Anruf ab
    pub fn reject(&mut self) -> Result<CallLifecycleState, SessionError> {
        self.with_call(|call| call.reject())
    }

    /// Beendet den aktuellen Anruf. Ohne Anruf ein No-op.
    pub fn end_call(&mut self) -> CallLifecycleState {
        if let Some(mut call) = self.call.take() {
            tracing::info!("Hanging up call {}", call.id());
            call.end();
        }
        CallLifecycleState::Idle
    }

    /// Mikrofon stumm/laut, gibt den neuen Mute-Status zurück
    pub fn toggle_microphone(&mut self) -> Result<bool, SessionError> {
        let call = self.call.as_mut().ok_or(SessionError::NoActiveCall)?;
        Ok(call.toggle_microphone()?)
    }

    /// Kamera ab/an, gibt zurück ob Video deaktiviert ist
    pub fn toggle_video(&mut self) -> Result<bool, SessionError> {
        let call = self.call.as_mut().ok_or(SessionError::NoActiveCall)?;
        Ok(call.toggle_video()?)
    }

    // ========================================================================
    // EVENT HANDLING
    // ========================================================================

    /// Wartet auf die nächste Benachrichtigung (eingehender Anruf oder SDK-Event).
    ///
    /// Gibt `None` zurück wenn der Event-Stream des SDKs geschlossen wurde.
    pub async fn next_notification(&mut self) -> Option<Notification<S::Call>> {
        let inbound_rx = &mut self.inbound_rx;
        let sdk_events = &mut self.sdk_events;

        let inbound = async {
            match inbound_rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            Some(call) = inbound => Some(Notification::Ringing(call)),
            event = sdk_events.recv() => match event {
                Ok(event) => Some(Notification::Sdk(event)),
                Err(RecvError::Lagged(skipped)) => Some(Notification::Missed(skipped)),
                Err(RecvError::Closed) => None,
            },
        }
    }

    /// Verarbeitet eine Benachrichtigung
    pub fn handle_notification(&mut self, notification: Notification<S::Call>) {
        match notification {
            Notification::Ringing(call) => self.handle_ringing(call),
            Notification::Sdk(event) => self.handle_sdk_event(event),
            Notification::Missed(skipped) => self.handle_missed_events(skipped),
        }
    }

    /// Verpasste SDK-Events. Der Zustand des aktuellen Anrufs ist danach
    /// unbekannt (z.B. ein verlorenes `Ended`), daher wird er lokal beendet.
    pub fn handle_missed_events(&mut self, skipped: u64) {
        match self.call.take() {
            Some(mut call) => {
                tracing::warn!("Missed {} SDK events, ending call {}", skipped, call.id());
                call.end();
            }
            None => tracing::warn!("Missed {} SDK events", skipped),
        }
    }

    /// Eingehender Anruf. Ist bereits ein Anruf aktiv, wird der neue mit
    /// "busy" abgelehnt.
    pub fn handle_ringing(&mut self, handle: S::Call) {
        if let Some(current) = &self.call {
            tracing::warn!(
                "Busy with call {}, declining call {} from {}",
                current.id(),
                handle.id(),
                handle.remote_user_id()
            );
            handle.end();
            return;
        }

        tracing::info!(
            "Receiving {} call {} from {}",
            handle.media_kind().label(),
            handle.id(),
            handle.remote_user_id()
        );
        self.call = Some(CallController::inbound(handle));
    }

    /// Wendet ein SDK-Event auf den aktuellen Anruf an.
    ///
    /// Events für andere Call-IDs sind veraltet und werden ignoriert.
    pub fn handle_sdk_event(&mut self, event: SdkEvent) {
        let (call_id, lifecycle_event) = match event {
            SdkEvent::Call { call_id, event } => (call_id, LifecycleEvent::from(event)),
            SdkEvent::DialFailed { call_id, reason } => {
                tracing::warn!("Dial of call {} failed: {}", call_id, reason);
                (call_id, LifecycleEvent::Failed)
            }
        };

        let Some(call) = self.call.as_mut() else {
            tracing::debug!("Ignoring {:?} for {}: no active call", lifecycle_event, call_id);
            return;
        };
        if call.id() != &call_id {
            tracing::debug!("Ignoring {:?} for stale call {}", lifecycle_event, call_id);
            return;
        }

        if call.apply(lifecycle_event).is_terminal() {
            self.call = None;
        }
    }

    fn with_call(
        &mut self,
        action: impl FnOnce(&mut CallController<S::Call>) -> Result<CallLifecycleState, CallError>,
    ) -> Result<CallLifecycleState, SessionError> {
        let call = self.call.as_mut().ok_or(SessionError::NoActiveCall)?;
        let result = action(call);

        if call.state().is_terminal() {
            self.call = None;
        }

        Ok(result?.normalize())
    }

    fn drop_call(&mut self) {
        if let Some(mut call) = self.call.take() {
            call.end();
        }
    }
}

impl<S: CallingSdk> std::fmt::Debug for SessionManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &self.session)
            .field("listener", &self.listener_key())
            .field("call_state", &self.call_state())
            .finish()
    }
}
