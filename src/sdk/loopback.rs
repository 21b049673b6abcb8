//! Loopback Backend
//!
//! Simuliert ein Calling-Backend im selben Prozess:
//! - Prüft App-ID und Access Token
//! - Verwaltet Listener für eingehende Anrufe
//! - Beantwortet ausgehende Anrufe nach `RemotePolicy`
//! - Erlaubt das Einspielen beliebiger Call-Events (für Szenarien)

use super::*;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Verhalten eines simulierten Gesprächspartners bei eingehenden Anrufen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemotePolicy {
    /// Nimmt an: Established + Connected
    Answer,
    /// Lehnt ab: Ended
    Reject,
    /// Klingelt ohne Antwort
    NoAnswer,
}

#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    pub app_id: String,
    pub access_token: String,
    /// `false` lässt `connect()` fehlschlagen
    pub online: bool,
}

// ============================================================================
// BACKEND STATE
// ============================================================================

#[derive(Default)]
struct BackendState {
    authenticated_user: Option<String>,
    connected: bool,
    listeners: HashMap<String, mpsc::UnboundedSender<LoopbackCall>>,
    users: HashMap<String, RemotePolicy>,
    latest_call: Option<LoopbackCall>,
}

/// In-Process Calling-Backend
#[derive(Clone)]
pub struct LoopbackSdk {
    config: Arc<RwLock<LoopbackConfig>>,
    state: Arc<RwLock<BackendState>>,
    event_tx: broadcast::Sender<SdkEvent>,
}

impl LoopbackSdk {
    pub fn new(config: LoopbackConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            config: Arc::new(RwLock::new(config)),
            state: Arc::new(RwLock::new(BackendState::default())),
            event_tx,
        }
    }

    /// Legt fest, wie ein bekannter Benutzer auf Anrufe reagiert
    pub fn set_user_policy(&self, user_id: impl Into<String>, policy: RemotePolicy) {
        self.state.write().users.insert(user_id.into(), policy);
    }

    /// Schaltet das simulierte Netzwerk an/aus
    pub fn set_online(&self, online: bool) {
        self.config.write().online = online;
    }

    pub fn listener_count(&self) -> usize {
        self.state.read().listeners.len()
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().connected
    }

    /// Zuletzt erzeugter Anruf (ein- oder ausgehend)
    pub fn latest_call(&self) -> Option<LoopbackCall> {
        self.state.read().latest_call.clone()
    }

    /// Simuliert einen eingehenden Anruf.
    ///
    /// Wird an alle registrierten Listener zugestellt. Gibt `None` zurück,
    /// wenn der Signaling-Kanal nicht offen ist.
    pub fn simulate_incoming(
        &self,
        from_user_id: impl Into<String>,
        media_kind: MediaKind,
    ) -> Option<LoopbackCall> {
        let mut state = self.state.write();
        if !state.connected {
            tracing::warn!("Loopback: dropping incoming call, channel not open");
            return None;
        }

        let call = LoopbackCall::new(
            CallDirection::Inbound,
            media_kind,
            from_user_id.into(),
            self.event_tx.clone(),
        );

        tracing::info!(
            "Loopback: ringing {} call {} from {}",
            media_kind.label(),
            call.id(),
            call.remote_user_id()
        );

        state
            .listeners
            .retain(|_, listener| listener.send(call.clone()).is_ok());
        state.latest_call = Some(call.clone());

        Some(call)
    }

    /// Spielt ein beliebiges Call-Event ein
    pub fn emit(&self, call_id: &CallId, event: CallEvent) {
        let _ = self.event_tx.send(SdkEvent::Call {
            call_id: call_id.clone(),
            event,
        });
    }
}

impl std::fmt::Debug for LoopbackSdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("LoopbackSdk")
            .field("app_id", &self.config.read().app_id)
            .field("authenticated_user", &state.authenticated_user)
            .field("connected", &state.connected)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

#[async_trait]
impl CallingSdk for LoopbackSdk {
    type Call = LoopbackCall;

    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthenticatedUser, SdkError> {
        {
            let config = self.config.read();
            if credentials.app_id != config.app_id {
                return Err(SdkError::Authentication(format!(
                    "unknown application {}",
                    credentials.app_id
                )));
            }
            if credentials.access_token != config.access_token {
                return Err(SdkError::Authentication("invalid access token".to_string()));
            }
        }

        if credentials.user_id.trim().is_empty() {
            return Err(SdkError::Authentication("empty user id".to_string()));
        }

        let mut state = self.state.write();
        state.authenticated_user = Some(credentials.user_id.clone());
        state.connected = false;

        Ok(AuthenticatedUser {
            user_id: credentials.user_id.clone(),
        })
    }

    async fn connect(&self) -> Result<(), SdkError> {
        let online = self.config.read().online;
        let mut state = self.state.write();

        if state.authenticated_user.is_none() {
            return Err(SdkError::Connection("not authenticated".to_string()));
        }
        if !online {
            return Err(SdkError::Connection("backend unreachable".to_string()));
        }

        state.connected = true;
        Ok(())
    }

    fn add_listener(&self, key: &str, listener: mpsc::UnboundedSender<LoopbackCall>) {
        if self
            .state
            .write()
            .listeners
            .insert(key.to_string(), listener)
            .is_some()
        {
            tracing::debug!("Loopback: replaced listener {}", key);
        }
    }

    fn remove_listener(&self, key: &str) -> bool {
        self.state.write().listeners.remove(key).is_some()
    }

    fn dial(&self, params: DialParams) -> Result<LoopbackCall, SdkError> {
        let mut state = self.state.write();
        if !state.connected {
            return Err(SdkError::Dial("signaling channel not open".to_string()));
        }
        if state.authenticated_user.as_deref() == Some(params.user_id.as_str()) {
            return Err(SdkError::Dial("cannot call yourself".to_string()));
        }

        let call = LoopbackCall::new(
            CallDirection::Outbound,
            params.media_kind,
            params.user_id.clone(),
            self.event_tx.clone(),
        );
        {
            let mut local = call.inner.local.lock();
            local.audio_enabled = params.option.audio_enabled;
            local.video_enabled = params.option.video_enabled && params.media_kind.is_video();
        }
        state.latest_call = Some(call.clone());

        // Events landen im Broadcast-Puffer und werden erst nach Rückgabe
        // des Handles verarbeitet
        match state.users.get(&params.user_id).copied() {
            None => {
                let _ = self.event_tx.send(SdkEvent::DialFailed {
                    call_id: call.id().clone(),
                    reason: format!("user {} not found", params.user_id),
                });
            }
            Some(RemotePolicy::Answer) => {
                self.emit(call.id(), CallEvent::Established);
                self.emit(call.id(), CallEvent::Connected);
            }
            Some(RemotePolicy::Reject) => {
                call.mark_ended();
                self.emit(call.id(), CallEvent::Ended);
            }
            Some(RemotePolicy::NoAnswer) => {}
        }

        Ok(call)
    }

    fn events(&self) -> broadcast::Receiver<SdkEvent> {
        self.event_tx.subscribe()
    }
}

// ============================================================================
// CALL HANDLE
// ============================================================================

#[derive(Debug)]
struct LocalMedia {
    audio_enabled: bool,
    video_enabled: bool,
    ended: bool,
}

#[derive(Debug)]
struct CallInner {
    id: CallId,
    direction: CallDirection,
    media_kind: MediaKind,
    remote_user_id: String,
    local: Mutex<LocalMedia>,
    event_tx: broadcast::Sender<SdkEvent>,
}

/// Handle eines Loopback-Anrufs
#[derive(Debug, Clone)]
pub struct LoopbackCall {
    inner: Arc<CallInner>,
}

impl LoopbackCall {
    fn new(
        direction: CallDirection,
        media_kind: MediaKind,
        remote_user_id: String,
        event_tx: broadcast::Sender<SdkEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(CallInner {
                id: CallId::new(Uuid::new_v4().to_string()),
                direction,
                media_kind,
                remote_user_id,
                local: Mutex::new(LocalMedia {
                    audio_enabled: true,
                    video_enabled: media_kind.is_video(),
                    ended: false,
                }),
                event_tx,
            }),
        }
    }

    pub fn is_local_audio_enabled(&self) -> bool {
        self.inner.local.lock().audio_enabled
    }

    pub fn is_local_video_enabled(&self) -> bool {
        self.inner.local.lock().video_enabled
    }

    pub fn is_ended(&self) -> bool {
        self.inner.local.lock().ended
    }

    fn mark_ended(&self) -> bool {
        let mut local = self.inner.local.lock();
        let was_ended = local.ended;
        local.ended = true;
        !was_ended
    }

    fn send(&self, event: CallEvent) {
        let _ = self.inner.event_tx.send(SdkEvent::Call {
            call_id: self.inner.id.clone(),
            event,
        });
    }
}

impl CallHandle for LoopbackCall {
    fn id(&self) -> &CallId {
        &self.inner.id
    }

    fn direction(&self) -> CallDirection {
        self.inner.direction
    }

    fn media_kind(&self) -> MediaKind {
        self.inner.media_kind
    }

    fn remote_user_id(&self) -> &str {
        &self.inner.remote_user_id
    }

    fn accept(&self, option: &CallOption) -> Result<(), SdkError> {
        {
            let mut local = self.inner.local.lock();
            if local.ended {
                return Err(SdkError::Closed);
            }
            if self.inner.direction != CallDirection::Inbound {
                return Err(SdkError::Rejected(
                    "only inbound calls can be accepted".to_string(),
                ));
            }
            local.audio_enabled = option.audio_enabled;
            local.video_enabled = option.video_enabled && self.inner.media_kind.is_video();
        }

        self.send(CallEvent::Established);
        self.send(CallEvent::Connected);
        Ok(())
    }

    fn end(&self) {
        if self.mark_ended() {
            self.send(CallEvent::Ended);
        }
    }

    fn mute_microphone(&self) {
        self.inner.local.lock().audio_enabled = false;
    }

    fn unmute_microphone(&self) {
        self.inner.local.lock().audio_enabled = true;
    }

    fn start_video(&self) {
        self.inner.local.lock().video_enabled = true;
    }

    fn stop_video(&self) {
        self.inner.local.lock().video_enabled = false;
    }
}
