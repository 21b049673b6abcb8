//! Call Lifecycle State Machine
//!
//! Reine Übergangsfunktion `(state, event) -> state`. Die Maschine ist
//! level-triggered: der neue Zustand hängt nur vom zuletzt gelieferten
//! Lifecycle-Event ab, nicht von der Reihenfolge davor. So bleiben doppelt
//! oder vertauscht zugestellte SDK-Events unschädlich.

use crate::sdk::CallEvent;
use serde::Serialize;
use std::fmt;

// ============================================================================
// CALL STATE
// ============================================================================

/// UI-sichtbarer Status eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallLifecycleState {
    /// Kein Call-Handle
    #[default]
    Idle,
    /// Eingehender Anruf wartet auf accept/reject
    RingingInbound,
    /// Anruf wird aufgebaut (gewählt oder angenommen)
    ConnectingOutbound,
    /// Anruf aktiv
    Connected,
    /// Verbindung gestört, SDK versucht Recovery
    Reconnecting,
    /// Anruf beendet, wird sofort zu `Idle`
    Ended,
}

impl CallLifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallLifecycleState::Idle => "idle",
            CallLifecycleState::RingingInbound => "ringing-inbound",
            CallLifecycleState::ConnectingOutbound => "connecting-outbound",
            CallLifecycleState::Connected => "connected",
            CallLifecycleState::Reconnecting => "reconnecting",
            CallLifecycleState::Ended => "ended",
        }
    }

    /// `Ended` ist nur ein Durchgangszustand
    pub fn normalize(self) -> Self {
        match self {
            CallLifecycleState::Ended => CallLifecycleState::Idle,
            other => other,
        }
    }

    /// Zustand, in dem das Call-Handle verworfen wird
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallLifecycleState::Idle | CallLifecycleState::Ended)
    }
}

impl fmt::Display for CallLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LIFECYCLE EVENTS
// ============================================================================

/// Eingaben der State Machine: SDK-Events plus lokale Ereignisse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Eingehender Anruf klingelt
    Ringing,
    /// Ausgehender Anruf gestartet
    Dialed,
    /// Eingehender Anruf lokal angenommen
    Accepted,
    Established,
    Connected,
    Reconnecting,
    Reconnected,
    Ended,
    /// Fehler beim dial/accept
    Failed,
    RemoteAudioSettingsChanged,
    RemoteVideoSettingsChanged,
}

impl From<CallEvent> for LifecycleEvent {
    fn from(event: CallEvent) -> Self {
        match event {
            CallEvent::Established => LifecycleEvent::Established,
            CallEvent::Connected => LifecycleEvent::Connected,
            CallEvent::Reconnecting => LifecycleEvent::Reconnecting,
            CallEvent::Reconnected => LifecycleEvent::Reconnected,
            CallEvent::Ended => LifecycleEvent::Ended,
            CallEvent::RemoteAudioSettingsChanged => LifecycleEvent::RemoteAudioSettingsChanged,
            CallEvent::RemoteVideoSettingsChanged => LifecycleEvent::RemoteVideoSettingsChanged,
        }
    }
}

impl LifecycleEvent {
    /// Zielzustand des Events, `None` für reine Info-Events
    pub fn target(self) -> Option<CallLifecycleState> {
        match self {
            LifecycleEvent::Ringing => Some(CallLifecycleState::RingingInbound),
            LifecycleEvent::Dialed | LifecycleEvent::Accepted | LifecycleEvent::Established => {
                Some(CallLifecycleState::ConnectingOutbound)
            }
            LifecycleEvent::Connected | LifecycleEvent::Reconnected => {
                Some(CallLifecycleState::Connected)
            }
            LifecycleEvent::Reconnecting => Some(CallLifecycleState::Reconnecting),
            LifecycleEvent::Ended | LifecycleEvent::Failed => Some(CallLifecycleState::Ended),
            LifecycleEvent::RemoteAudioSettingsChanged
            | LifecycleEvent::RemoteVideoSettingsChanged => None,
        }
    }
}

/// Übergangsfunktion der Call-State-Machine
pub fn transition(state: CallLifecycleState, event: LifecycleEvent) -> CallLifecycleState {
    event.target().unwrap_or(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_EVENTS: [LifecycleEvent; 11] = [
        LifecycleEvent::Ringing,
        LifecycleEvent::Dialed,
        LifecycleEvent::Accepted,
        LifecycleEvent::Established,
        LifecycleEvent::Connected,
        LifecycleEvent::Reconnecting,
        LifecycleEvent::Reconnected,
        LifecycleEvent::Ended,
        LifecycleEvent::Failed,
        LifecycleEvent::RemoteAudioSettingsChanged,
        LifecycleEvent::RemoteVideoSettingsChanged,
    ];

    fn any_event() -> impl Strategy<Value = LifecycleEvent> {
        prop::sample::select(ALL_EVENTS.to_vec())
    }

    #[test]
    fn outbound_happy_path() {
        let mut state = transition(CallLifecycleState::Idle, LifecycleEvent::Dialed);
        assert_eq!(state, CallLifecycleState::ConnectingOutbound);

        state = transition(state, LifecycleEvent::Established);
        assert_eq!(state, CallLifecycleState::ConnectingOutbound);

        state = transition(state, LifecycleEvent::Connected);
        assert_eq!(state, CallLifecycleState::Connected);
    }

    #[test]
    fn reconnect_cycle() {
        let state = transition(CallLifecycleState::Connected, LifecycleEvent::Reconnecting);
        assert_eq!(state, CallLifecycleState::Reconnecting);
        assert_eq!(
            transition(state, LifecycleEvent::Reconnected),
            CallLifecycleState::Connected
        );
        assert_eq!(
            transition(state, LifecycleEvent::Ended).normalize(),
            CallLifecycleState::Idle
        );
    }

    #[test]
    fn remote_settings_changes_keep_state() {
        for state in [
            CallLifecycleState::RingingInbound,
            CallLifecycleState::Connected,
            CallLifecycleState::Reconnecting,
        ] {
            assert_eq!(
                transition(state, LifecycleEvent::RemoteAudioSettingsChanged),
                state
            );
            assert_eq!(
                transition(state, LifecycleEvent::RemoteVideoSettingsChanged),
                state
            );
        }
    }

    #[test]
    fn connected_before_established_is_tolerated() {
        let state = transition(CallLifecycleState::ConnectingOutbound, LifecycleEvent::Connected);
        // Verspätetes Established fällt auf Connecting zurück, das nächste
        // Connected stellt den Zustand wieder her
        let state = transition(state, LifecycleEvent::Established);
        assert_eq!(state, CallLifecycleState::ConnectingOutbound);
        assert_eq!(
            transition(state, LifecycleEvent::Connected),
            CallLifecycleState::Connected
        );
    }

    #[test]
    fn state_names() {
        assert_eq!(CallLifecycleState::RingingInbound.to_string(), "ringing-inbound");
        assert_eq!(
            serde_json::to_string(&CallLifecycleState::ConnectingOutbound).unwrap(),
            "\"connecting-outbound\""
        );
    }

    proptest! {
        #[test]
        fn state_follows_latest_lifecycle_event(
            events in prop::collection::vec(any_event(), 1..40)
        ) {
            let folded = events
                .iter()
                .fold(CallLifecycleState::Idle, |state, event| transition(state, *event));

            let expected = events
                .iter()
                .rev()
                .find_map(|event| event.target())
                .unwrap_or(CallLifecycleState::Idle);

            prop_assert_eq!(folded, expected);
        }

        #[test]
        fn repeated_delivery_is_idempotent(
            events in prop::collection::vec(any_event(), 1..20),
            repeat in any_event()
        ) {
            let state = events
                .iter()
                .fold(CallLifecycleState::Idle, |state, event| transition(state, *event));
            let once = transition(state, repeat);
            prop_assert_eq!(transition(once, repeat), once);
        }
    }
}
