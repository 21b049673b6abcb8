//! View Module - UI als reine Funktion des Zustands
//!
//! `render` bildet (Session, Call-Zustand, Schalter) auf eine `Screen`-
//! Beschreibung ab. Es ist immer genau ein Panel sichtbar, dadurch
//! schließen sich Ringing-, Connected-, Calling- und Dialer-Controls aus.

use crate::call::{CallLifecycleState, MediaToggles};
use crate::sdk::{CallingSdk, MediaKind};
use crate::session::{AuthStatus, Session, SessionManager};
use serde::Serialize;
use std::fmt;

/// Breite der Remote-Ansicht während eines Videoanrufs (Prozent)
pub const REMOTE_VIDEO_WIDTH: u8 = 100;
/// Breite der lokalen Vorschau während eines Videoanrufs (Prozent)
pub const LOCAL_VIDEO_WIDTH: u8 = 30;

// ============================================================================
// VIEW STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallView {
    pub state: CallLifecycleState,
    pub media_kind: MediaKind,
    pub toggles: MediaToggles,
}

/// Eingabe der Render-Funktion
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ViewState {
    pub session: Session,
    pub call: Option<CallView>,
}

impl ViewState {
    pub fn from_manager<S: CallingSdk>(manager: &SessionManager<S>) -> Self {
        Self {
            session: manager.session().clone(),
            call: manager.call().map(|call| CallView {
                state: call.state(),
                media_kind: call.media_kind(),
                toggles: call.toggles(),
            }),
        }
    }

    /// Zustand während eines laufenden Logins
    pub fn authenticating(identity: &str) -> Self {
        Self {
            session: Session {
                identity: Some(identity.trim().to_string()),
                auth: AuthStatus::Authenticating,
                ..Session::default()
            },
            call: None,
        }
    }
}

// ============================================================================
// SCREEN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Accept,
    Reject,
    ToggleMicrophone,
    ToggleVideo,
    EndCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub kind: ActionKind,
    pub label: String,
}

impl Action {
    fn new(kind: ActionKind, label: &str) -> Self {
        Self {
            kind,
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum Panel {
    /// Login-Formular mit Überschrift
    Login { headline: String },
    /// Login läuft
    Loading,
    /// Wahlformular: Ziel + Audio/Video
    Dialer,
    Ringing { title: String, actions: Vec<Action> },
    Connected { title: String, actions: Vec<Action> },
    Calling { label: String },
    Reconnecting { label: String },
}

impl Panel {
    pub fn actions(&self) -> &[Action] {
        match self {
            Panel::Ringing { actions, .. } | Panel::Connected { actions, .. } => actions.as_slice(),
            _ => &[],
        }
    }
}

/// Größe der beiden Media-Flächen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MediaLayout {
    pub remote_width_percent: u8,
    pub local_width_percent: u8,
}

impl MediaLayout {
    pub fn is_visible(&self) -> bool {
        self.remote_width_percent > 0 || self.local_width_percent > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screen {
    pub header: Option<String>,
    pub panel: Panel,
    pub media: MediaLayout,
}

// ============================================================================
// RENDER
// ============================================================================

pub fn render(view: &ViewState) -> Screen {
    let session = &view.session;

    let Some(identity) = session.identity.as_deref() else {
        return Screen {
            header: None,
            panel: Panel::Login {
                headline: "Not Authenticated".to_string(),
            },
            media: MediaLayout::default(),
        };
    };

    if !session.is_ready() {
        let panel = match session.auth {
            AuthStatus::Authenticating | AuthStatus::Authenticated => Panel::Loading,
            AuthStatus::Unauthenticated | AuthStatus::Failed => Panel::Login {
                headline: format!("Unable to authenticate as {}", identity),
            },
        };
        return Screen {
            header: None,
            panel,
            media: MediaLayout::default(),
        };
    }

    let panel = match view.call {
        None => Panel::Dialer,
        Some(call) => call_panel(&call),
    };

    let media = match view.call {
        Some(call) if call.media_kind.is_video() => MediaLayout {
            remote_width_percent: REMOTE_VIDEO_WIDTH,
            local_width_percent: LOCAL_VIDEO_WIDTH,
        },
        _ => MediaLayout::default(),
    };

    Screen {
        header: Some(format!("Authenticated as {}", identity)),
        panel,
        media,
    }
}

fn call_panel(call: &CallView) -> Panel {
    let kind = call.media_kind.label();

    match call.state.normalize() {
        CallLifecycleState::Idle | CallLifecycleState::Ended => Panel::Dialer,
        CallLifecycleState::RingingInbound => Panel::Ringing {
            title: format!("{} Call is Ringing", kind),
            actions: vec![
                Action::new(ActionKind::Reject, "Reject"),
                Action::new(ActionKind::Accept, "Accept"),
            ],
        },
        CallLifecycleState::ConnectingOutbound => Panel::Calling {
            label: "Calling...".to_string(),
        },
        CallLifecycleState::Reconnecting => Panel::Reconnecting {
            label: "Reconnecting...".to_string(),
        },
        CallLifecycleState::Connected => {
            let mut actions = vec![Action::new(
                ActionKind::ToggleMicrophone,
                if call.toggles.microphone_muted {
                    "Unmute Audio"
                } else {
                    "Mute Audio"
                },
            )];
            if call.media_kind.is_video() {
                actions.push(Action::new(
                    ActionKind::ToggleVideo,
                    if call.toggles.video_disabled {
                        "Enable Video"
                    } else {
                        "Disable Video"
                    },
                ));
            }
            actions.push(Action::new(ActionKind::EndCall, "End Call"));

            Panel::Connected {
                title: format!("{} Call is Connected", kind),
                actions,
            }
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(header) = &self.header {
            writeln!(f, "== {} ==", header)?;
        }

        match &self.panel {
            Panel::Login { headline } => writeln!(f, "{}\n[login <user id>]", headline)?,
            Panel::Loading => writeln!(f, "...")?,
            Panel::Dialer => writeln!(f, "[dial <user id> audio|video]")?,
            Panel::Ringing { title, .. } | Panel::Connected { title, .. } => {
                writeln!(f, "{}", title)?
            }
            Panel::Calling { label } | Panel::Reconnecting { label } => writeln!(f, "{}", label)?,
        }

        let actions = self.panel.actions();
        if !actions.is_empty() {
            let labels: Vec<_> = actions.iter().map(|a| format!("[{}]", a.label)).collect();
            writeln!(f, "{}", labels.join(" "))?;
        }

        if self.media.is_visible() {
            writeln!(
                f,
                "video: remote {}% / local {}%",
                self.media.remote_width_percent, self.media.local_width_percent
            )?;
        }

        Ok(())
    }
}
