//! App - sequenzieller Dispatcher
//!
//! Nimmt Benutzerbefehle und SDK-Benachrichtigungen entgegen und wendet
//! sie nacheinander auf den Session Manager an. Nach jeder Änderung wird
//! der neu gerenderte Screen an alle Subscriber gesendet.

use crate::config::AppConfig;
use crate::sdk::{CallingSdk, MediaKind};
use crate::session::{Notification, SessionError, SessionManager};
use crate::view::{render, Screen, ViewState};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// COMMANDS & EVENTS
// ============================================================================

/// Benutzeraktionen aus der UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { identity: String },
    Dial { target: String, media_kind: MediaKind },
    Accept,
    Reject,
    EndCall,
    ToggleMicrophone,
    ToggleVideo,
    Logout,
}

/// Events die von der App ausgelöst werden
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Neuer Screen-Zustand
    ScreenChanged(Screen),
    /// Ein Befehl ist fehlgeschlagen, der Zustand wurde zurückgesetzt
    CommandFailed { command: Command, error: SessionError },
}

// ============================================================================
// CALL APP
// ============================================================================

pub struct CallApp<S: CallingSdk> {
    manager: SessionManager<S>,
    event_tx: broadcast::Sender<AppEvent>,
    last_screen: Option<Screen>,
}

impl<S: CallingSdk> CallApp<S> {
    pub fn new(sdk: Arc<S>, config: AppConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            manager: SessionManager::new(sdk, config),
            event_tx,
            last_screen: None,
        }
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    pub fn manager(&self) -> &SessionManager<S> {
        &self.manager
    }

    /// Aktueller Screen
    pub fn screen(&self) -> Screen {
        render(&ViewState::from_manager(&self.manager))
    }

    /// Führt einen Benutzerbefehl aus.
    ///
    /// Fehler werden geloggt und als `AppEvent::CommandFailed` gemeldet; der
    /// Zustand ist danach bereits auf den Fallback zurückgesetzt.
    pub async fn handle_command(&mut self, command: Command) -> Result<(), SessionError> {
        tracing::debug!("Command: {:?}", command);

        let result = match &command {
            Command::Login { identity } => {
                self.publish_screen(render(&ViewState::authenticating(identity)));
                self.manager.login(identity).await
            }
            Command::Dial { target, media_kind } => {
                self.manager.dial(target, *media_kind).map(|_| ())
            }
            Command::Accept => self.manager.accept().map(|_| ()),
            Command::Reject => self.manager.reject().map(|_| ()),
            Command::EndCall => {
                self.manager.end_call();
                Ok(())
            }
            Command::ToggleMicrophone => self.manager.toggle_microphone().map(|_| ()),
            Command::ToggleVideo => self.manager.toggle_video().map(|_| ()),
            Command::Logout => {
                self.manager.logout();
                Ok(())
            }
        };

        if let Err(e) = &result {
            tracing::warn!("Command {:?} failed: {}", command, e);
            let _ = self.event_tx.send(AppEvent::CommandFailed {
                command,
                error: e.clone(),
            });
        }

        self.publish();
        result
    }

    /// Verarbeitet eine SDK-Benachrichtigung
    pub fn handle_notification(&mut self, notification: Notification<S::Call>) {
        self.manager.handle_notification(notification);
        self.publish();
    }

    /// Event-Loop: läuft bis der Befehlskanal geschlossen wird
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        let _ = self.handle_command(command).await;
                    }
                    None => {
                        tracing::info!("Command channel closed, shutting down");
                        break;
                    }
                },
                notification = self.manager.next_notification() => match notification {
                    Some(notification) => self.handle_notification(notification),
                    None => {
                        tracing::error!("SDK event stream closed");
                        break;
                    }
                },
            }
        }

        self.manager.logout();
        self.publish();
    }

    /// Rendert den aktuellen Zustand und sendet ihn, falls er sich geändert hat
    fn publish(&mut self) {
        let screen = self.screen();
        self.publish_screen(screen);
    }

    fn publish_screen(&mut self, screen: Screen) {
        if self.last_screen.as_ref() == Some(&screen) {
            return;
        }
        self.last_screen = Some(screen.clone());
        let _ = self.event_tx.send(AppEvent::ScreenChanged(screen));
    }
}

impl<S: CallingSdk> std::fmt::Debug for CallApp<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallApp")
            .field("manager", &self.manager)
            .finish()
    }
}
