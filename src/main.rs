//! Terminal-Demo gegen das Loopback-Backend
//!
//! Liest Befehle von stdin und gibt nach jeder Änderung den Screen aus.

use anyhow::{bail, Context, Result};
use call_lifecycle::app::{AppEvent, CallApp, Command};
use call_lifecycle::config::AppConfig;
use call_lifecycle::sdk::loopback::{LoopbackConfig, LoopbackSdk, RemotePolicy};
use call_lifecycle::sdk::{CallEvent, CallHandle, MediaKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

const HELP: &str = "\
commands:
  login <user id>              authenticate and connect
  dial <user id> [audio|video] place a call (bob answers, carol rejects)
  accept | reject | end        call controls
  mute | video                 toggle microphone / camera
  logout | json | help | quit
simulate:
  sim ring <user id> [audio|video]
  sim reconnecting | sim reconnected | sim hangup
  sim offline | sim online";

/// Eingabe-Zeile: entweder App-Befehl oder lokale Steuerung
enum Input {
    App(Command),
    Simulate(Vec<String>),
    ToggleJson,
    Help,
    Quit,
}

fn parse_media_kind(word: Option<&str>) -> Result<MediaKind> {
    match word {
        None | Some("audio") => Ok(MediaKind::Audio),
        Some("video") => Ok(MediaKind::Video),
        Some(other) => bail!("unknown call kind '{}'", other),
    }
}

fn parse_input(line: &str) -> Result<Option<Input>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let input = match head {
        "login" => Input::App(Command::Login {
            identity: words.next().context("usage: login <user id>")?.to_string(),
        }),
        "dial" => Input::App(Command::Dial {
            target: words.next().context("usage: dial <user id> [audio|video]")?.to_string(),
            media_kind: parse_media_kind(words.next())?,
        }),
        "accept" => Input::App(Command::Accept),
        "reject" => Input::App(Command::Reject),
        "end" => Input::App(Command::EndCall),
        "mute" => Input::App(Command::ToggleMicrophone),
        "video" => Input::App(Command::ToggleVideo),
        "logout" => Input::App(Command::Logout),
        "sim" => Input::Simulate(words.map(str::to_string).collect()),
        "json" => Input::ToggleJson,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => bail!("unknown command '{}', try 'help'", other),
    };

    Ok(Some(input))
}

fn simulate(sdk: &LoopbackSdk, args: &[String]) -> Result<()> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["ring", from, rest @ ..] => {
            let kind = parse_media_kind(rest.first().copied())?;
            if sdk.simulate_incoming(*from, kind).is_none() {
                bail!("not connected");
            }
        }
        ["reconnecting"] | ["reconnected"] | ["hangup"] => {
            let call = sdk.latest_call().context("no call to simulate on")?;
            let event = match args[0] {
                "reconnecting" => CallEvent::Reconnecting,
                "reconnected" => CallEvent::Reconnected,
                _ => CallEvent::Ended,
            };
            sdk.emit(call.id(), event);
        }
        ["offline"] => sdk.set_online(false),
        ["online"] => sdk.set_online(true),
        _ => bail!("unknown simulation, try 'help'"),
    }

    Ok(())
}

/// Loopback-Backend mit denselben Zugangsdaten wie die App-Konfiguration
fn loopback_sdk(config: &AppConfig) -> Arc<LoopbackSdk> {
    let sdk = Arc::new(LoopbackSdk::new(LoopbackConfig {
        app_id: config.app_id.clone(),
        access_token: config.access_token.clone(),
        online: true,
    }));
    sdk.set_user_policy("bob", RemotePolicy::Answer);
    sdk.set_user_policy("carol", RemotePolicy::Reject);
    sdk.set_user_policy("dave", RemotePolicy::NoAnswer);
    sdk
}

async fn print_events(mut events: broadcast::Receiver<AppEvent>, json: Arc<AtomicBool>) {
    loop {
        match events.recv().await {
            Ok(AppEvent::ScreenChanged(screen)) => {
                if json.load(Ordering::Relaxed) {
                    match serde_json::to_string(&screen) {
                        Ok(line) => println!("{}", line),
                        Err(e) => tracing::error!("Failed to serialize screen: {}", e),
                    }
                } else {
                    println!("{}", screen);
                }
            }
            Ok(AppEvent::CommandFailed { error, .. }) => println!("! {}", error),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    call_lifecycle::init_logging();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::info!("{}, using loopback configuration", e);
        AppConfig::loopback()
    });

    let sdk = loopback_sdk(&config);

    let app = CallApp::new(Arc::clone(&sdk), config);
    let json = Arc::new(AtomicBool::new(false));
    let printer = tokio::spawn(print_events(app.subscribe(), Arc::clone(&json)));

    let (command_tx, command_rx) = mpsc::channel(16);
    let app_task = tokio::spawn(app.run(command_rx));

    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match parse_input(&line) {
            Ok(None) => {}
            Ok(Some(Input::App(command))) => {
                if command_tx.send(command).await.is_err() {
                    break;
                }
            }
            Ok(Some(Input::Simulate(args))) => {
                if let Err(e) = simulate(&sdk, &args) {
                    println!("! {}", e);
                }
            }
            Ok(Some(Input::ToggleJson)) => {
                let enabled = !json.load(Ordering::Relaxed);
                json.store(enabled, Ordering::Relaxed);
                println!("json output {}", if enabled { "on" } else { "off" });
            }
            Ok(Some(Input::Help)) => println!("{}", HELP),
            Ok(Some(Input::Quit)) => break,
            Err(e) => println!("! {}", e),
        }
    }

    drop(command_tx);
    app_task.await.context("app task panicked")?;

    // Mit der App ist auch der Sender weg: der Printer leert den Puffer und endet
    if tokio::time::timeout(Duration::from_secs(1), printer)
        .await
        .is_err()
    {
        tracing::warn!("Screen printer did not finish in time");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_lifecycle::session::SessionManager;

    #[test]
    fn parses_dial_with_kind() {
        match parse_input("dial bob video").unwrap() {
            Some(Input::App(Command::Dial { target, media_kind })) => {
                assert_eq!(target, "bob");
                assert_eq!(media_kind, MediaKind::Video);
            }
            _ => panic!("expected dial"),
        }
    }

    #[test]
    fn dial_defaults_to_audio() {
        assert!(matches!(
            parse_input("dial bob").unwrap(),
            Some(Input::App(Command::Dial {
                media_kind: MediaKind::Audio,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn loopback_accepts_configured_credentials() {
        let config = AppConfig::new("custom-app", "custom-token");
        let sdk = loopback_sdk(&config);
        let mut manager = SessionManager::new(Arc::clone(&sdk), config);

        manager.login("alice").await.unwrap();
        assert!(manager.session().is_ready());
        assert_eq!(sdk.listener_count(), 1);
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse_input("frobnicate").is_err());
        assert!(parse_input("dial bob hologram").is_err());
        assert!(parse_input("login").is_err());
        assert!(parse_input("   ").unwrap().is_none());
    }
}
