use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use trigger_commands::config::{CommandKind, Config};
use trigger_commands::elements::Trigger;
use trigger_commands::host::LoopbackHost;
use trigger_commands::speech::RecognitionEvent;
use trigger_commands::{error_sink, telemetry, CommandError, CommandRouter};

// Actions hold `Rc` handles, so everything stays on one thread
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load()?;
    println!("✓ Config loaded from ~/.trigger-commands.toml");

    telemetry::init(config.telemetry.enabled, &config.telemetry.log_path)?;
    info!("trigger-commands starting");

    let host = LoopbackHost::default();
    for element in &config.elements {
        host.elements.insert(&element.id, &element.text);
    }

    let mut router = CommandRouter::new(host.host(), config.router_options());
    let phrases = apply_commands(&mut router, &config)?;
    println!("✓ {} commands bound", config.commands.len());

    if phrases > 0 {
        router.set_voice_error_sink(error_sink(|| {
            warn!("speech did not match any command");
            println!("  (not recognized)");
        }))?;
        router.start_listening()?;
        println!("✓ Listening for {phrases} phrases");
    }

    println!("\nCommands: key <name> | say <phrase> | silence | quit");
    println!("Press Ctrl+C to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if handle_line(&host, line.trim()) => {}
                    _ => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                println!("\nShutting down...");
                break;
            }
        }
    }

    router.dispose();
    Ok(())
}

/// Binds configured commands; returns how many phrase commands were bound
fn apply_commands(router: &mut CommandRouter, config: &Config) -> Result<usize> {
    let mut phrases = 0;
    for entry in &config.commands {
        let command = entry.to_command()?;
        let result = match entry.action {
            CommandKind::Click => router.set_click_on_element_command(&command),
            CommandKind::Read => router.set_read_on_element_command(&command),
        };

        match result {
            Ok(()) => {
                if matches!(command.trigger, Trigger::Phrase(_)) {
                    phrases += 1;
                }
            }
            Err(e @ CommandError::CapabilityUnavailable { .. }) => {
                warn!(element = %entry.element, error = %e, "command skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(phrases)
}

/// Handles one stdin line; returns false to quit
fn handle_line(host: &LoopbackHost, line: &str) -> bool {
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let result = match verb {
        "quit" | "exit" => return false,
        "key" if !rest.is_empty() => host.press(rest),
        "say" if !rest.is_empty() => host.speech.say(rest),
        "silence" => host.speech.deliver(&RecognitionEvent::empty()),
        "" => Ok(()),
        _ => {
            println!("  unknown input: {line}");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!(error = %e, "action failed");
        println!("  {e}");
    }
    true
}
