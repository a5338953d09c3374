//! `okbot-cli` – okbot command line entry point
//!
//! Runs the whole robot in one foreground process against a simulated car:
//!
//! 1. Loads `~/.okbot/config.toml` (defaults when absent) with `OKBOT_*`
//!    overrides; `--write-config` saves the effective config and exits.
//! 2. Wires the simulated car, the log-backed speech and sound collaborators,
//!    and the optional chat provider into a [`Robot`].
//! 3. Spawns the safety monitor, the keyboard loop, and the voice controller,
//!    with the console feeding both input channels.
//! 4. Intercepts **Ctrl-C** / SIGTERM to run the shutdown sequence, which
//!    leaves the car stopped and centred.

mod config;
mod console;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use okbot_hal::SimCar;
use okbot_runtime::{
    AutonomousModeRunner, ChannelInput, CommandDispatcher, KeyboardLoop, LogSoundPlayer,
    LogSpeaker, Robot, SafetyMonitor, StateMachine, VoiceController, init_tracing,
    provider_from_config,
};
use okbot_types::RobotConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};

const USAGE: &str = "\
usage: okbot [--write-config] [--help]

  --write-config   save the effective configuration to ~/.okbot/config.toml and exit
  --help           show this message";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    if let Some(unknown) = args.iter().find(|a| *a != "--write-config") {
        eprintln!("{}: unknown argument '{}'\n\n{USAGE}", "Error".red(), unknown);
        return ExitCode::FAILURE;
    }

    let _tracing = init_tracing("okbot");
    print_banner();

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = cfg.validate() {
        eprintln!("{}: {}", "Config error".red(), e);
        return ExitCode::FAILURE;
    }

    if args.iter().any(|a| a == "--write-config") {
        return match config::save(&cfg) {
            Ok(()) => {
                println!(
                    "  {} Config saved to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    run(cfg).await;
    ExitCode::SUCCESS
}

async fn run(cfg: RobotConfig) {
    info!(config = ?cfg, "starting");

    let chat = match provider_from_config(&cfg.llm) {
        Ok(chat) => chat,
        Err(e) => {
            warn!(error = %e, "chat provider unavailable, using keyword commands");
            None
        }
    };
    match &chat {
        Some(c) => println!("  Chat model: {} ({})", cfg.llm.model.bold(), c.name()),
        None => println!("  Chat model: {}", "off".dimmed()),
    }

    let car = SimCar::from_config(&cfg);
    let robot = Robot::new(
        cfg.clone(),
        Box::new(car.clone()),
        Arc::new(car),
        Arc::new(LogSpeaker),
        Arc::new(LogSoundPlayer),
    );
    let modes = Arc::new(AutonomousModeRunner::new(robot.clone()));
    let lifecycle = Arc::new(StateMachine::new(robot.clone(), modes));
    let dispatcher = Arc::new(CommandDispatcher::new(lifecycle.clone(), chat));

    // ── Signals ───────────────────────────────────────────────────────────
    let (quit_tx, mut quit_rx) = mpsc::unbounded_channel::<&'static str>();
    let ctrlc_tx = quit_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send("signal");
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Input ─────────────────────────────────────────────────────────────
    let (speech_tx, input) = ChannelInput::channel(32);
    let (key_tx, key_rx) = mpsc::channel(32);
    let keyboard = cfg
        .keyboard_enabled
        .then(|| tokio::spawn(KeyboardLoop::new(dispatcher.clone(), key_rx).run()));

    let safety = tokio::spawn(SafetyMonitor::new(robot.clone()).run());

    // ── Startup ───────────────────────────────────────────────────────────
    robot.play(&cfg.sound.engine).await;
    let greeting = if cfg.wake_enabled {
        format!(
            "Hello! I am {}. Say '{}' to wake me up!",
            cfg.robot_name,
            robot.wake_hint()
        )
    } else {
        format!("Hello! I am {}. I'm listening for commands.", cfg.robot_name)
    };
    robot.say(&greeting).await;
    println!(
        "\n  Type what you would say. Prefix a key with {} (e.g. {}, {}, {}).\n",
        "!".bold().cyan(),
        "!up".bold(),
        "!1".bold(),
        "!?".bold()
    );

    console::spawn(console::ConsoleSinks {
        speech: speech_tx,
        keys: cfg.keyboard_enabled.then_some(key_tx),
        quit: quit_tx,
    });

    let mut controller = tokio::spawn(
        VoiceController::new(lifecycle.clone(), dispatcher, Arc::new(input)).run(),
    );

    // ── Wait for the first stop reason ────────────────────────────────────
    let cancel = robot.state.cancellation();
    let controller_done = tokio::select! {
        _ = cancel.cancelled() => false,
        reason = quit_rx.recv() => {
            println!();
            println!(
                "{} ({})",
                "⚠  Shutting down …".yellow().bold(),
                reason.unwrap_or("signal")
            );
            false
        }
        _ = &mut controller => true,
    };

    lifecycle.shutdown().await;
    if !controller_done {
        let _ = controller.await;
    }
    let _ = safety.await;
    if let Some(keyboard) = keyboard {
        let _ = keyboard.await;
    }
    println!("{}", "  ✓ Motors stopped, steering centred. Goodbye.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____  __   ___       __ "#.bold().cyan());
    println!("{}", r#"  / __ \/ /__/ _ )___  / /_"#.bold().cyan());
    println!("{}", r#" / /_/ /  '_/ _  / _ \/ __/"#.bold().cyan());
    println!("{}", r#" \____/_/\_\/____/\___/\__/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "okbot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Voice-controlled PiCar-X");
    println!();
}
