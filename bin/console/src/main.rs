use clap::Parser;
use parlance_console::{ConsoleConfig, ConsoleError, Input, TerminalBot, build_manager, parse_input};
use rootcause::Report;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Chat with the phone damage claim bot.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (YAML or TOML).
    #[arg(short, long, env = "PARLANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Print answers at once instead of simulating typing.
    #[arg(long)]
    no_delays: bool,

    /// Start the conversation with `/start` instead of waiting for the user.
    #[arg(long)]
    greet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Console failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Report<ConsoleError>> {
    let config = ConsoleConfig::load(args.config.as_deref()).map_err(|e| ConsoleError::Config {
        reason: e.to_string(),
    })?;
    info!(config = ?config, "Loaded configuration");

    let mut bot = TerminalBot::stdout();
    if args.no_delays || !config.dialog.pacing.enabled {
        bot = bot.without_delays();
    }
    let bot = Arc::new(bot);
    let manager = build_manager(&config, bot.clone())?;
    let user = config.user.to_user();
    info!(user_id = %user.id, "Conversation ready, type /quit to leave");

    let mut pending = args.greet.then_some(Input::Start);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let input = match pending.take() {
            Some(input) => input,
            None => {
                let line = tokio::select! {
                    line = lines.next_line() => line.map_err(|e| ConsoleError::Io { reason: e.to_string() })?,
                    _ = tokio::signal::ctrl_c() => None,
                };
                let Some(line) = line else {
                    break;
                };
                parse_input(&line, &bot.last_choices())
            }
        };
        if input == Input::Quit {
            break;
        }
        let Some(update) = input.into_update(&user) else {
            continue;
        };
        if let Err(e) = manager.handle_update(update).await {
            warn!(error = %e, "Turn failed");
            eprintln!("({e})");
        }
    }
    info!("Bye");
    Ok(())
}
