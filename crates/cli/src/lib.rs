pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "deskline",
    about = "Deskline operator CLI",
    long_about = "Operate Deskline migrations, one-shot support turns, feedback capture, and \
                  config inspection.",
    after_help = "Examples:\n  deskline migrate\n  deskline chat --session demo \"Where is my invoice?\"\n  deskline turns --limit 10\n  deskline config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Run one support turn end to end and print the resolved answer")]
    Chat {
        #[arg(long, default_value = "cli", help = "Session identity for rate limiting")]
        session: String,
        #[arg(help = "The customer query to resolve")]
        query: String,
        #[arg(long, default_value = "A", help = "Policy variant (A or B)")]
        variant: String,
        #[arg(long, help = "Detected language tag to record with the turn")]
        language: Option<String>,
    },
    #[command(about = "Record a thumbs rating against a persisted turn")]
    Feedback {
        #[arg(long, help = "The turn being rated")]
        turn_id: i64,
        #[arg(long, allow_hyphen_values = true, help = "+1 (thumbs up) or -1 (thumbs down)")]
        rating: i64,
        #[arg(long, help = "Optional free-text comment")]
        comment: Option<String>,
    },
    #[command(about = "List recent turns, newest first, as JSON")]
    Turns {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Chat { session, query, variant, language } => {
            commands::chat::run(commands::chat::ChatArgs {
                session_id: session,
                query,
                variant,
                language,
            })
        }
        Command::Feedback { turn_id, rating, comment } => {
            commands::feedback::run(turn_id, rating, comment.as_deref())
        }
        Command::Turns { limit } => commands::turns::run(limit),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
