pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "offerank",
    about = "Offerank operator CLI",
    long_about = "Rank offers from a JSON file, top up the candidate cache from the catalog, \
                  apply migrations and inspect configuration.",
    after_help = "Examples:\n  offerank rank --input items.json\n  offerank fetch --query \"power bank\" --limit 5\n  offerank doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity, and upstream client setup")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Rank the items in a JSON file; lower scores rank first")]
    Rank {
        #[arg(long, help = "Path to a JSON array of ranking items")]
        input: PathBuf,
    },
    #[command(about = "List suitable candidates for a query, acquiring more when short")]
    Fetch {
        #[arg(long, help = "Free-text product query")]
        query: String,
        #[arg(long, help = "Number of candidates to return")]
        limit: Option<u32>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Rank { input } => commands::rank::run(&input),
        Command::Fetch { query, limit } => commands::fetch::run(&query, limit),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
