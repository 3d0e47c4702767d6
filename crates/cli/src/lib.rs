pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "ednna",
    about = "Ednna operator CLI",
    long_about = "Prepare the Ednna database, load the starter knowledge base, inspect \
                  configuration and ask the assistant questions from the terminal.",
    after_help = "Examples:\n  ednna migrate\n  ednna seed\n  ednna doctor --json\n  \
                  ednna ask \"o que é o teia card?\" --user ana"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the starter knowledge base and verify every entry landed")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, lexicon, database connectivity and knowledge base")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Resolve one message through the full pipeline and print the result")]
    Ask {
        #[arg(help = "Message text, as a customer would type it")]
        message: String,
        #[arg(long, default_value = commands::ask::DEFAULT_USER, help = "User id to attribute")]
        user: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { message, user } => commands::ask::run(&message, &user),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
