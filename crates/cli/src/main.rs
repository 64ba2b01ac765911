use anyhow::Context;
use clap::{Parser, Subcommand};

use bookshelf_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about = "Bookshelf catalog service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API until ctrl-c
    Serve,
    /// Apply pending database migrations
    Migrate,
    /// Load the demo catalog into an empty database
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => bookshelf_app::serve(&settings).await?,
        Command::Migrate => {
            let applied = bookshelf_app::migrate(&settings).await?;
            tracing::info!(applied, "migrations complete");
        }
        Command::Seed => {
            let created = bookshelf_app::seed(&settings).await?;
            tracing::info!(created, "seed complete");
        }
    }

    Ok(())
}
