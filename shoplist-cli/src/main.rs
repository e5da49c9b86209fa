use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod db;
mod sync;

use commands::{
    AddCommand, ConfigCommand, DaemonCommand, EditCommand, ItemRef, ListCommand, ShowCommand,
    SyncCommand,
};
use config::Config;
use sync::App;

#[derive(Parser)]
#[command(name = "cart")]
#[command(version)]
#[command(about = "An offline-first shopping list", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List items
    List(ListCommand),

    /// Show one item
    Show(ShowCommand),

    /// Add an item
    Add(AddCommand),

    /// Change an item's name, quantity or note
    Edit(EditCommand),

    /// Delete an item
    Delete(ItemRef),

    /// Mark an item as bought
    Buy(ItemRef),

    /// Mark an item as not bought
    Unbuy(ItemRef),

    /// Sync with remote server
    Sync(SyncCommand),

    /// Run background sync until interrupted
    Daemon(DaemonCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cli_config_path = cli.config.clone();
    let config = Config::load(cli.config)?;

    let command = match &cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config, cli_config_path),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let app = App::open(&config).await?;

    // Auto-sync BEFORE read commands
    if is_read_command(command) {
        app.try_sync().await;
    }

    match command {
        Commands::List(cmd) => cmd.run(&app).await?,
        Commands::Show(cmd) => cmd.run(&app).await?,
        Commands::Add(cmd) => cmd.run(&app).await?,
        Commands::Edit(cmd) => cmd.run(&app).await?,
        Commands::Delete(item) => item.delete(&app).await?,
        Commands::Buy(item) => item.set_bought(&app, true).await?,
        Commands::Unbuy(item) => item.set_bought(&app, false).await?,
        Commands::Sync(cmd) => cmd.run(&app, &config).await?,
        Commands::Daemon(cmd) => cmd.run(&app, &config).await?,
        Commands::Config(_) => {}
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Returns true if the command is a read operation that should sync before execution.
fn is_read_command(cmd: &Commands) -> bool {
    matches!(cmd, Commands::List(_) | Commands::Show(_))
}
