use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use gatehouse::cli;
use gatehouse::confirm::TrustChoice;
use gatehouse::hooks::HookEventName;
use gatehouse::trust::TrustLevel;

#[derive(Parser)]
#[command(name = "gatehouse", version, about = "Folder trust and lifecycle hook mediation")]
struct Cli {
    /// Extra directories to include at session start (comma-separated, repeatable)
    #[arg(long, global = true, value_delimiter = ',')]
    include_directories: Vec<String>,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the session workspace
    Directory {
        #[command(subcommand)]
        command: DirectoryCommands,
    },
    /// Manage recorded folder trust
    Trust {
        #[command(subcommand)]
        command: TrustCommands,
    },
    /// Exercise the configured lifecycle hooks
    Hook {
        #[command(subcommand)]
        command: HookCommands,
    },
}

#[derive(Subcommand)]
enum DirectoryCommands {
    /// Add directories (comma-separated) to the workspace
    Add {
        paths: String,
        /// Answer the trust confirmation without prompting
        /// (once, remember, reject, cancel)
        #[arg(long)]
        choice: Option<TrustChoice>,
    },
    /// Show the workspace directories
    Show,
}

#[derive(Subcommand)]
enum TrustCommands {
    /// Record a trust level (TRUST_FOLDER, TRUST_PARENT, DO_NOT_TRUST)
    Set { path: String, level: TrustLevel },
    /// Remove the trust record for a path
    Unset { path: String },
    /// List recorded trust
    List,
    /// Classify paths as trusted, untrusted or unknown
    Check {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum HookCommands {
    /// Fire an event (before-agent, after-agent) and print the decision
    Fire {
        event: HookEventName,
        #[arg(long)]
        payload: Option<String>,
        #[arg(long)]
        correlation_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match args.command {
        Commands::Directory { command } => match command {
            DirectoryCommands::Add { paths, choice } => {
                cli::directory::run_add(&paths, &args.include_directories, choice, &cancel).await?
            }
            DirectoryCommands::Show => {
                cli::directory::run_show(&args.include_directories, &cancel).await?
            }
        },
        Commands::Trust { command } => match command {
            TrustCommands::Set { path, level } => cli::trust::run_set(&path, level).await?,
            TrustCommands::Unset { path } => cli::trust::run_unset(&path).await?,
            TrustCommands::List => cli::trust::run_list().await?,
            TrustCommands::Check { paths } => cli::trust::run_check(&paths).await?,
        },
        Commands::Hook { command } => match command {
            HookCommands::Fire {
                event,
                payload,
                correlation_id,
            } => {
                cli::hook::run_fire(event, payload.as_deref(), correlation_id.as_deref()).await?
            }
        },
    }

    Ok(())
}
