use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tasksync", version, about = "Sync local todos with a remote task list")]
struct Cli {
    /// Account the command acts on
    #[arg(long, global = true, default_value = "default")]
    account: String,
    /// Local todo list the command acts on
    #[arg(long, global = true, default_value = "inbox")]
    list: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// OAuth login / logout / status
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Local todo items
    Todo {
        #[command(subcommand)]
        action: commands::todo::TodoAction,
    },
    /// Remote sync control
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasksync=info,tasksync_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let scope = commands::Scope {
        account: cli.account,
        list: cli.list,
    };

    let result = match cli.command {
        Commands::Auth { action } => commands::auth::run(action, &scope).await,
        Commands::Todo { action } => commands::todo::run(action, &scope).await,
        Commands::Sync { action } => commands::sync::run(action, &scope).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
