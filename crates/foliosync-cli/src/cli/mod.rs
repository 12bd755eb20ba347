//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "foliosync")]
#[command(version)]
#[command(about = "Multi-broker portfolio session and sync client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in to the portfolio backend
    Login {
        /// Account username
        #[arg(short, long)]
        username: String,

        /// Account password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// TOTP step-up operations
    Totp {
        #[command(subcommand)]
        command: TotpCommands,
    },
    /// End the current session
    Logout,
    /// Show the currently authenticated user
    Whoami,
    /// Show broker connection status
    Status {
        /// Keep polling on the configured cadence until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Trigger a portfolio refresh and print the settled summary
    Sync,
    /// Config file operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum TotpCommands {
    /// Request enrollment material (secret + otpauth URL)
    Setup,
    /// Submit a TOTP code
    Verify {
        /// The 6-digit code from the authenticator app
        code: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Create a default config file
    Init,
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;
    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login { username, password } => commands::auth::login(&username, password).await,
        Commands::Totp { command } => match command {
            TotpCommands::Setup => commands::auth::totp_setup().await,
            TotpCommands::Verify { code } => commands::auth::totp_verify(&code).await,
        },
        Commands::Logout => commands::auth::logout().await,
        Commands::Whoami => commands::auth::whoami().await,
        Commands::Status { watch } => {
            if watch {
                commands::status::watch().await
            } else {
                commands::status::once().await
            }
        }
        Commands::Sync => commands::sync::run().await,
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
