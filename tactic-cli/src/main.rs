mod app;
mod board;
mod commands;
mod config;

use app::App;
use clap::{Parser, Subcommand};
use commands::TermsArgs;
use config::CliConfig;
use std::path::PathBuf;
use tactic_core::{CoreError, HostError};
use tactic_match::{CoSignError, MatchError, SessionId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tactic")]
#[command(about = "Co-signed two-player tactical matches on a local ledger")]
#[command(version)]
struct Cli {
    /// Data directory for identities, ledger and hand-offs
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Signing identity management
    #[command(subcommand)]
    Identity(commands::IdentityCommands),

    /// Sign a join as player B and publish it for the initiator
    Join {
        /// Joining identity
        identity: String,
        /// Initiator address or local identity name
        #[arg(long)]
        initiator: String,
        #[command(flatten)]
        terms: TermsArgs,
    },

    /// Validate the joiner's signature and create the session as player A
    Finalize {
        /// Initiating identity
        identity: String,
        /// Joiner address or local identity name
        #[arg(long)]
        joiner: String,
        #[command(flatten)]
        terms: TermsArgs,
        /// Encoded payload, instead of reading the hand-off board
        #[arg(long)]
        payload: Option<String>,
    },

    /// Commit to a tactic (defensive, balanced, aggressive, all-out)
    Commit {
        identity: String,
        session_id: SessionId,
        tactic: String,
    },

    /// Resolve a session once both players committed
    Resolve {
        /// Identity that submits the call
        identity: String,
        session_id: SessionId,
    },

    /// Show one session, or list all live sessions
    Show { session_id: Option<SessionId> },

    /// Local ledger commands
    #[command(subcommand)]
    Ledger(commands::LedgerCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = CliConfig::new(cli.data_dir, cli.verbose);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_filter()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = App::open(config)?;

    let result = match cli.command {
        Commands::Identity(cmd) => commands::handle_identity_command(cmd, &app).await,
        Commands::Join {
            identity,
            initiator,
            terms,
        } => commands::game::join(&app, &identity, &initiator, terms).await,
        Commands::Finalize {
            identity,
            joiner,
            terms,
            payload,
        } => commands::game::finalize(&app, &identity, &joiner, terms, payload).await,
        Commands::Commit {
            identity,
            session_id,
            tactic,
        } => commands::game::commit(&app, &identity, session_id, &tactic).await,
        Commands::Resolve {
            identity,
            session_id,
        } => commands::game::resolve(&app, &identity, session_id).await,
        Commands::Show { session_id } => commands::game::show(&app, session_id),
        Commands::Ledger(cmd) => commands::handle_ledger_command(cmd, &app).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = hint(&e) {
            eprintln!("{}", hint);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn hint(e: &anyhow::Error) -> Option<&'static str> {
    if let Some(e) = e.downcast_ref::<CoSignError>() {
        if e.requires_restart() {
            return Some("The joiner's signature can no longer be used; ask them to run 'tactic join' again");
        }
        if e.is_transient() {
            return Some("Nothing was submitted; run 'tactic finalize' again");
        }
        if let CoSignError::PayloadUnavailable(_) = e {
            return Some("The joiner has not published a payload yet; pass one with --payload");
        }
        return None;
    }

    if let Some(e) = e.downcast_ref::<HostError<MatchError>>() {
        return match e.contract_error() {
            Some(MatchError::GameNotFound) => Some("Use 'tactic show' to list live sessions"),
            Some(MatchError::BothPlayersNotSubmitted) => {
                Some("Both players have to run 'tactic commit' first")
            }
            _ => None,
        };
    }

    match e.downcast_ref::<CoreError>() {
        Some(CoreError::IdentityNotFound { .. }) => {
            Some("Use 'tactic identity list' to see available identities")
        }
        _ => None,
    }
}
