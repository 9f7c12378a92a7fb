use crate::app::App;
use anyhow::Result;
use clap::Subcommand;
use tactic_match::HandoffChannel;

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Show the local ledger clock and pending hand-offs
    Status,
    /// Close ledgers to move the clock forward
    Advance {
        /// Number of ledgers to close
        #[arg(default_value_t = 1)]
        ledgers: u32,
    },
    /// Drop expired sessions and consumed nonces
    Purge,
}

pub async fn handle_ledger_command(cmd: LedgerCommands, app: &App) -> Result<()> {
    match cmd {
        LedgerCommands::Status => {
            let current = app.sequence()?;
            let config = app.host.config();

            println!("Ledger Status:");
            println!("  Network: {}", config.network_passphrase);
            println!("  Sequence: {}", current);
            println!(
                "  Auth TTL: {} ledgers (hand-off: {})",
                config.auth_ttl_ledgers, config.extended_auth_ttl_ledgers
            );
            println!(
                "  Live sessions: {}",
                app.host.contract().sessions(current)?.len()
            );

            let pending = app.board.entries().await?;
            if pending.is_empty() {
                println!("  Pending hand-offs: none");
            } else {
                println!("  Pending hand-offs:");
                for session_id in pending.keys() {
                    let payload = app.board.fetch(*session_id).await?;
                    let expiry = payload.expiry().unwrap_or_default();
                    let state = if current > expiry { "expired" } else { "valid" };
                    println!(
                        "    session {} from {} ({} until ledger {})",
                        session_id,
                        payload.terms.joiner.short(),
                        state,
                        expiry
                    );
                }
            }
        }

        LedgerCommands::Advance { ledgers } => {
            let next = app.host.advance(ledgers)?;
            let elapsed = app.host.config().ledgers_to_duration(ledgers);
            println!(
                "Advanced {} ledgers (~{}s) to sequence {}",
                ledgers,
                elapsed.as_secs(),
                next
            );
        }

        LedgerCommands::Purge => {
            let current = app.sequence()?;
            let sessions = app.host.contract().purge_expired(current)?;
            let nonces = app.host.purge_expired_nonces()?;
            println!(
                "Purged {} expired sessions and {} nonces at ledger {}",
                sessions, nonces, current
            );
        }
    }

    Ok(())
}
