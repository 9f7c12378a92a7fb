use crate::app::App;
use anyhow::{bail, Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use tactic_core::{Address, Amount, LedgerClient};
use tactic_match::{
    CallOutput, HandoffChannel, HandoffPayload, MatchCall, Opening, Phase, Session, SessionId,
    SessionTerms, Tactic,
};

/// Terms both parties must pass identically to `join` and `finalize`.
#[derive(Args, Debug, Clone)]
pub struct TermsArgs {
    /// Session id agreed with the other party
    pub session_id: SessionId,
    /// Initiator stake in satoshis (player A)
    #[arg(long)]
    pub stake_a: u64,
    /// Joiner stake in satoshis (player B)
    #[arg(long)]
    pub stake_b: u64,
}

impl TermsArgs {
    fn terms(&self, initiator: Address, joiner: Address) -> SessionTerms {
        SessionTerms {
            session_id: self.session_id,
            initiator,
            joiner,
            initiator_stake: Amount::from_sat(self.stake_a),
            joiner_stake: Amount::from_sat(self.stake_b),
        }
    }
}

/// Phase 1: the joining party signs its authorization and publishes it.
pub async fn join(app: &App, identity: &str, initiator: &str, args: TermsArgs) -> Result<()> {
    let signer = app.unlock(identity)?;
    let terms = args.terms(app.address(initiator)?, *signer.address());

    let payload = app.cosigner(signer).join_via(&terms, &app.board).await?;
    let pending = payload.pending(&app.host.network_id())?;
    tracing::info!(
        "Published join {} for session {}",
        payload.payload_id,
        terms.session_id
    );

    println!("Signed join for session {}.", terms.session_id);
    println!("  Initiator: {}", terms.initiator);
    println!("  Stakes: {} / {}", terms.initiator_stake, terms.joiner_stake);
    println!("  Request digest: {}", hex::encode(pending.request_digest));
    println!("  Valid until ledger: {}", pending.expiry);
    println!();
    println!("Published to {}", app.board.path().display());
    println!("Payload (share if the initiator uses another data directory):");
    println!("{}", payload.encode()?);

    Ok(())
}

/// Phase 2: the initiator validates the joiner's payload and submits.
pub async fn finalize(
    app: &App,
    identity: &str,
    joiner: &str,
    args: TermsArgs,
    payload: Option<String>,
) -> Result<()> {
    let signer = app.unlock(identity)?;
    let terms = args.terms(*signer.address(), app.address(joiner)?);
    let cosigner = app.cosigner(signer);

    let output = match payload {
        Some(encoded) => {
            let payload = HandoffPayload::decode(&encoded)?;
            let output = cosigner.finalize_with_retry(&terms, &payload).await?;
            if let Err(e) = app.board.discard(terms.session_id).await {
                tracing::warn!(
                    "Could not clear hand-off for session {}: {}",
                    terms.session_id,
                    e
                );
            }
            output
        }
        None => cosigner.finalize_via(&terms, &app.board).await?,
    };

    tracing::info!("Finalized session {} with {}", terms.session_id, terms.joiner.short());

    match output {
        CallOutput::Started(id) => {
            println!("Session {} created.", id);
            println!("Both players can now run: tactic commit <identity> {} <tactic>", id);
        }
        other => bail!("Unexpected contract output: {:?}", other),
    }

    Ok(())
}

/// Commits to a tactic. The proof carries the opening the contract uses at
/// resolution.
pub async fn commit(app: &App, identity: &str, session_id: SessionId, tactic: &str) -> Result<()> {
    let tactic: Tactic = tactic.parse()?;
    let signer = app.unlock(identity)?;

    let opening = Opening::new(session_id, tactic);
    let call = MatchCall::SubmitTactic {
        session_id,
        player: *signer.address(),
        commitment: opening.commitment(),
        proof: opening.to_proof(),
    };

    match app.call(&signer, call).await? {
        CallOutput::Submitted { phase, .. } => {
            println!("Committed to session {}.", session_id);
            println!("  Commitment: {}", opening.commitment());
            if phase == Phase::AwaitingBoth {
                println!("Both players are in. Run: tactic resolve <identity> {}", session_id);
            } else {
                println!("Waiting for the other player to commit.");
            }
        }
        other => bail!("Unexpected contract output: {:?}", other),
    }

    Ok(())
}

pub async fn resolve(app: &App, identity: &str, session_id: SessionId) -> Result<()> {
    let signer = app.unlock(identity)?;

    let winner = match app
        .call(&signer, MatchCall::ResolveMatch { session_id })
        .await?
    {
        CallOutput::Resolved { winner, .. } => winner,
        other => bail!("Unexpected contract output: {:?}", other),
    };

    let session = app
        .host
        .contract()
        .get(session_id, app.sequence()?)
        .context("reading resolved session")?;

    println!("Session {} resolved.", session_id);
    print_session(&session);
    println!();
    println!("Winner: {}", winner);

    Ok(())
}

pub fn show(app: &App, session_id: Option<SessionId>) -> Result<()> {
    let current = app.sequence()?;

    if let Some(id) = session_id {
        let session = app.host.contract().get(id, current)?;
        print_session(&session);
        return Ok(());
    }

    let sessions = app.host.contract().sessions(current)?;
    if sessions.is_empty() {
        println!("No live sessions.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Session", "Phase", "Player A", "Player B", "Stakes", "Winner",
    ]);

    for session in sessions {
        table.add_row(vec![
            session.id.to_string(),
            format!("{:?}", session.phase),
            session.player_a.short(),
            session.player_b.short(),
            format!("{} / {}", session.stake_a.to_sat(), session.stake_b.to_sat()),
            session
                .winner
                .map(|w| w.short())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", table);
    Ok(())
}

fn print_session(session: &Session) {
    let slot = |committed: bool| if committed { "committed" } else { "pending" };
    let pick = |choice: Option<Tactic>, score: Option<u32>| match (choice, score) {
        (Some(choice), Some(score)) => format!("{} ({} pts)", choice, score),
        _ => "-".to_string(),
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["", "Player A", "Player B"]);
    table.add_row(vec![
        "Address".to_string(),
        session.player_a.to_string(),
        session.player_b.to_string(),
    ]);
    table.add_row(vec![
        "Stake (sats)".to_string(),
        session.stake_a.to_sat().to_string(),
        session.stake_b.to_sat().to_string(),
    ]);
    table.add_row(vec![
        "Commitment".to_string(),
        slot(session.commitment_a.is_some()).to_string(),
        slot(session.commitment_b.is_some()).to_string(),
    ]);
    table.add_row(vec![
        "Result".to_string(),
        pick(session.choice_a, session.score_a),
        pick(session.choice_b, session.score_b),
    ]);

    println!("Session {} ({:?})", session.id, session.phase);
    println!(
        "Created at ledger {}, live until {}",
        session.created_ledger, session.live_until_ledger
    );
    println!("{}", table);
}
