//! Example: Cast a vote and follow its progress
//!
//! Usage: `cargo run --example cast_vote -- <proposal-id>`

use anyhow::Context;
use ballotbox_client::{ActionOutcome, ActionState, VotingClient, VotingConfig};
use ethers::signers::LocalWallet;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ballotbox_client::init_tracing();

    println!("=== Ballotbox Vote Example ===\n");

    let proposal_id: u64 = std::env::args()
        .nth(1)
        .context("usage: cast_vote <proposal-id>")?
        .parse()
        .context("proposal id must be a number")?;

    let config = Arc::new(VotingConfig::load(None)?);
    let wallet: LocalWallet = std::env::var("BALLOTBOX_PRIVATE_KEY")
        .context("BALLOTBOX_PRIVATE_KEY must be set")?
        .parse()?;

    let client = Arc::new(VotingClient::connect_evm(config, wallet).await?);
    client.load().await?;
    println!("✓ Client initialized\n");

    let mut status = client.subscribe_status();
    let progress = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let state = status.borrow_and_update().clone();
            match &state {
                ActionState::CheckingBalance => println!("Checking fee token balance..."),
                ActionState::CheckingAllowance => println!("Checking allowance..."),
                ActionState::Approving => println!("Requesting token approval..."),
                ActionState::AwaitingApproval(hash) => println!("Approval sent: {:?}", hash),
                ActionState::Submitting => println!("Submitting vote..."),
                ActionState::AwaitingConfirmation(hash) => {
                    println!("Waiting for confirmation of {:?}", hash)
                }
                _ => {}
            }
            if state.is_terminal() {
                break;
            }
        }
    });

    let outcome = client.vote(proposal_id).await?;
    progress.abort();

    match outcome {
        ActionOutcome::Succeeded { hash } => {
            println!("\n✓ Vote confirmed: {:?}", hash);
            if let Some(proposal) = client.cache().snapshot().get(proposal_id) {
                println!("  - {} now has {} votes", proposal.description, proposal.vote_count);
            }
        }
        ActionOutcome::Failed(failure) => {
            eprintln!("\n✗ {}: {}", failure.kind, failure.reason);
        }
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
