//! Example: Read-only proposal dashboard
//!
//! Loads the proposal list, prints it in display order and keeps the
//! countdowns ticking for a few seconds from one shared clock.

use anyhow::Context;
use ballotbox_client::{
    spawn_ticker, Clock, Leader, SystemClock, VotingClient, VotingConfig,
};
use ethers::signers::LocalWallet;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ballotbox_client::init_tracing();

    println!("=== Ballotbox Dashboard ===\n");

    let config = Arc::new(VotingConfig::load(None)?);
    println!("Network: {:?}", config.network);
    println!("RPC URL: {}\n", config.rpc_url);

    let wallet: LocalWallet = std::env::var("BALLOTBOX_PRIVATE_KEY")
        .context("BALLOTBOX_PRIVATE_KEY must be set")?
        .parse()?;

    let client = VotingClient::connect_evm(config.clone(), wallet).await?;
    println!("✓ Connected as {:?}\n", client.account().await);

    if !client.health_check().await? {
        anyhow::bail!("voting registry is not reachable");
    }

    let snapshot = client.load().await?;
    println!("✓ Loaded {} proposals\n", snapshot.proposals.len());

    let role = client.role().await;
    println!("Role: owner={} admin={}", role.is_owner, role.is_admin);

    match client.leader() {
        Leader::NoProposals => println!("Leader: none yet"),
        Leader::Winner(p) => println!("Leader: #{} {} ({} votes)", p.id, p.description, p.vote_count),
        Leader::Tie { votes, proposals } => {
            let ids: Vec<u64> = proposals.iter().map(|p| p.id).collect();
            println!("Leader: tie at {} votes between {:?}", votes, ids);
        }
    }
    println!();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (mut ticks, ticker) = spawn_ticker(clock, config.clock_tick());

    for _ in 0..3 {
        let now = *ticks.borrow_and_update();
        for view in client.proposals(now).await {
            println!(
                "  #{:<3} {:<20} {:>5} votes  {:<7} {}{}",
                view.proposal.id,
                view.proposal.description,
                view.proposal.vote_count,
                view.status,
                view.time_remaining,
                if view.voted { "  ✓ voted" } else { "" }
            );
        }
        println!();
        ticks.changed().await?;
    }
    ticker.abort();

    if role.is_admin {
        let roster = client.admins().await;
        println!("Admins:");
        for admin in roster.admins {
            println!("  - {:?}", admin);
        }
        println!();
    }

    if let (Some(gallery), Some(account)) = (client.badges(), client.account().await) {
        let badges = gallery.owned_badges(account).await?;
        println!("Badges: {}", badges.len());
        for badge in badges {
            println!("  - #{} {}", badge.token_id, badge.gateway_url);
        }
    }

    println!("\n=== Dashboard Complete ===");
    Ok(())
}
