//! posdao-sim - replay staking scenarios through the epoch engine

use anyhow::{Context, Result};
use clap::Parser;
use hbbft_posdao::{Amount, RotationOutcome, COIN};
use posdao_sim::{EpochSummary, Scenario, Simulator};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "posdao-sim")]
#[command(about = "Deterministic HBBFT PoS committee simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Replay a scenario for a number of epochs
    Run {
        /// Scenario JSON file (reference network if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of epochs to simulate
        #[arg(short, long, default_value = "3")]
        epochs: u64,

        /// Seconds between blocks
        #[arg(short, long, default_value = "600")]
        block_time: u64,

        /// Epochs in which key generation is withheld
        #[arg(long = "fail-keygen-epoch")]
        fail_keygen_epoch: Vec<u64>,

        /// Print summaries as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Print the reference scenario as JSON
    DefaultScenario,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hbbft_posdao=info,posdao_sim=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            scenario,
            epochs,
            block_time,
            fail_keygen_epoch,
            json,
        } => {
            let scenario = match scenario {
                Some(path) => Scenario::load(&path)?,
                None => Scenario::reference(),
            };
            run(scenario, epochs, block_time, fail_keygen_epoch.into_iter().collect(), json)
        }
        Command::DefaultScenario => {
            println!("{}", Scenario::reference().to_json()?);
            Ok(())
        }
    }
}

fn run(scenario: Scenario, epochs: u64, block_time: u64, fail: BTreeSet<u64>, json: bool) -> Result<()> {
    tracing::info!(epochs, block_time, validators = scenario.genesis.validators.len(), "starting simulation");
    let mut sim = Simulator::new(scenario, block_time, fail)?;

    for _ in 0..epochs {
        let summary = sim.run_epoch()?;
        if json {
            println!("{}", serde_json::to_string(&summary).context("serializing summary")?);
        } else {
            print_summary(&summary);
        }
    }

    let ledger = sim.engine().ledger();
    println!("\n=== Simulation Summary ===");
    println!("Final epoch:         {}", sim.engine().current_epoch());
    println!("Pools:               {}", sim.engine().registry().pool_count());
    println!("Total staked:        {}", coins(sim.engine().registry().total_staked()));
    println!("Paid out:            {}", coins(ledger.total_paid_out()));
    println!("Conserved:           {}", ledger.is_conserved());
    println!("State digest:        {}", hex::encode(sim.engine().state_digest()));
    Ok(())
}

fn print_summary(summary: &EpochSummary) {
    let t = &summary.transition;
    let rotation = match &t.rotation {
        RotationOutcome::Rotated { .. } => "rotated".to_string(),
        RotationOutcome::Retained { reason } => format!("retained ({:?})", reason),
        RotationOutcome::AlreadyFinalized => "already finalized".to_string(),
    };

    println!("\n=== Epoch {} -> {} ===", t.ended_epoch, t.new_epoch);
    println!("Blocks:              {}", summary.blocks);
    println!("Rotation:            {}", rotation);
    println!("Validators:          {}", summary.validators.len());
    for v in &summary.validators {
        println!("  {}", v);
    }
    println!("Total reward:        {}", coins(t.rewards.total_reward));
    println!("Governance share:    {}", coins(t.rewards.governance_share));
    println!("Per validator:       {}", coins(t.rewards.per_validator_share));
    println!("Returned to reinsert: {}", coins(t.rewards.returned_to_reinsert));
    if !t.rewards.failed_payouts.is_empty() {
        println!("Failed payouts:      {}", t.rewards.failed_payouts.len());
    }
    println!("Delta pot:           {}", coins(summary.delta_pot));
    println!("Reinsert pot:        {}", coins(summary.reinsert_pot));
    println!("Undistributed:       {}", coins(summary.undistributed));
    println!("Digest:              {}", summary.digest);
}

fn coins(amount: Amount) -> String {
    format!("{}.{:018}", amount / COIN, amount % COIN)
}
