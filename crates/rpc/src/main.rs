//! LevelBank CLI - Main entry point

use clap::{Parser, Subcommand};
use levelbank_rpc::commands::{self, SimulateOptions};
use levelbank_rpc::EngineConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "levelbank")]
#[command(about = "LevelBank - referral levels, rewards and withdrawals", long_about = None)]
struct Cli {
    /// Engine config file (JSON); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the level table
    Levels,

    /// Print the effective configuration
    Config,

    /// Run a concurrent simulation and audit the result
    Simulate {
        /// Members to register
        #[arg(long, default_value = "200")]
        members: usize,
        /// Direct referrals per member
        #[arg(long, default_value = "3")]
        fanout: usize,
        /// Members that request a withdrawal
        #[arg(long, default_value = "20")]
        withdrawals: usize,
        /// Members that submit a loan referral
        #[arg(long, default_value = "10")]
        loans: usize,
        /// Export the journal as JSONL
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Verify the hash chain of an exported journal
    Verify {
        /// JSONL journal file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides();

    match cli.command {
        Commands::Levels => commands::levels(&config),

        Commands::Config => commands::show_config(&config)?,

        Commands::Simulate {
            members,
            fanout,
            withdrawals,
            loans,
            export,
        } => {
            let options = SimulateOptions {
                members,
                fanout,
                withdrawals,
                loans,
                export,
            };
            let summary = commands::simulate(config, &options).await?;
            commands::print_summary(&summary);
        }

        Commands::Verify { path } => commands::verify(&path)?,
    }

    Ok(())
}
