mod generator;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use poolchain_core::{
    load_blocks, verify_blocks, Chain, ChainConfig, HashPrimitive, MixHash, Sha256Hex,
};
use poolchain_storage::SledStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "poolchain")]
#[command(about = "Competitive proof-of-work mining simulator")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum HashKind {
    #[default]
    Mix,
    Sha256,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate users and transfers, then mine until the pending pool is empty
    Simulate {
        /// TOML file with chain settings; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 100)]
        users: usize,
        #[arg(long, default_value_t = 500)]
        txs: usize,
        /// Transactions per candidate block
        #[arg(long, default_value_t = 50)]
        block_tx: usize,
        /// Required hex prefix of block hashes
        #[arg(long)]
        difficulty: Option<String>,
        #[arg(long)]
        candidates: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Search candidates on worker threads
        #[arg(long)]
        parallel: bool,
        #[arg(long, value_enum, default_value_t)]
        hash: HashKind,
        /// Persist the mined chain to this sled directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-check linkage and Merkle roots of a persisted chain
    Verify {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long, value_enum, default_value_t)]
        hash: HashKind,
    },
    /// Print the digest of a string
    Hash {
        text: String,
        #[arg(long, value_enum, default_value_t)]
        hash: HashKind,
    },
}

struct SimulateArgs {
    config: ChainConfig,
    users: usize,
    txs: usize,
    block_tx: usize,
    data_dir: Option<PathBuf>,
    json: bool,
}

#[derive(Serialize)]
struct SimulationOutput {
    users: usize,
    accepted_txs: usize,
    rejected_txs: usize,
    report: poolchain_core::MiningReport,
    summary: poolchain_core::ChainSummary,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate {
            config,
            users,
            txs,
            block_tx,
            difficulty,
            candidates,
            seed,
            parallel,
            hash,
            data_dir,
            json,
        } => {
            let mut chain_config = match config {
                Some(path) => ChainConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => ChainConfig::default(),
            };
            if let Some(difficulty) = difficulty {
                chain_config.difficulty_target = difficulty;
            }
            if let Some(candidates) = candidates {
                chain_config.num_candidates = candidates;
            }
            if seed.is_some() {
                chain_config.seed = seed;
            }
            chain_config.parallel |= parallel;
            chain_config.validate()?;

            let args = SimulateArgs {
                config: chain_config,
                users,
                txs,
                block_tx,
                data_dir,
                json,
            };
            match hash {
                HashKind::Mix => simulate(args, MixHash),
                HashKind::Sha256 => simulate(args, Sha256Hex),
            }
        }
        Command::Verify { data_dir, hash } => match hash {
            HashKind::Mix => verify(&data_dir, MixHash),
            HashKind::Sha256 => verify(&data_dir, Sha256Hex),
        },
        Command::Hash { text, hash } => {
            let digest = match hash {
                HashKind::Mix => MixHash.digest(&text),
                HashKind::Sha256 => Sha256Hex.digest(&text),
            };
            println!("{digest}");
            Ok(())
        }
    }
}

fn simulate<H: HashPrimitive>(args: SimulateArgs, hasher: H) -> Result<()> {
    let mut rng = match args.config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };

    let accounts = generator::generate_users(args.users, &mut rng);
    let mut keys: Vec<String> = accounts.keys().cloned().collect();
    keys.sort();

    let mut chain = Chain::new(args.config, accounts, hasher);
    let generated = generator::generate_transactions(&mut chain, &keys, args.txs, &mut rng);
    let report = chain.mine_until_done(args.block_tx)?;
    chain.verify()?;

    if let Some(dir) = &args.data_dir {
        let store = SledStore::open(dir)?;
        store.clear()?;
        chain.persist(&store)?;
        info!(path = %dir.display(), "chain written");
    }

    let output = SimulationOutput {
        users: keys.len(),
        accepted_txs: generated.accepted,
        rejected_txs: generated.rejected,
        report,
        summary: chain.summary(),
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("users:             {}", output.users);
        println!(
            "transactions:      {} accepted, {} rejected",
            output.accepted_txs, output.rejected_txs
        );
        println!(
            "blocks mined:      {} ({} best-effort)",
            output.report.blocks_mined, output.report.best_effort_blocks
        );
        println!(
            "applied/skipped:   {}/{}",
            output.report.applied, output.report.skipped
        );
        println!("{}", output.summary);
    }
    Ok(())
}

fn verify<H: HashPrimitive>(data_dir: &Path, hasher: H) -> Result<()> {
    let store = SledStore::open(data_dir)?;
    let blocks = load_blocks(&store)?;
    if blocks.is_empty() {
        bail!("no blocks found in {}", data_dir.display());
    }
    verify_blocks(&blocks, &hasher)
        .with_context(|| format!("chain in {} failed verification", data_dir.display()))?;
    println!("chain ok: {} blocks", blocks.len());
    Ok(())
}
