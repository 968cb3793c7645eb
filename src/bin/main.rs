#![forbid(unsafe_code)]
//! DualChain demo CLI: mine or forge blocks on an in-memory chain.

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use dualchain::blockchain::{Blockchain, Seal};
use dualchain::config::{load_config, Config, DEFAULT_CONFIG_PATH};
use dualchain::consensus::{Consensus, ProofOfStake, ProofOfWork};
use dualchain::transaction::Amount;
use dualchain::ChainError;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Log chain activity at debug level
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine blocks with proof of work
    Pow {
        /// Number of blocks to mine
        #[arg(long, default_value_t = 3)]
        blocks: u32,
        /// Address receiving block rewards
        #[arg(long, default_value = "miner")]
        miner: String,
        /// Override the configured difficulty
        #[arg(long)]
        difficulty: Option<u32>,
        /// Give up on a block after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Transfers to submit before mining, as FROM:TO:AMOUNT
        #[arg(long = "transfer", value_parser = parse_transfer)]
        transfers: Vec<(String, String, Amount)>,
    },
    /// Forge blocks with proof of stake
    Pos {
        /// Number of blocks to forge
        #[arg(long, default_value_t = 3)]
        blocks: u32,
        /// Stake deposits made before forging, as ADDRESS=AMOUNT
        #[arg(long = "stake", value_parser = parse_deposit)]
        stakes: Vec<(String, Amount)>,
        /// Transfers to submit before forging, as FROM:TO:AMOUNT
        #[arg(long = "transfer", value_parser = parse_transfer)]
        transfers: Vec<(String, String, Amount)>,
    },
    /// Mine a short chain, optionally tamper with one block, then validate it
    Validate {
        /// Number of blocks to mine
        #[arg(long, default_value_t = 3)]
        blocks: u32,
        /// Shift this block's timestamp before validating
        #[arg(long)]
        tamper: Option<usize>,
    },
    /// Print the effective configuration
    Config,
}

fn parse_amount(s: &str) -> Result<Amount, String> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("invalid amount '{}': {}", s, e))?;
    Amount::checked_from_num(value).ok_or_else(|| {
        format!(
            "amount '{}' is out of range ({} to {})",
            s,
            Amount::MIN,
            Amount::MAX
        )
    })
}

fn parse_deposit(s: &str) -> Result<(String, Amount), String> {
    let (address, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ADDRESS=AMOUNT, got '{}'", s))?;
    Ok((address.to_string(), parse_amount(amount)?))
}

fn parse_transfer(s: &str) -> Result<(String, String, Amount), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("expected FROM:TO:AMOUNT, got '{}'", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string(), parse_amount(parts[2])?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Pow {
            blocks,
            miner,
            difficulty,
            timeout,
            transfers,
        } => run_pow(&config, blocks, &miner, difficulty, timeout.map(Duration::from_secs), &transfers)?,
        Commands::Pos {
            blocks,
            stakes,
            transfers,
        } => run_pos(&config, blocks, &stakes, &transfers)?,
        Commands::Validate { blocks, tamper } => run_validate(&config, blocks, tamper)?,
        Commands::Config => print_config(&config),
    }

    Ok(())
}

fn submit_transfers<C: Consensus>(chain: &mut Blockchain<C>, transfers: &[(String, String, Amount)]) {
    for (from, to, amount) in transfers {
        match chain.create_transaction(Some(from.clone()), to.as_str(), *amount) {
            Ok(id) => println!("{} {} → {} ({}) {}", "📨".green(), from, to, amount, id.dimmed()),
            Err(e) => println!("{} {} → {}: {}", "✗ rejected".red(), from, to, e),
        }
    }
}

fn run_pow(
    config: &Config,
    blocks: u32,
    miner: &str,
    difficulty: Option<u32>,
    timeout: Option<Duration>,
    transfers: &[(String, String, Amount)],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config.clone();
    if let Some(difficulty) = difficulty {
        config.pow.difficulty = difficulty;
        config.validate()?;
    }
    let mut chain = Blockchain::<ProofOfWork>::from_config(&config)?;

    println!("{}", "⛏️  Proof-of-Work".bright_cyan().bold());
    println!("{}", format!("difficulty {} · reward {}", chain.difficulty(), chain.block_reward).dimmed());
    println!();

    submit_transfers(&mut chain, transfers);

    for _ in 0..blocks {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
        spinner.enable_steady_tick(Duration::from_millis(100));

        let started = Instant::now();
        let mut job = chain.start_mining(miner);
        let mined = loop {
            if let Some(result) = job.try_result() {
                break result;
            }
            if timeout.is_some_and(|limit| started.elapsed() > limit) {
                job.cancel();
            }
            spinner.set_message(format!("mining block #{} · {} nonces tried", chain.len(), job.attempts()));
            std::thread::sleep(Duration::from_millis(50));
        };
        spinner.finish_and_clear();

        let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
        match mined {
            Ok(block) => {
                let block = chain.apply_block(block)?;
                let nonce = block.header.nonce().unwrap_or_default();
                println!(
                    "{} block #{} {} nonce {} in {}",
                    "✅".green(),
                    block.header.index,
                    block.hash.bright_white(),
                    nonce,
                    humantime::format_duration(elapsed)
                );
            }
            Err(ChainError::MiningCancelled) => {
                println!("{} gave up after {}", "⏱".yellow(), humantime::format_duration(elapsed));
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    print_summary(&chain);
    Ok(())
}

fn run_pos(
    config: &Config,
    blocks: u32,
    stakes: &[(String, Amount)],
    transfers: &[(String, String, Amount)],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut chain = Blockchain::<ProofOfStake>::from_config(config)?;

    println!("{}", "🥩 Proof-of-Stake".bright_magenta().bold());
    println!(
        "{}",
        format!("minimum stake {} · reward {}", chain.minimum_stake(), chain.block_reward).dimmed()
    );
    println!();

    for (address, amount) in stakes {
        match chain.stake(address, *amount) {
            Ok(total) => println!("{} {} staked {} (total {})", "🔒".green(), address, amount, total),
            Err(e) => println!("{} {}: {}", "✗ stake rejected".red(), address, e),
        }
    }
    submit_transfers(&mut chain, transfers);

    for _ in 0..blocks {
        match chain.forge_block() {
            Ok(block) => {
                let validator = match &block.header.seal {
                    Seal::Stake { validator, .. } => validator.as_str(),
                    Seal::Work { .. } => "?",
                };
                println!(
                    "{} block #{} {} forged by {}",
                    "✅".green(),
                    block.header.index,
                    block.hash.bright_white(),
                    validator.bright_yellow()
                );
            }
            Err(e) => {
                println!("{} {}", "✗ forging failed:".red(), e);
                break;
            }
        }
    }

    if !chain.validators().is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                header_cell("Validator"),
                header_cell("Stake"),
                header_cell("Share"),
            ]);
        let total = chain.get_total_stake();
        for validator in chain.validators() {
            let share = if total > Amount::ZERO {
                (validator.stake / total).to_num::<f64>() * 100.0
            } else {
                0.0
            };
            table.add_row(vec![
                Cell::new(&validator.address).fg(TableColor::Yellow),
                Cell::new(validator.stake).fg(TableColor::White),
                Cell::new(format!("{:.1}%", share)).fg(TableColor::Grey),
            ]);
        }
        println!();
        println!("{}", table);
    }

    print_summary(&chain);
    Ok(())
}

fn run_validate(config: &Config, blocks: u32, tamper: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let mut chain = Blockchain::<ProofOfWork>::from_config(config)?;

    println!("{}", "🔍 Chain validation".bright_cyan().bold());
    for _ in 0..blocks {
        chain.seal_pending_block("miner")?;
    }
    println!("mined {} blocks at difficulty {}", blocks, chain.difficulty());

    if let Some(index) = tamper {
        let block = chain
            .blocks
            .get_mut(index)
            .ok_or_else(|| format!("no block #{} to tamper with", index))?;
        block.header.timestamp += 1;
        println!("{} shifted timestamp of block #{}", "✎".yellow(), index);
    }

    print_summary(&chain);
    Ok(())
}

fn header_cell(title: &str) -> Cell {
    Cell::new(title).fg(TableColor::Cyan).add_attribute(Attribute::Bold)
}

fn print_summary<C: Consensus>(chain: &Blockchain<C>) {
    let mut balances: Vec<_> = chain.ledger.balances.iter().collect();
    balances.sort_by(|a, b| a.0.cmp(b.0));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![header_cell("Address"), header_cell("Balance")]);
    for (address, balance) in balances {
        let color = if *balance < Amount::ZERO {
            TableColor::Red
        } else {
            TableColor::White
        };
        table.add_row(vec![Cell::new(address), Cell::new(balance).fg(color)]);
    }

    println!();
    println!("{}", table);
    println!();
    println!("Blocks:   {}", chain.len());
    println!("Pending:  {}", chain.pending_len());
    match chain.validate_chain() {
        Ok(()) => println!("Chain:    {}", "valid".green().bold()),
        Err(e) => println!("Chain:    {} ({})", "INVALID".red().bold(), e),
    }
}

fn print_config(config: &Config) {
    println!("{}", "Effective configuration".bright_cyan().bold());
    println!("  chain.block_reward     = {}", config.chain.block_reward);
    println!("  chain.mempool_capacity = {}", config.chain.mempool_capacity);
    println!("  pow.difficulty         = {}", config.pow.difficulty);
    println!("  pos.minimum_stake      = {}", config.pos.minimum_stake);
    for (address, balance) in &config.chain.initial_balances {
        println!("  initial {:<14} = {}", address, balance);
    }
}
