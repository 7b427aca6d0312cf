//! CLI for running a bank settlement simulation.

use bank_settlement::dot::{DotProbe, DotWriter};
use bank_settlement::{
    BankError, Executor, LockingExecutor, SequentialExecutor, Workload, WorkloadConfig,
};
use clap::{Parser, ValueEnum};
use settlement_engine::RunAudit;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Manager / executor-pool engine settling disjoint transfers concurrently.
    Locking,
    /// One transfer at a time on the main thread.
    Sequential,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of accounts in the bank
    #[arg(long, default_value_t = 6)]
    accounts: usize,

    /// Number of transfers to generate
    #[arg(long, default_value_t = 1000)]
    transactions: usize,

    /// Number of executor threads (defaults to the number of accounts)
    #[arg(long)]
    executors: Option<usize>,

    /// Seed for the transaction generator (defaults to the current time)
    #[arg(long)]
    seed: Option<u64>,

    /// Opening balance of every account
    #[arg(long, default_value_t = 1000)]
    initial_balance: i64,

    /// Largest transfer amount
    #[arg(long, default_value_t = 100)]
    max_amount: i64,

    /// Probability of a transfer between the "hot" accounts (0.0 to 1.0)
    #[arg(long, default_value_t = 0.0)]
    conflict_factor: f64,

    /// Generate DOT graphs of the state of the bank
    #[arg(long)]
    debug: bool,

    /// Directory for DOT graphs
    #[arg(long, default_value = "dot")]
    dot_dir: PathBuf,

    /// Settlement strategy
    #[arg(long, value_enum, default_value_t = Strategy::Locking)]
    strategy: Strategy,
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let seed = cli.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    });

    let config = WorkloadConfig {
        num_accounts: cli.accounts,
        num_transactions: cli.transactions,
        initial_balance: cli.initial_balance,
        max_amount: cli.max_amount,
        conflict_factor: cli.conflict_factor,
        seed,
    };
    if cli.debug && cli.accounts % 2 != 0 {
        warn!(accounts = cli.accounts, "An odd number of accounts gives a lopsided DOT layout");
    }

    info!(
        accounts = config.num_accounts,
        transactions = config.num_transactions,
        seed,
        "Generating workload"
    );
    let workload = Workload::generate(config)?;
    let ledger = Arc::new(workload.create_ledger());
    let start_sum = ledger.sum();

    let executor: Box<dyn Executor> = match cli.strategy {
        Strategy::Sequential => Box::new(SequentialExecutor::new()),
        Strategy::Locking => {
            let mut executor = LockingExecutor::new(cli.executors.unwrap_or(cli.accounts));
            if cli.debug {
                let writer = DotWriter::new(&cli.dot_dir)?;
                info!(dir = %cli.dot_dir.display(), "Writing DOT graphs");
                executor = executor.with_probe(Arc::new(DotProbe::new(ledger.clone(), writer)));
            }
            Box::new(executor)
        }
    };

    let start = Instant::now();
    let result = executor.execute(ledger.clone(), &workload)?;
    let elapsed = start.elapsed();

    let audit = RunAudit::capture(
        &ledger,
        start_sum,
        workload.expected_transferred(),
        workload.transactions.len(),
        result.successful,
        result.unprocessed,
    );

    println!();
    println!("Strategy\t\t{}", executor.name());
    println!("Expected transferred\t{}", audit.expected_transferred);
    println!("Actual transferred\t{}", audit.actual_transferred);
    println!("Expected sum\t\t{}", audit.expected_sum);
    println!("Actual sum\t\t{}", audit.actual_sum);
    println!("Unprocessed\t\t{}", audit.unprocessed);
    println!("Peak concurrency\t{}", result.peak_concurrency);
    println!("Manager scans\t\t{}", result.scans);
    println!("Elapsed\t\t\t{:.2} ms", elapsed.as_secs_f64() * 1000.0);

    if let Err(violation) = audit.verify() {
        error!("{violation}");
        return Err(BankError::from(violation).into());
    }

    println!("The bank works!");
    Ok(())
}
