//! DOT-graph snapshots of the bank, for debugging runs.
//!
//! Accounts are laid out as two rows of boxes; locked accounts are shaded and
//! show their holder. Every settlement in progress is drawn as an edge from the
//! paying account to the receiving one.

use settlement_engine::{Dispatch, ExecutorId, Ledger, LedgerSnapshot, SettlementProbe};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Renders a ledger snapshot as a DOT digraph.
pub fn render(snapshot: &LedgerSnapshot) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_graph(&mut out, snapshot);
    out
}

fn write_graph(out: &mut String, snapshot: &LedgerSnapshot) -> std::fmt::Result {
    writeln!(out, "digraph bank {{")?;
    writeln!(out, "  label=\"transferred: {}\";", snapshot.money_transferred)?;
    writeln!(out, "  node [shape=box];")?;

    let half = snapshot.accounts.len().div_ceil(2);
    for row in snapshot.accounts.chunks(half.max(1)) {
        write!(out, "  {{ rank=same;")?;
        for account in row {
            write!(out, " a{};", account.id)?;
        }
        writeln!(out, " }}")?;
    }

    for account in &snapshot.accounts {
        match account.owner.as_deref().filter(|_| account.locked) {
            Some(owner) => writeln!(
                out,
                "  a{} [label=\"{}\\n{}\\n({})\", style=filled, fillcolor=lightgrey];",
                account.id, account.name, account.balance, owner
            )?,
            None => writeln!(
                out,
                "  a{} [label=\"{}\\n{}\"];",
                account.id, account.name, account.balance
            )?,
        }
    }

    for (_, record) in &snapshot.in_progress {
        writeln!(
            out,
            "  a{} -> a{} [label=\"{} (E{})\"];",
            record.transaction.from,
            record.transaction.to,
            record.transaction.amount,
            record.executor
        )?;
    }

    writeln!(out, "}}")
}

/// Writes numbered DOT files into a directory.
#[derive(Debug)]
pub struct DotWriter {
    dir: PathBuf,
    next: AtomicUsize,
    written: AtomicUsize,
}

impl DotWriter {
    /// Creates the output directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            next: AtomicUsize::new(0),
            written: AtomicUsize::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files successfully written so far.
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Acquire)
    }

    /// Writes `snapshot` to the next `bank_NNNNNN.dot` file and returns its path.
    pub fn write(&self, snapshot: &LedgerSnapshot) -> io::Result<PathBuf> {
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        let path = self.dir.join(format!("bank_{index:06}.dot"));
        fs::write(&path, render(snapshot))?;
        self.written.fetch_add(1, Ordering::AcqRel);
        Ok(path)
    }
}

/// Probe that dumps a DOT snapshot whenever a settlement starts or ends.
pub struct DotProbe {
    ledger: Arc<Ledger>,
    writer: DotWriter,
}

impl DotProbe {
    pub fn new(ledger: Arc<Ledger>, writer: DotWriter) -> Self {
        Self { ledger, writer }
    }

    pub fn writer(&self) -> &DotWriter {
        &self.writer
    }

    fn dump(&self) {
        if let Err(e) = self.writer.write(&self.ledger.snapshot()) {
            warn!(dir = %self.writer.dir().display(), "Failed to write DOT snapshot: {e}");
        }
    }
}

impl SettlementProbe for DotProbe {
    fn on_settle_start(&self, _executor: ExecutorId, _dispatch: &Dispatch) {
        self.dump();
    }

    fn on_settle_end(&self, _executor: ExecutorId, _dispatch: &Dispatch) {
        self.dump();
    }
}
