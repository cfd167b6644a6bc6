//! Tree Repair CLI
//!
//! Operator tool that checks one content tree's nested-set numbering
//! against its parent chain and prints a per-node report. Dry-run by
//! default; `--commit` writes the recomputed numbering back.
//!
//! # Usage
//!
//! ```bash
//! # Report inconsistencies without changing anything
//! cargo run --bin repair-tree -- <node-id> --db regio.db
//!
//! # Fix them
//! cargo run --bin repair-tree -- <node-id> --db regio.db --commit
//! ```
//!
//! `<node-id>` may be any member of the tree; the pass always starts from
//! the located root. Exits non-zero when the node does not exist or the
//! parent chain cannot be walked (missing parent, cycle).
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use regio_core::{DatabaseService, RepairReport, TreeEpochs, TreeRepair, TreeStore, TursoStore};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

#[derive(Parser)]
#[command(
    name = "repair-tree",
    about = "Check and repair the nested-set numbering of a content tree"
)]
struct Args {
    /// Id of any node in the tree to check
    node_id: String,

    /// Write the recomputed numbering back instead of dry-running
    #[arg(long)]
    commit: bool,

    /// Path to the database file
    #[arg(long)]
    db: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    tracing::debug!(db = %args.db.display(), node_id = %args.node_id, "opening database");

    let db = Arc::new(DatabaseService::new(args.db.clone()).await?);
    let store: Arc<dyn TreeStore> = Arc::new(TursoStore::new(db));
    let epochs = Arc::new(TreeEpochs::new());
    let repair = TreeRepair::new(store, epochs);

    let report = repair.check_tree(&args.node_id, args.commit).await?;
    print_report(&report, std::io::stdout().is_terminal());
    Ok(())
}

fn paint(text: &str, color: &str, colorize: bool) -> String {
    if colorize {
        format!("{color}{text}{RESET}")
    } else {
        text.to_string()
    }
}

fn print_report(report: &RepairReport, colorize: bool) {
    println!(
        "Tree {} (root {}), {} nodes checked",
        report.tree_id,
        report.root_id,
        report.checks.len()
    );

    for check in &report.checks {
        if check.is_consistent() {
            println!("  {} {} ({})", paint("ok", GREEN, colorize), check.title, check.id);
            continue;
        }
        println!(
            "  {} {} ({})",
            paint("FIX", RED, colorize),
            check.title,
            check.id
        );
        for diff in &check.diffs {
            println!(
                "      {}: {} -> {}",
                diff.field, diff.stored, diff.proposed
            );
        }
    }

    for orphan in &report.orphans {
        println!(
            "  {} {} ({}) carries tree_id {} but is unreachable from the root",
            paint("ORPHAN", YELLOW, colorize),
            orphan.title,
            orphan.id,
            orphan.tree_id
        );
    }

    let summary = format!(
        "{} inconsistent, {} orphaned",
        report.inconsistent_count(),
        report.orphans.len()
    );
    if report.is_consistent() {
        println!("{}", paint("Tree is consistent.", GREEN, colorize));
    } else if report.committed {
        println!("{summary} {}", paint("(fixed)", GREEN, colorize));
        if !report.orphans.is_empty() {
            println!("Orphans are reported only; re-home or remove them manually.");
        }
    } else {
        println!("{summary} {}", paint("(dry run, use --commit to fix)", YELLOW, colorize));
    }
}
