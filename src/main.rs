use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clerk_edits::table::SHEET_LABEL;
use clerk_edits::{
    rename_map, revision_of, CsvTables, RecordType, Reconciler, Table, TableStore, Workspace,
};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "clerk",
    version = clerk_edits::VERSION,
    about = "Carry spreadsheet edits across processing runs of a finance workspace"
)]
struct Cli {
    /// Workspace root folder
    #[arg(long, short = 'w', env = "CLERK_WORKSPACE", default_value = ".", global = true)]
    workspace: PathBuf,

    /// Debug logging (CLERK_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the repository and folder layout
    Init,

    /// Commit the files currently in the workspace
    Acknowledge,

    /// List edit snapshots, oldest first
    Snapshots,

    /// Show the file renames between two revisions
    Renames {
        /// Older revision
        from: String,

        /// Newer revision (defaults to HEAD)
        #[arg(long, default_value = "HEAD")]
        to: String,
    },

    /// List the documents in the receipts folder
    Receipts {
        /// Write the listing here instead of printing it
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Build the reconciled table for one record type
    #[command(
        after_help = "EXAMPLES:\n    clerk reconcile transaction_files --save\n    clerk reconcile transactions --current parsed.csv --output out.csv"
    )]
    Reconcile {
        /// transaction_files or transactions
        record_type: String,

        /// Freshly generated rows; transaction_files defaults to a listing
        /// of the transactions folder
        #[arg(long)]
        current: Option<PathBuf>,

        /// Keep per-revision edits older than the merged snapshot
        #[arg(long)]
        keep_unmerged: bool,

        /// Store the result as the snapshot of the current revision
        #[arg(long)]
        save: bool,

        /// Write the result here instead of printing a summary
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("CLERK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "clerk_edits=debug,info"
        } else {
            "clerk_edits=info,warn"
        })
    });

    let format = env::var("CLERK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workspace = Workspace::open(&cli.workspace)
        .with_context(|| format!("opening workspace {}", cli.workspace.display()))?;

    match cli.command {
        Command::Init => run_init(&workspace),
        Command::Acknowledge => run_acknowledge(&workspace),
        Command::Snapshots => run_snapshots(&workspace),
        Command::Renames { from, to } => run_renames(&workspace, &from, &to),
        Command::Receipts { output } => run_receipts(&workspace, output.as_deref()),
        Command::Reconcile {
            record_type,
            current,
            keep_unmerged,
            save,
            output,
        } => run_reconcile(
            &workspace,
            &record_type,
            current.as_deref(),
            keep_unmerged,
            save,
            output.as_deref(),
        ),
    }
}

fn run_init(workspace: &Workspace) -> Result<()> {
    let revision = workspace.current_revision()?;
    println!("✓ Workspace ready at {}", workspace.root().display());
    println!("✓ Current revision: {}", revision);
    Ok(())
}

fn run_acknowledge(workspace: &Workspace) -> Result<()> {
    match workspace.acknowledge_changes()? {
        Some(revision) => println!("✓ Committed current files as {}", revision),
        None => println!("✓ Nothing to commit, still at {}", workspace.current_revision()?),
    }
    Ok(())
}

fn run_snapshots(workspace: &Workspace) -> Result<()> {
    let edits = workspace.edits_folder()?;
    let snapshots = edits.list_snapshots(workspace.history())?;

    if snapshots.is_empty() {
        println!("No snapshots in {}", edits.path().display());
        return Ok(());
    }

    let exports = &workspace.config().exports;
    for snapshot in &snapshots {
        let mut held = Vec::new();
        for record_type in [RecordType::TransactionFiles, RecordType::Transactions] {
            if snapshot.has_export(exports.for_record_type(record_type)) {
                held.push(record_type.as_str());
            }
        }
        println!(
            "{}  {}  [{}]",
            snapshot.revision_time.format("%Y-%m-%d %H:%M"),
            snapshot.revision,
            held.join(", ")
        );
    }
    Ok(())
}

fn run_renames(workspace: &Workspace, from: &str, to: &str) -> Result<()> {
    let history = workspace.history();
    let from = revision_of(history, from).with_context(|| format!("resolving revision {}", from))?;
    let to = revision_of(history, to).with_context(|| format!("resolving revision {}", to))?;

    let renames = rename_map(history, &from, &to)?;
    println!("🔀 Renames {} → {}", from, to);
    for (old, new) in renames.iter() {
        println!("   {} → {}", old, new);
    }
    for path in renames.deleted() {
        println!("   {} (deleted)", path);
    }
    for path in renames.added() {
        println!("   {} (added)", path);
    }
    println!("✓ {} rename(s)", renames.len());
    Ok(())
}

fn run_receipts(workspace: &Workspace, output: Option<&Path>) -> Result<()> {
    let table = workspace.list_receipt_files()?;

    match output {
        Some(path) => {
            CsvTables
                .write_table(&table, path, SHEET_LABEL, true)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("✓ Wrote {} receipt(s) to {}", table.len(), path.display());
        }
        None => {
            println!("🧾 Receipts");
            for row in table.iter() {
                println!(
                    "   {}/{}",
                    row.get("File path").unwrap_or_default(),
                    row.get("File name").unwrap_or_default()
                );
            }
            println!("✓ {} receipt(s)", table.len());
        }
    }
    Ok(())
}

fn run_reconcile(
    workspace: &Workspace,
    record_type: &str,
    current: Option<&Path>,
    keep_unmerged: bool,
    save: bool,
    output: Option<&Path>,
) -> Result<()> {
    let record_type: RecordType = record_type.parse()?;
    let reconciler = workspace.reconciler()?;

    let table = match (record_type, current) {
        (_, Some(path)) => {
            let current = CsvTables
                .read_table(path)
                .with_context(|| format!("reading {}", path.display()))?;
            reconciler.reconcile_table(record_type, &current, path, keep_unmerged, save)?
        }
        (RecordType::TransactionFiles, None) => {
            reconcile_listing(workspace, &reconciler, keep_unmerged, save)?
        }
        (RecordType::Transactions, None) => {
            bail!("--current is required for {}", record_type)
        }
    };

    match output {
        Some(path) => {
            CsvTables
                .write_table(&table, path, SHEET_LABEL, true)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("✓ Wrote {} {} row(s) to {}", table.len(), record_type, path.display());
        }
        None => {
            println!("✓ Reconciled {} {} row(s)", table.len(), record_type);
        }
    }
    if save {
        println!("✓ Saved snapshot for {}", workspace.current_revision()?);
    }
    Ok(())
}

fn reconcile_listing(
    workspace: &Workspace,
    reconciler: &Reconciler<'_>,
    keep_unmerged: bool,
    save: bool,
) -> Result<Table> {
    let rows = workspace.list_transaction_files()?;
    let view = reconciler.reconciled_view(rows, keep_unmerged)?;
    if save {
        Ok(reconciler.save_view(&view)?)
    } else {
        Ok(view.to_table())
    }
}
