// End-to-end reconciliation against a real git-backed workspace.

use clerk_edits::{
    rename_map, Edits, History, RecordType, Table, TransactionFileColumn, TransactionFileRow,
    Workspace,
};
use clerk_edits::git::SHORT_ID_LEN;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ACCOUNT: TransactionFileColumn = TransactionFileColumn::Account;

fn workspace_with(files: &[(&str, &str)]) -> (TempDir, Workspace) {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::open(dir.path()).unwrap();
    for (path, content) in files {
        write(dir.path(), path, content);
    }
    workspace.acknowledge_changes().unwrap();
    (dir, workspace)
}

fn write(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Simulate the user filling in `Account` for `file_name` and saving the
/// result as the snapshot of the current revision.
fn save_with_account(workspace: &Workspace, account_by_file: &[(&str, &str)]) {
    let reconciler = workspace.reconciler().unwrap();
    let rows = workspace
        .list_transaction_files()
        .unwrap()
        .into_iter()
        .map(|row| {
            match account_by_file.iter().find(|(name, _)| *name == row.file_name) {
                Some((_, account)) => row.with_edits(Edits::new().with(ACCOUNT, account)),
                None => row,
            }
        })
        .collect();
    let view = reconciler.reconciled_view(rows, false).unwrap();
    reconciler.save_view(&view).unwrap();
}

fn reconcile(workspace: &Workspace) -> Vec<TransactionFileRow> {
    let reconciler = workspace.reconciler().unwrap();
    let rows = workspace.list_transaction_files().unwrap();
    reconciler
        .reconciled_view(rows, false)
        .unwrap()
        .resolved_rows()
}

fn account_of<'a>(rows: &'a [TransactionFileRow], file_name: &str) -> Option<&'a str> {
    rows.iter()
        .find(|r| r.file_name == file_name)
        .and_then(|r| r.edits.get(ACCOUNT))
}

#[test]
fn edits_survive_a_new_revision_without_renames() {
    let (dir, workspace) = workspace_with(&[("Transactions/f1.csv", "date,amount\n2024-01-02,-4.50\n")]);
    save_with_account(&workspace, &[("f1.csv", "Food")]);

    write(dir.path(), "Transactions/f3.csv", "date,amount\n2024-02-01,-9.00\n");
    assert!(workspace.acknowledge_changes().unwrap().is_some());

    let rows = reconcile(&workspace);
    assert_eq!(rows.len(), 2);
    assert_eq!(account_of(&rows, "f1.csv"), Some("Food"));
    assert_eq!(account_of(&rows, "f3.csv"), None);
}

#[test]
fn edits_follow_a_renamed_file() {
    let (dir, workspace) = workspace_with(&[("Transactions/f1.csv", "date,amount\n2024-01-02,-4.50\n")]);
    save_with_account(&workspace, &[("f1.csv", "Food")]);

    fs::rename(
        dir.path().join("Transactions/f1.csv"),
        dir.path().join("Transactions/f2.csv"),
    )
    .unwrap();
    workspace.acknowledge_changes().unwrap();

    let rows = reconcile(&workspace);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].file_name, "f2.csv");
    assert_eq!(account_of(&rows, "f2.csv"), Some("Food"));
}

#[test]
fn renames_compose_across_commits() {
    let (dir, workspace) = workspace_with(&[("Transactions/a.csv", "date,amount\n2024-01-02,-4.50\n")]);
    save_with_account(&workspace, &[("a.csv", "Travel")]);

    fs::rename(dir.path().join("Transactions/a.csv"), dir.path().join("Transactions/b.csv")).unwrap();
    workspace.acknowledge_changes().unwrap();
    fs::create_dir(dir.path().join("Transactions/2024")).unwrap();
    fs::rename(
        dir.path().join("Transactions/b.csv"),
        dir.path().join("Transactions/2024/c.csv"),
    )
    .unwrap();
    workspace.acknowledge_changes().unwrap();

    let rows = reconcile(&workspace);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].file_path, "@/Transactions/2024");
    assert_eq!(account_of(&rows, "c.csv"), Some("Travel"));
}

#[test]
fn reused_download_name_keeps_edits_on_the_first_file() {
    let (dir, workspace) = workspace_with(&[(
        "Transactions/Transaktioner.csv",
        "date,amount\n2024-01-02,-4.50\n",
    )]);
    let saved_at = workspace.current_revision().unwrap();
    save_with_account(&workspace, &[("Transaktioner.csv", "Checking")]);

    let transactions = dir.path().join("Transactions");
    fs::rename(transactions.join("Transaktioner.csv"), transactions.join("jan.csv")).unwrap();
    workspace.acknowledge_changes().unwrap();
    write(dir.path(), "Transactions/Transaktioner.csv", "date,amount\n2024-02-03,-7.25\n");
    workspace.acknowledge_changes().unwrap();
    fs::rename(transactions.join("Transaktioner.csv"), transactions.join("feb.csv")).unwrap();
    workspace.acknowledge_changes().unwrap();

    let head = workspace.history().head_revision().unwrap();
    let renames = rename_map(workspace.history(), &saved_at, &head).unwrap();
    assert_eq!(
        renames.iter().collect::<Vec<_>>(),
        vec![("Transactions/Transaktioner.csv", "Transactions/jan.csv")]
    );
    assert!(renames.added().contains("Transactions/feb.csv"));

    let rows = reconcile(&workspace);
    assert_eq!(rows.len(), 2);
    assert_eq!(account_of(&rows, "jan.csv"), Some("Checking"));
    assert_eq!(account_of(&rows, "feb.csv"), None);
}

#[test]
fn revisions_keep_their_width_as_history_grows() {
    let (dir, workspace) = workspace_with(&[]);
    for n in 0..20 {
        write(dir.path(), &format!("Transactions/{n}.csv"), &format!("row,{n}\n"));
        workspace.acknowledge_changes().unwrap();
    }
    let widths: Vec<usize> = workspace
        .history()
        .log()
        .unwrap()
        .iter()
        .map(|c| c.revision.as_str().len())
        .collect();
    assert_eq!(widths.len(), 21);
    assert!(widths.iter().all(|w| *w == SHORT_ID_LEN));
}

#[test]
fn edits_of_deleted_files_are_retained() {
    let (dir, workspace) = workspace_with(&[
        ("Transactions/kept.csv", "date,amount\n2024-01-02,-4.50\n"),
        ("Transactions/gone.csv", "date,amount\n2024-03-02,-12.00\n"),
    ]);
    save_with_account(&workspace, &[("kept.csv", "Food"), ("gone.csv", "Rent")]);

    fs::remove_file(dir.path().join("Transactions/gone.csv")).unwrap();
    workspace.acknowledge_changes().unwrap();

    let rows = reconcile(&workspace);
    assert_eq!(rows.len(), 2);
    assert_eq!(account_of(&rows, "kept.csv"), Some("Food"));
    assert_eq!(account_of(&rows, "gone.csv"), Some("Rent"));
}

#[test]
fn saving_twice_at_one_revision_keeps_the_first_snapshot() {
    let (_dir, workspace) = workspace_with(&[("Transactions/f1.csv", "date,amount\n2024-01-02,-4.50\n")]);
    save_with_account(&workspace, &[("f1.csv", "Food")]);

    let edits = workspace.edits_folder().unwrap();
    let snapshots = edits.list_snapshots(workspace.history()).unwrap();
    assert_eq!(snapshots.len(), 1);
    let export = snapshots[0].export_path("Transaction files.csv");
    let before = fs::read(&export).unwrap();

    save_with_account(&workspace, &[("f1.csv", "Groceries")]);

    assert_eq!(fs::read(&export).unwrap(), before);
    assert_eq!(edits.list_snapshots(workspace.history()).unwrap().len(), 1);
    assert_eq!(account_of(&reconcile(&workspace), "f1.csv"), Some("Food"));
}

#[test]
fn reconcile_table_reports_unknown_record_type() {
    let err = "receipts".parse::<RecordType>().unwrap_err();
    assert!(err.is_configuration());

    let (dir, workspace) = workspace_with(&[]);
    let reconciler = workspace.reconciler().unwrap();
    let current = Table::new(vec!["File name".into(), "File path".into()]);
    let table = reconciler
        .reconcile_table(
            RecordType::TransactionFiles,
            &current,
            &dir.path().join("current.csv"),
            false,
            false,
        )
        .unwrap();
    assert!(table.is_empty());
}
