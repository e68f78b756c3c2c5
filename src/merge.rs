// 🔗 Two-Snapshot Merger - outer join of current rows and one prior snapshot
//
// Prior rows are re-keyed onto the head revision through the rename map
// before the join. The join is a full outer join: rows only present in the
// prior snapshot (files since deleted) are kept so their edits are never
// silently lost.

use crate::error::Result;
use crate::identity::{CanonicalPath, JoinKey};
use crate::records::{Edits, Record, SnapshotRow};
use crate::revision::{current_revision, rename_map, History, RenameMap, RevisionId};
use crate::snapshot::SnapshotRef;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

// ============================================================================
// TYPES
// ============================================================================

/// A snapshot read back from disk.
#[derive(Debug, Clone)]
pub struct PriorSnapshot<R: Record> {
    pub reference: SnapshotRef,
    pub rows: Vec<SnapshotRow<R>>,
}

/// The prior side of a joined row.
#[derive(Debug, Clone)]
pub struct PriorRow<R: Record> {
    pub revision: RevisionId,
    pub row: R,
    /// The row's canonical path carried through the rename map
    pub head_corresponding_path: CanonicalPath,
}

/// One row of the combined table.
///
/// `edits_by_revision` replaces the suffixed `"<column> (<revision>)"`
/// columns: it holds the edits each known snapshot had for this row.
/// `edits` is the resolved, unsuffixed set.
#[derive(Debug, Clone)]
pub struct MergedRow<R: Record> {
    pub current: Option<R>,
    pub prior: Option<PriorRow<R>>,
    pub edits_by_revision: BTreeMap<RevisionId, Edits<R::Column>>,
    pub edits: Edits<R::Column>,
}

impl<R: Record> MergedRow<R> {
    fn new(current: Option<R>, prior: Option<(PriorRow<R>, &SnapshotRow<R>)>) -> Self {
        let edits = current.as_ref().map(|r| r.edits().clone()).unwrap_or_default();

        let mut edits_by_revision = BTreeMap::new();
        let prior = prior.map(|(prior_row, snapshot_row)| {
            edits_by_revision.extend(snapshot_row.carried.clone());
            edits_by_revision.insert(prior_row.revision.clone(), prior_row.row.edits().clone());
            prior_row
        });

        MergedRow {
            current,
            prior,
            edits_by_revision,
            edits,
        }
    }

    /// A row with no prior snapshot to join against.
    pub fn from_current(row: R) -> Self {
        Self::new(Some(row), None)
    }

    /// The row's path at the head revision.
    pub fn canonical_path(&self) -> CanonicalPath {
        match (&self.current, &self.prior) {
            (Some(current), _) => current.canonical_path(),
            (None, Some(prior)) => prior.head_corresponding_path.clone(),
            (None, None) => CanonicalPath::from_parts("", ""),
        }
    }

    /// Value a given snapshot had for an editable column.
    pub fn edit_at(&self, column: R::Column, revision: &RevisionId) -> Option<&str> {
        self.edits_by_revision.get(revision)?.get(column)
    }

    /// The current row (or, for a source that disappeared, the prior row
    /// moved to its head path) with the resolved edits applied.
    pub fn resolved_row(&self) -> Option<R> {
        let mut row = match (&self.current, &self.prior) {
            (Some(current), _) => current.clone(),
            (None, Some(prior)) => {
                let mut row = prior.row.clone();
                row.relocate(&prior.head_corresponding_path);
                row
            }
            (None, None) => return None,
        };
        *row.edits_mut() = self.edits.clone();
        Some(row)
    }
}

// ============================================================================
// MERGE
// ============================================================================

/// Join `current_rows` against `prior`, re-keying the prior rows through the
/// renames between the snapshot's revision and the head revision.
pub fn merge<R: Record>(
    history: &dyn History,
    current_rows: Vec<R>,
    prior: &PriorSnapshot<R>,
) -> Result<Vec<MergedRow<R>>> {
    let head = current_revision(history)?;
    let renames = rename_map(history, &prior.reference.revision, &head)?;
    Ok(join(current_rows, prior, &renames))
}

/// Full outer join on the (rewritten) join key.
///
/// Output order: current rows in input order, each followed by any extra
/// matches, then prior-only rows in snapshot order. Duplicate keys join as
/// a cross product.
pub fn join<R: Record>(
    current_rows: Vec<R>,
    prior: &PriorSnapshot<R>,
    renames: &RenameMap,
) -> Vec<MergedRow<R>> {
    let revision = &prior.reference.revision;

    let rewritten: Vec<JoinKey> = prior
        .rows
        .iter()
        .map(|r| r.row.join_key().rewritten(renames))
        .collect();

    let mut by_key: HashMap<&JoinKey, Vec<usize>> = HashMap::new();
    for (index, key) in rewritten.iter().enumerate() {
        by_key.entry(key).or_default().push(index);
    }

    let prior_row = |index: usize| PriorRow {
        revision: revision.clone(),
        row: prior.rows[index].row.clone(),
        head_corresponding_path: rewritten[index].path.clone(),
    };

    let mut matched = vec![false; prior.rows.len()];
    let mut merged = Vec::with_capacity(current_rows.len());
    let mut current_only = 0;

    for row in current_rows {
        match by_key.get(&row.join_key()) {
            Some(indices) => {
                for &index in indices {
                    matched[index] = true;
                    merged.push(MergedRow::new(
                        Some(row.clone()),
                        Some((prior_row(index), &prior.rows[index])),
                    ));
                }
            }
            None => {
                current_only += 1;
                merged.push(MergedRow::new(Some(row), None));
            }
        }
    }

    let mut prior_only = 0;
    for (index, was_matched) in matched.iter().enumerate() {
        if !was_matched {
            prior_only += 1;
            merged.push(MergedRow::new(None, Some((prior_row(index), &prior.rows[index]))));
        }
    }

    debug!(
        revision = %revision,
        record_type = %R::RECORD_TYPE,
        rows = merged.len(),
        current_only,
        prior_only,
        renames = renames.len(),
        "merged prior snapshot"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{TransactionColumn, TransactionFileColumn, TransactionFileRow, TransactionRow};
    use crate::revision::Modification;
    use crate::testing::MemoryHistory;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn snapshot<R: Record>(revision: &str, rows: Vec<R>) -> PriorSnapshot<R> {
        PriorSnapshot {
            reference: SnapshotRef {
                directory: PathBuf::from(format!("Edits/2024-01-01 0900 ({})", revision)),
                revision: RevisionId::new(revision),
                revision_time: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            },
            rows: rows
                .into_iter()
                .map(|row| SnapshotRow {
                    row,
                    carried: BTreeMap::new(),
                })
                .collect(),
        }
    }

    fn food(path: &str, name: &str) -> TransactionFileRow {
        TransactionFileRow::new(path, name)
            .with_edits(Edits::new().with(TransactionFileColumn::Account, "Food"))
    }

    #[test]
    fn test_matching_row_gets_prior_edits() {
        let history = MemoryHistory::new().commit("abc123", vec![]);
        let prior = snapshot("abc123", vec![food("@", "f1.csv")]);

        let merged = merge(&history, vec![TransactionFileRow::new("@", "f1.csv")], &prior).unwrap();

        assert_eq!(merged.len(), 1);
        assert!(merged[0].current.is_some());
        assert_eq!(
            merged[0].edit_at(TransactionFileColumn::Account, &RevisionId::new("abc123")),
            Some("Food")
        );
        // not resolved until propagation
        assert!(merged[0].edits.is_empty());
    }

    #[test]
    fn test_renamed_file_joins_through_rename_map() {
        let history = MemoryHistory::new()
            .commit("abc123", vec![Modification::added("f1.csv")])
            .commit("def456", vec![Modification::renamed("f1.csv", "f2.csv")]);
        let prior = snapshot("abc123", vec![food("@", "f1.csv")]);

        let merged = merge(&history, vec![TransactionFileRow::new("@", "f2.csv")], &prior).unwrap();

        assert_eq!(merged.len(), 1);
        let prior_row = merged[0].prior.as_ref().unwrap();
        assert_eq!(prior_row.head_corresponding_path.as_str(), "@/f2.csv");
        assert_eq!(prior_row.row.file_name, "f1.csv");
        assert_eq!(merged[0].canonical_path().as_str(), "@/f2.csv");
    }

    #[test]
    fn test_outer_join_completeness() {
        let prior = snapshot("abc123", vec![food("@", "kept.csv"), food("@", "deleted.csv")]);
        let current = vec![
            TransactionFileRow::new("@", "kept.csv"),
            TransactionFileRow::new("@", "new.csv"),
        ];

        let merged = join(current, &prior, &RenameMap::default());
        let paths: Vec<(String, bool, bool)> = merged
            .iter()
            .map(|m| (m.canonical_path().to_string(), m.current.is_some(), m.prior.is_some()))
            .collect();

        assert_eq!(
            paths,
            vec![
                ("@/kept.csv".to_string(), true, true),
                ("@/new.csv".to_string(), true, false),
                ("@/deleted.csv".to_string(), false, true),
            ]
        );

        let deleted = &merged[2];
        assert_eq!(
            deleted.edit_at(TransactionFileColumn::Account, &RevisionId::new("abc123")),
            Some("Food")
        );
        assert_eq!(deleted.resolved_row().unwrap().file_name, "deleted.csv");
    }

    #[test]
    fn test_prior_only_row_exported_under_head_path() {
        let prior = snapshot("abc123", vec![food("@/Transactions", "f1.csv")]);
        let mut renames = RenameMap::default();
        renames.apply_commit(&[Modification::renamed("Transactions/f1.csv", "Archive/2023/f1-old.csv")]);

        let merged = join(Vec::new(), &prior, &renames);
        let row = merged[0].resolved_row().unwrap();

        assert_eq!(row.file_path, "@/Archive/2023");
        assert_eq!(row.file_name, "f1-old.csv");
        assert_eq!(row.canonical_path(), merged[0].canonical_path());
        // the snapshot side keeps the name it was exported under
        assert_eq!(merged[0].prior.as_ref().unwrap().row.file_name, "f1.csv");
    }

    #[test]
    fn test_transactions_join_on_ordinal_too() {
        let edited = TransactionRow::new("@/Transactions", "bank.csv", "t1", 0)
            .with_edits(Edits::new().with(TransactionColumn::Doc, "receipt-1.pdf"));
        let other = TransactionRow::new("@/Transactions", "bank.csv", "t1", 1)
            .with_edits(Edits::new().with(TransactionColumn::Doc, "receipt-2.pdf"));
        let prior = snapshot("abc123", vec![edited, other]);

        let current = vec![
            TransactionRow::new("@/Transactions", "bank.csv", "t1", 1),
            TransactionRow::new("@/Transactions", "bank.csv", "t1", 0),
        ];
        let merged = join(current, &prior, &RenameMap::default());

        assert_eq!(merged.len(), 2);
        let rev = RevisionId::new("abc123");
        assert_eq!(merged[0].edit_at(TransactionColumn::Doc, &rev), Some("receipt-2.pdf"));
        assert_eq!(merged[1].edit_at(TransactionColumn::Doc, &rev), Some("receipt-1.pdf"));
    }

    #[test]
    fn test_duplicate_prior_keys_cross_join() {
        let prior = snapshot("abc123", vec![food("@", "f1.csv"), food("@", "f1.csv")]);
        let merged = join(vec![TransactionFileRow::new("@", "f1.csv")], &prior, &RenameMap::default());
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|m| m.current.is_some() && m.prior.is_some()));
    }

    #[test]
    fn test_carried_edits_come_along() {
        let mut prior = snapshot("def456", vec![TransactionFileRow::new("@", "f1.csv")]);
        prior.rows[0].carried.insert(
            RevisionId::new("abc123"),
            Edits::new().with(TransactionFileColumn::Ignore, "yes"),
        );

        let merged = join(vec![TransactionFileRow::new("@", "f1.csv")], &prior, &RenameMap::default());

        assert_eq!(
            merged[0].edit_at(TransactionFileColumn::Ignore, &RevisionId::new("abc123")),
            Some("yes")
        );
        assert!(merged[0].edits_by_revision.contains_key(&RevisionId::new("def456")));
    }
}
