// 🧮 Reconciled-View Builder
//
// current rows + most recent snapshot (rename-aware merge)
//              + every other snapshot (edit propagation)
//              = the table handed back to the user for the next round of edits

use crate::config::ExportConfig;
use crate::error::{ClerkError, Result};
use crate::merge::{merge, MergedRow, PriorSnapshot};
use crate::propagate::propagate;
use crate::records::{
    rows_from_table, suffixed_header, EditableColumn, Record, RecordType, TransactionFileRow,
    TransactionRow,
};
use crate::revision::{current_revision, History, RevisionId};
use crate::snapshot::{EditsFolder, SnapshotRef};
use crate::table::{Table, TableStore};
use std::path::Path;
use tracing::info;

// ============================================================================
// RECONCILED VIEW
// ============================================================================

/// The merged, edit-complete rows for one record type.
#[derive(Debug, Clone)]
pub struct ReconciledView<R: Record> {
    /// Revision the view was built at
    pub head: RevisionId,
    /// Snapshot the current rows were joined against, if any
    pub merged_revision: Option<RevisionId>,
    /// Snapshots holding an export for this record type, oldest first
    pub snapshots: Vec<SnapshotRef>,
    pub rows: Vec<MergedRow<R>>,
}

impl<R: Record> ReconciledView<R> {
    /// Current rows (or prior rows whose source disappeared) with resolved
    /// edits applied.
    pub fn resolved_rows(&self) -> Vec<R> {
        self.rows.iter().filter_map(MergedRow::resolved_row).collect()
    }

    /// Export shape: regenerable columns, then the resolved editable
    /// columns, then one `"<column> (<revision>)"` column per editable
    /// column and retained snapshot, oldest snapshot first.
    pub fn to_table(&self) -> Table {
        let rows: Vec<(R, &MergedRow<R>)> = self
            .rows
            .iter()
            .filter_map(|merged| merged.resolved_row().map(|row| (row, merged)))
            .collect();

        let mut base_columns: Vec<String> = Vec::new();
        for (row, _) in &rows {
            for (column, _) in row.base_cells() {
                if !base_columns.contains(&column) {
                    base_columns.push(column);
                }
            }
        }

        let revisions: Vec<&RevisionId> = self
            .snapshots
            .iter()
            .map(|s| &s.revision)
            .filter(|revision| rows.iter().any(|(_, m)| m.edits_by_revision.contains_key(*revision)))
            .collect();

        let mut columns = base_columns.clone();
        columns.extend(R::Column::ALL.iter().map(|c| c.header().to_string()));
        for revision in &revisions {
            columns.extend(
                R::Column::ALL
                    .iter()
                    .map(|c| suffixed_header(c.header(), revision)),
            );
        }

        let mut table = Table::new(columns);
        for (row, merged) in &rows {
            let base = row.base_cells();
            let mut cells: Vec<Option<String>> = base_columns
                .iter()
                .map(|column| {
                    base.iter()
                        .find(|(name, _)| name == column)
                        .and_then(|(_, value)| value.clone())
                })
                .collect();
            cells.extend(
                R::Column::ALL
                    .iter()
                    .map(|c| merged.edits.get(*c).map(str::to_string)),
            );
            for revision in &revisions {
                cells.extend(
                    R::Column::ALL
                        .iter()
                        .map(|c| merged.edit_at(*c, revision).map(str::to_string)),
                );
            }
            table.push_row(cells);
        }
        table
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

/// Builds reconciled views against one workspace's history and edits folder.
pub struct Reconciler<'a> {
    history: &'a dyn History,
    tables: &'a dyn TableStore,
    edits: EditsFolder,
    exports: &'a ExportConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        history: &'a dyn History,
        tables: &'a dyn TableStore,
        edits: EditsFolder,
        exports: &'a ExportConfig,
    ) -> Self {
        Reconciler {
            history,
            tables,
            edits,
            exports,
        }
    }

    /// Snapshots that hold an export for `record_type`, oldest first.
    pub fn snapshots_for(&self, record_type: RecordType) -> Result<Vec<SnapshotRef>> {
        let export_name = self.exports.for_record_type(record_type);
        Ok(self
            .edits
            .list_snapshots(self.history)?
            .into_iter()
            .filter(|s| s.has_export(export_name))
            .collect())
    }

    /// Merge `current_rows` against the most recent snapshot and fill their
    /// editable columns from every snapshot.
    ///
    /// Per-revision edits the merged snapshot itself carried from older
    /// merges are dropped unless `keep_unmerged_previous_edits` is set.
    pub fn reconciled_view<R: Record>(
        &self,
        current_rows: Vec<R>,
        keep_unmerged_previous_edits: bool,
    ) -> Result<ReconciledView<R>> {
        let head = current_revision(self.history)?;
        let snapshots = self.snapshots_for(R::RECORD_TYPE)?;
        let export_name = self.exports.for_record_type(R::RECORD_TYPE);

        let Some(latest) = snapshots.last() else {
            info!(record_type = %R::RECORD_TYPE, "no previous edits to merge");
            return Ok(ReconciledView {
                head,
                merged_revision: None,
                snapshots,
                rows: current_rows.into_iter().map(MergedRow::from_current).collect(),
            });
        };

        let path = latest.export_path(export_name);
        let table = self
            .edits
            .read_snapshot(self.tables, latest, export_name)?
            .ok_or_else(|| ClerkError::table(&path, "snapshot export disappeared"))?;
        let prior = PriorSnapshot {
            reference: latest.clone(),
            rows: rows_from_table::<R>(&table, &path)?,
        };

        let mut rows = merge(self.history, current_rows, &prior)?;
        if !keep_unmerged_previous_edits {
            for row in &mut rows {
                row.edits_by_revision.retain(|revision, _| revision == &latest.revision);
            }
        }
        let filled = propagate(&mut rows, &snapshots);

        info!(
            record_type = %R::RECORD_TYPE,
            merged = %latest.revision,
            rows = rows.len(),
            filled,
            "reconciled previous edits"
        );

        Ok(ReconciledView {
            head,
            merged_revision: Some(latest.revision.clone()),
            snapshots,
            rows,
        })
    }

    /// Export `view` as the snapshot of its head revision. If that snapshot
    /// already exists its content wins and is returned unchanged.
    pub fn save_view<R: Record>(&self, view: &ReconciledView<R>) -> Result<Table> {
        let export_name = self.exports.for_record_type(R::RECORD_TYPE);
        let timestamp = self.history.commit_timestamp(&view.head)?;

        self.edits
            .load_or_create(self.tables, &view.to_table(), export_name, timestamp, &view.head, true)?
            .ok_or_else(|| ClerkError::table(self.edits.path(), "snapshot export missing after creation"))
    }

    /// Table-in, table-out entry point for callers that only know the record
    /// type at runtime.
    pub fn reconcile_table(
        &self,
        record_type: RecordType,
        current: &Table,
        source: &Path,
        keep_unmerged_previous_edits: bool,
        save: bool,
    ) -> Result<Table> {
        match record_type {
            RecordType::TransactionFiles => {
                self.reconcile_table_as::<TransactionFileRow>(current, source, keep_unmerged_previous_edits, save)
            }
            RecordType::Transactions => {
                self.reconcile_table_as::<TransactionRow>(current, source, keep_unmerged_previous_edits, save)
            }
        }
    }

    fn reconcile_table_as<R: Record>(
        &self,
        current: &Table,
        source: &Path,
        keep_unmerged_previous_edits: bool,
        save: bool,
    ) -> Result<Table> {
        let rows = rows_from_table::<R>(current, source)?
            .into_iter()
            .map(|r| r.row)
            .collect();
        let view = self.reconciled_view::<R>(rows, keep_unmerged_previous_edits)?;
        if save {
            self.save_view(&view)
        } else {
            Ok(view.to_table())
        }
    }
}
