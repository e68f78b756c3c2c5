// ⏩ Edit Propagator - carry edits forward across snapshots
//
// Resolution rule per editable cell:
//   1. a value already present on the current row is kept
//   2. otherwise the most recent snapshot with a non-null value wins
//   3. otherwise the cell stays null ("no edit yet")
// Recency beats age, age beats absence. The result only depends on the
// column and the snapshot order, never on row order.

use crate::merge::MergedRow;
use crate::records::{EditableColumn, Record};
use crate::snapshot::SnapshotRef;
use tracing::debug;

/// Fill null editable cells of every row from `snapshots` (oldest first,
/// as `EditsFolder::list_snapshots` returns them). Returns the number of
/// cells filled.
pub fn propagate<R: Record>(rows: &mut [MergedRow<R>], snapshots: &[SnapshotRef]) -> usize {
    let mut filled = 0;

    for row in rows.iter_mut() {
        for column in R::Column::ALL {
            if !row.edits.is_null(*column) {
                continue;
            }

            let value = snapshots
                .iter()
                .rev()
                .find_map(|snapshot| row.edit_at(*column, &snapshot.revision))
                .map(str::to_string);

            if value.is_some() {
                row.edits.set(*column, value);
                filled += 1;
            }
        }
    }

    debug!(
        record_type = %R::RECORD_TYPE,
        rows = rows.len(),
        snapshots = snapshots.len(),
        filled,
        "propagated previous edits"
    );
    filled
}
