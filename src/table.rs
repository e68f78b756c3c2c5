// 📋 Tabular files - the export format snapshots are written in
//
// A Table is the loosely typed, on-disk shape of a snapshot: ordered column
// names and rows of optional cells. Typed rows are mapped onto it in
// `records`. Empty cells are nulls.

use crate::error::{ClerkError, Result};
use std::path::Path;
use tracing::trace;

/// Sheet label used for every snapshot export
pub const SHEET_LABEL: &str = "Data";

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with nulls, extra cells dropped.
    pub fn push_row(&mut self, mut cells: Vec<Option<String>>) {
        cells.resize(self.columns.len(), None);
        self.rows.push(cells);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        (index < self.rows.len()).then_some(RowView { table: self, index })
    }

    pub fn iter(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.rows.len()).map(move |index| RowView { table: self, index })
    }
}

/// Borrowed view of one table row with lookup by column name.
#[derive(Clone, Copy)]
pub struct RowView<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> RowView<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let position = self.table.column_index(column)?;
        self.table.rows[self.index][position]
            .as_deref()
            .filter(|v| !v.is_empty())
    }

    /// Cells paired with their column names, in column order.
    pub fn cells(&self) -> impl Iterator<Item = (&'a str, Option<&'a str>)> {
        let table = self.table;
        table
            .columns
            .iter()
            .zip(table.rows[self.index].iter())
            .map(|(column, cell)| (column.as_str(), cell.as_deref().filter(|v| !v.is_empty())))
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

// ============================================================================
// TABLE STORE
// ============================================================================

/// Reads and writes exported tables.
pub trait TableStore {
    /// Write `table` to `path`. `frozen_header` asks for the header row to
    /// stay pinned when the file is opened in a spreadsheet tool.
    fn write_table(&self, table: &Table, path: &Path, sheet_label: &str, frozen_header: bool) -> Result<()>;

    fn read_table(&self, path: &Path) -> Result<Table>;
}

/// CSV-backed table store. The header is always the first line, which is
/// as close to a frozen pane as CSV gets; the sheet label is not stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTables;

impl TableStore for CsvTables {
    fn write_table(&self, table: &Table, path: &Path, sheet_label: &str, frozen_header: bool) -> Result<()> {
        trace!(path = %path.display(), sheet_label, frozen_header, "writing csv table");

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&table.columns)?;
        for row in &table.rows {
            writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        writer.flush().map_err(|e| ClerkError::io(path, e))?;
        Ok(())
    }

    fn read_table(&self, path: &Path) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(columns);

        for record in reader.records() {
            let record = record?;
            table.push_row(
                record
                    .iter()
                    .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                    .collect(),
            );
        }

        Ok(table)
    }
}
