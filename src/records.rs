// 🧾 Record types - typed rows for the two tables that carry user edits
//
// transaction_files: one row per source file, keyed by its path.
// transactions:      one row per parsed transaction, keyed by its source
//                    file plus a locally assigned ordinal pair.
//
// Editable columns are an explicit enum per record type. Everything else
// on a row is regenerated on every run and never carried forward.

use crate::error::{ClerkError, Result};
use crate::files::FileMetadata;
use crate::identity::{CanonicalPath, JoinKey, TransactionOrdinal};
use crate::revision::RevisionId;
use crate::table::{RowView, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// RECORD TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    TransactionFiles,
    Transactions,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::TransactionFiles => "transaction_files",
            RecordType::Transactions => "transactions",
        }
    }

    /// Headers of the user-writable columns for this record type
    pub fn editable_headers(&self) -> Vec<&'static str> {
        match self {
            RecordType::TransactionFiles => headers::<TransactionFileColumn>(),
            RecordType::Transactions => headers::<TransactionColumn>(),
        }
    }
}

fn headers<C: EditableColumn>() -> Vec<&'static str> {
    C::ALL.iter().map(|c| c.header()).collect()
}

impl FromStr for RecordType {
    type Err = ClerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transaction_files" => Ok(RecordType::TransactionFiles),
            "transactions" => Ok(RecordType::Transactions),
            other => Err(ClerkError::UnknownRecordType(other.to_string())),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// EDITABLE COLUMNS
// ============================================================================

/// A user-writable column of some record type.
pub trait EditableColumn: Copy + Ord + fmt::Debug + 'static {
    const ALL: &'static [Self];

    /// Column header as exported.
    fn header(self) -> &'static str;

    fn from_header(header: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.header() == header)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransactionFileColumn {
    Ignore,
    AccountProvider,
    Account,
    ContentType,
    AccountCurrency,
}

impl EditableColumn for TransactionFileColumn {
    const ALL: &'static [Self] = &[
        TransactionFileColumn::Ignore,
        TransactionFileColumn::AccountProvider,
        TransactionFileColumn::Account,
        TransactionFileColumn::ContentType,
        TransactionFileColumn::AccountCurrency,
    ];

    fn header(self) -> &'static str {
        match self {
            TransactionFileColumn::Ignore => "Ignore",
            TransactionFileColumn::AccountProvider => "Account provider",
            TransactionFileColumn::Account => "Account",
            TransactionFileColumn::ContentType => "Content type",
            TransactionFileColumn::AccountCurrency => "Account currency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransactionColumn {
    IncludeInExpenseReport,
    ExpenseReportReceiver,
    ExpenseReport,
    ExpenseReportAccountingPeriod,
    Walletsharing,
    RealDateCorrected,
    DaysBetweenRealAndBankDates,
    DocSource,
    DocStatus,
    Doc,
    Clarification,
}

impl EditableColumn for TransactionColumn {
    const ALL: &'static [Self] = &[
        TransactionColumn::IncludeInExpenseReport,
        TransactionColumn::ExpenseReportReceiver,
        TransactionColumn::ExpenseReport,
        TransactionColumn::ExpenseReportAccountingPeriod,
        TransactionColumn::Walletsharing,
        TransactionColumn::RealDateCorrected,
        TransactionColumn::DaysBetweenRealAndBankDates,
        TransactionColumn::DocSource,
        TransactionColumn::DocStatus,
        TransactionColumn::Doc,
        TransactionColumn::Clarification,
    ];

    fn header(self) -> &'static str {
        match self {
            TransactionColumn::IncludeInExpenseReport => "Include in expense report",
            TransactionColumn::ExpenseReportReceiver => "Expense report receiver",
            TransactionColumn::ExpenseReport => "Expense report",
            TransactionColumn::ExpenseReportAccountingPeriod => "Expense report accounting period",
            TransactionColumn::Walletsharing => "Walletsharing",
            TransactionColumn::RealDateCorrected => "Real Date (Corrected)",
            TransactionColumn::DaysBetweenRealAndBankDates => "Days between real and bank dates",
            TransactionColumn::DocSource => "Doc Source",
            TransactionColumn::DocStatus => "Doc Status",
            TransactionColumn::Doc => "Doc",
            TransactionColumn::Clarification => "Clarification",
        }
    }
}

/// `"<header> (<revision>)"`, the exported name of a revision's edit column.
pub fn suffixed_header(header: &str, revision: &RevisionId) -> String {
    format!("{} ({})", header, revision)
}

/// Split `"<header> (<revision>)"` when `<header>` is an editable column.
fn split_suffixed<C: EditableColumn>(column: &str) -> Option<(C, RevisionId)> {
    let inner = column.strip_suffix(')')?;
    let open = inner.rfind(" (")?;
    let column_header = &inner[..open];
    let revision = &inner[open + 2..];
    if revision.is_empty() {
        return None;
    }
    C::from_header(column_header).map(|c| (c, RevisionId::new(revision)))
}

// ============================================================================
// EDITS
// ============================================================================

/// Values of the editable columns of one row. A column that is absent is
/// null ("no edit yet").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edits<C: EditableColumn> {
    values: BTreeMap<C, String>,
}

impl<C: EditableColumn> Default for Edits<C> {
    fn default() -> Self {
        Edits {
            values: BTreeMap::new(),
        }
    }
}

impl<C: EditableColumn> Edits<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set one column
    pub fn with(mut self, column: C, value: &str) -> Self {
        self.set(column, Some(value.to_string()));
        self
    }

    pub fn get(&self, column: C) -> Option<&str> {
        self.values.get(&column).map(String::as_str)
    }

    /// Empty strings count as null.
    pub fn set(&mut self, column: C, value: Option<String>) {
        match value.filter(|v| !v.is_empty()) {
            Some(v) => {
                self.values.insert(column, v);
            }
            None => {
                self.values.remove(&column);
            }
        }
    }

    pub fn is_null(&self, column: C) -> bool {
        !self.values.contains_key(&column)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (C, &str)> {
        self.values.iter().map(|(c, v)| (*c, v.as_str()))
    }

    /// Read the unsuffixed editable columns of a table row.
    fn from_row(row: &RowView<'_>) -> Self {
        let mut edits = Edits::new();
        for column in C::ALL {
            edits.set(*column, row.get(column.header()).map(str::to_string));
        }
        edits
    }
}

// ============================================================================
// RECORD TRAIT
// ============================================================================

/// A typed row of one record type.
pub trait Record: Clone + fmt::Debug {
    type Column: EditableColumn;

    const RECORD_TYPE: RecordType;

    /// Root-relative path of the file this row came from.
    fn canonical_path(&self) -> CanonicalPath;

    /// Key the merger joins on.
    fn join_key(&self) -> JoinKey;

    /// Point the row's path columns at `path`.
    fn relocate(&mut self, path: &CanonicalPath);

    fn edits(&self) -> &Edits<Self::Column>;

    fn edits_mut(&mut self) -> &mut Edits<Self::Column>;

    /// Regenerable cells, in export order.
    fn base_cells(&self) -> Vec<(String, Option<String>)>;

    /// Build from an exported row. Errors carry a human-readable reason.
    fn from_row(row: &RowView<'_>) -> std::result::Result<Self, String>;
}

/// A row read back from a snapshot, together with the per-revision edit
/// columns that snapshot itself carried (present when it was exported with
/// unmerged edits kept).
#[derive(Debug, Clone)]
pub struct SnapshotRow<R: Record> {
    pub row: R,
    pub carried: BTreeMap<RevisionId, Edits<R::Column>>,
}

/// Map an exported snapshot table onto typed rows.
pub fn rows_from_table<R: Record>(table: &Table, source: &Path) -> Result<Vec<SnapshotRow<R>>> {
    let suffixed: Vec<(usize, R::Column, RevisionId)> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| R::Column::from_header(name).is_none())
        .filter_map(|(i, name)| split_suffixed::<R::Column>(name).map(|(c, rev)| (i, c, rev)))
        .collect();

    table
        .iter()
        .map(|view| {
            let row = R::from_row(&view)
                .map_err(|reason| ClerkError::table(source, format!("row {}: {}", view.index() + 2, reason)))?;

            let mut carried: BTreeMap<RevisionId, Edits<R::Column>> = BTreeMap::new();
            let cells: Vec<Option<&str>> = view.cells().map(|(_, v)| v).collect();
            for (index, column, revision) in &suffixed {
                if let Some(value) = cells[*index] {
                    carried
                        .entry(revision.clone())
                        .or_default()
                        .set(*column, Some(value.to_string()));
                }
            }

            Ok(SnapshotRow { row, carried })
        })
        .collect()
}

fn required<'a>(row: &RowView<'a>, column: &str) -> std::result::Result<&'a str, String> {
    row.get(column).ok_or_else(|| format!("missing '{}'", column))
}

// ============================================================================
// TRANSACTION FILES
// ============================================================================

pub const FILE_NAME: &str = "File name";
pub const FILE_PATH: &str = "File path";
pub const FILE_METADATA: &str = "File metadata";
pub const HISTORY_REFERENCE: &str = "History reference";

/// One source file below `Transactions/`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFileRow {
    pub file_name: String,
    /// Root-relative folder, `@` or `@/...`
    pub file_path: String,
    pub metadata: Option<FileMetadata>,
    /// Revision the row was derived at
    pub history_reference: Option<RevisionId>,
    pub edits: Edits<TransactionFileColumn>,
}

impl TransactionFileRow {
    pub fn new(file_path: &str, file_name: &str) -> Self {
        TransactionFileRow {
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            metadata: None,
            history_reference: None,
            edits: Edits::new(),
        }
    }

    /// Builder pattern: attach edits
    pub fn with_edits(mut self, edits: Edits<TransactionFileColumn>) -> Self {
        self.edits = edits;
        self
    }
}

impl Record for TransactionFileRow {
    type Column = TransactionFileColumn;

    const RECORD_TYPE: RecordType = RecordType::TransactionFiles;

    fn canonical_path(&self) -> CanonicalPath {
        CanonicalPath::from_parts(&self.file_path, &self.file_name)
    }

    fn join_key(&self) -> JoinKey {
        JoinKey::new(self.canonical_path(), None)
    }

    fn relocate(&mut self, path: &CanonicalPath) {
        let (file_path, file_name) = path.parts();
        self.file_path = file_path.to_string();
        self.file_name = file_name.to_string();
    }

    fn edits(&self) -> &Edits<TransactionFileColumn> {
        &self.edits
    }

    fn edits_mut(&mut self) -> &mut Edits<TransactionFileColumn> {
        &mut self.edits
    }

    fn base_cells(&self) -> Vec<(String, Option<String>)> {
        vec![
            (FILE_NAME.to_string(), Some(self.file_name.clone())),
            (FILE_PATH.to_string(), Some(self.file_path.clone())),
            (
                FILE_METADATA.to_string(),
                self.metadata
                    .as_ref()
                    .and_then(|m| serde_json::to_string(m).ok()),
            ),
            (
                HISTORY_REFERENCE.to_string(),
                self.history_reference.as_ref().map(|r| r.to_string()),
            ),
        ]
    }

    fn from_row(row: &RowView<'_>) -> std::result::Result<Self, String> {
        let metadata = match row.get(FILE_METADATA) {
            Some(json) => Some(
                serde_json::from_str(json).map_err(|e| format!("bad '{}': {}", FILE_METADATA, e))?,
            ),
            None => None,
        };

        Ok(TransactionFileRow {
            file_name: required(row, FILE_NAME)?.to_string(),
            file_path: required(row, FILE_PATH)?.to_string(),
            metadata,
            history_reference: row.get(HISTORY_REFERENCE).map(RevisionId::new),
            edits: Edits::from_row(row),
        })
    }
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

pub const SOURCE_FILE_NAME: &str = "Source transaction file: File name";
pub const SOURCE_FILE_PATH: &str = "Source transaction file: File path";
pub const NAIVE_TRANSACTION_ID: &str = "naive_transaction_id";
pub const NAIVE_TRANSACTION_ID_DUPLICATE_NUM: &str = "naive_transaction_id_duplicate_num";

/// One transaction parsed out of a source file. Parsed columns are kept
/// as-is in `fields`; they are regenerated on every run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub source_file_name: String,
    pub source_file_path: String,
    pub ordinal: TransactionOrdinal,
    pub fields: BTreeMap<String, String>,
    pub edits: Edits<TransactionColumn>,
}

impl TransactionRow {
    pub fn new(source_file_path: &str, source_file_name: &str, naive_id: &str, duplicate_num: u32) -> Self {
        TransactionRow {
            source_file_name: source_file_name.to_string(),
            source_file_path: source_file_path.to_string(),
            ordinal: TransactionOrdinal {
                naive_transaction_id: naive_id.to_string(),
                duplicate_num,
            },
            fields: BTreeMap::new(),
            edits: Edits::new(),
        }
    }

    /// Builder pattern: add a parsed column
    pub fn with_field(mut self, column: &str, value: &str) -> Self {
        self.fields.insert(column.to_string(), value.to_string());
        self
    }

    /// Builder pattern: attach edits
    pub fn with_edits(mut self, edits: Edits<TransactionColumn>) -> Self {
        self.edits = edits;
        self
    }
}

fn is_transaction_key_column(column: &str) -> bool {
    matches!(
        column,
        SOURCE_FILE_NAME | SOURCE_FILE_PATH | NAIVE_TRANSACTION_ID | NAIVE_TRANSACTION_ID_DUPLICATE_NUM
    )
}

impl Record for TransactionRow {
    type Column = TransactionColumn;

    const RECORD_TYPE: RecordType = RecordType::Transactions;

    fn canonical_path(&self) -> CanonicalPath {
        CanonicalPath::from_parts(&self.source_file_path, &self.source_file_name)
    }

    fn join_key(&self) -> JoinKey {
        JoinKey::new(self.canonical_path(), Some(self.ordinal.clone()))
    }

    fn relocate(&mut self, path: &CanonicalPath) {
        let (file_path, file_name) = path.parts();
        self.source_file_path = file_path.to_string();
        self.source_file_name = file_name.to_string();
    }

    fn edits(&self) -> &Edits<TransactionColumn> {
        &self.edits
    }

    fn edits_mut(&mut self) -> &mut Edits<TransactionColumn> {
        &mut self.edits
    }

    fn base_cells(&self) -> Vec<(String, Option<String>)> {
        let mut cells = vec![
            (SOURCE_FILE_NAME.to_string(), Some(self.source_file_name.clone())),
            (SOURCE_FILE_PATH.to_string(), Some(self.source_file_path.clone())),
            (
                NAIVE_TRANSACTION_ID.to_string(),
                Some(self.ordinal.naive_transaction_id.clone()),
            ),
            (
                NAIVE_TRANSACTION_ID_DUPLICATE_NUM.to_string(),
                Some(self.ordinal.duplicate_num.to_string()),
            ),
        ];
        cells.extend(self.fields.iter().map(|(k, v)| (k.clone(), Some(v.clone()))));
        cells
    }

    fn from_row(row: &RowView<'_>) -> std::result::Result<Self, String> {
        let duplicate_num = required(row, NAIVE_TRANSACTION_ID_DUPLICATE_NUM)?;
        let duplicate_num: u32 = duplicate_num
            .parse()
            .map_err(|_| format!("bad '{}': {}", NAIVE_TRANSACTION_ID_DUPLICATE_NUM, duplicate_num))?;

        let fields = row
            .cells()
            .filter(|(column, _)| !is_transaction_key_column(column))
            .filter(|(column, _)| TransactionColumn::from_header(column).is_none())
            .filter(|(column, _)| split_suffixed::<TransactionColumn>(column).is_none())
            .filter_map(|(column, value)| value.map(|v| (column.to_string(), v.to_string())))
            .collect();

        Ok(TransactionRow {
            source_file_name: required(row, SOURCE_FILE_NAME)?.to_string(),
            source_file_path: required(row, SOURCE_FILE_PATH)?.to_string(),
            ordinal: TransactionOrdinal {
                naive_transaction_id: required(row, NAIVE_TRANSACTION_ID)?.to_string(),
                duplicate_num,
            },
            fields,
            edits: Edits::from_row(row),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_parsing() {
        assert_eq!(
            "transaction_files".parse::<RecordType>().unwrap(),
            RecordType::TransactionFiles
        );
        assert_eq!("transactions".parse::<RecordType>().unwrap(), RecordType::Transactions);

        let err = "receipts".parse::<RecordType>().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_editable_headers() {
        assert_eq!(
            RecordType::TransactionFiles.editable_headers(),
            vec!["Ignore", "Account provider", "Account", "Content type", "Account currency"]
        );
        assert_eq!(RecordType::Transactions.editable_headers().len(), 11);
    }

    #[test]
    fn test_split_suffixed_handles_parenthesized_header() {
        let (column, revision) =
            split_suffixed::<TransactionColumn>("Real Date (Corrected) (abc1234)").unwrap();
        assert_eq!(column, TransactionColumn::RealDateCorrected);
        assert_eq!(revision.as_str(), "abc1234");

        assert!(split_suffixed::<TransactionColumn>("Amount (Incl. VAT)").is_none());
        assert!(split_suffixed::<TransactionFileColumn>("Account").is_none());
    }

    #[test]
    fn test_empty_string_edit_is_null() {
        let mut edits: Edits<TransactionFileColumn> = Edits::new();
        edits.set(TransactionFileColumn::Account, Some(String::new()));
        assert!(edits.is_null(TransactionFileColumn::Account));
        assert!(edits.is_empty());
    }

    #[test]
    fn test_transaction_file_row_from_table() {
        let mut table = Table::new(vec![
            "File name".into(),
            "File path".into(),
            "Account".into(),
            "Account (abc1234)".into(),
            "File name (abc1234)".into(),
        ]);
        table.push_row(vec![
            Some("bank.csv".into()),
            Some("@/Transactions".into()),
            Some("Checking".into()),
            Some("Savings".into()),
            Some("bank.csv".into()),
        ]);

        let rows = rows_from_table::<TransactionFileRow>(&table, Path::new("x.csv")).unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.row.canonical_path().as_str(), "@/Transactions/bank.csv");
        assert_eq!(row.row.edits.get(TransactionFileColumn::Account), Some("Checking"));

        let carried = &row.carried[&RevisionId::new("abc1234")];
        assert_eq!(carried.get(TransactionFileColumn::Account), Some("Savings"));
    }

    #[test]
    fn test_missing_key_column_is_table_error() {
        let mut table = Table::new(vec!["File name".into()]);
        table.push_row(vec![Some("bank.csv".into())]);

        let err = rows_from_table::<TransactionFileRow>(&table, Path::new("x.csv")).unwrap_err();
        assert!(err.to_string().contains("missing 'File path'"));
    }

    #[test]
    fn test_transaction_row_keeps_parsed_fields() {
        let mut table = Table::new(vec![
            SOURCE_FILE_NAME.into(),
            SOURCE_FILE_PATH.into(),
            NAIVE_TRANSACTION_ID.into(),
            NAIVE_TRANSACTION_ID_DUPLICATE_NUM.into(),
            "Amount (Incl. VAT)".into(),
            "Doc".into(),
        ]);
        table.push_row(vec![
            Some("bank.csv".into()),
            Some("@/Transactions".into()),
            Some("2024-01-02|-45.99".into()),
            Some("1".into()),
            Some("-45.99".into()),
            Some("receipt.pdf".into()),
        ]);

        let rows = rows_from_table::<TransactionRow>(&table, Path::new("t.csv")).unwrap();
        let row = &rows[0].row;

        assert_eq!(row.ordinal.duplicate_num, 1);
        assert_eq!(row.fields.get("Amount (Incl. VAT)").map(String::as_str), Some("-45.99"));
        assert!(!row.fields.contains_key("Doc"));
        assert_eq!(row.edits.get(TransactionColumn::Doc), Some("receipt.pdf"));

        let key = row.join_key();
        assert_eq!(key.ordinal.unwrap().naive_transaction_id, "2024-01-02|-45.99");
    }
}
