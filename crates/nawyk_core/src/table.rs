use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, TableError, ValidationError};
use crate::habit::Habit;
use crate::instance::HabitInstance;
use crate::notifications::TableObserver;
use crate::store::CsvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    Habits,
    Instances,
}

/// Display-ready grid of string cells derived from a record collection.
///
/// The projection is a full snapshot: row order is the insertion order of the
/// backing records, and consumers only ever see text, never typed values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableProjection {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableProjection {
    pub fn with_headers(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|header| header.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> Result<&str, TableError> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map(String::as_str)
            .ok_or(TableError::OutOfBounds {
                row,
                col,
                rows: self.row_count(),
                cols: self.column_count(),
            })
    }
}

/// Conversion between a domain record and one row of string cells.
pub trait TableRecord: Sized {
    fn kind() -> TableKind;
    fn headers() -> &'static [&'static str];
    fn to_cells(&self) -> Vec<String>;
    fn from_cells(cells: &[String]) -> Result<Self, ValidationError>;
}

impl TableRecord for Habit {
    fn kind() -> TableKind {
        TableKind::Habits
    }

    fn headers() -> &'static [&'static str] {
        &["Name", "Type", "Weekly Frequency", "Instances"]
    }

    fn to_cells(&self) -> Vec<String> {
        vec![
            self.name().to_string(),
            self.category().to_string(),
            self.weekly_frequency().to_string(),
            self.instance_count().to_string(),
        ]
    }

    fn from_cells(cells: &[String]) -> Result<Self, ValidationError> {
        let name = required_cell(cells, 0, Self::headers())?;
        let category = required_cell(cells, 1, Self::headers())?;
        let frequency: i64 =
            parse_number(required_cell(cells, 2, Self::headers())?, "Weekly Frequency")?;
        let count: u64 = parse_number(required_cell(cells, 3, Self::headers())?, "Instances")?;
        let mut habit = Habit::new(name, category, frequency)?;
        habit.set_instance_count(count);
        Ok(habit)
    }
}

impl TableRecord for HabitInstance {
    fn kind() -> TableKind {
        TableKind::Instances
    }

    fn headers() -> &'static [&'static str] {
        &["Habit", "Date", "Done?", "Conditions Out of Control?"]
    }

    fn to_cells(&self) -> Vec<String> {
        vec![
            self.habit_name().to_string(),
            self.formatted_date(),
            format_bool(self.done()).to_string(),
            format_bool(self.out_of_control()).to_string(),
        ]
    }

    fn from_cells(cells: &[String]) -> Result<Self, ValidationError> {
        let habit = required_cell(cells, 0, Self::headers())?;
        let date = required_cell(cells, 1, Self::headers())?;
        let done = parse_bool_cell("Done?", required_cell(cells, 2, Self::headers())?)?;
        // Older exports predate the out-of-control column.
        let out_of_control = match cells.get(3) {
            Some(value) => parse_bool_cell("Conditions Out of Control?", value)?,
            None => false,
        };
        HabitInstance::new(habit, date, done, out_of_control)
    }
}

/// Bridges an ordered record collection to a grid of string cells.
///
/// Mutation and projection rebuild are one atomic step: by the time `append`
/// or `update` returns, the projection reflects the new records and every
/// observer has been told.
pub struct TableAdapter<R: TableRecord> {
    records: Vec<R>,
    projection: TableProjection,
    observers: Vec<Box<dyn TableObserver>>,
}

impl<R: TableRecord> TableAdapter<R> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            projection: TableProjection::with_headers(R::headers()),
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn TableObserver>) {
        self.observers.push(observer);
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn projection(&self) -> &TableProjection {
        &self.projection
    }

    pub fn row_count(&self) -> usize {
        self.projection.row_count()
    }

    pub fn column_count(&self) -> usize {
        self.projection.column_count()
    }

    pub fn cell(&self, row: usize, col: usize) -> Result<&str, TableError> {
        self.projection.cell(row, col)
    }

    pub fn column_header(&self, col: usize) -> Option<&str> {
        self.projection.headers.get(col).map(String::as_str)
    }

    /// 1-based row label, the way a table view numbers its rows.
    pub fn row_header(&self, row: usize) -> Option<String> {
        (row < self.row_count()).then(|| (row + 1).to_string())
    }

    pub fn append(&mut self, record: R) {
        self.records.push(record);
        self.refresh();
    }

    /// Wholesale replacement, used by the load path.
    pub fn replace_records(&mut self, records: Vec<R>) {
        self.records = records;
        self.refresh();
    }

    /// Applies an edit to the backing records and refreshes in the same step.
    pub fn update<T>(&mut self, apply: impl FnOnce(&mut [R]) -> T) -> T {
        let out = apply(&mut self.records);
        self.refresh();
        out
    }

    /// Writes the current projection through the handler.
    pub fn export(&self, store: &CsvStore) -> Result<(), PersistenceError> {
        store.save(&self.projection)
    }

    /// Replaces the backing records with the file's contents. The swap and
    /// refresh happen only after every row converted cleanly.
    pub fn import(&mut self, store: &CsvStore) -> Result<(), PersistenceError> {
        let projection = store.load()?;
        let records = records_from_projection::<R>(&projection)?;
        self.replace_records(records);
        Ok(())
    }

    /// Rebuilds the projection in full and notifies observers. Idempotent:
    /// without an intervening mutation a second call yields an identical grid.
    pub fn refresh(&mut self) {
        self.projection = TableProjection {
            headers: R::headers().iter().map(|header| header.to_string()).collect(),
            rows: self.records.iter().map(TableRecord::to_cells).collect(),
        };
        for observer in &self.observers {
            observer.table_changed(R::kind());
        }
    }
}

impl<R: TableRecord> Default for TableAdapter<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts projection rows back into records, blaming the 1-based file line
/// (header included) when a row does not validate.
pub(crate) fn records_from_projection<R: TableRecord>(
    projection: &TableProjection,
) -> Result<Vec<R>, PersistenceError> {
    projection
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            R::from_cells(row).map_err(|err| PersistenceError::Corrupt {
                line: index + 2,
                reason: err.to_string(),
            })
        })
        .collect()
}

pub(crate) fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

pub(crate) fn parse_bool_cell(column: &str, value: &str) -> Result<bool, ValidationError> {
    match value.trim() {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        _ => Err(ValidationError::BadCell {
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

fn required_cell<'a>(
    cells: &'a [String],
    index: usize,
    headers: &'static [&'static str],
) -> Result<&'a str, ValidationError> {
    cells
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| ValidationError::MissingColumn {
            column: headers.get(index).copied().unwrap_or("?").to_string(),
        })
}

fn parse_number<T: FromStr>(value: &str, column: &str) -> Result<T, ValidationError> {
    value.trim().parse().map_err(|_| ValidationError::BadCell {
        column: column.to_string(),
        value: value.to_string(),
    })
}
