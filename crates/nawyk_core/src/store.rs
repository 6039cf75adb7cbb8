use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PersistenceError;
use crate::table::TableProjection;

const CSV_EXTENSION: &str = "csv";
const CANONICAL_DELIMITER: char = ',';
/// Early exports were `;`-delimited; accepted on load, never written.
const LEGACY_DELIMITER: char = ';';

/// Durable CSV round-trip for one table projection.
///
/// The store owns its path; callers hand projections in and out, never live
/// collections. A save lands in a temp file first and is renamed into place,
/// so a crash mid-write cannot leave a half-written table behind.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes header plus one line per row. A projection with no rows is a
    /// silent no-op: nothing is created, nothing is overwritten.
    pub fn save(&self, projection: &TableProjection) -> Result<(), PersistenceError> {
        self.require_csv_path()?;
        if projection.is_empty() {
            debug!(path = %self.path.display(), "projection has no rows, skipping save");
            return Ok(());
        }
        let mut out = String::new();
        write_row(&mut out, &projection.headers);
        for row in &projection.rows {
            write_row(&mut out, row);
        }
        let tmp = self.path.with_extension("csv.tmp");
        fs::write(&tmp, out.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), rows = projection.row_count(), "projection saved");
        Ok(())
    }

    /// A missing file is the typed, recoverable [`PersistenceError::NotFound`];
    /// anything unreadable or malformed is [`PersistenceError::Corrupt`]. The
    /// delimiter is sniffed from the header line so legacy `;` exports load
    /// through the same call.
    pub fn load(&self) -> Result<TableProjection, PersistenceError> {
        if !self.path.exists() {
            return Err(PersistenceError::NotFound(self.path.clone()));
        }
        let bytes = fs::read(&self.path)?;
        let raw = String::from_utf8(bytes).map_err(|_| PersistenceError::Corrupt {
            line: 0,
            reason: "file is not valid UTF-8".to_string(),
        })?;
        let projection = parse_projection(&raw)?;
        debug!(path = %self.path.display(), rows = projection.row_count(), "projection loaded");
        Ok(projection)
    }

    fn require_csv_path(&self) -> Result<(), PersistenceError> {
        let is_csv = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(CSV_EXTENSION))
            .unwrap_or(false);
        if is_csv {
            Ok(())
        } else {
            Err(PersistenceError::NotCsv(self.path.clone()))
        }
    }
}

fn write_row(out: &mut String, cells: &[String]) {
    for (index, cell) in cells.iter().enumerate() {
        if index > 0 {
            out.push(CANONICAL_DELIMITER);
        }
        push_escaped(out, cell);
    }
    out.push('\n');
}

fn push_escaped(out: &mut String, cell: &str) {
    let needs_quotes = cell
        .chars()
        .any(|ch| ch == CANONICAL_DELIMITER || ch == '"' || ch == '\n' || ch == '\r');
    if !needs_quotes {
        out.push_str(cell);
        return;
    }
    out.push('"');
    for ch in cell.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}

fn parse_projection(raw: &str) -> Result<TableProjection, PersistenceError> {
    let header_line = raw.lines().next().unwrap_or("");
    let delimiter = if header_line.contains(LEGACY_DELIMITER)
        && !header_line.contains(CANONICAL_DELIMITER)
    {
        LEGACY_DELIMITER
    } else {
        CANONICAL_DELIMITER
    };

    let mut rows = parse_rows(raw, delimiter)?;
    if rows.is_empty() {
        return Err(PersistenceError::Corrupt {
            line: 1,
            reason: "missing header row".to_string(),
        });
    }
    let headers = rows.remove(0);
    for (index, row) in rows.iter().enumerate() {
        if row.len() != headers.len() {
            return Err(PersistenceError::Corrupt {
                line: index + 2,
                reason: format!("expected {} cells, found {}", headers.len(), row.len()),
            });
        }
    }
    Ok(TableProjection { headers, rows })
}

/// Minimal quote-aware reader: `""` escapes a quote inside a quoted cell, and
/// quoted cells may span lines. Blank lines are skipped.
fn parse_rows(raw: &str, delimiter: char) -> Result<Vec<Vec<String>>, PersistenceError> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut saw_cell = false;
    let mut line = 1usize;

    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        cell.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '\n' => {
                    line += 1;
                    cell.push(ch);
                }
                _ => cell.push(ch),
            }
            continue;
        }
        match ch {
            '"' if cell.is_empty() => {
                in_quotes = true;
                saw_cell = true;
            }
            _ if ch == delimiter => {
                row.push(std::mem::take(&mut cell));
                saw_cell = true;
            }
            '\r' => {}
            '\n' => {
                line += 1;
                if saw_cell || !cell.is_empty() {
                    row.push(std::mem::take(&mut cell));
                    rows.push(std::mem::take(&mut row));
                }
                saw_cell = false;
            }
            _ => cell.push(ch),
        }
    }
    if in_quotes {
        return Err(PersistenceError::Corrupt {
            line,
            reason: "unterminated quoted cell".to_string(),
        });
    }
    if saw_cell || !cell.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    Ok(rows)
}
