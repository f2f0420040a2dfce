use std::collections::HashSet;
use std::path::Path;

use calamine::{open_workbook_auto, Reader};

use crate::error::MasterListError;

/// Extensions read as spreadsheets rather than delimited text.
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Header names that identify the part-number column.
const PART_COLUMN_NAMES: &[&str] = &["partnumber", "part number", "pn", "part", "item", "sku"];

/// Uppercases, drops spaces and anything outside `[A-Z0-9-_./]`.
pub fn normalize_part_number(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
        .collect()
}

/// Uppercased ASCII letters and digits only.
pub fn alnum_only(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Immutable set of official part numbers, stored normalized.
#[derive(Debug, Clone, Default)]
pub struct MasterPartList {
    entries: HashSet<String>,
}

impl MasterPartList {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads a workbook (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`; first
    /// sheet) or a CSV, TSV or one-per-line text file.
    ///
    /// The column is picked by header name (`partnumber`, `pn`, `part`,
    /// `item`, `sku`), falling back to the first column.
    pub fn load(path: &Path) -> Result<Self, MasterListError> {
        let is_workbook = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)));
        let list = if is_workbook {
            Self::load_workbook(path)?
        } else {
            Self::load_delimited(path)?
        };
        log::info!("Loaded {} master part numbers from {}", list.len(), path.display());
        Ok(list)
    }

    fn load_workbook(path: &Path) -> Result<Self, MasterListError> {
        let workbook_err = |source| MasterListError::Workbook {
            path: path.to_path_buf(),
            source,
        };
        let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| MasterListError::NoWorksheet {
                path: path.to_path_buf(),
            })?
            .map_err(workbook_err)?;
        Ok(Self::from_rows(range.rows().map(|row| {
            row.iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect()
        })))
    }

    fn load_delimited(path: &Path) -> Result<Self, MasterListError> {
        let bytes = std::fs::read(path).map_err(|e| MasterListError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| MasterListError::NotText {
            path: path.to_path_buf(),
        })?;
        Self::parse(&text).map_err(|source| MasterListError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses CSV text. A tab in the first line switches to tab-separated.
    pub fn parse(text: &str) -> Result<Self, csv::Error> {
        let text = text.trim_start_matches('\u{feff}');
        let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
        let delimiter = if first_line.contains('\t') { b'\t' } else { b',' };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect::<Vec<_>>()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_rows(rows))
    }

    /// Builds the list from table rows, detecting and skipping a header row.
    fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .peekable();

        let Some(header) = rows.peek() else {
            return Self::empty();
        };
        let named_column = header.iter().position(|cell| {
            PART_COLUMN_NAMES
                .iter()
                .any(|name| cell.eq_ignore_ascii_case(name))
        });
        // A first cell without digits is a header we don't recognize.
        let has_header = named_column.is_some()
            || !header
                .first()
                .is_some_and(|cell| cell.chars().any(|c| c.is_ascii_digit()));
        let column = named_column.unwrap_or(0);
        if has_header {
            rows.next();
        }

        rows.filter_map(|row| row.into_iter().nth(column)).collect()
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.contains_normalized(&normalize_part_number(candidate))
    }

    pub fn contains_normalized(&self, normalized: &str) -> bool {
        !normalized.is_empty() && self.entries.contains(normalized)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for MasterPartList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|s| normalize_part_number(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        Self { entries }
    }
}
