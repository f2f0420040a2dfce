//! Flattens stored cases into the tabular report read by the business and
//! writes it as an Excel workbook (or JSON) without exposing partial files.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::db::{case_repo, custom_column_repo, Database, DatabaseError};
use crate::error::ComplaintLogError;
use crate::store::{CaseStore, ComplaintCase};

pub const BASE_COLUMNS: [&str; 9] = [
    "Date (ET)",
    "Initiated By",
    "P/N",
    "Category",
    "Category_Final",
    "Summary",
    "Subject",
    "Notes",
    "Link",
];

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

const SHEET_NAME: &str = "Complaints";

/// A report open in a spreadsheet app can't be replaced; retry a few times
/// before writing a timestamped copy next to it instead.
const PERSIST_ATTEMPTS: u32 = 3;
const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(1200);

fn column_width(name: &str) -> f64 {
    match name {
        "Date (ET)" => 16.0,
        "Initiated By" | "Notes" => 30.0,
        "P/N" => 26.0,
        "Category" | "Category_Final" => 18.0,
        "Summary" => 64.0,
        "Subject" => 44.0,
        "Link" => 10.0,
        _ => 20.0,
    }
}

/// User-declared columns and their values per conversation id.
#[derive(Debug, Clone, Default)]
pub struct CustomColumns {
    pub names: Vec<String>,
    pub values: HashMap<String, Vec<Option<String>>>,
}

impl CustomColumns {
    pub fn load(db: &Database) -> Result<Self, DatabaseError> {
        let names = custom_column_repo::list(db)?;
        let values = case_repo::custom_values(db, &names)?.into_iter().collect();
        Ok(Self { names, values })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Report {
    /// Writes the report in the format named by the extension (`.json`, else
    /// a workbook). Returns the path actually written, which is a
    /// timestamped sibling when `path` stays locked.
    pub fn write(&self, path: &Path) -> Result<PathBuf, ComplaintLogError> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            self.write_json(path)
        } else {
            self.write_xlsx(path)
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<PathBuf, ComplaintLogError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| ComplaintLogError::WriteReport {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        })?;
        write_atomically(path, &json)
    }

    pub fn write_xlsx(&self, path: &Path) -> Result<PathBuf, ComplaintLogError> {
        let bytes = self
            .to_workbook()
            .map_err(|source| ComplaintLogError::ReportWorkbook {
                path: path.to_path_buf(),
                source,
            })?;
        write_atomically(path, &bytes)
    }

    /// One `Complaints` sheet: bold frozen header, filter, fixed widths,
    /// wrapped summaries and clickable links.
    fn to_workbook(&self) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let wrapped = Format::new().set_text_wrap().set_align(FormatAlign::Top);

        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;
        for (col, name) in self.columns.iter().enumerate() {
            let col = col as u16;
            sheet.write_string_with_format(0, col, name, &header)?;
            sheet.set_column_width(col, column_width(name))?;
        }
        for (row_ix, row) in self.rows.iter().enumerate() {
            let row_num = row_ix as u32 + 1;
            for (col, value) in row.iter().enumerate() {
                let col_num = col as u16;
                match self.columns.get(col).map(String::as_str) {
                    Some("Link") if value.starts_with("http") => {
                        sheet.write_url_with_text(row_num, col_num, value.as_str(), "Open")?;
                    }
                    Some("Summary") => {
                        sheet.write_string_with_format(row_num, col_num, value, &wrapped)?;
                    }
                    _ => {
                        sheet.write_string(row_num, col_num, value)?;
                    }
                }
            }
        }
        sheet.set_freeze_panes(1, 0)?;
        if !self.columns.is_empty() {
            sheet.autofilter(0, 0, self.rows.len() as u32, self.columns.len() as u16 - 1)?;
        }
        workbook.save_to_buffer()
    }
}

/// Writes `contents` to a temp file in the target directory and renames it
/// over `path`, so readers see the old file or the new one, never a mix.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<PathBuf, ComplaintLogError> {
    let io_err = |source: io::Error| ComplaintLogError::WriteReport {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut file = staged_file(dir, path, contents).map_err(io_err)?;
    let mut attempt = 1;
    loop {
        match file.persist(path) {
            Ok(_) => return Ok(path.to_path_buf()),
            Err(e) if !is_locked(&e.error) => return Err(io_err(e.error)),
            Err(e) if attempt >= PERSIST_ATTEMPTS => {
                let fallback = timestamped_sibling(path, chrono::Local::now().naive_local());
                log::warn!(
                    "{} stayed locked; writing {} instead",
                    path.display(),
                    fallback.display()
                );
                e.file.persist(&fallback).map_err(|e| io_err(e.error))?;
                return Ok(fallback);
            }
            Err(e) => {
                log::warn!(
                    "{} is locked (attempt {}/{}), retrying",
                    path.display(),
                    attempt,
                    PERSIST_ATTEMPTS
                );
                file = e.file;
                attempt += 1;
                std::thread::sleep(PERSIST_RETRY_DELAY);
            }
        }
    }
}

fn staged_file(dir: &Path, target: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let suffix = target
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix(&format!(".{}_tmp_", stem))
        .suffix(&suffix)
        .tempfile_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    Ok(file)
}

fn is_locked(err: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION: another process holds the file open.
    err.kind() == io::ErrorKind::PermissionDenied || (cfg!(windows) && err.raw_os_error() == Some(32))
}

/// `dir/name_YYYY-MM-DD_HH-MM-SS.ext` for a report that could not be replaced.
fn timestamped_sibling(path: &Path, at: NaiveDateTime) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let stamp = at.format("%Y-%m-%d_%H-%M-%S");
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, stamp),
    };
    path.with_file_name(name)
}

/// Keeps the most recently received case per case key, newest first-seen
/// first, cases without a first-seen last. Cases with an empty key are never
/// collapsed together.
fn dedupe_and_sort(cases: &[ComplaintCase]) -> Vec<&ComplaintCase> {
    let mut by_key: HashMap<&str, &ComplaintCase> = HashMap::new();
    let mut unkeyed = Vec::new();
    for case in cases {
        if case.case_key.is_empty() {
            unkeyed.push(case);
            continue;
        }
        by_key
            .entry(case.case_key.as_str())
            .and_modify(|kept| {
                if case.received_utc >= kept.received_utc {
                    *kept = case;
                }
            })
            .or_insert(case);
    }

    let mut kept: Vec<&ComplaintCase> = by_key.into_values().chain(unkeyed).collect();
    kept.sort_by(|a, b| {
        match (a.first_seen_utc, b.first_seen_utc) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| b.received_utc.cmp(&a.received_utc))
        .then_with(|| a.conversation_id.cmp(&b.conversation_id))
    });
    kept
}

pub fn build_report(cases: &[ComplaintCase], custom: &CustomColumns, tz: Tz) -> Report {
    let columns = BASE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(custom.names.iter().cloned())
        .collect();

    let rows = dedupe_and_sort(cases)
        .into_iter()
        .map(|case| {
            let date = case
                .first_seen_utc
                .map(|fs| fs.with_timezone(&tz).format(DATE_FORMAT).to_string())
                .unwrap_or_default();
            let mut row = vec![
                date,
                case.initiator_email.clone(),
                case.part_number.clone(),
                case.category.clone(),
                String::new(),
                case.summary.clone(),
                case.subject.clone(),
                String::new(),
                case.thread_url.clone(),
            ];
            let extra = custom.values.get(&case.conversation_id);
            row.extend((0..custom.names.len()).map(|i| {
                extra
                    .and_then(|values| values.get(i).cloned().flatten())
                    .unwrap_or_default()
            }));
            row
        })
        .collect();

    Report { columns, rows }
}

/// Reads every stored case and custom column and builds the report.
pub fn load_report(db: &Database, tz: Tz) -> Result<Report, DatabaseError> {
    let cases = db.all_cases()?;
    let custom = CustomColumns::load(db)?;
    Ok(build_report(&cases, &custom, tz))
}
