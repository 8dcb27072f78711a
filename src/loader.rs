//! CSV loading.
//!
//! Pure parsing: no column semantics are checked here. The full engine keeps
//! every column, the lite engine projects only the columns it needs.

use csv::ReaderBuilder;
use std::io::Read;

use crate::error::{IriError, Result};

/// Upper bound on rows pre-allocated per projected column.
pub const MAX_PREALLOC_ROWS: usize = 64 * 1024;

/// Column-oriented table of raw CSV cells.
#[derive(Clone, Debug, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub columns: Vec<Vec<String>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        let idx = self.headers.iter().position(|h| h == name)?;
        Some(&self.columns[idx])
    }

    /// Cells of row `i` in header order.
    pub fn row(&self, i: usize) -> Vec<&str> {
        self.columns.iter().map(|c| c[i].as_str()).collect()
    }
}

fn reader_builder() -> ReaderBuilder {
    let mut b = ReaderBuilder::new();
    b.has_headers(true).flexible(true);
    b
}

fn header_names(headers: &csv::StringRecord) -> Result<Vec<String>> {
    let names: Vec<String> = headers.iter().map(str::to_string).collect();
    if names.is_empty() || names.iter().all(|h| h.is_empty()) {
        return Err(IriError::Load("No columns to parse from file".to_string()));
    }
    Ok(names)
}

/// Loads every column of a CSV stream.
pub fn load_csv<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = reader_builder().from_reader(reader);
    let headers = header_names(rdr.headers()?)?;
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

    for rec in rdr.records() {
        let rec = rec?;
        for (i, col) in columns.iter_mut().enumerate() {
            // short rows are padded with missing cells
            col.push(rec.get(i).unwrap_or("").to_string());
        }
    }

    log::info!("Loaded {} rows with {} columns", columns.first().map_or(0, Vec::len), headers.len());
    Ok(RawTable { headers, columns })
}

/// Reads only the header row.
pub fn peek_headers<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = reader_builder().from_reader(reader);
    header_names(rdr.headers()?)
}

/// Loads the named columns only, skipping every other cell.
///
/// Columns absent from the header are left out of the result; `capacity_hint`
/// pre-sizes the column buffers, up to [`MAX_PREALLOC_ROWS`].
pub fn load_columns<R: Read>(reader: R, wanted: &[&str], capacity_hint: usize) -> Result<RawTable> {
    let mut rdr = reader_builder().from_reader(reader);
    let all = header_names(rdr.headers()?)?;

    let picked: Vec<(usize, String)> = wanted
        .iter()
        .filter_map(|w| all.iter().position(|h| h == w).map(|i| (i, w.to_string())))
        .collect();

    let mut columns: Vec<Vec<String>> = picked
        .iter()
        .map(|_| Vec::with_capacity(capacity_hint.min(MAX_PREALLOC_ROWS)))
        .collect();

    let mut rec = csv::StringRecord::new();
    while rdr.read_record(&mut rec)? {
        for ((src, _), col) in picked.iter().zip(columns.iter_mut()) {
            col.push(rec.get(*src).unwrap_or("").to_string());
        }
    }

    let headers = picked.into_iter().map(|(_, name)| name).collect();
    Ok(RawTable { headers, columns })
}
