use std::{fs, io, path::Path};

use crate::error::AssetTreeError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

/// Blank cells and the literal `nan` count as missing.
fn clean_cell(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A header row plus string cells, as read from a CSV file. Rows shorter than the header are
/// padded with missing cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new<S: Into<String>>(headers: Vec<S>) -> RawTable {
        RawTable {
            headers: headers.into_iter().map(|h| h.into()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<RawTable, AssetTreeError> {
        let data = strip_utf8_bom(data);
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(AssetTreeError::Validation("CSV input is empty".to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row = record.iter().map(clean_cell).collect::<Vec<_>>();
            if row.iter().all(|c| c.is_none()) {
                continue;
            }
            row.resize(headers.len().max(row.len()), None);
            rows.push(row);
        }
        tracing::debug!(
            "[RawTable] read {} columns, {} rows",
            headers.len(),
            rows.len()
        );
        Ok(RawTable { headers, rows })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<RawTable, AssetTreeError> {
        let data = fs::read(path.as_ref())?;
        RawTable::from_bytes(&data)
    }

    pub fn push_row(&mut self, row: Vec<Option<String>>) {
        let mut row = row;
        row.resize(self.headers.len().max(row.len()), None);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column with this header, compared case-insensitively.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(header))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    /// True when every row has a value in this column.
    pub fn column_complete(&self, column: usize) -> bool {
        (0..self.rows.len()).all(|row| self.cell(row, column).is_some())
    }

    pub fn column_any(&self, column: usize) -> bool {
        (0..self.rows.len()).any(|row| self.cell(row, column).is_some())
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), AssetTreeError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in self.rows.iter() {
            writer.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        writer.flush()?;
        Ok(())
    }
}
