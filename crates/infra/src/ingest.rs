//! Recipient list ingestion from uploaded CSV / Excel files.
//!
//! The first row is the header. The name column is any of `name`, `Name`,
//! `NAME` (first non-empty wins), likewise for `email`. Values are trimmed
//! and every email must pass [`is_valid_email`]; one bad row rejects the
//! whole file. Any failure reading an Excel file is reported as
//! [`IngestError::Spreadsheet`].

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use thiserror::Error;
use tracing::debug;

use bulksend_core::{Recipient, is_valid_email};

const NAME_HEADERS: [&str; 3] = ["name", "Name", "NAME"];
const EMAIL_HEADERS: [&str; 3] = ["email", "Email", "EMAIL"];
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Accepted upload formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
}

impl FileFormat {
    pub fn from_filename(filename: &str) -> Result<Self, IngestError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .ok_or(IngestError::MissingExtension)?;

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "xls" => Ok(Self::Xls),
            other => Err(IngestError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unable to determine file extension")]
    MissingExtension,
    #[error("Unsupported file format. Please upload CSV or XLSX files.")]
    UnsupportedFormat(String),
    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("XLSX processing failed: {0}")]
    Spreadsheet(String),
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),
    /// `row` is the 1-based row in the file, header included.
    #[error("Invalid email: {email}")]
    InvalidEmail { row: usize, email: String },
}

/// Parse an uploaded file into an ordered recipient list.
pub fn parse_recipients(filename: &str, bytes: &[u8]) -> Result<Vec<Recipient>, IngestError> {
    let format = FileFormat::from_filename(filename)?;
    let recipients = match format {
        FileFormat::Csv => parse_csv(bytes)?,
        FileFormat::Xlsx | FileFormat::Xls => parse_spreadsheet(bytes).map_err(spreadsheet_error)?,
    };
    debug!(filename, ?format, recipients = recipients.len(), "recipient file parsed");
    Ok(recipients)
}

/// Column positions for the recognised header spellings.
struct Columns {
    name: Vec<usize>,
    email: Vec<usize>,
}

impl Columns {
    fn locate<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<Self, IngestError> {
        let headers: Vec<&str> = headers.into_iter().map(str::trim).collect();
        let find = |candidates: &[&str]| -> Vec<usize> {
            candidates
                .iter()
                .filter_map(|c| headers.iter().position(|h| h == c))
                .collect()
        };

        let email = find(&EMAIL_HEADERS);
        if email.is_empty() {
            return Err(IngestError::MissingColumn("email"));
        }
        Ok(Self {
            name: find(&NAME_HEADERS),
            email,
        })
    }

    fn recipient(
        &self,
        row: usize,
        cell: impl Fn(usize) -> Option<String>,
    ) -> Result<Recipient, IngestError> {
        let first = |columns: &[usize]| {
            columns
                .iter()
                .filter_map(|&i| cell(i))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
                .unwrap_or_default()
        };

        let email = first(&self.email);
        if !is_valid_email(&email) {
            return Err(IngestError::InvalidEmail { row, email });
        }
        Ok(Recipient::new(first(&self.name), email))
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<Recipient>, IngestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let columns = Columns::locate(reader.headers()?.iter())?;

    let mut recipients = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = record.position().map(|p| p.line() as usize).unwrap_or(i + 2);
        recipients.push(columns.recipient(row, |c| record.get(c).map(str::to_string))?);
    }
    Ok(recipients)
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<Recipient>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Spreadsheet("workbook has no sheets".to_string()))?
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header.iter().map(cell_text).collect();
    let columns = Columns::locate(header.iter().map(String::as_str))?;

    let mut recipients = Vec::new();
    for (i, cells) in rows.enumerate() {
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        recipients.push(columns.recipient(i + 2, |c| cells.get(c).map(cell_text))?);
    }
    Ok(recipients)
}

fn spreadsheet_error(err: IngestError) -> IngestError {
    match err {
        IngestError::Spreadsheet(_) => err,
        other => IngestError::Spreadsheet(other.to_string()),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
