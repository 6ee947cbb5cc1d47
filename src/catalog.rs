//! Mutation table reader.
//!
//! Reads COSMIC-style annotation exports: one mutation per row, with the
//! gene name, accession code and mutation action in named columns. Both
//! comma- and tab-separated files are supported.
//!
//! Fields are decoded leniently: bytes that are not valid UTF-8 are
//! replaced rather than rejected.

use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::model::GeneKey;

/// Default column holding the gene name.
pub const DEFAULT_GENE_COLUMN: &str = "Gene name";
/// Default column holding the accession code.
pub const DEFAULT_CODE_COLUMN: &str = "Accession Number";
/// Default column holding the mutation action.
pub const DEFAULT_ACTION_COLUMN: &str = "Mutation CDS";

/// Errors that can occur while reading a mutation table.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to open file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed mutation table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Column '{0}' not found in mutation table header")]
    MissingColumn(String),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Field separator of the mutation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    /// Guesses the delimiter from a file extension: `.tsv`, `.tab` and
    /// `.txt` are tab-separated, anything else comma-separated.
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("tsv" | "tab" | "txt") => Delimiter::Tab,
            _ => Delimiter::Comma,
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }
}

/// How to read a mutation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogOptions {
    /// `None` detects the delimiter from the file extension
    pub delimiter: Option<Delimiter>,
    pub gene_column: String,
    pub code_column: String,
    pub action_column: String,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            gene_column: DEFAULT_GENE_COLUMN.to_string(),
            code_column: DEFAULT_CODE_COLUMN.to_string(),
            action_column: DEFAULT_ACTION_COLUMN.to_string(),
        }
    }
}

/// One mutation row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEntry {
    pub key: GeneKey,
    pub action: String,
    /// Line of the row in the input file, 1-based
    pub line: u64,
}

/// Streams [`MutationEntry`] values from a mutation table.
pub struct CatalogReader<R> {
    records: csv::ByteRecordsIntoIter<R>,
    gene: usize,
    code: usize,
    action: usize,
}

impl CatalogReader<File> {
    /// Opens a mutation table file.
    pub fn open<P: AsRef<Path>>(path: P, options: &CatalogOptions) -> CatalogResult<Self> {
        let delimiter = options
            .delimiter
            .unwrap_or_else(|| Delimiter::from_extension(&path));
        let file = File::open(&path)?;
        Self::from_reader(file, delimiter, options)
    }
}

impl<R: Read> CatalogReader<R> {
    /// Reads a mutation table from any source.
    pub fn from_reader(
        source: R,
        delimiter: Delimiter,
        options: &CatalogOptions,
    ) -> CatalogResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter.as_byte())
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers = reader.byte_headers()?.clone();
        let column = |name: &str| -> CatalogResult<usize> {
            headers
                .iter()
                .position(|h| String::from_utf8_lossy(h).trim() == name)
                .ok_or_else(|| CatalogError::MissingColumn(name.to_string()))
        };

        let gene = column(&options.gene_column)?;
        let code = column(&options.code_column)?;
        let action = column(&options.action_column)?;

        Ok(Self {
            records: reader.into_byte_records(),
            gene,
            code,
            action,
        })
    }
}

fn field(record: &csv::ByteRecord, i: usize) -> String {
    record
        .get(i)
        .map(|f| String::from_utf8_lossy(f).trim().to_string())
        .unwrap_or_default()
}

impl<R: Read> Iterator for CatalogReader<R> {
    type Item = CatalogResult<MutationEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        let line = record.position().map_or(0, |p| p.line());
        Some(Ok(MutationEntry {
            key: GeneKey::new(field(&record, self.gene), field(&record, self.code)),
            action: field(&record, self.action),
            line,
        }))
    }
}
