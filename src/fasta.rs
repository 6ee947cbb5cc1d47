//! Indexed FASTA reference access.
//!
//! References are looked up by [`GeneKey`]. A single scan of the file
//! records, for every header, the byte offset of its first sequence line;
//! sequences are then read on demand by seeking to that offset.
//!
//! ## FASTA Format
//!
//! ```text
//! >GENE ACCESSION optional description
//! ACGTACGTACGT...
//! >GENE_ACCESSION
//! TGCATGCATGCA...
//! ```
//!
//! Sequences may span several lines; blank lines and whitespace inside
//! sequence lines are ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

use crate::model::{GeneKey, Sequence};

/// Errors that can occur while indexing or reading a FASTA file.
#[derive(Error, Debug)]
pub enum FastaError {
    #[error("Failed to open file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Empty FASTA file")]
    EmptyFile,

    #[error("Invalid FASTA format: {0}")]
    InvalidFormat(String),

    #[error("Sequence without header at line {0}")]
    SequenceWithoutHeader(usize),

    #[error("Invalid index file: {0}")]
    IndexFormat(String),
}

/// Result type for FASTA operations.
pub type FastaResult<T> = Result<T, FastaError>;

/// Maps gene keys to the byte offset of their sequence data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastaIndex {
    offsets: HashMap<GeneKey, u64>,
    /// Headers skipped because their key was already indexed
    pub duplicates: usize,
}

impl FastaIndex {
    /// Scans a FASTA file and indexes every header.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use seqmut::fasta::FastaIndex;
    ///
    /// let index = FastaIndex::build("genes.fasta").unwrap();
    /// println!("Indexed {} references", index.len());
    /// ```
    pub fn build<P: AsRef<Path>>(path: P) -> FastaResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::with_capacity(1024 * 1024, file))
    }

    /// Indexes FASTA content from a reader. Offsets are relative to the
    /// start of the reader.
    pub fn from_reader<R: BufRead>(mut reader: R) -> FastaResult<Self> {
        let mut index = FastaIndex::default();
        let mut line = Vec::new();
        let mut offset: u64 = 0;
        let mut line_number = 0;
        let mut seen_header = false;

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }
            line_number += 1;
            offset += read as u64;

            let trimmed = line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed[0] == b'>' {
                seen_header = true;
                let header = String::from_utf8_lossy(trimmed);
                let key = GeneKey::from_header(&header).ok_or_else(|| {
                    FastaError::InvalidFormat(format!(
                        "Empty sequence identifier at line {}",
                        line_number
                    ))
                })?;
                // Sequence data starts on the line after the header
                if index.offsets.contains_key(&key) {
                    index.duplicates += 1;
                } else {
                    index.offsets.insert(key, offset);
                }
            } else if !seen_header {
                return Err(FastaError::SequenceWithoutHeader(line_number));
            }
        }

        if index.offsets.is_empty() {
            return Err(FastaError::EmptyFile);
        }
        Ok(index)
    }

    /// Returns the data offset recorded for `key`.
    pub fn offset(&self, key: &GeneKey) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    /// Returns true if `key` is indexed.
    pub fn contains(&self, key: &GeneKey) -> bool {
        self.offsets.contains_key(key)
    }

    /// Returns the number of indexed references.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Writes the index as a tab-separated `name`, `code`, `offset` table,
    /// sorted by key.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> FastaResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .map_err(csv_error)?;
        writer
            .write_record(["name", "code", "offset"])
            .map_err(csv_error)?;

        let mut entries: Vec<_> = self.offsets.iter().collect();
        entries.sort();
        for (key, offset) in entries {
            writer
                .write_record([key.name.as_str(), key.code.as_str(), &offset.to_string()])
                .map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads an index written by [`FastaIndex::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> FastaResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)
            .map_err(csv_error)?;

        let mut index = FastaIndex::default();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            if record.len() != 3 {
                return Err(FastaError::IndexFormat(format!(
                    "expected 3 columns at row {}, found {}",
                    row + 1,
                    record.len()
                )));
            }
            let offset = record[2].parse::<u64>().map_err(|_| {
                FastaError::IndexFormat(format!("bad offset '{}' at row {}", &record[2], row + 1))
            })?;
            index
                .offsets
                .insert(GeneKey::new(&record[0], &record[1]), offset);
        }

        if index.offsets.is_empty() {
            return Err(FastaError::EmptyFile);
        }
        Ok(index)
    }
}

fn csv_error(e: csv::Error) -> FastaError {
    if e.is_io_error() {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => FastaError::IoError(io),
            other => FastaError::IndexFormat(format!("{:?}", other)),
        }
    } else {
        FastaError::IndexFormat(e.to_string())
    }
}

/// Random-access reader over an indexed FASTA source.
pub struct FastaReader<R> {
    source: BufReader<R>,
    index: FastaIndex,
}

impl FastaReader<File> {
    /// Opens a FASTA file for keyed access using `index`.
    pub fn open<P: AsRef<Path>>(path: P, index: FastaIndex) -> FastaResult<Self> {
        Ok(Self::new(File::open(path)?, index))
    }
}

impl<R: Read + Seek> FastaReader<R> {
    /// Wraps any seekable source.
    pub fn new(source: R, index: FastaIndex) -> Self {
        Self {
            source: BufReader::new(source),
            index,
        }
    }

    /// Returns the index backing this reader.
    pub fn index(&self) -> &FastaIndex {
        &self.index
    }

    /// Reads the sequence stored under `key`, or `None` if it is not indexed.
    pub fn fetch(&mut self, key: &GeneKey) -> FastaResult<Option<Sequence>> {
        let Some(offset) = self.index.offset(key) else {
            return Ok(None);
        };
        self.source.seek(SeekFrom::Start(offset))?;

        let mut data = Vec::with_capacity(4096);
        let mut line = Vec::new();
        loop {
            line.clear();
            if self.source.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            let trimmed = line.trim_ascii();
            if trimmed.first() == Some(&b'>') {
                break;
            }

            // Fast append: most FASTA lines don't have internal whitespace
            if trimmed.iter().all(|b| !b.is_ascii_whitespace()) {
                data.extend_from_slice(trimmed);
            } else {
                data.extend(trimmed.iter().filter(|b| !b.is_ascii_whitespace()));
            }
        }

        data.shrink_to_fit();
        Ok(Some(Sequence::from_bytes(key.to_string(), data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const CONTENT: &str = ">TP53 ENST00000269305 tumour protein\nACGT\nTGCA\n\n>KRAS_ENST00000311936\nAAAA CCCC\n>BRAF\nGGG\n";

    fn reader(content: &str) -> FastaReader<Cursor<Vec<u8>>> {
        let index = FastaIndex::from_reader(content.as_bytes()).unwrap();
        FastaReader::new(Cursor::new(content.as_bytes().to_vec()), index)
    }

    #[test]
    fn test_index_keys() {
        let index = FastaIndex::from_reader(CONTENT.as_bytes()).unwrap();
        assert_eq!(index.len(), 3);
        assert!(index.contains(&GeneKey::new("TP53", "ENST00000269305")));
        assert!(index.contains(&GeneKey::new("KRAS", "ENST00000311936")));
        assert!(index.contains(&GeneKey::new("BRAF", "")));
        assert_eq!(index.duplicates, 0);
    }

    #[test]
    fn test_offsets_point_past_header() {
        let index = FastaIndex::from_reader(CONTENT.as_bytes()).unwrap();
        let offset = index.offset(&GeneKey::new("TP53", "ENST00000269305")).unwrap();
        assert_eq!(&CONTENT[offset as usize..offset as usize + 4], "ACGT");
    }

    #[test]
    fn test_fetch_multiline() {
        let mut reader = reader(CONTENT);
        let seq = reader
            .fetch(&GeneKey::new("TP53", "ENST00000269305"))
            .unwrap()
            .unwrap();
        assert_eq!(seq.as_str(), "ACGTTGCA");
        assert_eq!(seq.id, "TP53:ENST00000269305");
    }

    #[test]
    fn test_fetch_strips_inner_whitespace() {
        let mut reader = reader(CONTENT);
        let seq = reader
            .fetch(&GeneKey::new("KRAS", "ENST00000311936"))
            .unwrap()
            .unwrap();
        assert_eq!(seq.as_str(), "AAAACCCC");
    }

    #[test]
    fn test_fetch_last_and_repeated() {
        let mut reader = reader(CONTENT);
        let key = GeneKey::new("BRAF", "");
        assert_eq!(reader.fetch(&key).unwrap().unwrap().as_str(), "GGG");
        // Seeking backwards works after reading to the end
        let tp53 = GeneKey::new("TP53", "ENST00000269305");
        assert_eq!(reader.fetch(&tp53).unwrap().unwrap().as_str(), "ACGTTGCA");
        assert_eq!(reader.fetch(&key).unwrap().unwrap().as_str(), "GGG");
    }

    #[test]
    fn test_fetch_missing() {
        let mut reader = reader(CONTENT);
        assert!(reader.fetch(&GeneKey::new("EGFR", "X")).unwrap().is_none());
    }

    #[test]
    fn test_fetch_crlf() {
        let mut reader = reader(">A B\r\nAC\r\nGT\r\n>C D\r\nTT\r\n");
        let seq = reader.fetch(&GeneKey::new("A", "B")).unwrap().unwrap();
        assert_eq!(seq.as_str(), "ACGT");
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let content = ">A B\nAAA\n>A B\nCCC\n";
        let mut reader = reader(content);
        assert_eq!(reader.index().duplicates, 1);
        let seq = reader.fetch(&GeneKey::new("A", "B")).unwrap().unwrap();
        assert_eq!(seq.as_str(), "AAA");
    }

    #[test]
    fn test_empty_file() {
        let result = FastaIndex::from_reader("".as_bytes());
        assert!(matches!(result, Err(FastaError::EmptyFile)));
    }

    #[test]
    fn test_sequence_without_header() {
        let result = FastaIndex::from_reader("ACGT\n>seq1\nTGCA\n".as_bytes());
        assert!(matches!(result, Err(FastaError::SequenceWithoutHeader(1))));
    }

    #[test]
    fn test_empty_identifier() {
        let result = FastaIndex::from_reader(">\nACGT\n".as_bytes());
        assert!(matches!(result, Err(FastaError::InvalidFormat(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.idx");

        let index = FastaIndex::from_reader(CONTENT.as_bytes()).unwrap();
        index.save(&path).unwrap();
        let loaded = FastaIndex::load(&path).unwrap();

        assert_eq!(loaded.len(), index.len());
        for key in [
            GeneKey::new("TP53", "ENST00000269305"),
            GeneKey::new("KRAS", "ENST00000311936"),
            GeneKey::new("BRAF", ""),
        ] {
            assert_eq!(loaded.offset(&key), index.offset(&key));
        }
    }

    #[test]
    fn test_load_bad_offset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "name\tcode\toffset\nA\tB\tnope\n").unwrap();
        let result = FastaIndex::load(file.path());
        assert!(matches!(result, Err(FastaError::IndexFormat(_))));
    }

    #[test]
    fn test_build_and_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONTENT.as_bytes()).unwrap();

        let index = FastaIndex::build(file.path()).unwrap();
        let mut reader = FastaReader::open(file.path(), index).unwrap();
        let seq = reader.fetch(&GeneKey::new("BRAF", "")).unwrap().unwrap();
        assert_eq!(seq.as_str(), "GGG");
    }
}
