//! Data model for mutant panels.
//!
//! This module contains the data structures shared by the reference index,
//! the mutation table reader and the panel builder:
//! - Reference sequences and the gene keys that identify them
//! - Output records (wild-type and mutants)

use std::fmt;

/// Represents a single sequence with its identifier and data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// The sequence identifier (from FASTA header, without '>')
    pub id: String,
    /// The nucleotide data, kept as raw bytes
    data: Vec<u8>,
}

impl Sequence {
    /// Creates a new sequence.
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into().into_bytes(),
        }
    }

    /// Creates a sequence from raw bytes.
    pub fn from_bytes(id: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Returns the length of the sequence.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the raw sequence bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the sequence as text, replacing any invalid UTF-8.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Identifies a reference sequence by gene name and accession code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneKey {
    pub name: String,
    pub code: String,
}

impl GeneKey {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }

    /// Extracts a key from a FASTA header line (with or without the '>').
    ///
    /// The first two whitespace-separated tokens are taken as name and code.
    /// A lone token such as `KRAS_ENST00000311936` is split at its last
    /// underscore; a lone token without one yields an empty code.
    pub fn from_header(header: &str) -> Option<Self> {
        let header = header.strip_prefix('>').unwrap_or(header);
        let mut tokens = header.split_whitespace();
        let first = tokens.next()?;
        match tokens.next() {
            Some(code) => Some(Self::new(first, code)),
            None => match first.rsplit_once('_') {
                Some((name, code)) if !name.is_empty() && !code.is_empty() => {
                    Some(Self::new(name, code))
                }
                _ => Some(Self::new(first, "")),
            },
        }
    }
}

impl fmt::Display for GeneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.name, self.code)
        }
    }
}

/// Label of an output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationLabel {
    /// The unmutated reference
    WildType,
    /// The n-th successful mutant of a gene, counting from 1
    Mutant(usize),
}

impl fmt::Display for MutationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationLabel::WildType => write!(f, "WT"),
            MutationLabel::Mutant(n) => write!(f, "M{}", n),
        }
    }
}

/// Action text carried by wild-type records.
pub const WILD_TYPE_ACTION: &str = "N/A";

/// One row of the output panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRecord {
    pub key: GeneKey,
    pub label: MutationLabel,
    /// Sequence already cut to the configured base size
    pub sequence: String,
    pub action: String,
}

impl PanelRecord {
    /// Creates the wild-type record for a gene.
    pub fn wild_type(key: GeneKey, sequence: String) -> Self {
        Self {
            key,
            label: MutationLabel::WildType,
            sequence,
            action: WILD_TYPE_ACTION.to_string(),
        }
    }

    /// Creates the n-th mutant record for a gene.
    pub fn mutant(key: GeneKey, n: usize, sequence: String, action: impl Into<String>) -> Self {
        Self {
            key,
            label: MutationLabel::Mutant(n),
            sequence,
            action: action.into(),
        }
    }
}

/// Cuts `data` to at most `basesize` bytes and returns it as text.
pub fn prefix(data: &[u8], basesize: usize) -> String {
    String::from_utf8_lossy(&data[..data.len().min(basesize)]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_creation() {
        let seq = Sequence::new("seq1", "ACGT");
        assert_eq!(seq.id, "seq1");
        assert_eq!(seq.as_str(), "ACGT");
        assert_eq!(seq.len(), 4);
        assert!(!seq.is_empty());
    }

    #[test]
    fn test_sequence_from_bytes() {
        let seq = Sequence::from_bytes("seq1", b"acgt".to_vec());
        assert_eq!(seq.as_bytes(), b"acgt");
    }

    #[test]
    fn test_key_from_two_tokens() {
        let key = GeneKey::from_header(">TP53 ENST00000269305 cds").unwrap();
        assert_eq!(key, GeneKey::new("TP53", "ENST00000269305"));
    }

    #[test]
    fn test_key_from_joined_token() {
        let key = GeneKey::from_header(">KRAS_ENST00000311936").unwrap();
        assert_eq!(key, GeneKey::new("KRAS", "ENST00000311936"));

        let key = GeneKey::from_header("HLA_A_ENST01").unwrap();
        assert_eq!(key, GeneKey::new("HLA_A", "ENST01"));
    }

    #[test]
    fn test_key_without_code() {
        assert_eq!(GeneKey::from_header(">BRAF").unwrap(), GeneKey::new("BRAF", ""));
        assert_eq!(GeneKey::from_header(">BRAF_").unwrap(), GeneKey::new("BRAF_", ""));
        assert!(GeneKey::from_header(">").is_none());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(GeneKey::new("TP53", "ENST1").to_string(), "TP53:ENST1");
        assert_eq!(GeneKey::new("TP53", "").to_string(), "TP53");
    }

    #[test]
    fn test_labels() {
        assert_eq!(MutationLabel::WildType.to_string(), "WT");
        assert_eq!(MutationLabel::Mutant(12).to_string(), "M12");
    }

    #[test]
    fn test_wild_type_record() {
        let rec = PanelRecord::wild_type(GeneKey::new("A", "B"), "ACGT".into());
        assert_eq!(rec.action, "N/A");
        assert_eq!(rec.label, MutationLabel::WildType);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(prefix(b"ACGTACGT", 3), "ACG");
        assert_eq!(prefix(b"ACG", 10), "ACG");
        assert_eq!(prefix(b"", 10), "");
    }
}
