//! Mutant panel construction.
//!
//! Turns a stream of mutation rows into panel records. For each gene key
//! the wild-type record comes first, then one `M<n>` record per mutation
//! that applied cleanly. Every mutation is applied to the reference as
//! read from the FASTA file, never to an earlier mutant.
//!
//! Rows that cannot be applied (bad action text, reference mismatch,
//! unknown gene) are reported through the [`Console`] and skipped; they
//! never stop the run.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{Read, Seek, Write};
use std::rc::Rc;

use thiserror::Error;

use crate::catalog::{CatalogError, MutationEntry};
use crate::console::Console;
use crate::fasta::{FastaError, FastaReader};
use crate::model::{prefix, GeneKey, PanelRecord, Sequence};
use crate::mutation::{MutationAction, MutationError};

/// Default number of leading bases written for each record.
pub const DEFAULT_BASESIZE: usize = 100;

/// Column names of the panel table.
pub const PANEL_COLUMNS: [&str; 5] = [
    "geneName",
    "geneCode",
    "mutationLabel",
    "sequencePrefix",
    "actionText",
];

/// Errors that stop panel construction.
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Reference error: {0}")]
    Fasta(#[from] FastaError),

    #[error("Mutation table error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Failed to write panel: {0}")]
    Output(#[from] csv::Error),

    #[error("Failed to write panel: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for panel operations.
pub type PanelResult<T> = Result<T, PanelError>;

/// Output settings for a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelConfig {
    /// Emitted sequences are cut to this many bases
    pub basesize: usize,
    /// Write the column header row
    pub header: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            basesize: DEFAULT_BASESIZE,
            header: true,
        }
    }
}

/// Counters collected while building a panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelSummary {
    pub entries: usize,
    pub wild_types: usize,
    pub mutants: usize,
    pub invalid_actions: usize,
    pub mismatches: usize,
    pub missing_references: usize,
    pub duplicates: usize,
    /// Single-base mutations past the end of their reference, emitted unchanged
    pub out_of_bounds: usize,
}

impl PanelSummary {
    /// Rows that produced no record.
    pub fn skipped(&self) -> usize {
        self.invalid_actions + self.mismatches + self.missing_references + self.duplicates
    }
}

impl fmt::Display for PanelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Read {} mutations: {} genes, {} mutants written, {} skipped",
            self.entries,
            self.wild_types,
            self.mutants,
            self.skipped()
        )?;
        write!(
            f,
            "  invalid format: {}, reference mismatch: {}, unknown gene: {}, duplicate: {}, past end of reference: {}",
            self.invalid_actions,
            self.mismatches,
            self.missing_references,
            self.duplicates,
            self.out_of_bounds
        )
    }
}

/// Builds panel records from mutation rows against an indexed reference.
pub struct PanelBuilder<R> {
    reference: FastaReader<R>,
    config: PanelConfig,
    console: Console,
    /// Mutants emitted so far per gene; presence means the WT record is out
    counters: HashMap<GeneKey, usize>,
    seen: HashSet<(GeneKey, String)>,
    missing: HashSet<GeneKey>,
    cached: Option<Rc<Sequence>>,
    cached_key: Option<GeneKey>,
    summary: PanelSummary,
}

impl<R: Read + Seek> PanelBuilder<R> {
    pub fn new(reference: FastaReader<R>, config: PanelConfig, console: Console) -> Self {
        Self {
            reference,
            config,
            console,
            counters: HashMap::new(),
            seen: HashSet::new(),
            missing: HashSet::new(),
            cached: None,
            cached_key: None,
            summary: PanelSummary::default(),
        }
    }

    /// Returns the counters collected so far.
    pub fn summary(&self) -> PanelSummary {
        self.summary
    }

    /// Loads the reference for `key`, reusing the last one when unchanged.
    fn load_reference(&mut self, key: &GeneKey) -> PanelResult<Option<Rc<Sequence>>> {
        if self.cached_key.as_ref() != Some(key) {
            self.cached = self.reference.fetch(key)?.map(Rc::new);
            self.cached_key = Some(key.clone());
        }
        Ok(self.cached.clone())
    }

    /// Processes one mutation row and returns the records it produces:
    /// nothing, a mutant, or a wild-type record followed by a mutant.
    ///
    /// Only reference I/O failures are returned as errors.
    pub fn process(&mut self, entry: &MutationEntry) -> PanelResult<Vec<PanelRecord>> {
        self.summary.entries += 1;
        let key = &entry.key;

        if !self.seen.insert((key.clone(), entry.action.clone())) {
            self.summary.duplicates += 1;
            self.console.debug(format!(
                "line {}: {}: duplicate mutation {}",
                entry.line, key, entry.action
            ));
            return Ok(Vec::new());
        }

        let basesize = self.config.basesize;
        let Some(wild_type) = self.load_reference(key)? else {
            self.summary.missing_references += 1;
            if self.missing.insert(key.clone()) {
                self.console.warn(format!(
                    "line {}: {}: gene not found in reference",
                    entry.line, key
                ));
            }
            return Ok(Vec::new());
        };

        let mut records = Vec::with_capacity(2);
        if !self.counters.contains_key(key) {
            self.counters.insert(key.clone(), 0);
            self.summary.wild_types += 1;
            records.push(PanelRecord::wild_type(
                key.clone(),
                prefix(wild_type.as_bytes(), basesize),
            ));
        }

        let applied = MutationAction::parse(&entry.action).and_then(|action| {
            if !action.anchor_in_bounds(wild_type.len()) {
                self.summary.out_of_bounds += 1;
                self.console.debug(format!(
                    "line {}: {}: {} names no base of the reference ({} bases), kept unchanged",
                    entry.line,
                    key,
                    entry.action,
                    wild_type.len()
                ));
            }
            action.apply(wild_type.as_bytes())
        });

        match applied {
            Ok(mutant) => {
                let counter = self.counters.entry(key.clone()).or_insert(0);
                *counter += 1;
                self.summary.mutants += 1;
                records.push(PanelRecord::mutant(
                    key.clone(),
                    *counter,
                    prefix(&mutant, basesize),
                    entry.action.as_str(),
                ));
            }
            Err(e) => {
                match e {
                    MutationError::InvalidActionFormat(_) => self.summary.invalid_actions += 1,
                    MutationError::MismatchAction { .. } => self.summary.mismatches += 1,
                }
                self.console
                    .warn(format!("line {}: {}: {}", entry.line, key, e));
            }
        }
        Ok(records)
    }

    /// Processes every row of `entries`, writing the records to `writer`.
    pub fn run<I, W>(&mut self, entries: I, writer: &mut PanelWriter<W>) -> PanelResult<PanelSummary>
    where
        I: IntoIterator<Item = Result<MutationEntry, CatalogError>>,
        W: Write,
    {
        for entry in entries {
            for record in self.process(&entry?)? {
                writer.write(&record)?;
            }
        }
        writer.flush()?;
        Ok(self.summary)
    }
}

/// Writes panel records as comma-separated rows.
pub struct PanelWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> PanelWriter<W> {
    /// Creates a writer, emitting the column header if `header` is set.
    pub fn new(sink: W, header: bool) -> PanelResult<Self> {
        let mut inner = csv::WriterBuilder::new().has_headers(false).from_writer(sink);
        if header {
            inner.write_record(PANEL_COLUMNS)?;
        }
        Ok(Self { inner })
    }

    pub fn write(&mut self, record: &PanelRecord) -> PanelResult<()> {
        let label = record.label.to_string();
        self.inner.write_record([
            record.key.name.as_str(),
            record.key.code.as_str(),
            label.as_str(),
            record.sequence.as_str(),
            record.action.as_str(),
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> PanelResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying sink.
    pub fn into_inner(self) -> PanelResult<W> {
        self.inner
            .into_inner()
            .map_err(|e| PanelError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Verbosity;
    use crate::fasta::FastaIndex;
    use crate::model::MutationLabel;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    const REFERENCE: &str = ">TP53 ENST1\nATCGATCG\n>KRAS ENST2\nGGGCCCAAATTT\n";

    fn builder(basesize: usize) -> PanelBuilder<Cursor<Vec<u8>>> {
        let index = FastaIndex::from_reader(REFERENCE.as_bytes()).unwrap();
        let reader = FastaReader::new(Cursor::new(REFERENCE.as_bytes().to_vec()), index);
        let config = PanelConfig {
            basesize,
            header: true,
        };
        PanelBuilder::new(reader, config, Console::new(Verbosity::Quiet))
    }

    fn entry(name: &str, code: &str, action: &str, line: u64) -> MutationEntry {
        MutationEntry {
            key: GeneKey::new(name, code),
            action: action.to_string(),
            line,
        }
    }

    fn run(builder: &mut PanelBuilder<Cursor<Vec<u8>>>, entries: Vec<MutationEntry>) -> (String, PanelSummary) {
        let mut writer = PanelWriter::new(Vec::new(), true).unwrap();
        let summary = builder
            .run(entries.into_iter().map(Ok), &mut writer)
            .unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        (out, summary)
    }

    #[test]
    fn test_wild_type_precedes_first_mutant() {
        let mut b = builder(100);
        let records = b.process(&entry("TP53", "ENST1", "3C>T", 2)).unwrap();
        assert_eq!(
            records,
            vec![
                PanelRecord::wild_type(GeneKey::new("TP53", "ENST1"), "ATCGATCG".into()),
                PanelRecord::mutant(GeneKey::new("TP53", "ENST1"), 1, "ATTGATCG".into(), "3C>T"),
            ]
        );
        let records = b.process(&entry("TP53", "ENST1", "c.3delC", 3)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, MutationLabel::Mutant(2));
        assert_eq!(records[0].sequence, "ATGATCG");
    }

    #[test]
    fn test_mutations_are_not_cumulative() {
        let mut b = builder(100);
        b.process(&entry("TP53", "ENST1", "1A>G", 2)).unwrap();
        // Position 1 is still 'A' in the reference
        let records = b.process(&entry("TP53", "ENST1", "1A>C", 3)).unwrap();
        assert_eq!(records[0].sequence, "CTCGATCG");
    }

    #[test]
    fn test_reference_is_shared_between_rows() {
        let mut b = builder(100);
        let key = GeneKey::new("TP53", "ENST1");
        let first = b.load_reference(&key).unwrap().unwrap();
        let second = b.load_reference(&key).unwrap().unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        let other = b.load_reference(&GeneKey::new("KRAS", "ENST2")).unwrap().unwrap();
        assert!(!Rc::ptr_eq(&first, &other));
        assert_eq!(first.as_str(), "ATCGATCG");
    }

    #[test]
    fn test_failures_are_skipped() {
        let mut b = builder(100);
        assert_eq!(b.process(&entry("TP53", "ENST1", "5G>T", 2)).unwrap().len(), 1);
        assert!(b.process(&entry("TP53", "ENST1", "p.V600E", 3)).unwrap().is_empty());
        let records = b.process(&entry("TP53", "ENST1", "ns5A>T", 4)).unwrap();
        assert_eq!(records[0].label, MutationLabel::Mutant(1));
        assert_eq!(records[0].sequence, "ATCGTT");

        let summary = b.summary();
        assert_eq!(summary.mismatches, 1);
        assert_eq!(summary.invalid_actions, 1);
        assert_eq!(summary.wild_types, 1);
        assert_eq!(summary.mutants, 1);
    }

    #[test]
    fn test_unknown_gene() {
        let mut b = builder(100);
        assert!(b.process(&entry("EGFR", "ENST9", "1A>T", 2)).unwrap().is_empty());
        assert!(b.process(&entry("EGFR", "ENST9", "2A>T", 3)).unwrap().is_empty());
        // Same name, different accession
        assert!(b.process(&entry("TP53", "ENST2", "1A>T", 4)).unwrap().is_empty());
        assert_eq!(b.summary().missing_references, 3);
        assert_eq!(b.summary().wild_types, 0);
    }

    #[test]
    fn test_duplicates_are_skipped() {
        let mut b = builder(100);
        b.process(&entry("KRAS", "ENST2", "c.4_5insAA", 2)).unwrap();
        assert!(b.process(&entry("KRAS", "ENST2", "c.4_5insAA", 3)).unwrap().is_empty());
        assert_eq!(b.summary().duplicates, 1);
    }

    #[test]
    fn test_out_of_bounds_is_emitted_unchanged() {
        let mut b = builder(100);
        let records = b.process(&entry("TP53", "ENST1", "20A>T", 2)).unwrap();
        assert_eq!(records[1].sequence, "ATCGATCG");
        assert_eq!(records[1].label, MutationLabel::Mutant(1));
        assert_eq!(b.summary().out_of_bounds, 1);
    }

    #[test]
    fn test_basesize_truncation() {
        let mut b = builder(4);
        let records = b.process(&entry("KRAS", "ENST2", "c.1_2insTT", 2)).unwrap();
        assert_eq!(records[0].sequence, "GGGC");
        assert_eq!(records[1].sequence, "ttGG");
    }

    #[test]
    fn test_run_writes_table() {
        let mut b = builder(6);
        let entries = vec![
            entry("TP53", "ENST1", "3C>T", 2),
            entry("KRAS", "ENST2", "c.2_5delXXXX", 3),
            entry("TP53", "ENST1", "5G>T", 4),
            entry("TP53", "ENST1", "c.3_4insAA", 5),
        ];
        let (out, summary) = run(&mut b, entries);
        assert_eq!(
            out,
            "geneName,geneCode,mutationLabel,sequencePrefix,actionText\n\
             TP53,ENST1,WT,ATCGAT,N/A\n\
             TP53,ENST1,M1,ATTGAT,3C>T\n\
             KRAS,ENST2,WT,GGGCCC,N/A\n\
             KRAS,ENST2,M1,GCAAAT,c.2_5delXXXX\n\
             TP53,ENST1,M2,ATaaCG,c.3_4insAA\n"
        );
        assert_eq!(summary.entries, 4);
        assert_eq!(summary.mutants, 3);
        assert_eq!(summary.skipped(), 1);
    }

    #[test]
    fn test_catalog_error_stops_run() {
        let mut b = builder(6);
        let mut writer = PanelWriter::new(Vec::new(), false).unwrap();
        let entries = vec![Err(CatalogError::MissingColumn("x".into()))];
        assert!(matches!(
            b.run(entries, &mut writer),
            Err(PanelError::Catalog(_))
        ));
    }

    #[test]
    fn test_writer_without_header() {
        let mut writer = PanelWriter::new(Vec::new(), false).unwrap();
        writer
            .write(&PanelRecord::wild_type(GeneKey::new("A", ""), "AC".into()))
            .unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "A,,WT,AC,N/A\n");
    }

    #[test]
    fn test_summary_display() {
        let summary = PanelSummary {
            entries: 3,
            wild_types: 1,
            mutants: 1,
            mismatches: 1,
            duplicates: 1,
            ..PanelSummary::default()
        };
        let text = summary.to_string();
        assert!(text.starts_with("Read 3 mutations: 1 genes, 1 mutants written, 2 skipped"));
        assert!(text.contains("reference mismatch: 1"));
    }
}
