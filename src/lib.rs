//! # seqmut - Mutant Sequence Panels
//!
//! Applies COSMIC-style point mutations to reference nucleotide sequences
//! and writes one record per mutant, preceded by a wild-type record per gene.
//!
//! ## Architecture
//!
//! - `mutation`: Action grammar parsing and sequence editing
//! - `model`: Sequences, gene keys and panel records
//! - `fasta`: FASTA indexing and keyed random access
//! - `catalog`: Mutation table reading
//! - `panel`: Orchestration, deduplication and panel output
//! - `console`: Diagnostics on stderr

pub mod catalog;
pub mod console;
pub mod fasta;
pub mod model;
pub mod mutation;
pub mod panel;
