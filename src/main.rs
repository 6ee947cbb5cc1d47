//! seqmut - Mutant Sequence Panel Builder
//!
//! Builds a table of mutant sequences from an indexed FASTA reference and a
//! COSMIC-style mutation table.
//!
//! ## Usage
//!
//! ```bash
//! seqmut genes.fasta mutations.tsv -o panel.csv
//! seqmut genes.fasta mutations.csv -b 300 --index genes.idx --save-index
//! ```
//!
//! ## Supported Actions
//!
//! - `10A>T`: substitution
//! - `c.15delA`: single-base deletion
//! - `ns7A>G`: substitution truncated at the next codon boundary
//! - `c.10_11insAAGG`: insertion
//! - `c.10_20del`: range deletion

// Use jemalloc for better memory management (returns memory to OS)
#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use seqmut::catalog::{
    CatalogOptions, CatalogReader, Delimiter, DEFAULT_ACTION_COLUMN, DEFAULT_CODE_COLUMN,
    DEFAULT_GENE_COLUMN,
};
use seqmut::console::{Console, Verbosity};
use seqmut::fasta::{FastaIndex, FastaReader};
use seqmut::panel::{PanelBuilder, PanelConfig, PanelWriter, DEFAULT_BASESIZE};

/// Field separator of the mutation table
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DelimiterArg {
    /// Comma-separated
    Comma,
    /// Tab-separated
    Tab,
    /// Detect from the file extension (.tsv, .tab, .txt are tab-separated)
    Auto,
}

impl From<DelimiterArg> for Option<Delimiter> {
    fn from(arg: DelimiterArg) -> Self {
        match arg {
            DelimiterArg::Comma => Some(Delimiter::Comma),
            DelimiterArg::Tab => Some(Delimiter::Tab),
            DelimiterArg::Auto => None,
        }
    }
}

/// seqmut - Build mutant sequence panels from COSMIC-style annotations
///
/// Every mutation is applied to the wild-type reference of its gene. Rows
/// that cannot be applied are reported as warnings and skipped.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Reference FASTA file (headers: ">GENE ACCESSION" or ">GENE_ACCESSION")
    reference: PathBuf,

    /// Mutation table (CSV or TSV with a header row)
    mutations: PathBuf,

    /// Output file. Use "-" for stdout.
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: String,

    /// Number of leading bases written for each sequence
    #[arg(short = 'b', long = "basesize", default_value_t = DEFAULT_BASESIZE)]
    basesize: usize,

    /// Column holding the gene name
    #[arg(long = "gene-column", default_value = DEFAULT_GENE_COLUMN)]
    gene_column: String,

    /// Column holding the accession code
    #[arg(long = "code-column", default_value = DEFAULT_CODE_COLUMN)]
    code_column: String,

    /// Column holding the mutation action
    #[arg(long = "action-column", default_value = DEFAULT_ACTION_COLUMN)]
    action_column: String,

    /// Field separator of the mutation table
    #[arg(short = 'd', long = "delimiter", value_enum, default_value = "auto")]
    delimiter: DelimiterArg,

    /// Reference index file; loaded if it exists, otherwise the FASTA file is scanned
    #[arg(long = "index")]
    index: Option<PathBuf>,

    /// Write the scanned index to the --index path
    #[arg(long = "save-index", requires = "index")]
    save_index: bool,

    /// Omit the column header row
    #[arg(long = "no-header")]
    no_header: bool,

    /// Report every skipped or adjusted record
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only report errors
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

/// Loads the reference index, scanning the FASTA file when needed.
fn load_index(args: &Args, console: &Console) -> Result<FastaIndex> {
    if let Some(path) = &args.index {
        if path.exists() && !args.save_index {
            console.debug(format!("Loading index {}", path.display()));
            return FastaIndex::load(path)
                .with_context(|| format!("Failed to load index {}", path.display()));
        }
    }

    console.debug(format!("Indexing {}", args.reference.display()));
    let index = FastaIndex::build(&args.reference)
        .with_context(|| format!("Failed to index {}", args.reference.display()))?;
    if index.duplicates > 0 {
        console.warn(format!(
            "{} duplicate headers in {}, first occurrence kept",
            index.duplicates,
            args.reference.display()
        ));
    }

    if let (true, Some(path)) = (args.save_index, &args.index) {
        index
            .save(path)
            .with_context(|| format!("Failed to write index {}", path.display()))?;
        console.info(format!("Wrote index of {} references to {}", index.len(), path.display()));
    }
    Ok(index)
}

fn open_output(output: &str) -> Result<Box<dyn Write>> {
    if output == "-" {
        Ok(Box::new(BufWriter::new(io::stdout().lock())))
    } else {
        let file = File::create(Path::new(output))
            .with_context(|| format!("Failed to create {}", output))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

fn run(args: Args, console: Console) -> Result<()> {
    let index = load_index(&args, &console)?;
    console.debug(format!("{} references indexed", index.len()));
    let reference = FastaReader::open(&args.reference, index)
        .with_context(|| format!("Failed to open {}", args.reference.display()))?;

    let options = CatalogOptions {
        delimiter: args.delimiter.into(),
        gene_column: args.gene_column.clone(),
        code_column: args.code_column.clone(),
        action_column: args.action_column.clone(),
    };
    let entries = CatalogReader::open(&args.mutations, &options)
        .with_context(|| format!("Failed to read {}", args.mutations.display()))?;

    let config = PanelConfig {
        basesize: args.basesize,
        header: !args.no_header,
    };
    let mut writer = PanelWriter::new(open_output(&args.output)?, config.header)?;
    let mut builder = PanelBuilder::new(reference, config, console);
    let summary = builder.run(entries, &mut writer)?;
    writer.into_inner()?.flush()?;

    console.info(&summary);
    if args.output != "-" {
        console.info(format!("Wrote panel to {}", args.output));
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new(Verbosity::from_flags(args.quiet, args.verbose));

    if args.basesize == 0 {
        anyhow::bail!("Base size must be at least 1");
    }

    if let Err(e) = run(args, console) {
        console.error(format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
