//! Diagnostic output on stderr.
//!
//! Standard output may carry the panel itself, so every message goes to
//! stderr. The amount printed is controlled by [`Verbosity`].

use colored::Colorize;

/// How much diagnostic output to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Warnings for skipped records and the run summary
    #[default]
    Normal,
    /// Everything, including per-record progress
    Verbose,
}

impl Verbosity {
    /// Builds a verbosity from the `-q` flag and the number of `-v` flags.
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose > 0 {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

/// Writes styled diagnostics to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console {
    verbosity: Verbosity,
}

impl Console {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Always printed.
    pub fn error(&self, message: impl std::fmt::Display) {
        eprintln!("{}: {}", "Error".red().bold(), message);
    }

    pub fn warn(&self, message: impl std::fmt::Display) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{}: {}", "Warning".yellow().bold(), message);
        }
    }

    pub fn info(&self, message: impl std::fmt::Display) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{}", message);
        }
    }

    pub fn debug(&self, message: impl std::fmt::Display) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{}", message.to_string().dimmed());
        }
    }
}
