//! Mutation action grammar and sequence editing.
//!
//! An action is a short text code describing one edit of a reference
//! sequence. Five grammars are recognized (case-insensitive):
//!
//! ```text
//! 10A>T            substitution
//! c.15delA         single-base deletion
//! ns7A>G           substitution, result cut at the next codon boundary
//! c.10_11insAAGG   insertion before position 10
//! c.10_20delXYZ    deletion of positions 10 through 20
//! ```
//!
//! Positions are 1-based as written. Every edit produces a new sequence;
//! the reference is never modified.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Errors raised while parsing or applying an action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("Invalid action format: {0}")]
    InvalidActionFormat(String),

    #[error("Mismatch action {action}: expected '{expected}' at position {position}, found '{found}'")]
    MismatchAction {
        action: String,
        position: usize,
        expected: char,
        found: char,
    },
}

/// Result type for mutation operations.
pub type MutationResult<T> = Result<T, MutationError>;

/// The kind of an action, without its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Substitute,
    DeleteOne,
    SubstituteTruncating,
    InsertMany,
    DeleteRange,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Substitute => write!(f, "substitution"),
            ActionKind::DeleteOne => write!(f, "deletion"),
            ActionKind::SubstituteTruncating => write!(f, "truncating substitution"),
            ActionKind::InsertMany => write!(f, "insertion"),
            ActionKind::DeleteRange => write!(f, "range deletion"),
        }
    }
}

/// A parsed mutation action.
///
/// Bases are kept exactly as written in the action text; the reference
/// check compares them case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationAction {
    Substitute {
        position: usize,
        expected: u8,
        replacement: u8,
    },
    DeleteOne {
        position: usize,
        expected: u8,
    },
    SubstituteTruncating {
        position: usize,
        expected: u8,
        replacement: u8,
    },
    InsertMany {
        position: usize,
        bases: Vec<u8>,
    },
    DeleteRange {
        start: usize,
        end: usize,
    },
}

struct Grammar {
    kind: ActionKind,
    pattern: Regex,
}

/// Anchored patterns in match precedence order.
fn grammars() -> &'static [Grammar] {
    static GRAMMARS: OnceLock<Vec<Grammar>> = OnceLock::new();
    GRAMMARS.get_or_init(|| {
        [
            (ActionKind::Substitute, r"^(\d+)([ACGT])>([ACGT])$"),
            (ActionKind::DeleteOne, r"^c\.(\d+)del([ACGT])$"),
            (ActionKind::SubstituteTruncating, r"^ns(\d+)([ACGT])>([ACGT])$"),
            (ActionKind::InsertMany, r"^c\.(\d+)_(\d+)ins([ACGT]+)$"),
            (ActionKind::DeleteRange, r"^c\.(\d+)_(\d+)del(.*)$"),
        ]
        .into_iter()
        .map(|(kind, pattern)| Grammar {
            kind,
            pattern: RegexBuilder::new(pattern)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()
                .unwrap_or_else(|e| panic!("built-in pattern {pattern:?} is invalid: {e}")),
        })
        .collect()
    })
}

impl MutationAction {
    /// Classifies an action string.
    ///
    /// The first grammar that matches the whole string wins. Positions too
    /// large to represent saturate, which places them past any sequence end.
    pub fn parse(text: &str) -> MutationResult<Self> {
        let (kind, caps) = grammars()
            .iter()
            .find_map(|g| g.pattern.captures(text).map(|caps| (g.kind, caps)))
            .ok_or_else(|| MutationError::InvalidActionFormat(text.to_string()))?;

        let position = |i: usize| caps[i].parse::<usize>().unwrap_or(usize::MAX);
        let base = |i: usize| caps[i].as_bytes()[0];

        let action = match kind {
            ActionKind::Substitute => MutationAction::Substitute {
                position: position(1),
                expected: base(2),
                replacement: base(3),
            },
            ActionKind::DeleteOne => MutationAction::DeleteOne {
                position: position(1),
                expected: base(2),
            },
            ActionKind::SubstituteTruncating => MutationAction::SubstituteTruncating {
                position: position(1),
                expected: base(2),
                replacement: base(3),
            },
            // The second position only marks the flanking base.
            ActionKind::InsertMany => MutationAction::InsertMany {
                position: position(1),
                bases: caps[3].to_ascii_lowercase().into_bytes(),
            },
            ActionKind::DeleteRange => MutationAction::DeleteRange {
                start: position(1),
                end: position(2),
            },
        };
        Ok(action)
    }

    /// Returns the kind of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            MutationAction::Substitute { .. } => ActionKind::Substitute,
            MutationAction::DeleteOne { .. } => ActionKind::DeleteOne,
            MutationAction::SubstituteTruncating { .. } => ActionKind::SubstituteTruncating,
            MutationAction::InsertMany { .. } => ActionKind::InsertMany,
            MutationAction::DeleteRange { .. } => ActionKind::DeleteRange,
        }
    }

    /// Position and expected base for the single-base kinds.
    fn anchor(&self) -> Option<(usize, u8)> {
        match *self {
            MutationAction::Substitute { position, expected, .. }
            | MutationAction::DeleteOne { position, expected }
            | MutationAction::SubstituteTruncating { position, expected, .. } => {
                Some((position, expected))
            }
            MutationAction::InsertMany { .. } | MutationAction::DeleteRange { .. } => None,
        }
    }

    /// Returns false when a single-base action points at no base of a
    /// sequence of length `len` (position 0 or past the end). Such actions
    /// leave the sequence unchanged.
    ///
    /// Insertions and range deletions have no anchor and always return true.
    pub fn anchor_in_bounds(&self, len: usize) -> bool {
        self.anchor()
            .map_or(true, |(position, _)| (1..=len).contains(&position))
    }

    /// Applies the action to `sequence`, returning the edited copy.
    ///
    /// A single-base action whose position names no base of the sequence
    /// returns the sequence unchanged. Range offsets follow slice semantics:
    /// the result is `sequence[..start - 1] + sequence[end..]`, each bound
    /// clamped to the sequence, so a reversed range repeats the overlap.
    pub fn apply(&self, sequence: &[u8]) -> MutationResult<Vec<u8>> {
        if let Some((position, expected)) = self.anchor() {
            let Some(&found) = position.checked_sub(1).and_then(|i| sequence.get(i)) else {
                return Ok(sequence.to_vec());
            };
            if found != expected {
                return Err(MutationError::MismatchAction {
                    action: self.to_string(),
                    position,
                    expected: expected as char,
                    found: found as char,
                });
            }
        }

        let edited = match self {
            MutationAction::Substitute {
                position,
                replacement,
                ..
            } => {
                let mut out = sequence.to_vec();
                out[position - 1] = *replacement;
                out
            }
            MutationAction::DeleteOne { position, .. } => {
                let mut out = sequence.to_vec();
                out.remove(position - 1);
                out
            }
            MutationAction::SubstituteTruncating {
                position,
                replacement,
                ..
            } => {
                let mut out = sequence.to_vec();
                out[position - 1] = *replacement;
                out.truncate(codon_boundary(*position));
                out
            }
            MutationAction::InsertMany { position, bases } => {
                let at = position.saturating_sub(1).min(sequence.len());
                let mut out = Vec::with_capacity(sequence.len() + bases.len());
                out.extend_from_slice(&sequence[..at]);
                out.extend_from_slice(bases);
                out.extend_from_slice(&sequence[at..]);
                out
            }
            MutationAction::DeleteRange { start, end } => {
                let head = start.saturating_sub(1).min(sequence.len());
                let tail = (*end).min(sequence.len());
                let mut out = Vec::with_capacity(head + (sequence.len() - tail));
                out.extend_from_slice(&sequence[..head]);
                out.extend_from_slice(&sequence[tail..]);
                out
            }
        };
        Ok(edited)
    }
}

impl FromStr for MutationAction {
    type Err = MutationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MutationAction::parse(s)
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationAction::Substitute {
                position,
                expected,
                replacement,
            } => write!(f, "{}{}>{}", position, *expected as char, *replacement as char),
            MutationAction::DeleteOne { position, expected } => {
                write!(f, "c.{}del{}", position, *expected as char)
            }
            MutationAction::SubstituteTruncating {
                position,
                expected,
                replacement,
            } => write!(f, "ns{}{}>{}", position, *expected as char, *replacement as char),
            MutationAction::InsertMany { position, bases } => write!(
                f,
                "c.{}_{}ins{}",
                position,
                position.saturating_add(1),
                String::from_utf8_lossy(bases).to_uppercase()
            ),
            MutationAction::DeleteRange { start, end } => write!(f, "c.{}_{}del", start, end),
        }
    }
}

/// Smallest multiple of 3 that is at least `position`.
fn codon_boundary(position: usize) -> usize {
    position.div_ceil(3) * 3
}

/// Parses `action` and applies it to `sequence`.
///
/// # Examples
///
/// ```
/// use seqmut::mutation::transform;
///
/// assert_eq!(transform("ATCGATCG", "3C>T").unwrap(), "ATTGATCG");
/// assert_eq!(transform("ATCGATCG", "c.3_4insAA").unwrap(), "ATaaCGATCG");
/// ```
pub fn transform(sequence: &str, action: &str) -> MutationResult<String> {
    let edited = MutationAction::parse(action)?.apply(sequence.as_bytes())?;
    Ok(String::from_utf8_lossy(&edited).into_owned())
}
