//! Error types for reconciling result variants.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies which shape failed to align its variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeTag {
    Literal,
    Option,
    Terms,
    Ids,
    Keys,
}

impl ShapeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Option => "option",
            Self::Terms => "terms",
            Self::Ids => "ids",
            Self::Keys => "keys",
        }
    }
}

impl fmt::Display for ShapeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to fold N result variants into one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceFailure {
    #[error("structural mismatch: variants disagree on {0}")]
    StructuralMismatch(ShapeTag),
    #[error("payload mismatch: {0}")]
    PayloadMismatch(String),
    #[error("existence of {id} changed between variants")]
    ExistenceChanged { id: String },
}

impl ReduceFailure {
    pub fn structural(tag: ShapeTag) -> Self {
        Self::StructuralMismatch(tag)
    }

    pub fn payload(reason: impl Into<String>) -> Self {
        Self::PayloadMismatch(reason.into())
    }

    /// The shape tag for structural failures, `None` otherwise.
    pub fn shape(&self) -> Option<ShapeTag> {
        match self {
            Self::StructuralMismatch(tag) => Some(*tag),
            _ => None,
        }
    }
}

/// Convenience result type for reductions.
pub type ReduceResult<T> = Result<T, ReduceFailure>;
