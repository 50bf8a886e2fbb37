//! Error types for the vertical layout core

use std::fmt;

use thiserror::Error;

use crate::model::GroupId;

/// Where in the user's input a record came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputLocation {
    pub file: Option<String>,
    pub line: u32,
}

impl InputLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
        }
    }

    /// Location with a line number only
    pub fn line(line: u32) -> Self {
        Self { file: None, line }
    }
}

impl fmt::Display for InputLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}", file, self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

/// Errors that abort a layout run
///
/// Input errors point at the offending location so the caller can fix the
/// document. `InvalidHandle` and `Internal` indicate a defect in the core.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A stem length forced by the user ended up negative
    #[error("{location}: stem length {length:.3} inches is negative; forced stem lengths conflict with the beam")]
    NegativeStem { location: InputLocation, length: f64 },

    /// A beam was started but never ended
    #[error("{location}: beam is never terminated")]
    UnterminatedBeam { location: InputLocation },

    /// A tuplet was started but never ended
    #[error("{location}: tuplet is never terminated")]
    UnterminatedTuplet { location: InputLocation },

    /// A handle that does not address any group
    #[error("internal error: group handle {id:?} is out of range")]
    InvalidHandle { id: GroupId },

    /// Broken internal invariant
    #[error("internal error: {0}")]
    Internal(String),
}

impl LayoutError {
    /// Create a negative stem error
    pub fn negative_stem(location: &InputLocation, length: f64) -> Self {
        Self::NegativeStem {
            location: location.clone(),
            length,
        }
    }

    /// Create an unterminated beam error
    pub fn unterminated_beam(location: &InputLocation) -> Self {
        Self::UnterminatedBeam {
            location: location.clone(),
        }
    }

    /// Create an unterminated tuplet error
    pub fn unterminated_tuplet(location: &InputLocation) -> Self {
        Self::UnterminatedTuplet {
            location: location.clone(),
        }
    }

    /// Create an internal invariant error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Get the input location if the error was caused by the document
    pub fn location(&self) -> Option<&InputLocation> {
        match self {
            Self::NegativeStem { location, .. }
            | Self::UnterminatedBeam { location }
            | Self::UnterminatedTuplet { location } => Some(location),
            Self::InvalidHandle { .. } | Self::Internal(_) => None,
        }
    }

    /// True for defects in the core rather than in the input
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InvalidHandle { .. } | Self::Internal(_))
    }
}
