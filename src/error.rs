//! Error types for the analyzer
//!
//! Every failure is fatal to the current analysis run: a partially explored
//! set of callback interleavings would classify varying values as constant.

use serde::Serialize;
use thiserror::Error;

use crate::ast::Span;

/// Main error type for the analyzer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("UnboundNameError: {name} is not defined{}", format_location(.location))]
    UnboundName {
        name: String,
        location: Option<Span>,
    },

    #[error("RedeclarationError: {name} has already been declared{}", format_location(.location))]
    Redeclaration {
        name: String,
        location: Option<Span>,
    },

    #[error("InvalidProgramError: {message}{}", format_location(.location))]
    InvalidProgram {
        message: String,
        location: Option<Span>,
    },

    #[error("UnsupportedConstructError: {construct} is not supported{}", format_location(.location))]
    UnsupportedConstruct {
        construct: String,
        location: Option<Span>,
    },

    #[error("AnalysisDivergedError: {message}")]
    AnalysisDiverged { message: String },
}

fn format_location(location: &Option<Span>) -> String {
    match location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

/// The error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    UnboundNameError,
    RedeclarationError,
    InvalidProgramError,
    UnsupportedConstructError,
    AnalysisDivergedError,
}

/// Structured form of an [`AnalysisError`]: `{kind, message, sourceLocation?}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_location: Option<Span>,
}

impl AnalysisError {
    pub fn unbound_name(name: impl Into<String>, location: Option<Span>) -> Self {
        AnalysisError::UnboundName {
            name: name.into(),
            location,
        }
    }

    pub fn redeclaration(name: impl Into<String>, location: Option<Span>) -> Self {
        AnalysisError::Redeclaration {
            name: name.into(),
            location,
        }
    }

    pub fn invalid_program(message: impl Into<String>, location: Option<Span>) -> Self {
        AnalysisError::InvalidProgram {
            message: message.into(),
            location,
        }
    }

    pub fn unsupported(construct: impl Into<String>, location: Option<Span>) -> Self {
        AnalysisError::UnsupportedConstruct {
            construct: construct.into(),
            location,
        }
    }

    pub fn diverged(message: impl Into<String>) -> Self {
        AnalysisError::AnalysisDiverged {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::UnboundName { .. } => ErrorKind::UnboundNameError,
            AnalysisError::Redeclaration { .. } => ErrorKind::RedeclarationError,
            AnalysisError::InvalidProgram { .. } => ErrorKind::InvalidProgramError,
            AnalysisError::UnsupportedConstruct { .. } => ErrorKind::UnsupportedConstructError,
            AnalysisError::AnalysisDiverged { .. } => ErrorKind::AnalysisDivergedError,
        }
    }

    /// Source location of the offending node, when the input carried one.
    /// Divergence is an internal failure and never has a location.
    pub fn location(&self) -> Option<Span> {
        match self {
            AnalysisError::UnboundName { location, .. }
            | AnalysisError::Redeclaration { location, .. }
            | AnalysisError::InvalidProgram { location, .. }
            | AnalysisError::UnsupportedConstruct { location, .. } => *location,
            AnalysisError::AnalysisDiverged { .. } => None,
        }
    }

    /// Message without the kind prefix or location suffix
    pub fn message(&self) -> String {
        match self {
            AnalysisError::UnboundName { name, .. } => format!("{} is not defined", name),
            AnalysisError::Redeclaration { name, .. } => {
                format!("{} has already been declared", name)
            }
            AnalysisError::InvalidProgram { message, .. } => message.clone(),
            AnalysisError::UnsupportedConstruct { construct, .. } => {
                format!("{} is not supported", construct)
            }
            AnalysisError::AnalysisDiverged { message } => message.clone(),
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.message(),
            source_location: self.location(),
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        let location = match err.line() {
            0 => None,
            line => Some(Span::new(line as u32, err.column() as u32)),
        };
        AnalysisError::InvalidProgram {
            message: format!("malformed AST document: {}", err),
            location,
        }
    }
}
