//! Sorting errors.

use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display};

/// Boxed underlying cause of a [`SortError`].
pub type Cause = Box<dyn Error + Send + Sync + 'static>;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, SortError>;

/// Error kind. Wrapping an error never changes its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required input is missing or invalid.
    InvalidArgument,
    /// A backing store could not be created, opened or closed.
    Resource,
    /// Input could not be read while scanning lines.
    Scan,
    /// Expected terminal signal of a line cursor. Not a failure.
    EndOfInput,
    /// Data could not be written to a sink.
    Write,
    /// Merge was invoked without any chunk cursor.
    NoInputChunks,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Resource => "resource error",
            ErrorKind::Scan => "scan error",
            ErrorKind::EndOfInput => "end of input",
            ErrorKind::Write => "write error",
            ErrorKind::NoInputChunks => "no input chunks",
        };
        f.write_str(name)
    }
}

/// Sorting error.
///
/// Carries a kind, a message naming the stage that failed and an optional cause.
/// Every stage wraps the error it receives with [`SortError::wrap`] so the full chain can be
/// walked through [`Error::source`] while the kind stays inspectable with [`SortError::kind`].
pub struct SortError {
    kind: ErrorKind,
    stage: String,
    source: Option<Cause>,
}

impl SortError {
    /// Creates an error without an underlying cause.
    pub fn new(kind: ErrorKind, stage: impl Into<String>) -> Self {
        SortError {
            kind,
            stage: stage.into(),
            source: None,
        }
    }

    /// Creates an error caused by another error.
    pub fn with_source(kind: ErrorKind, stage: impl Into<String>, source: impl Into<Cause>) -> Self {
        SortError {
            kind,
            stage: stage.into(),
            source: Some(source.into()),
        }
    }

    pub fn invalid_argument(stage: impl Into<String>) -> Self {
        SortError::new(ErrorKind::InvalidArgument, stage)
    }

    pub fn end_of_input() -> Self {
        SortError::new(ErrorKind::EndOfInput, "end of input reached")
    }

    pub fn no_input_chunks() -> Self {
        SortError::new(ErrorKind::NoInputChunks, "nothing to merge")
    }

    /// Wraps the error with a new stage message keeping its kind.
    pub fn wrap(self, stage: impl Into<String>) -> Self {
        let kind = self.kind;
        SortError::with_source(kind, stage, self)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn is_end_of_input(&self) -> bool {
        self.kind == ErrorKind::EndOfInput
    }
}

impl Debug for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("SortError");
        debug.field("kind", &self.kind).field("stage", &self.stage);
        if let Some(source) = &self.source {
            debug.field("source", source);
        }
        debug.finish()
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.stage, source),
            None => write!(f, "{} ({})", self.stage, self.kind),
        }
    }
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as &(dyn Error + 'static))
    }
}
