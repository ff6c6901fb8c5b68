//! Error type shared by the grid engine, the likelihood engine and the CLI.
//!
//! Every failure carries an [`ErrorKind`] (which also fixes the process exit
//! code) and a human-readable message. Callers add context such as the star
//! index or axis with [`AppError::context`] as the error travels outward.

/// Broad failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-positive kernel sigma, malformed grid step, mismatched dimensions.
    InvalidParameter,
    /// A kernel or evaluation window does not fit inside the grid extent.
    InsufficientSupport,
    /// Zero or non-finite normalization mass and similar degenerate numerics.
    NumericalDegeneracy,
    /// Root bracketing or solver failure (a logic defect, never expected).
    RootFinding,
    /// File, CSV or JSON failures.
    Io,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::InvalidParameter => 2,
            ErrorKind::InsufficientSupport => 3,
            ErrorKind::NumericalDegeneracy => 4,
            ErrorKind::RootFinding => 5,
            ErrorKind::Io => 6,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }

    pub fn support(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientSupport, message)
    }

    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NumericalDegeneracy, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// Prefix the message with where the failure happened.
    pub fn context(mut self, what: impl std::fmt::Display) -> Self {
        self.message = format!("{what}: {}", self.message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prefixes_message_and_keeps_kind() {
        let err = AppError::support("kernel does not fit").context("axis 1").context("star 7");
        assert_eq!(err.kind(), ErrorKind::InsufficientSupport);
        assert_eq!(err.to_string(), "star 7: axis 1: kernel does not fit");
        assert_eq!(err.exit_code(), 3);
    }
}
