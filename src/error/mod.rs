//! Unified error handling for GraniteDB.
//!
//! This module defines [`GraniteError`], the single error type propagated
//! throughout every layer of the engine — from the pager and WAL, through
//! the catalog and index, up through the SQL front-end and executor.
//!
//! A convenience [`Result<T>`] type alias is re-exported so that callers can
//! write `Result<T>` instead of `std::result::Result<T, GraniteError>`.

use std::fmt;
use std::io;

/// The canonical error type for all GraniteDB operations.
///
/// Variants are grouped by the error kinds the specification names (§7):
/// definition errors, type errors, constraint violations, planning
/// (SQL) errors, I/O errors, and corruption. `Internal` and
/// `NotImplemented` round out the set for engine bugs and deliberately
/// unsupported surface area.
#[derive(Debug)]
pub enum GraniteError {
    /// Duplicate table/index, unknown column, invalid precision, missing
    /// primary-key column.
    Definition(String),

    /// Incompatible operand types in an expression or `INSERT`.
    Type(String),

    /// `NOT NULL` violation, unique-index duplicate, `VARCHAR` overflow,
    /// `DECIMAL` out-of-range.
    Constraint(String),

    /// Syntactic SQL errors, unsupported syntax, unresolved identifier.
    Planning(String),

    /// Pager/WAL/filesystem I/O failure.
    Io(io::Error),

    /// Bad magic, page checksum mismatch, truncated file, unrecoverable
    /// WAL — fatal at open time.
    Corruption(String),

    /// An internal invariant was violated; indicates a bug in the engine
    /// itself.
    Internal(String),

    /// The requested feature is out of scope for this core.
    NotImplemented(String),
}

impl fmt::Display for GraniteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraniteError::Definition(msg) => write!(f, "definition error: {msg}"),
            GraniteError::Type(msg) => write!(f, "type error: {msg}"),
            GraniteError::Constraint(msg) => write!(f, "constraint violation: {msg}"),
            GraniteError::Planning(msg) => write!(f, "planning error: {msg}"),
            GraniteError::Io(err) => write!(f, "I/O error: {err}"),
            GraniteError::Corruption(msg) => write!(f, "corrupt database: {msg}"),
            GraniteError::Internal(msg) => write!(f, "internal error: {msg}"),
            GraniteError::NotImplemented(msg) => write!(f, "not implemented: {msg}"),
        }
    }
}

impl std::error::Error for GraniteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GraniteError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for GraniteError {
    fn from(err: io::Error) -> Self {
        GraniteError::Io(err)
    }
}

/// A specialised [`Result`] type for GraniteDB operations.
pub type Result<T> = std::result::Result<T, GraniteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts_via_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let err: GraniteError = GraniteError::from(io_err);
        assert!(matches!(err, GraniteError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn io_error_converts_via_question_mark() {
        fn might_fail() -> Result<()> {
            let _f = std::fs::File::open("/non/existent/path/granite_test")?;
            Ok(())
        }
        assert!(matches!(might_fail().unwrap_err(), GraniteError::Io(_)));
    }

    #[test]
    fn display_messages_are_human_readable() {
        let cases: Vec<(GraniteError, &str)> = vec![
            (
                GraniteError::Definition("duplicate table users".into()),
                "definition error: duplicate table users",
            ),
            (
                GraniteError::Type("cannot compare INT and VARCHAR".into()),
                "type error: cannot compare INT and VARCHAR",
            ),
            (
                GraniteError::Constraint("NOT NULL violated on id".into()),
                "constraint violation: NOT NULL violated on id",
            ),
            (
                GraniteError::Planning("unexpected token".into()),
                "planning error: unexpected token",
            ),
            (
                GraniteError::Corruption("bad magic".into()),
                "corrupt database: bad magic",
            ),
            (
                GraniteError::Internal("unreachable".into()),
                "internal error: unreachable",
            ),
            (
                GraniteError::NotImplemented("subqueries".into()),
                "not implemented: subqueries",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn error_source_chains_io_errors() {
        use std::error::Error;
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = GraniteError::Io(io_err);
        assert!(err.source().is_some());
        assert!(GraniteError::Internal("x".into()).source().is_none());
    }
}
