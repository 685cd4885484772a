// Error taxonomy shared by the store, the C ABI, and the CLI.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::ffi;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Open,
    Schema,
    Engine,
    Busy,
    Misuse,
    TypeMismatch,
    Corrupt,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    key: Option<String>,
    engine_code: Option<i32>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            key: None,
            engine_code: None,
            source: None,
        }
    }

    /// Classifies an engine failure. `fallback` is used for failures that carry no
    /// more specific meaning (e.g. `Open` while opening, `Schema` while creating the table).
    pub fn from_engine(fallback: ErrorKind, err: rusqlite::Error) -> Self {
        let code = extended_code(&err);
        let kind = match code.map(|code| code & 0xff) {
            Some(ffi::SQLITE_BUSY) | Some(ffi::SQLITE_LOCKED) => ErrorKind::Busy,
            Some(ffi::SQLITE_MISUSE) => ErrorKind::Misuse,
            Some(ffi::SQLITE_MISMATCH) => ErrorKind::TypeMismatch,
            Some(ffi::SQLITE_CORRUPT) | Some(ffi::SQLITE_NOTADB) => ErrorKind::Corrupt,
            _ => fallback,
        };
        let message = match &err {
            rusqlite::Error::SqliteFailure(_, Some(message)) => message.clone(),
            _ => err.to_string(),
        };
        let mut out = Self::new(kind).with_message(message).with_source(err);
        out.engine_code = code;
        out
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Primary engine result code (low byte of the extended code).
    pub fn engine_code(&self) -> Option<i32> {
        self.engine_code.map(|code| code & 0xff)
    }

    pub fn extended_code(&self) -> Option<i32> {
        self.engine_code
    }

    /// Result code reported across the C boundary. Errors raised by this crate rather
    /// than the engine are mapped onto the closest engine code.
    pub fn result_code(&self) -> i32 {
        if let Some(code) = self.engine_code() {
            return code;
        }
        match self.kind {
            ErrorKind::Misuse | ErrorKind::Usage => ffi::SQLITE_MISUSE,
            ErrorKind::TypeMismatch => ffi::SQLITE_MISMATCH,
            ErrorKind::Open => ffi::SQLITE_CANTOPEN,
            ErrorKind::Busy => ffi::SQLITE_BUSY,
            ErrorKind::Corrupt => ffi::SQLITE_CORRUPT,
            ErrorKind::Internal | ErrorKind::Schema | ErrorKind::Engine => ffi::SQLITE_ERROR,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_engine_code(mut self, code: i32) -> Self {
        self.engine_code = Some(code);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(key) = &self.key {
            write!(f, " (key: {key:?})")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(code) = self.engine_code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

fn extended_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.extended_code),
        _ => None,
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Open => 3,
        ErrorKind::Schema => 4,
        ErrorKind::Engine => 5,
        ErrorKind::Busy => 6,
        ErrorKind::Misuse => 7,
        ErrorKind::TypeMismatch => 8,
        ErrorKind::Corrupt => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};
    use rusqlite::ffi;

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::Open, 3),
            (ErrorKind::Schema, 4),
            (ErrorKind::Engine, 5),
            (ErrorKind::Busy, 6),
            (ErrorKind::Misuse, 7),
            (ErrorKind::TypeMismatch, 8),
            (ErrorKind::Corrupt, 9),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn engine_failures_keep_their_codes() {
        let failure = rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
            Some("UNIQUE constraint failed".to_string()),
        );
        let err = Error::from_engine(ErrorKind::Engine, failure);
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(err.engine_code(), Some(ffi::SQLITE_CONSTRAINT));
        assert_eq!(err.extended_code(), Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY));
        assert!(err.message().unwrap().contains("UNIQUE constraint failed"));
    }

    #[test]
    fn busy_and_locked_map_to_busy() {
        for code in [ffi::SQLITE_BUSY, ffi::SQLITE_LOCKED] {
            let failure = rusqlite::Error::SqliteFailure(ffi::Error::new(code), None);
            let err = Error::from_engine(ErrorKind::Engine, failure);
            assert_eq!(err.kind(), ErrorKind::Busy);
            assert_eq!(err.result_code(), code);
        }
    }

    #[test]
    fn crate_errors_map_to_engine_codes() {
        assert_eq!(
            Error::new(ErrorKind::Misuse).result_code(),
            ffi::SQLITE_MISUSE
        );
        assert_eq!(
            Error::new(ErrorKind::TypeMismatch).result_code(),
            ffi::SQLITE_MISMATCH
        );
        assert_eq!(Error::new(ErrorKind::Schema).result_code(), ffi::SQLITE_ERROR);
    }
}
