// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.

//! Library error codes and results.

use std::fmt::{Display, Formatter};

/// Project-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Max string length when the error is converted to string using `to_string_full`.
const MAX_ERROR_SOURCE_STRING_LENGTH: usize = 128;

/// Error kind to better contextualize the returned error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// Data received from the chain or read from a file cannot be decoded.
    MalformedData,
    /// The chain node cannot be reached or answered with an error.
    NodeFault,
    /// A proposer or commit signer is not part of the fetched validator set.
    UnknownValidator,
    /// The persistence backend refused a read or a write.
    DatabaseFault,
    /// A module handler failed.
    ModuleFault,
    /// Configuration is invalid.
    BadConfig,
    ResourceNotFound,
    ChannelFault,
    Other,
}

/// Error kind strings.
pub(super) mod error_kind_str {
    pub const MALFORMED_DATA: &str = "malformed data";
    pub const NODE_FAULT: &str = "node fault";
    pub const UNKNOWN_VALIDATOR: &str = "unknown validator";
    pub const DATABASE_FAULT: &str = "database fault";
    pub const MODULE_FAULT: &str = "module fault";
    pub const BAD_CONFIG: &str = "bad config";
    pub const RESOURCE_NOT_FOUND: &str = "resource not found";
    pub const CHANNEL_FAULT: &str = "channel fault";
    pub const OTHER: &str = "other";
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        let kind_str = match self {
            MalformedData => error_kind_str::MALFORMED_DATA,
            NodeFault => error_kind_str::NODE_FAULT,
            UnknownValidator => error_kind_str::UNKNOWN_VALIDATOR,
            DatabaseFault => error_kind_str::DATABASE_FAULT,
            ModuleFault => error_kind_str::MODULE_FAULT,
            BadConfig => error_kind_str::BAD_CONFIG,
            ResourceNotFound => error_kind_str::RESOURCE_NOT_FOUND,
            ChannelFault => error_kind_str::CHANNEL_FAULT,
            Other => error_kind_str::OTHER,
        };
        write!(f, "{}", kind_str)
    }
}

/// Project-wide error type.
/// Contains a kind enumerate and a `source` to identify the subsystem that may
/// have propagated the error.
#[derive(Debug)]
pub struct Error {
    /// Error kind.
    pub kind: ErrorKind,
    /// Underlying cause, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Error {
            kind: self.kind,
            source: self
                .source
                .as_ref()
                .map(|source| source.to_string().into()),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::new_ext(ErrorKind::Other, s)
    }
}

impl<T> From<ErrorKind> for Result<T> {
    fn from(kind: ErrorKind) -> Self {
        Err(kind.into())
    }
}

impl Error {
    pub fn new_ext<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let source = error.into();
        Error {
            kind,
            source: Some(source),
        }
    }

    pub fn new(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    /// Wraps the error with a context string, keeping its kind.
    pub fn context(self, ctx: &str) -> Error {
        let detail = match self.source {
            Some(ref source) => format!("{}: {}", ctx, source),
            None => ctx.to_string(),
        };
        Error::new_ext(self.kind, detail)
    }

    pub fn to_string_full(&self) -> String {
        let mut err_string = self.to_string();
        if let Some(ref source) = self.source {
            let detail = format!(": {}", source);
            let max_len = std::cmp::min(detail.len(), MAX_ERROR_SOURCE_STRING_LENGTH);
            let mut end = max_len;
            while !detail.is_char_boundary(end) {
                end -= 1;
            }
            err_string.push_str(&detail[..end]);
        }
        err_string
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match (&self.source, &other.source) {
            (None, None) => true,
            (Some(a), Some(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.source {
            None => None,
            Some(ref source) => Some(source.as_ref()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use ErrorKind::*;

    #[test]
    fn generic_error_type() {
        let src1 = io::Error::new(io::ErrorKind::PermissionDenied, "oh no!");
        let src2 = io::Error::new(io::ErrorKind::TimedOut, "oh yes!");
        let err1 = Error::new_ext(DatabaseFault, src1);
        let err2 = Error::new_ext(DatabaseFault, src2);

        assert_ne!(err1, err2);
    }

    #[test]
    fn external_db_failure() {
        let source = io::Error::new(io::ErrorKind::PermissionDenied, "oh no!");

        let error = Error::new_ext(DatabaseFault, source);

        assert_eq!(error.to_string(), "database fault");
        assert_eq!(error.to_string_full(), "database fault: oh no!");
        let source = std::error::Error::source(&error)
            .unwrap()
            .downcast_ref::<io::Error>()
            .unwrap();
        assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn context_keeps_kind() {
        let error = Error::new_ext(NodeFault, "connection refused");

        let error = error.context("failed to get block 7");

        assert_eq!(error.kind, NodeFault);
        assert_eq!(
            error.to_string_full(),
            "node fault: failed to get block 7: connection refused"
        );
    }

    #[test]
    fn long_source_is_truncated() {
        let error = Error::new_ext(Other, "x".repeat(500));

        let full = error.to_string_full();

        assert_eq!(full.len(), "other".len() + MAX_ERROR_SOURCE_STRING_LENGTH);
    }

    #[test]
    fn cloned_error_keeps_source_text() {
        let error = Error::new_ext(ModuleFault, "boom");

        let cloned = error.clone();

        assert_eq!(cloned, error);
    }
}
