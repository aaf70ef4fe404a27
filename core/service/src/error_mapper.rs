// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Maps arbitrary failures onto the gRPC status taxonomy.
//!
//! A failure that already carries a [`Status`] anywhere in its source chain
//! is passed through untouched. Anything else is classified by looking at the
//! typed errors in the chain first and at the chain's messages second.

use std::error::Error;
use std::io;
use std::sync::Arc;

use tonic::{Code, Status};

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Error classification shared by the client and the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    DeadlineExceeded,
    Unavailable,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    Internal,
    Cancelled,
    Unknown,
}

impl ErrorKind {
    pub fn code(self) -> Code {
        match self {
            ErrorKind::InvalidArgument => Code::InvalidArgument,
            ErrorKind::DeadlineExceeded => Code::DeadlineExceeded,
            ErrorKind::Unavailable => Code::Unavailable,
            ErrorKind::Unauthenticated => Code::Unauthenticated,
            ErrorKind::PermissionDenied => Code::PermissionDenied,
            ErrorKind::NotFound => Code::NotFound,
            ErrorKind::AlreadyExists => Code::AlreadyExists,
            ErrorKind::Internal => Code::Internal,
            ErrorKind::Cancelled => Code::Cancelled,
            ErrorKind::Unknown => Code::Unknown,
        }
    }

    /// Human readable prefix of every description of this kind.
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "Invalid request parameters",
            ErrorKind::DeadlineExceeded => "Request timeout",
            ErrorKind::Unavailable => "Service unavailable",
            ErrorKind::Unauthenticated => "Authentication required",
            ErrorKind::PermissionDenied => "Permission denied",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::AlreadyExists => "Resource already exists",
            ErrorKind::Internal => "Internal server error",
            ErrorKind::Cancelled => "Operation cancelled",
            ErrorKind::Unknown => "Unknown error",
        }
    }

    /// Codes outside the taxonomy map to `Unknown`.
    pub fn from_code(code: Code) -> ErrorKind {
        match code {
            Code::InvalidArgument => ErrorKind::InvalidArgument,
            Code::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Code::Unavailable => ErrorKind::Unavailable,
            Code::Unauthenticated => ErrorKind::Unauthenticated,
            Code::PermissionDenied => ErrorKind::PermissionDenied,
            Code::NotFound => ErrorKind::NotFound,
            Code::AlreadyExists => ErrorKind::AlreadyExists,
            Code::Internal => ErrorKind::Internal,
            Code::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.code())
    }
}

/// A classified failure: code, description and the optional original cause.
#[derive(Debug, Clone)]
pub struct ErrorStatus {
    status: Status,
}

impl ErrorStatus {
    pub fn new(kind: ErrorKind, message: impl std::fmt::Display) -> Self {
        ErrorStatus {
            status: Status::new(kind.code(), format!("{}: {}", kind.description(), message)),
        }
    }

    fn with_cause(kind: ErrorKind, cause: BoxError) -> Self {
        let mut error = ErrorStatus::new(kind, &cause);
        error.status.set_source(Arc::from(cause));
        error
    }

    pub fn code(&self) -> Code {
        self.status.code()
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(self.status.code())
    }

    pub fn description(&self) -> &str {
        self.status.message()
    }

    pub fn cause(&self) -> Option<&(dyn Error + 'static)> {
        self.status.source()
    }

    /// Whether a whole call attempt failing this way is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.status.code(),
            Code::Unavailable | Code::DeadlineExceeded | Code::ResourceExhausted | Code::Internal
        )
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn into_status(self) -> Status {
        self.status
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.status.code(), self.status.message())
    }
}

impl Error for ErrorStatus {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.status.source()
    }
}

impl From<Status> for ErrorStatus {
    fn from(status: Status) -> Self {
        ErrorStatus { status }
    }
}

impl From<ErrorStatus> for Status {
    fn from(error: ErrorStatus) -> Self {
        error.status
    }
}

const TIMEOUT_WORDS: &[&str] = &["timeout", "timed out", "deadline", "elapsed"];
const CONNECTION_WORDS: &[&str] = &[
    "connection",
    "connect",
    "network",
    "unreachable",
    "refused",
    "broken pipe",
    "dns",
    "resolve",
    "unknown host",
];
const ARGUMENT_WORDS: &[&str] = &["argument", "invalid", "null", "parse"];
const AUTHENTICATION_WORDS: &[&str] = &["authentication", "unauthenticated", "unauthorized"];
const PERMISSION_WORDS: &[&str] = &["security", "permission", "forbidden", "denied"];
// matched against the text with spaces, dashes and underscores removed
const NOT_FOUND_WORDS: &[&str] = &["notfound", "nosuch"];
const ALREADY_EXISTS_WORDS: &[&str] = &["alreadyexists", "duplicate"];

fn chain<'a>(err: &'a (dyn Error + 'static)) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn kind_of(err: &(dyn Error + 'static)) -> ErrorKind {
    let io_kinds: Vec<io::ErrorKind> = chain(err)
        .filter_map(|e| e.downcast_ref::<io::Error>().map(io::Error::kind))
        .collect();
    let text = chain(err)
        .map(|e| e.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(": ");
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect();

    let io_is = |kinds: &[io::ErrorKind]| io_kinds.iter().any(|k| kinds.contains(k));
    let mentions = |words: &[&str]| words.iter().any(|w| text.contains(w));
    let mentions_compact = |words: &[&str]| words.iter().any(|w| compact.contains(w));

    if io_is(&[io::ErrorKind::TimedOut])
        || chain(err).any(|e| e.is::<tokio::time::error::Elapsed>())
        || mentions(TIMEOUT_WORDS)
    {
        ErrorKind::DeadlineExceeded
    } else if io_is(&[
        io::ErrorKind::ConnectionRefused,
        io::ErrorKind::ConnectionReset,
        io::ErrorKind::ConnectionAborted,
        io::ErrorKind::NotConnected,
        io::ErrorKind::AddrNotAvailable,
        io::ErrorKind::BrokenPipe,
        io::ErrorKind::HostUnreachable,
        io::ErrorKind::NetworkUnreachable,
    ]) || chain(err).any(|e| e.is::<tonic::transport::Error>())
        || mentions(CONNECTION_WORDS)
    {
        ErrorKind::Unavailable
    } else if io_is(&[io::ErrorKind::InvalidInput, io::ErrorKind::InvalidData])
        || mentions(ARGUMENT_WORDS)
    {
        ErrorKind::InvalidArgument
    } else if mentions(AUTHENTICATION_WORDS) {
        ErrorKind::Unauthenticated
    } else if io_is(&[io::ErrorKind::PermissionDenied]) || mentions(PERMISSION_WORDS) {
        ErrorKind::PermissionDenied
    } else if io_is(&[io::ErrorKind::NotFound]) || mentions_compact(NOT_FOUND_WORDS) {
        ErrorKind::NotFound
    } else if io_is(&[io::ErrorKind::AlreadyExists]) || mentions_compact(ALREADY_EXISTS_WORDS) {
        ErrorKind::AlreadyExists
    } else {
        ErrorKind::Internal
    }
}

/// Classify `failure`. A status found in its chain is returned unchanged.
pub fn classify<E>(failure: E) -> ErrorStatus
where
    E: Into<BoxError>,
{
    let failure: BoxError = failure.into();

    let failure = match failure.downcast::<Status>() {
        Ok(status) => return ErrorStatus::from(*status),
        Err(other) => other,
    };

    if let Some(status) = chain(failure.as_ref()).find_map(|e| e.downcast_ref::<Status>()) {
        return ErrorStatus::from(status.clone());
    }

    if let Some(classified) = chain(failure.as_ref()).find_map(|e| e.downcast_ref::<ErrorStatus>())
    {
        return classified.clone();
    }

    let kind = kind_of(failure.as_ref());
    ErrorStatus::with_cause(kind, failure)
}
