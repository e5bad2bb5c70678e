//! # Hostinger API Errors
//!
//! Closed error taxonomy for responses returned by the Hostinger API.
//!
//! [`classify_error`] maps an HTTP status code onto an [`ErrorKind`]. The
//! `is_*` predicates answer "is this a not-found/unauthorized/... failure"
//! for any error value, looking through wrapping layers for a
//! [`HostingerError`]. They match on the kind *or* the raw status, so an
//! error built directly from a status code (without going through the
//! classifier) is still recognised.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::clients::http::ClientError;

/// Kind of a Hostinger API failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Forbidden,
    InvalidConfig,
    RateLimit,
    Conflict,
    Internal,
    Unknown,
}

impl ErrorKind {
    /// Stable name used in error messages and metric labels
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::InvalidConfig => "InvalidConfig",
            Self::RateLimit => "RateLimit",
            Self::Conflict => "Conflict",
            Self::Internal => "Internal",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified Hostinger API error
///
/// `status` is always the transport status the error was built from, even
/// when `kind` is less precise.
#[derive(Debug, Error)]
#[error("{kind}: {message} (status: {status})")]
pub struct HostingerError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: u16,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HostingerError {
    /// Build an error with an explicit kind, bypassing classification
    pub fn new(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
            source: None,
        }
    }

    /// Attach the underlying cause
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Convert an HTTP status code and message into a [`HostingerError`]
///
/// Total and pure: unmapped statuses become [`ErrorKind::Unknown`] and the
/// status is preserved unchanged.
pub fn classify_error(status: u16, message: impl Into<String>) -> HostingerError {
    let kind = match status {
        404 => ErrorKind::NotFound,
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::Forbidden,
        409 => ErrorKind::Conflict,
        429 => ErrorKind::RateLimit,
        500 | 502 | 503 | 504 => ErrorKind::Internal,
        _ => ErrorKind::Unknown,
    };

    HostingerError::new(kind, status, message)
}

/// Find the first [`HostingerError`] in an error chain
///
/// `ClientError::Api` is transparent, so it is unwrapped explicitly rather
/// than through `source()`.
pub fn find_hostinger_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a HostingerError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(he) = e.downcast_ref::<HostingerError>() {
            return Some(he);
        }
        if let Some(ClientError::Api(he)) = e.downcast_ref::<ClientError>() {
            return Some(he);
        }
        current = e.source();
    }
    None
}

fn matches<E>(err: Option<&E>, kind: ErrorKind, status: u16) -> bool
where
    E: StdError + 'static,
{
    let Some(err) = err else {
        return false;
    };
    find_hostinger_error(err).is_some_and(|he| he.kind == kind || he.status == status)
}

/// Whether `err` is a 404 Not Found error
pub fn is_not_found<E: StdError + 'static>(err: Option<&E>) -> bool {
    matches(err, ErrorKind::NotFound, 404)
}

/// Whether `err` is a 401 Unauthorized error
pub fn is_unauthorized<E: StdError + 'static>(err: Option<&E>) -> bool {
    matches(err, ErrorKind::Unauthorized, 401)
}

/// Whether `err` is a 403 Forbidden error
pub fn is_forbidden<E: StdError + 'static>(err: Option<&E>) -> bool {
    matches(err, ErrorKind::Forbidden, 403)
}

/// Whether `err` is a 409 Conflict error
pub fn is_conflict<E: StdError + 'static>(err: Option<&E>) -> bool {
    matches(err, ErrorKind::Conflict, 409)
}

/// Whether `err` is a 429 rate-limit error
pub fn is_rate_limit<E: StdError + 'static>(err: Option<&E>) -> bool {
    matches(err, ErrorKind::RateLimit, 429)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error_mapping_table() {
        let cases = [
            (404, ErrorKind::NotFound),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Forbidden),
            (409, ErrorKind::Conflict),
            (429, ErrorKind::RateLimit),
            (500, ErrorKind::Internal),
            (502, ErrorKind::Internal),
            (503, ErrorKind::Internal),
            (504, ErrorKind::Internal),
        ];

        for (status, expected) in cases {
            let err = classify_error(status, "boom");
            assert_eq!(err.kind, expected, "status {status} should map to {expected}");
            assert_eq!(err.status, status);
            assert_eq!(err.message, "boom");
        }
    }

    #[test]
    fn test_classify_error_unmapped_status_is_unknown() {
        for status in [0, 200, 302, 400, 418, 422, 501, 505, 599, 999] {
            let err = classify_error(status, "unexpected");
            assert_eq!(err.kind, ErrorKind::Unknown, "status {status}");
            assert_eq!(err.status, status, "status must be preserved");
        }
    }

    #[test]
    fn test_with_source_keeps_cause_in_chain() {
        let cause = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "body cut short");
        let err = classify_error(503, "Service Unavailable").with_source(cause);

        let source = StdError::source(&err).expect("cause attached");
        assert_eq!(source.to_string(), "body cut short");
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(!is_not_found(Some(&err)));

        let plain = classify_error(503, "Service Unavailable");
        assert!(StdError::source(&plain).is_none());
    }

    #[test]
    fn test_classify_error_rate_limit_message() {
        let err = classify_error(429, "slow down");
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.to_string(), "RateLimit: slow down (status: 429)");
    }

    #[test]
    fn test_predicates_match_kind_or_status() {
        // Imprecise kind, authoritative status
        let by_status = HostingerError::new(ErrorKind::Unknown, 404, "gone");
        assert!(is_not_found(Some(&by_status)));

        // Precise kind, unrelated status
        let by_kind = HostingerError::new(ErrorKind::Conflict, 0, "taken");
        assert!(is_conflict(Some(&by_kind)));
        assert!(!is_not_found(Some(&by_kind)));

        assert!(is_unauthorized(Some(&classify_error(401, ""))));
        assert!(is_forbidden(Some(&classify_error(403, ""))));
        assert!(is_rate_limit(Some(&classify_error(429, ""))));
        assert!(!is_rate_limit(Some(&classify_error(503, ""))));
    }

    #[test]
    fn test_predicates_false_for_none() {
        assert!(!is_not_found::<HostingerError>(None));
        assert!(!is_unauthorized::<HostingerError>(None));
        assert!(!is_forbidden::<HostingerError>(None));
        assert!(!is_conflict::<HostingerError>(None));
        assert!(!is_rate_limit::<HostingerError>(None));
    }

    #[test]
    fn test_predicates_false_for_foreign_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        assert!(!is_not_found(Some(&io)));
    }

    #[test]
    fn test_predicates_see_through_client_error() {
        let err = ClientError::Api(classify_error(404, "missing"));
        assert!(is_not_found(Some(&err)));
        assert!(!is_conflict(Some(&err)));
    }
}
