//! Classify backend failures into retry policy error kinds.

use super::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code),
        _ => ErrorKind::Other,
    }
}

const TIMEOUT_HINTS: &[&str] = &["timed out", "timeout"];

const CONNECTION_HINTS: &[&str] = &[
    "connection reset",
    "connection refused",
    "connection aborted",
    "remote end closed connection",
    "temporary failure in name resolution",
    "name or service not known",
    "network is unreachable",
    "incompleteread",
];

/// Classify the diagnostic output of a failed backend run.
///
/// Looks for `HTTP Error NNN` first, then timeout and connection hints.
/// Anything unrecognized is `Other` and is not retried.
pub fn classify_backend_output(output: &str) -> ErrorKind {
    let lower = output.to_ascii_lowercase();

    if let Some(code) = http_error_code(&lower) {
        let kind = classify_http_status(code);
        if kind != ErrorKind::Other {
            return kind;
        }
    }
    if TIMEOUT_HINTS.iter().any(|h| lower.contains(h)) {
        return ErrorKind::Timeout;
    }
    if CONNECTION_HINTS.iter().any(|h| lower.contains(h)) {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Extracts NNN from the first `http error NNN` in already-lowercased text.
fn http_error_code(lower: &str) -> Option<u16> {
    let idx = lower.find("http error ")?;
    let digits: String = lower[idx + "http error ".len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
