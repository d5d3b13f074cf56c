use std::{io, string};

use rustls::pki_types::InvalidDnsNameError;
use thiserror::Error;

/// Errors surfaced by `resolve`, `Control::dial`, and `Control::retrieve`.
///
/// Variant names follow the taxonomy from the protocol design rather than
/// Rust's usual one-error-per-failure-site convention, since callers branch
/// on the class of failure (format/dial/header/...), not on which function
/// raised it.
#[derive(Error, Debug)]
pub enum GeminiClientError {
    #[error("URL could not be resolved: {0}")]
    Format(String),

    #[error("TLS dial failed: {0}")]
    Dial(String),

    #[error("response header unreadable or malformed: {0}")]
    Header(String),

    #[error("unsupported feature: {0}")]
    Unsupported(String),

    #[error("remote error (status {status}): {meta}")]
    Remote { status: u8, meta: String },

    #[error("redirect failed: {0}")]
    Redirect(String),

    #[error("gemtext parse error: {0}")]
    Parse(String),

    #[error("operation attempted after close")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("URL could not be parsed: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("the host provided is not a valid DNS name: {0}")]
    DnsName(#[from] InvalidDnsNameError),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("UTF-8 string could not be decoded: {0}")]
    Utf8(#[from] string::FromUtf8Error),
}

pub type Result<T, E = GeminiClientError> = core::result::Result<T, E>;
