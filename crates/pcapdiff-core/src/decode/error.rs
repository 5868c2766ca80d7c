use thiserror::Error;

/// Why a frame could not be split into protocol layers.
///
/// Note: this error type lives in an internal module; the example is
/// illustrative and not compiled as a public doctest.
///
/// # Examples
/// ```text
/// use pcapdiff_core::decode::error::DecodeError;
///
/// let err = DecodeError::UnsupportedLinktype(113);
/// assert!(err.to_string().contains("113"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("packet slice error: {0}")]
    Slice(String),
    #[error("unsupported linktype {0}")]
    UnsupportedLinktype(i32),
}
