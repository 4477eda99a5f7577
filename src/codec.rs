//! Binary/text codec for fingerprint templates.
//!
//! Templates travel to and from the server as standard base64 so they fit in
//! JSON string fields. Decoding is strict: any non-alphabet character or a
//! length inconsistent with the padding is rejected rather than truncated.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode raw template bytes as base64 text.
///
/// Output length is `ceil(n/3)*4` with `=` padding, a pure function of the
/// input length.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text back to raw template bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(text)
        .map_err(|e| CodecError::Invalid(e.to_string()))
}

/// Codec error types.
#[derive(Debug)]
pub enum CodecError {
    /// Input is not valid base64 (bad character, padding, or length)
    Invalid(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Invalid(msg) => write!(f, "Invalid template encoding: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}
