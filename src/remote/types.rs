//! Error taxonomy and wire types for the remote content store.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures from the remote document client.
///
/// A missing document is not an error; `get_document` reports it as
/// `Ok(None)` so callers can treat "no remote state yet" as a normal
/// outcome.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("no access token configured; writing to the remote repository requires one")]
    MissingToken,

    #[error("remote document changed since it was last fetched (HTTP 409): {body}")]
    VersionConflict { body: String },

    #[error("remote request failed (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    #[error("could not decode remote document: {0}")]
    Decode(String),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RemoteError {
    /// Map a non-success HTTP response to the taxonomy. 409 is the contents
    /// API's stale-sha rejection and gets its own variant so callers can
    /// recognize a write conflict.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 409 {
            RemoteError::VersionConflict { body }
        } else {
            RemoteError::Http { status, body }
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::VersionConflict { .. })
    }
}

/// A versioned document fetched from or written to the remote store.
/// Transient: constructed per operation, never cached across operations.
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    /// Decoded plain-text content.
    pub content: String,
    /// Opaque version token for optimistic concurrency.
    pub sha: String,
}

/// GET /repos/{owner}/{repo}/contents/{path} response.
#[derive(Debug, Deserialize)]
pub(super) struct ContentsResponse {
    pub content: String,
    pub sha: String,
}

/// PUT /repos/{owner}/{repo}/contents/{path} request body. `sha` is present
/// only when overwriting an existing document.
#[derive(Debug, Serialize)]
pub(super) struct PutRequest<'a> {
    pub message: String,
    pub content: String,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

/// PUT response: the updated content metadata is nested under `content`.
#[derive(Debug, Deserialize)]
pub(super) struct PutResponse {
    pub content: PutContent,
}

#[derive(Debug, Deserialize)]
pub(super) struct PutContent {
    pub sha: String,
}

/// Encode text for the contents-API wire format. Encoding the UTF-8 bytes
/// (not a char-wise transform) keeps multi-byte text lossless.
pub fn encode_text(text: &str) -> String {
    BASE64.encode(text.as_bytes())
}

/// Decode contents-API base64. The API wraps the payload with newlines, so
/// ASCII whitespace is stripped before decoding.
pub fn decode_text(encoded: &str) -> Result<String, RemoteError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| RemoteError::Decode(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| RemoteError::Decode(format!("not valid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_codec_round_trips_multibyte_unicode() {
        for text in [
            "plain ascii",
            "",
            "{\"total\": 120.5}",
            "café ☕ 500€ 目標 🎉",
            "line\nbreaks\tand \u{1F37A}",
        ] {
            assert_eq!(decode_text(&encode_text(text)).unwrap(), text);
        }
    }

    #[test]
    fn decode_tolerates_wrapped_base64() {
        let wrapped = "eyJ0b3RhbCI6IDEy\nMC41LCAiaGlzdG9y\neSI6IFs1MCwgNzAu\nNV19\n";
        assert_eq!(
            decode_text(wrapped).unwrap(),
            "{\"total\": 120.5, \"history\": [50, 70.5]}"
        );
    }

    #[test]
    fn decode_rejects_garbage_and_non_utf8() {
        assert!(decode_text("!!! not base64 !!!").is_err());
        // 0xFF 0xFE is valid base64 input but not valid UTF-8 output.
        let bad = BASE64.encode([0xFFu8, 0xFE]);
        assert!(matches!(decode_text(&bad), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn status_409_maps_to_version_conflict() {
        let err = RemoteError::from_status(409, "sha mismatch".to_string());
        assert!(err.is_conflict());

        let err = RemoteError::from_status(500, "boom".to_string());
        assert!(!err.is_conflict());
        assert!(matches!(err, RemoteError::Http { status: 500, .. }));
    }
}
