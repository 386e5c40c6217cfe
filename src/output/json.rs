//! JSON serialization of verdict artifacts.

use super::VerdictArtifact;

/// Serialize an artifact to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for a
/// [`VerdictArtifact`]).
pub fn to_json(artifact: &VerdictArtifact) -> Result<String, serde_json::Error> {
    serde_json::to_string(artifact)
}

/// Serialize an artifact to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for a
/// [`VerdictArtifact`]).
pub fn to_json_pretty(artifact: &VerdictArtifact) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(artifact)
}
