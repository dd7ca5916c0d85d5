//! crates/ecoplot_core/src/error.rs
//!
//! The failure taxonomy of a single recommendation run.

/// Everything that can turn a generation run into a failed result.
///
/// Persistence failures are not represented here: history writes never fail a run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecommendationError {
    /// Credential or endpoint configuration is missing. Raised before a prompt is built.
    #[error("Recommendation service is not configured: {0}")]
    Configuration(String),

    /// The request never completed: network unreachable, connection reset or timeout.
    #[error("Could not reach the recommendation service: {0}")]
    Transport(String),

    /// The service answered, but not with a usable completion.
    #[error("Recommendation service returned an error: {0}")]
    Upstream(String),

    #[error("No valid JSON structure found in response")]
    NoJsonFound,

    #[error("Could not parse recommendations: {message}")]
    Malformed {
        message: String,
        raw_response: String,
    },
}

impl RecommendationError {
    /// The unparsed model output, kept for diagnostics when decoding failed.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Malformed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}
