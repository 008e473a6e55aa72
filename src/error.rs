use thiserror::Error;

/// Failures raised by the tailoring pipeline.
///
/// `UpstreamCall` and `Parse` are recoverable: the agent catches them and
/// switches to its heuristic path. `DocumentStructure` is always terminal.
#[derive(Debug, Error)]
pub enum TailorError {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("{service} call failed{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    UpstreamCall {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("unexpected response content: {0}")]
    Parse(String),

    #[error("document structure error: {0}")]
    DocumentStructure(#[from] DocumentStructureError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentStructureError {
    #[error("missing required part '{0}'")]
    MissingPart(String),

    #[error("no paragraphs found in document body")]
    NoParagraphs,

    #[error("no text runs available")]
    NoRuns,

    #[error("unreadable document container: {0}")]
    Archive(String),
}

impl TailorError {
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        TailorError::UpstreamCall {
            service,
            status: None,
            message: message.into(),
        }
    }

    /// True when a fallback strategy may take over after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TailorError::UpstreamCall { .. } | TailorError::Parse(_)
        )
    }
}

impl From<reqwest::Error> for TailorError {
    fn from(err: reqwest::Error) -> Self {
        TailorError::UpstreamCall {
            service: "http",
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for TailorError {
    fn from(err: zip::result::ZipError) -> Self {
        TailorError::DocumentStructure(DocumentStructureError::Archive(err.to_string()))
    }
}

impl From<std::io::Error> for TailorError {
    fn from(err: std::io::Error) -> Self {
        TailorError::DocumentStructure(DocumentStructureError::Archive(err.to_string()))
    }
}
