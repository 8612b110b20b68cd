use thiserror::Error;

use crate::field::FieldKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing DOM structure: {0}")]
    MissingDomStructure(String),

    #[error("No options found for: {0}")]
    NoOptionsFound(String),

    #[error("Model reply is not a valid JSON object: {message}")]
    AiInvalidJson {
        message: String,
        raw: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Model selected '{id}', which is not one of: {allowed:?}")]
    AiInvalidSelection { id: String, allowed: Vec<String> },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Navigation control not found: {0}")]
    NavigationNotFound(String),

    #[error("Page '{step}' did not advance after {attempts} attempts")]
    MaxRetriesExceeded { step: String, attempts: u32 },

    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    #[error("JavaScript error: {0}")]
    JsError(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Completion endpoint returned {status}: {message}")]
    Llm { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::MissingDomStructure(_) => "MISSING_DOM_STRUCTURE",
            Error::NoOptionsFound(_) => "NO_OPTIONS_FOUND",
            Error::AiInvalidJson { .. } => "AI_INVALID_JSON",
            Error::AiInvalidSelection { .. } => "AI_INVALID_SELECTION",
            Error::ElementNotFound(_) => "ELEMENT_NOT_FOUND",
            Error::NavigationNotFound(_) => "NAVIGATION_NOT_FOUND",
            Error::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
            Error::LaunchError(_) => "LAUNCH_FAILED",
            Error::JsError(_) => "JS_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::Llm { .. } => "LLM_REQUEST_FAILED",
            Error::Config(_) => "CONFIG",
            Error::Http(_) => "HTTP",
            Error::CdpError(_) => "CDP",
            Error::TomlDe(_) => "CONFIG",
            Error::IoError(_) => "IO",
        }
    }

    /// Page-level errors end the fill session; everything else is contained
    /// at the field boundary.
    pub fn is_page_level(&self) -> bool {
        matches!(
            self,
            Error::NavigationNotFound(_) | Error::MaxRetriesExceeded { .. }
        )
    }

    pub(crate) fn invalid_json(message: impl Into<String>, raw: &str) -> Self {
        Error::AiInvalidJson {
            message: message.into(),
            raw: raw.to_string(),
            source: None,
        }
    }
}

/// An error raised while resolving a single field, tagged with the kind of
/// handler that raised it.
#[derive(Debug, Error)]
#[error("{kind} field '{label}': {source}")]
pub struct FieldError {
    pub kind: FieldKind,
    pub label: String,
    #[source]
    pub source: Error,
}

impl FieldError {
    pub fn new(kind: FieldKind, label: impl Into<String>, source: Error) -> Self {
        Self {
            kind,
            label: label.into(),
            source,
        }
    }

    /// Kind-prefixed code, e.g. `SELECT_AI_INVALID_SELECTION`.
    pub fn code(&self) -> String {
        format!("{}_{}", self.kind.code_prefix(), self.source.code())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
