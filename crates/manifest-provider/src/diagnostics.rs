use std::error::Error;

use manifest_morph::AttributePath;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single finding reported back to the host, optionally pointing at the
/// offending attribute of the resource configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(summary, detail)
        }
    }

    pub fn with_attribute(self, attribute: AttributePath) -> Self {
        Self {
            attribute: Some(attribute),
            ..self
        }
    }

    /// Builds an error diagnostic whose detail is the full message chain of `error`.
    pub fn from_error(summary: impl Into<String>, error: &dyn Error) -> Self {
        Self::error(summary, full_message(error))
    }
}

/// Walks the whole error chain, so that the host sees the root cause too.
pub fn full_message(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(error) = source {
        message.push_str(": ");
        message.push_str(&error.to_string());
        source = error.source();
    }
    message
}
