//! Parsing of untrusted structured output from the completion service.
//!
//! Models are asked for JSON arrays but routinely wrap them in prose or code
//! fences, or return something else entirely. Every parse here is fallible
//! and every call site names the value it falls back to.

use serde::de::DeserializeOwned;

/// Why a reply could not be read as the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuredOutputError {
    #[error("no JSON array found in reply")]
    NotFound,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("unexpected shape: {0}")]
    Validation(String),
}

/// Outcome of parsing a reply: the parsed payload, or the fallback value
/// together with the error that triggered it.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredOutput<T> {
    Parsed(T),
    Fallback {
        value: T,
        error: StructuredOutputError,
    },
}

impl<T> StructuredOutput<T> {
    /// Parse with `parser`, substituting `fallback()` on failure.
    pub fn parse_or(
        reply: &str,
        parser: impl FnOnce(&str) -> Result<T, StructuredOutputError>,
        fallback: impl FnOnce() -> T,
    ) -> Self {
        match parser(reply) {
            Ok(value) => StructuredOutput::Parsed(value),
            Err(error) => StructuredOutput::Fallback {
                value: fallback(),
                error,
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, StructuredOutput::Fallback { .. })
    }

    pub fn error(&self) -> Option<&StructuredOutputError> {
        match self {
            StructuredOutput::Parsed(_) => None,
            StructuredOutput::Fallback { error, .. } => Some(error),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StructuredOutput::Parsed(value) | StructuredOutput::Fallback { value, .. } => value,
        }
    }
}

/// Slice out the outermost `[...]` of `reply`.
fn array_slice(reply: &str) -> Result<&str, StructuredOutputError> {
    let start = reply.find('[').ok_or(StructuredOutputError::NotFound)?;
    let end = reply.rfind(']').ok_or(StructuredOutputError::NotFound)?;
    if end < start {
        return Err(StructuredOutputError::NotFound);
    }
    Ok(&reply[start..=end])
}

/// Extract the outermost JSON array from `reply` and deserialize it.
pub fn extract_struct<T: DeserializeOwned>(reply: &str) -> Result<T, StructuredOutputError> {
    let slice = array_slice(reply)?;
    let value: serde_json::Value = serde_json::from_str(slice)
        .map_err(|e| StructuredOutputError::InvalidJson(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| StructuredOutputError::Validation(e.to_string()))
}

/// Parse a JSON array of strings.
pub fn parse_string_list(reply: &str) -> Result<Vec<String>, StructuredOutputError> {
    extract_struct(reply)
}

/// Parse a JSON array of non-negative integers.
///
/// Floats, negative numbers, strings and nested values are rejected.
pub fn parse_index_list(reply: &str) -> Result<Vec<usize>, StructuredOutputError> {
    let values: Vec<serde_json::Value> = extract_struct(reply)?;
    values
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| StructuredOutputError::Validation(format!("not an index: {v}")))
        })
        .collect()
}
