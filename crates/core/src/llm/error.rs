use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub model: String,
    pub stage: &'static str,
    pub status: Option<u16>,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (model={}, stage={}): {}",
            self.model, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

/// True when the error chain carries an HTTP 429 from the chat endpoint.
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<LlmDiagnosticsError>())
        .any(LlmDiagnosticsError::is_rate_limited)
}
