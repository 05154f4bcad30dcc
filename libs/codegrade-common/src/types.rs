use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Request as it arrives from the decoding boundary.
///
/// Every field is optional here: presence and shape are checked by the
/// engine when it turns this into a [`Job`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub timeout: Option<Value>,
    #[serde(default)]
    pub cases: Option<Value>,
}

/// One validated unit of work. Immutable once built.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub language: String,
    pub source: String,
    pub timeout: Duration,
    pub cases: Vec<InputCase>,
}

/// Values fed to one program invocation, one per stdin line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputCase {
    pub values: Vec<String>,
}

impl InputCase {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Text presented on the program's standard input.
    pub fn stdin_text(&self) -> String {
        self.values.join("\n")
    }
}

/// Output lines of one successful case.
pub type CaseOutput = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
}

/// Final value handed to the encoding boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<CaseOutput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ExecutionResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            outputs: Vec::new(),
            errors: vec![error.into()],
        }
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdin_text_one_value_per_line() {
        let case = InputCase::new(["1", "2"]);
        assert_eq!(case.stdin_text(), "1\n2");
        assert_eq!(InputCase::default().stdin_text(), "");
    }

    #[test]
    fn test_empty_collections_are_omitted() {
        let result = ExecutionResult {
            status: Status::Pass,
            outputs: vec![],
            errors: vec![],
        };
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"status":"pass"}"#);
    }

    #[test]
    fn test_request_fields_default_to_none() {
        let request: JobRequest = serde_json::from_str("{}").unwrap();
        assert!(request.language.is_none());
        assert!(request.source.is_none());
        assert!(request.timeout.is_none());
        assert!(request.cases.is_none());
    }
}
