//! Encoding boundary: [`ExecutionResult`] into JSON text.

use crate::types::ExecutionResult;

/// Emitted when a result cannot be serialized. Always valid JSON.
pub const FALLBACK_RESPONSE: &str =
    r#"{"status":"fail","errors":["internal error: result could not be encoded"]}"#;

/// Encode a result. Never fails: if serialization errors, the fixed
/// fallback value is returned instead.
pub fn encode(result: &ExecutionResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|_| FALLBACK_RESPONSE.to_string())
}

pub fn encode_pretty(result: &ExecutionResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| FALLBACK_RESPONSE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;

    #[test]
    fn test_fallback_is_valid_json() {
        let decoded: ExecutionResult = serde_json::from_str(FALLBACK_RESPONSE).unwrap();
        assert_eq!(decoded.status, Status::Fail);
        assert_eq!(decoded.errors.len(), 1);
    }

    #[test]
    fn test_hostile_text_round_trips() {
        let nasty = "say \"hi\"\n\ttab\r\u{0}\u{1b}[31mred\u{7f} \\ end} ] ,";
        let result = ExecutionResult {
            status: Status::Fail,
            outputs: vec![vec![nasty.to_string(), String::new()]],
            errors: vec![format!("runtime error in case 1 (exit code 1):\n{nasty}")],
        };

        let encoded = encode(&result);
        assert!(!encoded.contains('\n'));
        let decoded: ExecutionResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn test_pass_with_outputs() {
        let result = ExecutionResult {
            status: Status::Pass,
            outputs: vec![vec!["2".into()], vec!["30".into()]],
            errors: vec![],
        };
        assert_eq!(
            encode(&result),
            r#"{"status":"pass","outputs":[["2"],["30"]]}"#
        );
    }
}
