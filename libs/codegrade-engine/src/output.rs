use codegrade_common::types::CaseOutput;

/// Split captured stdout into output values, one per printed line.
///
/// The empty piece after a final line terminator is dropped; blank lines in
/// the middle are kept since a program may print an empty value. A trailing
/// `\r` is stripped from each line.
pub fn extract_lines(stdout: &str) -> CaseOutput {
    if stdout.is_empty() {
        return Vec::new();
    }

    let body = stdout.strip_suffix('\n').unwrap_or(stdout);
    body.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_terminator_dropped() {
        assert_eq!(extract_lines("2\n"), vec!["2"]);
        assert_eq!(extract_lines("2"), vec!["2"]);
        assert_eq!(extract_lines("a\nb\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_interior_blank_lines_kept() {
        assert_eq!(extract_lines("a\n\nb\n"), vec!["a", "", "b"]);
        assert_eq!(extract_lines("a\n\n"), vec!["a", ""]);
        assert_eq!(extract_lines("\n"), vec![""]);
    }

    #[test]
    fn test_empty_output_has_no_lines() {
        assert!(extract_lines("").is_empty());
    }

    #[test]
    fn test_crlf_lines() {
        assert_eq!(extract_lines("1\r\n2\r\n"), vec!["1", "2"]);
    }
}
