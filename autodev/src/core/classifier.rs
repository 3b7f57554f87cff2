//! Pass/fail classification of check output.
//!
//! The rule is a text heuristic: failure indicators mark the output as
//! failing, but a success marker wins unless a traceback is present. A test
//! called `test_error_handling` in a passing unittest summary therefore still
//! counts as a pass.

/// Substrings that mark check output as failing.
pub const FAILURE_INDICATORS: &[&str] = &[
    "Traceback (most recent call last)",
    "FAILED",
    "Error",
    "AssertionError",
    "SyntaxError",
    "IndentationError",
    "NameError",
    "TypeError",
    "ValueError",
    "ImportError",
    "ModuleNotFoundError",
    "ERRORS",
];

const TRACEBACK_MARKER: &str = "Traceback";

fn has_success_marker(output: &str) -> bool {
    output.contains("OK") || output.contains("passed") || output.trim().ends_with('0')
}

/// Classify check output. Missing output counts as a failure.
pub fn is_test_failure(output: Option<&str>) -> bool {
    let Some(output) = output else {
        return true;
    };
    if has_success_marker(output) && !output.contains(TRACEBACK_MARKER) {
        return false;
    }
    FAILURE_INDICATORS
        .iter()
        .any(|indicator| output.contains(indicator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_output_fails() {
        assert!(is_test_failure(None));
    }

    #[test]
    fn success_marker_overrides_error_substring() {
        assert!(!is_test_failure(Some("3 tests, 1 error, OK")));
        assert!(!is_test_failure(Some(
            "test_error_handling ... ok\nValueError raised as expected\nOK"
        )));
    }

    #[test]
    fn traceback_defeats_success_marker() {
        let output = "Traceback (most recent call last):\n  File \"a.py\"\nOK";
        assert!(is_test_failure(Some(output)));
    }

    #[test]
    fn failed_summary_without_success_marker_fails() {
        assert!(is_test_failure(Some("FAILED (failures=2)")));
    }

    #[test]
    fn plain_output_passes() {
        assert!(!is_test_failure(Some("")));
        assert!(!is_test_failure(Some("hello world")));
    }

    #[test]
    fn trailing_zero_counts_as_success() {
        assert!(!is_test_failure(Some("NameError count: 0")));
    }

    /// Known limitation: "passed" anywhere wins, even in a failing summary.
    #[test]
    fn passed_substring_masks_failures() {
        assert!(!is_test_failure(Some("0 passed, 5 failed, FAILED")));
    }
}
