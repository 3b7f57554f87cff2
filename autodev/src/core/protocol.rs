//! The structured command protocol: `TOOL: <name> ARGS: <json-object>`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::core::text::truncate_chars;
use crate::core::types::Action;

/// Payload may span lines.
static TOOL_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^TOOL:\s*(\w+)\s*ARGS:\s*(.*)$").expect("tool call regex should compile")
});

/// Parse one tool call. `None` if the text is not a call or the payload is not a JSON object.
pub fn parse_tool_call(text: &str) -> Option<Action> {
    let caps = TOOL_CALL_RE.captures(text.trim())?;
    let name = &caps[1];
    let payload = caps[2].trim();
    if payload.is_empty() {
        return Some(Action::new(name, Value::Object(Default::default())));
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(args)) => Some(Action {
            tool: name.to_string(),
            args,
        }),
        Ok(_) => {
            warn!(tool = name, "tool args are not a JSON object");
            None
        }
        Err(e) => {
            warn!(tool = name, err = %e, args = %truncate_chars(payload, 100), "invalid tool args JSON");
            None
        }
    }
}

/// Parse every single-line tool call in `text`, skipping malformed lines.
pub fn parse_tool_calls(text: &str) -> Vec<Action> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("TOOL:"))
        .filter_map(parse_tool_call)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_name_and_object_args() {
        let action = parse_tool_call(r#"TOOL: write ARGS: {"path": "/tmp/a", "content": "x"}"#)
            .expect("action");
        assert_eq!(action, Action::new("write", json!({"path": "/tmp/a", "content": "x"})));
    }

    #[test]
    fn empty_payload_is_empty_args() {
        let action = parse_tool_call("TOOL: ps ARGS:").expect("action");
        assert!(action.args.is_empty());
    }

    #[test]
    fn payload_may_span_lines() {
        let action = parse_tool_call("TOOL: write ARGS: {\"path\": \"a\",\n \"content\": \"b\"}")
            .expect("action");
        assert_eq!(action.args["content"], "b");
    }

    #[test]
    fn non_object_or_malformed_payload_is_rejected() {
        assert!(parse_tool_call("TOOL: run ARGS: [1, 2]").is_none());
        assert!(parse_tool_call("TOOL: run ARGS: {oops").is_none());
        assert!(parse_tool_call("run ls").is_none());
    }

    #[test]
    fn multi_line_output_skips_bad_lines() {
        let text = "TOOL: mkdir ARGS: {\"path\": \"p\"}\nchatter\nTOOL: run ARGS: {bad\n  TOOL: ls ARGS: {\"path\": \"p\"}";
        let tools: Vec<String> = parse_tool_calls(text).into_iter().map(|a| a.tool).collect();
        assert_eq!(tools, vec!["mkdir", "ls"]);
    }
}
