//! Filter for generation-backend text.
//!
//! Backend output is only useful when it is actionable: protocol lines,
//! JSON, or prefixed execution records. Conversational filler is dropped.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Prefixes that mark a line as actionable output.
pub const ACTIONABLE_PREFIXES: &[&str] = &[
    "TOOL:", "EXEC:", "WRITE:", "READ:", "DELETE:", "MKDIR:", "GIT:", "TEST:", "BUILD:", "ERROR:",
    "OK:", "FAIL:", "LOG:", "ACTION:",
];

const CONVERSATIONAL_PATTERNS: &[&str] = &[
    r"^(Here is|I have|I will|I've|I'd|Sure|Okay|Certainly|Of course|Absolutely)",
    r"^(Let's|Let me|To do this|First|Now|Next|Finally|In order to)",
    r"^(Great|Good|Nice|Perfect|Excellent|Wonderful|Amazing)",
    r"^(Hello|Hi|Hey|Greetings|Welcome)",
    r"^(Thank|Thanks|Please|Sorry|Apolog)",
    r"^(As you|As we|As I|You can|You may|You should|You might)",
    r"^(This (is|will|would|should|can|may))",
    r"^(It (is|will|would|should|seems|appears|looks))",
    r"^(Note|Remember|Keep in mind|Important|Please note)",
    r"^(Would you|Could you|Can I|Do you|Shall I|May I)",
    r"^.*Hope this helps",
    r"^.*Let me know",
    r"^.*feel free",
    r"^.*happy to help",
    r"^.*Can I help you with",
    r"^.*Is there anything",
    r"^.*don't hesitate",
    r"^.*Here's (what|how|a|an|the)",
];

static CONVERSATIONAL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CONVERSATIONAL_PATTERNS
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("conversational pattern should compile")
        })
        .collect()
});

fn is_actionable(text: &str) -> bool {
    ACTIONABLE_PREFIXES
        .iter()
        .any(|prefix| text.starts_with(prefix))
}

fn is_json(text: &str) -> bool {
    (text.starts_with('{') || text.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(text).is_ok()
}

fn is_conversational(line: &str) -> bool {
    CONVERSATIONAL.iter().any(|re| re.is_match(line))
}

/// Keep actionable content; strip conversational lines from everything else.
///
/// Returns `None` when nothing actionable remains.
pub fn enforce(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if is_actionable(text) || is_json(text) {
        return Some(text.to_string());
    }

    let kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let stripped = line.trim();
            !stripped.is_empty() && !is_conversational(stripped)
        })
        .collect();
    let joined = kept.join("\n");
    let result = joined.trim();
    (!result.is_empty()).then(|| result.to_string())
}

/// Accept only protocol lines, JSON-looking text and prefixed records.
pub fn enforce_strict(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.starts_with('{') || text.starts_with('[') || is_actionable(text) {
        return Some(text.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_protocol_passes_through() {
        let text = "TOOL: ls ARGS: {\"path\": \"/tmp\"}";
        assert_eq!(enforce(text).as_deref(), Some(text));
    }

    #[test]
    fn valid_json_passes_through() {
        assert_eq!(enforce("  {\"a\": 1}  ").as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn conversational_lines_are_dropped() {
        let text = "Sure, here you go.\nmkdir -p build\nHope this helps!";
        assert_eq!(enforce(text).as_deref(), Some("mkdir -p build"));
    }

    #[test]
    fn purely_conversational_output_is_none() {
        assert_eq!(enforce("Hello! Let me know if you need anything."), None);
        assert_eq!(enforce("   "), None);
    }

    #[test]
    fn strict_mode_rejects_plain_commands() {
        assert_eq!(enforce_strict("mkdir -p build"), None);
        assert_eq!(enforce_strict("OK: done").as_deref(), Some("OK: done"));
        assert_eq!(enforce_strict("[broken").as_deref(), Some("[broken"));
    }
}
