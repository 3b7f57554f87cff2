//! Rule table used by self-repair when no generation backend is available.
//!
//! Rules are checked in order against the lower-cased error text and the
//! first matching signature decides the diagnosis. Only indentation problems
//! can be fixed mechanically; the rest are diagnosed for the log.

use std::sync::LazyLock;

use regex::Regex;

static MISSING_MODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)no module named '(\w+)'").expect("module regex should compile")
});
static FILE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"File "([^"]+)", line (\d+)"#).expect("file/line regex should compile")
});
static FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "([^"]+)""#).expect("file regex should compile"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairDiagnosis {
    MissingModule { module: Option<String> },
    Syntax { file: Option<String>, line: Option<u32> },
    Indentation { file: Option<String> },
    UndefinedName,
    Unrecognized,
}

impl RepairDiagnosis {
    /// Rule name used in logs.
    pub fn rule(&self) -> &'static str {
        match self {
            RepairDiagnosis::MissingModule { .. } => "missing_module",
            RepairDiagnosis::Syntax { .. } => "syntax",
            RepairDiagnosis::Indentation { .. } => "indentation",
            RepairDiagnosis::UndefinedName => "undefined_name",
            RepairDiagnosis::Unrecognized => "unrecognized",
        }
    }
}

/// Match `error` against the rule table.
pub fn diagnose(error: &str) -> RepairDiagnosis {
    let lower = error.to_lowercase();
    if lower.contains("importerror") || lower.contains("modulenotfounderror") {
        let module = MISSING_MODULE_RE
            .captures(error)
            .map(|caps| caps[1].to_string());
        return RepairDiagnosis::MissingModule { module };
    }
    if lower.contains("syntaxerror") {
        let caps = FILE_LINE_RE.captures(error);
        return RepairDiagnosis::Syntax {
            file: caps.as_ref().map(|c| c[1].to_string()),
            line: caps.as_ref().and_then(|c| c[2].parse().ok()),
        };
    }
    if lower.contains("indentationerror") {
        let file = FILE_RE.captures(error).map(|caps| caps[1].to_string());
        return RepairDiagnosis::Indentation { file };
    }
    if lower.contains("nameerror") {
        return RepairDiagnosis::UndefinedName;
    }
    RepairDiagnosis::Unrecognized
}

/// Replace each tab with four spaces. Returns `None` if nothing changed.
pub fn expand_tabs(source: &str) -> Option<String> {
    source
        .contains('\t')
        .then(|| source.replace('\t', "    "))
}
