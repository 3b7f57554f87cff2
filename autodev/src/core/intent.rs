//! Ordered intent catalog for operator commands.
//!
//! Each catalog entry holds one or more patterns, anchored at the start of the
//! command and matched case-insensitively. Entries are evaluated in declared
//! order and the first matching pattern wins, so project creation is always
//! checked before the broader tool and feature phrasings. Patterns accept both
//! Turkish and English wording.

use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};

/// Tokens never accepted as a project name.
const NAME_STOP_WORDS: &[&str] = &[
    "yeni", "new", "proje", "project", "oluştur", "create", "init", "yarat", "aç",
];

/// Placeholder used when a name sanitizes to nothing.
pub const DEFAULT_SANITIZED_NAME: &str = "project";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentKind {
    CreateProject,
    CreateApi,
    CreateTool,
    AddFeature,
    RunTests,
    Build,
    Dockerize,
    GitOp,
    List,
    ReadFile,
    Fix,
    Shell,
}

/// Which capture feeds the intent payload.
#[derive(Debug, Clone, Copy)]
enum Payload {
    None,
    /// Scan all groups with [`extract_name`].
    Name,
    /// Take one group; the whole command if the group did not participate.
    Group(usize),
}

struct Matcher {
    regex: Regex,
    payload: Payload,
}

struct CatalogEntry {
    kind: IntentKind,
    matchers: Vec<Matcher>,
}

/// Classified operator command with the text extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CreateProject { name: Option<String> },
    CreateApi,
    CreateTool { description: String },
    AddFeature { feature: String },
    RunTests,
    Build,
    Dockerize,
    GitOp,
    List { target: Option<String> },
    ReadFile { path: String },
    Fix { description: String },
    Shell,
}

fn entry(kind: IntentKind, patterns: &[(&str, Payload)]) -> CatalogEntry {
    let matchers = patterns
        .iter()
        .map(|(pattern, payload)| Matcher {
            regex: RegexBuilder::new(&format!("^(?:{pattern})"))
                .case_insensitive(true)
                .build()
                .expect("intent pattern should compile"),
            payload: *payload,
        })
        .collect();
    CatalogEntry { kind, matchers }
}

static CATALOG: LazyLock<Vec<CatalogEntry>> = LazyLock::new(|| {
    use Payload::{Group, Name};
    vec![
        entry(
            IntentKind::CreateProject,
            &[
                (
                    r"(yeni|new)\s+(proje|project)\s+(?:oluştur|yarat|aç|create|init)\s*:?\s*(.*)",
                    Name,
                ),
                (
                    r"(proje|project)\s+(oluştur|yarat|aç|create|init)\s*:?\s*(.*)",
                    Name,
                ),
                (r"create\s+project\s+(.*)", Name),
                (r"init\s+project\s+(.*)", Name),
            ],
        ),
        entry(
            IntentKind::CreateApi,
            &[
                (r"(api|rest|endpoint)\s*(yaz|oluştur|ekle|write|create|build)", Payload::None),
                (r"(yaz|oluştur|create|build|write)\s+(bir\s+)?(api|rest|endpoint)", Payload::None),
                (r"(basit|simple)\s+(bir\s+)?(api|rest)\s*(yaz|oluştur|create)", Payload::None),
            ],
        ),
        entry(
            IntentKind::CreateTool,
            &[(
                r"(yaz|oluştur|create|build|write)\s+(bir\s+)?(.*?)(\s+tool|\s+araç|\s+utility)?$",
                Group(3),
            )],
        ),
        entry(
            IntentKind::AddFeature,
            &[(r"(ekle|add)\s+(.*)", Group(2)), (r"(.*)\s+(ekle|add)$", Group(1))],
        ),
        entry(
            IntentKind::RunTests,
            &[
                (r"(test|testleri?)\s*(çalıştır|run|yap|koş)", Payload::None),
                (r"(çalıştır|run)\s+(test|testleri?)", Payload::None),
                (r"run\s+tests?", Payload::None),
            ],
        ),
        entry(
            IntentKind::Build,
            &[
                (r"(build|derleme|derle)\s*(al|yap|et)?", Payload::None),
                (r"(al|yap)\s+(build|derleme)", Payload::None),
            ],
        ),
        entry(
            IntentKind::Dockerize,
            &[
                (r"docker(ize|la|le)?\s*(et|yap)?", Payload::None),
                (r"(container|konteyner)\s*(oluştur|yap|et)", Payload::None),
            ],
        ),
        entry(
            IntentKind::GitOp,
            &[
                (r"(commit|kaydet)\s*(et|yap)?", Payload::None),
                (r"git\s+(commit|push|pull|status|log)", Payload::None),
            ],
        ),
        entry(
            IntentKind::List,
            &[
                (r"(listele|göster|list|show|ls)\s+(.*)", Group(2)),
                (r"(dosyalar|files|projeler|projects)\s*(listele|göster|list|show)", Payload::None),
            ],
        ),
        entry(
            IntentKind::ReadFile,
            &[(r"(oku|read|cat|göster|show)\s+(.+\.\w+)", Group(2))],
        ),
        entry(
            IntentKind::Fix,
            &[(r"(düzelt|fix|debug|hata)\s*(.*)", Group(2)), (r"(.*)\s+(düzelt|fix)$", Group(1))],
        ),
        entry(
            IntentKind::Shell,
            &[
                (r"(python3?|pip|git|npm|node|cargo|go|make|gcc|g\+\+|sh|bash)\s+.*", Payload::None),
                (r"(ls|cat|mkdir|cp|mv|rm|find|grep|chmod|chown)\s+.*", Payload::None),
            ],
        ),
    ]
});

/// Match `text` against the catalog. `None` means no entry matched.
pub fn classify(text: &str) -> Option<Intent> {
    CATALOG.iter().find_map(|entry| {
        entry.matchers.iter().find_map(|matcher| {
            matcher
                .regex
                .captures(text)
                .map(|caps| build_intent(entry.kind, matcher.payload, &caps, text))
        })
    })
}

fn payload_text(payload: Payload, caps: &Captures<'_>, text: &str) -> Option<String> {
    match payload {
        Payload::None => None,
        Payload::Name => extract_name(caps),
        Payload::Group(idx) => Some(
            caps.get(idx)
                .map_or(text, |m| m.as_str())
                .trim()
                .to_string(),
        ),
    }
}

fn build_intent(kind: IntentKind, payload: Payload, caps: &Captures<'_>, text: &str) -> Intent {
    let extracted = payload_text(payload, caps, text);
    let or_text = |value: Option<String>| value.unwrap_or_else(|| text.to_string());
    match kind {
        IntentKind::CreateProject => Intent::CreateProject { name: extracted },
        IntentKind::CreateApi => Intent::CreateApi,
        IntentKind::CreateTool => Intent::CreateTool {
            description: or_text(extracted),
        },
        IntentKind::AddFeature => Intent::AddFeature {
            feature: or_text(extracted),
        },
        IntentKind::RunTests => Intent::RunTests,
        IntentKind::Build => Intent::Build,
        IntentKind::Dockerize => Intent::Dockerize,
        IntentKind::GitOp => Intent::GitOp,
        IntentKind::List => Intent::List {
            target: extracted.filter(|t| !t.is_empty()),
        },
        IntentKind::ReadFile => Intent::ReadFile {
            path: or_text(extracted),
        },
        IntentKind::Fix => Intent::Fix {
            description: or_text(extracted),
        },
        IntentKind::Shell => Intent::Shell,
    }
}

/// Scan capture groups from last to first and return the first usable name.
///
/// Groups of one character or less and stop-words are skipped.
pub fn extract_name(caps: &Captures<'_>) -> Option<String> {
    (1..caps.len())
        .rev()
        .filter_map(|idx| caps.get(idx).map(|m| m.as_str()))
        .find(|group| {
            group.chars().count() > 1 && !NAME_STOP_WORDS.contains(&group.to_lowercase().as_str())
        })
        .map(|group| group.trim().to_string())
}

static NON_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("name regex should compile"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Lower-case, drop non-word characters and join words with underscores.
pub fn sanitize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = NON_NAME_CHARS.replace_all(&lowered, "");
    let joined = WHITESPACE_RUN.replace_all(stripped.trim(), "_");
    if joined.is_empty() {
        DEFAULT_SANITIZED_NAME.to_string()
    } else {
        joined.into_owned()
    }
}
