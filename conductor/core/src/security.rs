//! Security Module
//!
//! Gates every command before any backend is contacted:
//!
//! - [`InputValidator`]: size and control-character checks
//! - [`SafetyFilter`]: prompt-injection detection and off-topic screening
//!
//! Both are pure. A rejection from either short-circuits the command with the
//! fixed refusal text; no backend call is made.

use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

/// Default maximum command size in bytes
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 8 * 1024;

/// Configuration limits for the Conductor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConductorLimits {
    /// Maximum size of a single command in bytes (default: 8KB)
    pub max_message_size: usize,
    /// Maximum board objects summarised in the system prompt (default: 100)
    pub max_prompt_objects: usize,
}

impl Default for ConductorLimits {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_prompt_objects: 100,
        }
    }
}

impl ConductorLimits {
    /// Create limits from environment variables with fallback to defaults
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_message_size: std::env::var("WHITEBOARD_MAX_MESSAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_message_size),
            max_prompt_objects: std::env::var("WHITEBOARD_MAX_PROMPT_OBJECTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_prompt_objects),
        }
    }
}

/// Result of input validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    /// Input is valid
    Valid,
    /// Input is invalid with reason
    Invalid(String),
}

impl ValidationResult {
    /// Check if the result indicates valid input
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Get the error message if invalid
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(msg) => Some(msg),
        }
    }
}

/// Input validator for incoming commands
#[derive(Clone, Debug, Default)]
pub struct InputValidator {
    limits: ConductorLimits,
}

impl InputValidator {
    /// Create a new input validator with the given limits
    pub fn new(limits: ConductorLimits) -> Self {
        Self { limits }
    }

    /// Validate a user message
    pub fn validate_message(&self, content: &str) -> ValidationResult {
        if content.len() > self.limits.max_message_size {
            return ValidationResult::Invalid(format!(
                "Message too large: {} bytes (max: {})",
                content.len(),
                self.limits.max_message_size
            ));
        }

        // Check for control characters (except newline, tab)
        if content
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t' && c != '\r')
        {
            return ValidationResult::Invalid(
                "Message contains invalid control characters".to_string(),
            );
        }

        ValidationResult::Valid
    }

    /// Get the current limits
    pub fn limits(&self) -> &ConductorLimits {
        &self.limits
    }
}

/// Why the safety filter refused a command
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Instruction override, role reassignment or prompt extraction attempt
    PromptInjection,
    /// A question unrelated to the board
    OffTopicQuestion,
    /// A longer request unrelated to the board
    OffTopic,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PromptInjection => "prompt_injection",
            Self::OffTopicQuestion => "off_topic_question",
            Self::OffTopic => "off_topic",
        })
    }
}

/// Outcome of [`SafetyFilter::check`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterVerdict {
    /// Whether the command may proceed
    pub allowed: bool,
    /// Set when `allowed` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

impl FilterVerdict {
    /// Let the command through
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Refuse the command
    #[must_use]
    pub const fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Instruction-override, role-reassignment, prompt-extraction and known
/// jailbreak phrasing. Matched case-insensitively.
const INJECTION_PATTERNS: &[&str] = &[
    r"\b(ignore|disregard|forget|override|bypass)\s+(all\s+|any\s+)?(the\s+|your\s+|of\s+your\s+)?(previous|prior|above|earlier|original|system)?\s*(instructions?|prompts?|rules|directions|guidelines)\b",
    r"\bnew\s+instructions?\s*:",
    r"\byou\s+are\s+(now|no\s+longer)\b",
    r"\b(pretend|imagine)\s+(to\s+be|you\s*(are|'re))\b",
    r"\bact\s+as\s+(if\s+you\s+(are|were)\s+)?(an?\s+)?(unrestricted|unfiltered|jailbroken|evil|different|new)\b",
    r"\b(from\s+now\s+on|henceforth)\s*,?\s+you\b",
    r"\b(reveal|show|print|display|repeat|leak|output|tell\s+me)\s+(me\s+)?(your|the)\s+(system\s+|hidden\s+|initial\s+)?(prompt|instructions)\b",
    r"\bsystem\s+prompt\b",
    r"\bjailbreak",
    r"\bdo\s+anything\s+now\b",
    r"\bDAN\s+mode\b",
    r"\bdeveloper\s+mode\b",
    r"<\|im_start\|>|<\|system\|>|\[/?INST\]|<<SYS>>",
];

/// Short greetings and acknowledgements that are always let through
const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "yo", "ok", "okay", "thanks", "thank", "thx", "ty", "help", "yes",
    "no", "sure", "cool", "great", "nice", "good", "morning", "bye", "please", "awesome",
];

/// On-topic vocabulary, grouped by category
const ON_TOPIC_KEYWORDS: &[&[&str]] = &[
    // actions
    &[
        "add", "create", "make", "draw", "put", "place", "move", "delete", "remove", "erase",
        "clear", "change", "update", "resize", "color", "colour", "rename", "organize",
        "organise", "arrange", "align", "connect", "link", "group", "sketch", "design",
        "paint", "build", "brainstorm", "list", "count", "analyze", "analyse", "summarize",
        "summarise", "layout", "sort", "shrink", "enlarge", "duplicate", "write",
    ],
    // object types
    &[
        "sticky", "stickies", "note", "rectangle", "rect", "box", "square", "circle", "ellipse",
        "oval", "line", "arrow", "connector", "text", "label", "shape", "frame", "card",
        "triangle", "star",
    ],
    // board concepts
    &[
        "board", "canvas", "whiteboard", "diagram", "flowchart", "flow", "chart", "swot",
        "kanban", "column", "row", "grid", "template", "mindmap", "timeline", "retro",
        "matrix", "object", "item", "element", "workflow", "process", "roadmap",
    ],
    // scene nouns
    &[
        "house", "tree", "snowman", "castle", "dragon", "car", "sun", "moon", "cat", "dog",
        "flower", "robot", "face", "person", "mountain", "landscape", "scene", "picture",
        "city", "boat", "rocket", "garden", "cloud", "bird", "fish", "planet",
    ],
    // meta / help
    &["help", "undo", "tool", "tools", "command", "commands", "feature", "features"],
];

/// Words that open a question
const INTERROGATIVES: &[&str] = &[
    "what", "who", "whom", "whose", "where", "when", "why", "how", "which", "can", "could",
    "would", "should", "does", "do", "did", "is", "are", "was", "were", "will", "shall", "may",
    "might", "have", "has",
];

/// Longest input still treated as a greeting
const GREETING_MAX_TOKENS: usize = 3;

/// Longest off-topic input that is still let through
const AMBIGUOUS_MAX_TOKENS: usize = 5;

/// Pattern-based input safety filter
///
/// Checks run in priority order: injection, greeting, on-topic keyword,
/// interrogative opener, length. Anything not caught is allowed; the system
/// prompt steers ambiguous short input.
#[derive(Clone, Debug)]
pub struct SafetyFilter {
    injection: RegexSet,
}

impl Default for SafetyFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyFilter {
    /// Create a filter with the built-in pattern set
    #[must_use]
    pub fn new() -> Self {
        let injection = RegexSetBuilder::new(INJECTION_PATTERNS)
            .case_insensitive(true)
            .build()
            // Constant patterns; covered by test_injection_patterns_compile.
            .expect("injection patterns are valid regexes");
        Self { injection }
    }

    /// Classify a command
    #[must_use]
    pub fn check(&self, text: &str) -> FilterVerdict {
        if self.injection.is_match(text) {
            return FilterVerdict::deny(DenyReason::PromptInjection);
        }

        let normalized = text.trim().to_lowercase();
        let tokens: Vec<&str> = normalized
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.len() <= GREETING_MAX_TOKENS
            && tokens.first().is_some_and(|first| GREETINGS.contains(first))
        {
            return FilterVerdict::allow();
        }

        if tokens.iter().any(|token| is_on_topic(token)) {
            return FilterVerdict::allow();
        }

        if tokens
            .first()
            .is_some_and(|first| INTERROGATIVES.contains(first))
        {
            return FilterVerdict::deny(DenyReason::OffTopicQuestion);
        }

        if tokens.len() > AMBIGUOUS_MAX_TOKENS {
            return FilterVerdict::deny(DenyReason::OffTopic);
        }

        FilterVerdict::allow()
    }
}

/// Whether a token is an on-topic keyword or a simple inflection of one
fn is_on_topic(token: &str) -> bool {
    ON_TOPIC_KEYWORDS
        .iter()
        .flat_map(|category| category.iter())
        .any(|keyword| matches_keyword(token, keyword))
}

/// Exact match, or the keyword plus a common suffix
pub(crate) fn matches_keyword(token: &str, keyword: &str) -> bool {
    token == keyword
        || ["s", "es", "ing", "ed", "d"]
            .iter()
            .any(|suffix| token.strip_suffix(suffix) == Some(keyword))
}
