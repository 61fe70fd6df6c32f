//! Task Classifier
//!
//! Keyword rules, checked in order:
//!
//! 1. a creative-signal keyword anywhere -> creative (even next to CRUD verbs)
//! 2. more than 15 tokens with a compositional connective -> creative
//! 3. a simple-signal keyword -> simple
//! 4. otherwise -> simple
//!
//! Matching is case-insensitive; empty input is simple.

use serde::{Deserialize, Serialize};

use crate::security::matches_keyword;

/// Which bucket a command falls into
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
    /// CRUD-style board edits
    /// Examples: add a note, delete red stickies, organize the board
    #[default]
    Simple,

    /// Compositions built from many primitive shapes
    /// Examples: draw a snowman, design a landing page mockup
    Creative,
}

impl TaskClass {
    /// Name of the backend slot serving this class
    #[must_use]
    pub fn backend_slot(self) -> &'static str {
        match self {
            Self::Simple => "fast",
            Self::Creative => "creative",
        }
    }
}

impl std::fmt::Display for TaskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Creative => "creative",
        })
    }
}

/// Rule that decided a classification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "keyword", rename_all = "snake_case")]
pub enum ClassificationReason {
    /// A creative-signal keyword was present
    CreativeKeyword(String),
    /// Long utterance with compositional connectives
    CompositionalLength,
    /// A simple-signal keyword was present
    SimpleKeyword(String),
    /// Nothing matched
    Default,
}

/// Classifier output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Bucket
    pub class: TaskClass,
    /// Rule that fired
    pub reason: ClassificationReason,
}

/// Drawing and composition vocabulary
const CREATIVE_KEYWORDS: &[&str] = &[
    "draw", "design", "sketch", "paint", "illustrate", "compose", "depict", "imagine",
    "visualize", "visualise", "doodle", "art", "artwork", "drawing", "picture", "scene",
    "landscape", "portrait", "snowman", "castle", "dragon", "house", "tree", "robot",
    "spaceship", "rocket", "flower", "garden", "city", "skyline", "mountain", "sunset",
    "animal", "cat", "dog", "bird", "fish", "face", "character", "logo", "mockup",
    "wireframe", "mandala",
];

/// CRUD verbs
const SIMPLE_KEYWORDS: &[&str] = &[
    "add", "create", "delete", "remove", "move", "organize", "organise", "resize",
    "update", "change", "clear", "rename", "color", "colour", "arrange", "connect", "list",
    "count",
];

/// Single-word connectives that signal a multi-part composition
const CONNECTIVE_WORDS: &[&str] = &[
    "and", "with", "containing", "including", "inside", "beside", "between", "surrounded",
    "connected", "underneath", "above", "below",
];

/// Multi-word connectives
const CONNECTIVE_PHRASES: &[&str] = &[
    "that has", "that have", "which has", "next to", "on top of", "in front of",
    "made of",
];

/// Utterances longer than this may be compositional
const COMPOSITIONAL_MIN_TOKENS: usize = 15;

/// Keyword-based task classifier
#[derive(Clone, Debug, Default)]
pub struct TaskClassifier;

impl TaskClassifier {
    /// Create a classifier
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify a command
    #[must_use]
    pub fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();

        if let Some(keyword) = first_match(&tokens, CREATIVE_KEYWORDS) {
            return Classification {
                class: TaskClass::Creative,
                reason: ClassificationReason::CreativeKeyword(keyword.to_string()),
            };
        }

        if tokens.len() > COMPOSITIONAL_MIN_TOKENS && has_connective(&tokens, &lower) {
            return Classification {
                class: TaskClass::Creative,
                reason: ClassificationReason::CompositionalLength,
            };
        }

        if let Some(keyword) = first_match(&tokens, SIMPLE_KEYWORDS) {
            return Classification {
                class: TaskClass::Simple,
                reason: ClassificationReason::SimpleKeyword(keyword.to_string()),
            };
        }

        Classification {
            class: TaskClass::Simple,
            reason: ClassificationReason::Default,
        }
    }
}

fn first_match<'k>(tokens: &[&str], keywords: &[&'k str]) -> Option<&'k str> {
    tokens.iter().find_map(|token| {
        keywords
            .iter()
            .copied()
            .find(|keyword| matches_keyword(token, keyword))
    })
}

fn has_connective(tokens: &[&str], lower: &str) -> bool {
    tokens.iter().any(|t| CONNECTIVE_WORDS.contains(t))
        || CONNECTIVE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(text: &str) -> TaskClass {
        TaskClassifier::new().classify(text).class
    }

    #[test]
    fn test_creative_beats_simple() {
        let result = TaskClassifier::new().classify("Draw me a circle");
        assert_eq!(result.class, TaskClass::Creative);
        assert_eq!(
            result.reason,
            ClassificationReason::CreativeKeyword("draw".to_string())
        );
        assert_eq!(class("add a snowman next to the notes"), TaskClass::Creative);
        assert_eq!(class("DESIGN a castle"), TaskClass::Creative);
    }

    #[test]
    fn test_crud_is_simple() {
        assert_eq!(class("delete all red sticky notes"), TaskClass::Simple);
        assert_eq!(class("move the blue rectangle left"), TaskClass::Simple);
        assert_eq!(
            TaskClassifier::new().classify("organize the board").reason,
            ClassificationReason::SimpleKeyword("organize".to_string())
        );
    }

    #[test]
    fn test_empty_is_simple() {
        let result = TaskClassifier::new().classify("   ");
        assert_eq!(result.class, TaskClass::Simple);
        assert_eq!(result.reason, ClassificationReason::Default);
    }

    #[test]
    fn test_long_compositional_utterance_is_creative() {
        let text = "put a big blue rectangle in the middle with three small yellow notes \
                    lined up along the top edge of it";
        let result = TaskClassifier::new().classify(text);
        assert_eq!(result.class, TaskClass::Creative);
        assert_eq!(result.reason, ClassificationReason::CompositionalLength);
    }

    #[test]
    fn test_long_utterance_without_connectives_stays_simple() {
        let text = "please go ahead now and";
        assert_eq!(class(text), TaskClass::Simple);
        let long = "please update every single yellow note on this board so it says done \
                    right now thanks a lot";
        assert_eq!(class(long), TaskClass::Simple);
    }

    #[test]
    fn test_backend_slots() {
        assert_eq!(TaskClass::Simple.backend_slot(), "fast");
        assert_eq!(TaskClass::Creative.backend_slot(), "creative");
    }
}
