//! Model Profiles
//!
//! Fixed generation settings per classification bucket.

use serde::{Deserialize, Serialize};

use super::classifier::TaskClass;

/// Default model id for the fast bucket
pub const FAST_MODEL: &str = "gpt-4o-mini";

/// Default model id for the creative bucket
pub const CREATIVE_MODEL: &str = "claude-sonnet-4-20250514";

/// Generation settings for one bucket
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Bucket this profile serves
    pub class: TaskClass,

    /// Model identifier sent to the backend
    pub model_id: String,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum orchestration turns per command
    pub max_turns: usize,
}

impl ModelProfile {
    /// Profile for CRUD-style edits: 3 turns, 1024 tokens, temperature 0.3
    #[must_use]
    pub fn fast() -> Self {
        Self {
            class: TaskClass::Simple,
            model_id: FAST_MODEL.to_string(),
            max_tokens: 1024,
            temperature: 0.3,
            max_turns: 3,
        }
    }

    /// Profile for compositions: 15 turns, 8192 tokens, temperature 0.7
    #[must_use]
    pub fn creative() -> Self {
        Self {
            class: TaskClass::Creative,
            model_id: CREATIVE_MODEL.to_string(),
            max_tokens: 8192,
            temperature: 0.7,
            max_turns: 15,
        }
    }

    /// Profile for a bucket
    #[must_use]
    pub fn for_class(class: TaskClass) -> Self {
        match class {
            TaskClass::Simple => Self::fast(),
            TaskClass::Creative => Self::creative(),
        }
    }

    /// Replace the model id (process-start configuration only)
    #[must_use]
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }
}
