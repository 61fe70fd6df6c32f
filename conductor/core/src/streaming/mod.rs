//! Streaming Wire Protocol
//!
//! Orchestration events travel to the client as newline-delimited JSON
//! records, one [`StreamEvent`] per line:
//!
//! ```text
//! {"type":"text","text":"Adding a "}
//! {"type":"action","action":{"tool":"create_circle","arguments":{"radius":40}}}
//! {"type":"error","message":"backend returned 429"}
//! ```
//!
//! Records are written as soon as they are produced. Within one command the
//! order of records is the order of emission and must not be changed.
//!
//! - [`codec`]: line encoder and the chunk-tolerant decoder

pub mod codec;

use serde::{Deserialize, Serialize};

use crate::actions::Action;

pub use codec::{encode, CodecError, RecordDecoder, RecordEncoder, MAX_RECORD_SIZE};

/// One record of the stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A completed, validated action
    Action {
        /// The action to apply
        action: Action,
    },
    /// A delta of assistant text
    Text {
        /// Text to append
        text: String,
    },
    /// The command failed; the raw error string
    Error {
        /// Error description
        message: String,
    },
}

impl StreamEvent {
    /// Wrap an action
    #[must_use]
    pub fn action(action: Action) -> Self {
        Self::Action { action }
    }

    /// Wrap a text delta
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Wrap an error message
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
