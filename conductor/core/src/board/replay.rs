//! Stream replay
//!
//! Client-side driver: feeds raw response chunks through the record decoder
//! and applies each decoded action as soon as it arrives.

use crate::streaming::{RecordDecoder, StreamEvent};

use super::applier::{ActionApplier, ApplyOutcome};

/// Result of replaying one command's stream
#[derive(Clone, Debug)]
pub struct ReplayOutcome {
    /// Concatenated text deltas
    pub text: String,
    /// Error records, in arrival order
    pub errors: Vec<String>,
    /// Number of lines the decoder dropped
    pub skipped_lines: usize,
    /// Applier result after layout and connector flush
    pub applied: ApplyOutcome,
}

/// Decodes a record stream into an [`ActionApplier`]
pub struct StreamReplayer {
    decoder: RecordDecoder,
    applier: ActionApplier,
    text: String,
    errors: Vec<String>,
}

impl StreamReplayer {
    /// Replay into `applier`
    #[must_use]
    pub fn new(applier: ActionApplier) -> Self {
        Self {
            decoder: RecordDecoder::new(),
            applier,
            text: String::new(),
            errors: Vec::new(),
        }
    }

    /// Text received so far
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Feed one chunk of the response body
    pub async fn push(&mut self, chunk: &[u8]) {
        self.decoder.push(chunk);
        while let Some(event) = self.decoder.next_event() {
            self.handle(event).await;
        }
    }

    async fn handle(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Action { action } => self.applier.apply(&action).await,
            StreamEvent::Text { text } => self.text.push_str(&text),
            StreamEvent::Error { message } => {
                tracing::warn!(error = %message, "Stream reported an error");
                self.errors.push(message);
            }
        }
    }

    /// End of stream: apply any unterminated last record, then finish the applier
    pub async fn finish(mut self) -> ReplayOutcome {
        if let Some(event) = self.decoder.finish() {
            self.handle(event).await;
        }
        ReplayOutcome {
            text: self.text,
            errors: self.errors,
            skipped_lines: self.decoder.skipped(),
            applied: self.applier.finish().await,
        }
    }
}
