//! Scripted Backend
//!
//! Deterministic backend that replays queued completions. Used by tests and
//! by the daemon's offline mode; records every request it receives.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::traits::{
    BackendError, Completion, CompletionChunk, CompletionRequest, LlmBackend,
};

#[derive(Clone, Debug)]
enum Step {
    Reply(Completion),
    Fail(String),
}

/// Backend answering from a fixed script
#[derive(Debug)]
pub struct ScriptedBackend {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<Step>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    /// Empty script; once exhausted every call returns an empty completion
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Backend that answers every call with `completion`
    pub fn repeating(name: impl Into<String>, completion: Completion) -> Self {
        Self {
            fallback: Some(Step::Reply(completion)),
            ..Self::new(name)
        }
    }

    /// Backend whose every call fails with `message`
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fallback: Some(Step::Fail(message.into())),
            ..Self::new(name)
        }
    }

    /// Queue a reply
    #[must_use]
    pub fn then_reply(self, completion: Completion) -> Self {
        self.steps.lock().push_back(Step::Reply(completion));
        self
    }

    /// Queue a failure
    #[must_use]
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.steps.lock().push_back(Step::Fail(message.into()));
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Number of calls received
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
        self.requests.lock().push(request.clone());
        let step = self
            .steps
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone());
        match step {
            Some(Step::Reply(completion)) => Ok(completion),
            Some(Step::Fail(message)) => Err(BackendError::Stream(message)),
            None => Ok(Completion::default()),
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
        self.next(request)
    }

    async fn complete_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<CompletionChunk>, BackendError> {
        let completion = self.next(request)?;
        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            let words = completion.text.split_inclusive(' ').map(str::to_string);
            let chunks = words
                .map(CompletionChunk::Text)
                .chain(
                    completion
                        .tool_invocations
                        .into_iter()
                        .map(CompletionChunk::ToolInvocation),
                )
                .chain(std::iter::once(CompletionChunk::Complete {
                    usage: completion.usage,
                }));
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}
