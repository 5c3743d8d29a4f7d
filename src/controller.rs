//! Single-flight request controller.
//!
//! Owns the session: the conversation, the request state, the text being typed
//! and the last failure. All mutation happens on the caller's task; only the
//! transport call runs on a spawned task, and its result is folded back in by
//! [`RequestController::poll`] or [`RequestController::settle`].

use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::client::{Generation, GenerationParameters, Transport};
use crate::config::Config;
use crate::conversation::{Conversation, Message};
use crate::error::GenerationError;

/// Shown in place of a successful but empty reply.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "(empty response)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Pending,
    /// Result applied, about to return to `Idle`. Never visible between calls.
    Settled,
}

type GenerationTask = JoinHandle<Result<Generation, GenerationError>>;

pub struct RequestController {
    conversation: Conversation,
    state: RequestState,
    input: String,
    last_error: Option<GenerationError>,
    request_count: usize,
    model_id: Option<String>,
    device: Option<String>,

    transport: Arc<dyn Transport>,
    max_new_tokens: u32,
    temperature: f32,
    pending: Option<GenerationTask>,
}

impl RequestController {
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            conversation: Conversation::new(),
            state: RequestState::Idle,
            input: String::new(),
            last_error: None,
            request_count: 0,
            model_id: None,
            device: None,
            transport,
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            pending: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == RequestState::Pending
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn last_error(&self) -> Option<&GenerationError> {
        self.last_error.as_ref()
    }

    /// Model name the server reported with its most recent reply.
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    /// Compute device the server reported with its most recent reply.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Number of submissions accepted this session.
    pub fn request_count(&self) -> usize {
        self.request_count
    }

    /// Submit whatever is currently in the input buffer.
    pub fn submit_input(&mut self) -> bool {
        let prompt = self.input.clone();
        self.submit(&prompt)
    }

    /// Start a generation request for `prompt`.
    ///
    /// Returns `false` without touching any state when the prompt is blank or
    /// a request is already in flight. Must be called inside a tokio runtime.
    pub fn submit(&mut self, prompt: &str) -> bool {
        if self.state != RequestState::Idle {
            debug!("submission dropped, a request is already pending");
            return false;
        }
        if prompt.trim().is_empty() {
            debug!("submission dropped, prompt is blank");
            return false;
        }

        if let Err(err) = self.conversation.append(Message::user(prompt)) {
            warn!(error = %err, "could not record user message");
            return false;
        }

        self.input.clear();
        self.last_error = None;
        self.state = RequestState::Pending;
        self.request_count += 1;

        let params = GenerationParameters {
            prompt: prompt.to_string(),
            max_new_tokens: self.max_new_tokens,
            temperature: self.temperature,
        };
        info!(
            request = self.request_count,
            prompt_chars = prompt.chars().count(),
            "generation request submitted"
        );

        let transport = Arc::clone(&self.transport);
        self.pending = Some(tokio::spawn(async move { transport.send(params).await }));
        true
    }

    /// Apply the pending result if the task has finished. Never blocks.
    ///
    /// Returns `true` when a result was applied.
    pub fn poll(&mut self) -> bool {
        let Some(handle) = self.pending.as_mut() else {
            return false;
        };
        if !handle.is_finished() {
            return false;
        }

        match handle.now_or_never() {
            Some(joined) => {
                self.pending = None;
                self.apply(flatten(joined));
                true
            }
            None => false,
        }
    }

    /// Wait for the pending request, if any, and apply its result.
    pub async fn settle(&mut self) {
        if let Some(handle) = self.pending.take() {
            let joined = handle.await;
            self.apply(flatten(joined));
        }
    }

    fn apply(&mut self, result: Result<Generation, GenerationError>) {
        self.state = RequestState::Settled;

        let message = match result {
            Ok(reply) => {
                if reply.model_id.is_some() {
                    self.model_id = reply.model_id;
                }
                if reply.device.is_some() {
                    self.device = reply.device;
                }
                if reply.text.is_empty() {
                    Message::assistant(EMPTY_REPLY_PLACEHOLDER)
                } else {
                    Message::assistant(reply.text)
                }
            }
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "generation request failed");
                let message = Message::assistant(err.user_message());
                self.last_error = Some(err);
                message
            }
        };

        if let Err(err) = self.conversation.append(message) {
            warn!(error = %err, "could not record assistant message");
        }

        self.state = RequestState::Idle;
    }
}

impl Drop for RequestController {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

fn flatten(
    joined: Result<Result<Generation, GenerationError>, JoinError>,
) -> Result<Generation, GenerationError> {
    joined.unwrap_or_else(|err| {
        Err(GenerationError::Transport {
            message: format!("generation task did not complete: {}", err),
        })
    })
}
