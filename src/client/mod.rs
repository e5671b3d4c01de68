//! Chat session driver: conversation state, retry with backoff, and
//! cancellation. This is the piece a UI sits on top of; it owns the
//! append-only message list and the at-most-one-in-flight rule.

pub mod transport;

pub use transport::ChatTransport;
pub use transport::HttpChatTransport;
pub use transport::SnapshotStream;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::config::ChatConfig;
use crate::errors::MinervaError;
use crate::errors::Result;
use crate::models::Message;

type CurrentToken = Arc<Mutex<Option<CancellationToken>>>;

/// Handle for cancelling the in-flight request from outside the task
/// driving `send` (navigation away, shutdown). Cheap to clone; a no-op
/// when nothing is in flight.
#[derive(Clone)]
pub struct AbortHandle {
    current: CurrentToken,
}

impl AbortHandle {
    pub fn abort(&self) {
        if let Ok(guard) = self.current.lock() {
            if let Some(token) = guard.as_ref() {
                token.cancel();
            }
        }
    }
}

/// Driver for one conversation against a [`ChatTransport`].
pub struct ChatClient<T: ChatTransport> {
    transport: T,
    messages: Vec<Message>,
    user_id: Option<String>,
    max_messages: usize,
    max_attempts: u32,
    base_delay: Duration,
    current: CurrentToken,
}

impl<T: ChatTransport> ChatClient<T> {
    pub fn new(transport: T, config: &ChatConfig, user_id: Option<String>) -> Self {
        Self {
            transport,
            messages: Vec::new(),
            user_id,
            max_messages: config.max_messages,
            max_attempts: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Conversation so far, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Handle that can cancel an in-flight `send` from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            current: self.current.clone(),
        }
    }

    /// Abort any in-flight request.
    pub fn abort(&self) {
        self.abort_handle().abort();
    }

    fn set_current(&self, token: CancellationToken) {
        if let Ok(mut guard) = self.current.lock() {
            // A new send supersedes whatever was in flight.
            if let Some(old) = guard.replace(token) {
                old.cancel();
            }
        }
    }

    fn clear_current(&self) {
        if let Ok(mut guard) = self.current.lock() {
            guard.take();
        }
    }

    /// Send one user message and stream the reply.
    ///
    /// `on_update` receives every buffer snapshot, already superseding
    /// the previous one. Transient failures are retried with
    /// exponential backoff; after the attempts are exhausted the
    /// pending user message is removed from the conversation so the UI
    /// can surface the failure without a dangling question.
    pub async fn send<F>(&mut self, text: impl Into<String>, mut on_update: F) -> Result<Message>
    where
        F: FnMut(&str),
    {
        let token = CancellationToken::new();
        self.set_current(token.clone());

        // Cap conversation growth: past the limit the history is
        // cleared and the conversation starts fresh.
        if self.messages.len() >= self.max_messages {
            debug!("Conversation cap reached, clearing history");
            self.messages.clear();
        }

        self.messages.push(Message::user(text));

        let mut last_error = MinervaError::Custom("no attempts made".to_string());

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                // base × 2^(attempt-1): strictly increasing delays.
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!("Retry attempt {} after {:?}", attempt, delay);
                tokio::select! {
                    () = token.cancelled() => {
                        self.clear_current();
                        return Err(MinervaError::Cancelled);
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }

            match self.attempt_turn(&token, &mut on_update).await {
                Ok(reply) => {
                    self.messages.push(reply.clone());
                    self.clear_current();
                    return Ok(reply);
                }
                Err(e) if e.is_transient() => {
                    warn!("Chat attempt {} failed: {}", attempt + 1, e);
                    last_error = e;
                }
                Err(e) => {
                    // Cancellation and config errors are not retried.
                    self.messages.pop();
                    self.clear_current();
                    return Err(e);
                }
            }
        }

        // Retries exhausted: the failed question leaves the visible
        // conversation.
        self.messages.pop();
        self.clear_current();
        Err(last_error)
    }

    async fn attempt_turn<F>(
        &self,
        token: &CancellationToken,
        on_update: &mut F,
    ) -> Result<Message>
    where
        F: FnMut(&str),
    {
        let stream_fut = self
            .transport
            .stream_chat(&self.messages, self.user_id.as_deref());

        let mut stream = tokio::select! {
            () = token.cancelled() => return Err(MinervaError::Cancelled),
            result = stream_fut => result?,
        };

        let mut latest = String::new();
        loop {
            tokio::select! {
                () = token.cancelled() => return Err(MinervaError::Cancelled),
                item = stream.next() => match item {
                    Some(Ok(snapshot)) => {
                        on_update(&snapshot);
                        latest = snapshot;
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                }
            }
        }

        Ok(Message::assistant(latest))
    }
}
