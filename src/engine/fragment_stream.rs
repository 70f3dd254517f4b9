use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::model::message::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("LLM returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid stream chunk: {0}")]
    InvalidChunk(String),
    #[error("Stream interrupted: {0}")]
    Interrupted(String),
}

pub type BoxFragmentStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Anything that can turn a conversation into a stream of text fragments.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    async fn open(&self, messages: Vec<ChatMessage>) -> Result<BoxFragmentStream, TransportError>;

    /// Checks that the source is reachable and describes it.
    async fn check_connection(&self) -> Result<String, TransportError> {
        Ok("Ready".to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Delta {
    Text(String),
    End,
    Failed(TransportError),
}

/// Pull side of a fragment source. After `End` or `Failed` every further
/// call returns `End`.
pub struct FragmentStream {
    inner: BoxFragmentStream,
    finished: bool,
}

impl FragmentStream {
    pub fn new(inner: BoxFragmentStream) -> Self {
        Self {
            inner,
            finished: false,
        }
    }

    pub async fn next_delta(&mut self) -> Delta {
        while !self.finished {
            match self.inner.next().await {
                Some(Ok(text)) if text.is_empty() => continue,
                Some(Ok(text)) => return Delta::Text(text),
                Some(Err(e)) => {
                    self.finished = true;
                    return Delta::Failed(e);
                }
                None => self.finished = true,
            }
        }
        Delta::End
    }
}
