//! Streaming response handling

use std::pin::Pin;

use futures::Stream;

use crate::errors::Result;

/// Boxed chunk stream yielded by a generation backend.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Streaming response from the generation backend.
///
/// The sequence is finite and consumed at most once; it may terminate
/// early with an `Err` item, in which case everything received so far
/// is the whole response.
pub struct StreamingResponse {
    stream: ChunkStream,
}

impl StreamingResponse {
    pub fn new(stream: ChunkStream) -> Self {
        Self { stream }
    }

    /// Collect all chunks into a single string
    pub async fn collect_all(self) -> Result<String> {
        use futures::StreamExt;
        let mut stream = self.stream;
        let mut result = String::new();
        while let Some(chunk) = stream.next().await {
            result.push_str(&chunk?);
        }
        Ok(result)
    }

    /// Get the underlying stream
    pub fn into_stream(self) -> ChunkStream {
        self.stream
    }
}
