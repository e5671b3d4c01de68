//! Response relay: races the generation stream against a timeout,
//! forwards buffer snapshots to the client at a bounded cadence, and
//! converts failures into user-safe apology text.
//!
//! State machine per request: STREAMING -> COMPLETED | TIMED_OUT |
//! FAILED. Every terminal path emits exactly one [`RelayEvent::Done`].

use std::time::Duration;

use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::error;
use tracing::warn;

use crate::llm::ChunkStream;
use crate::llm::StreamingResponse;

/// Fixed apology shown when the generation stream exceeds its deadline.
pub const TIMEOUT_MESSAGE: &str =
    "I apologize, but the response took too long. Please try a shorter query or try again.";

/// Fixed apology for retrieval/index-related backend failures.
pub const DATABASE_MESSAGE: &str = "I apologize, but I encountered an error accessing the \
     review database. This has been logged and will be investigated.";

/// Fixed apology for any other backend failure.
pub const GENERIC_MESSAGE: &str = "I apologize, but I encountered an error processing your \
     request. Please try again in a moment.";

/// Event forwarded to the client. `Update` always carries the complete
/// buffer so far, never a delta; the coalescing step drops intermediate
/// snapshots but never reorders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Update(String),
    Done,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Overall deadline for the generation stream.
    pub timeout: Duration,
    /// Minimum interval between forwarded snapshots.
    pub min_update_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            min_update_interval: Duration::from_millis(100),
        }
    }
}

/// Map a backend failure to one of the fixed user-facing strings.
/// Raw error text is logged, never shown.
pub fn user_facing_message(error_text: &str) -> &'static str {
    let lower = error_text.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        TIMEOUT_MESSAGE
    } else if lower.contains("database") || lower.contains("retriev") || lower.contains("index")
    {
        DATABASE_MESSAGE
    } else {
        GENERIC_MESSAGE
    }
}

/// Relay a generation stream as a sequence of client events.
///
/// Spawns one task per request that consumes the stream; dropping the
/// returned stream drops the channel and the task winds down on its
/// next send.
pub fn relay(
    response: StreamingResponse,
    config: RelayConfig,
) -> impl Stream<Item = RelayEvent> + Send {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_relay(response.into_stream(), config, tx));
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
}

/// Produce a relay stream that emits a single fixed message and closes.
/// Used when the turn fails before generation even starts, so the
/// failure still reads as an assistant message.
pub fn single_message(text: impl Into<String>) -> impl Stream<Item = RelayEvent> + Send {
    futures::stream::iter(vec![RelayEvent::Update(text.into()), RelayEvent::Done])
}

async fn run_relay(
    mut stream: ChunkStream,
    config: RelayConfig,
    tx: mpsc::UnboundedSender<RelayEvent>,
) {
    let deadline = tokio::time::sleep(config.timeout);
    tokio::pin!(deadline);

    let mut buffer = String::new();
    let mut last_update = Instant::now();

    loop {
        tokio::select! {
            () = &mut deadline => {
                // TIMED_OUT: abandon the stream. Best-effort cancellation;
                // the backend may keep working, we just stop listening.
                warn!("Generation stream timed out after {:?}", config.timeout);
                let _ = tx.send(RelayEvent::Update(TIMEOUT_MESSAGE.to_string()));
                let _ = tx.send(RelayEvent::Done);
                return;
            }
            chunk = stream.next() => match chunk {
                Some(Ok(text)) => {
                    buffer.push_str(&text);
                    let now = Instant::now();
                    if now.duration_since(last_update) >= config.min_update_interval {
                        if tx.send(RelayEvent::Update(buffer.clone())).is_err() {
                            // Client went away; stop consuming the stream.
                            return;
                        }
                        last_update = now;
                    }
                }
                Some(Err(e)) => {
                    // FAILED: full detail to the log, fixed string to the user.
                    error!("Generation stream failed: {}", e);
                    let _ = tx.send(RelayEvent::Update(
                        user_facing_message(&e.to_string()).to_string(),
                    ));
                    let _ = tx.send(RelayEvent::Done);
                    return;
                }
                None => {
                    // COMPLETED: the final flush guarantees the client's
                    // last view is the complete text even when the last
                    // chunk fell inside the coalescing window.
                    if !buffer.is_empty() {
                        let _ = tx.send(RelayEvent::Update(buffer.clone()));
                    }
                    let _ = tx.send(RelayEvent::Done);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MinervaError;
    use crate::Result;

    fn response_from(chunks: Vec<Result<String>>) -> StreamingResponse {
        StreamingResponse::new(Box::pin(futures::stream::iter(chunks)))
    }

    async fn collect(stream: impl Stream<Item = RelayEvent> + Send) -> Vec<RelayEvent> {
        stream.collect::<Vec<_>>().await
    }

    #[tokio::test]
    async fn test_completed_stream_ends_with_full_buffer_and_done() {
        let response = response_from(vec![Ok("Hello ".to_string()), Ok("world".to_string())]);
        let events = collect(relay(response, RelayConfig::default())).await;

        assert_eq!(events.last(), Some(&RelayEvent::Done));
        let updates: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                RelayEvent::Update(s) => Some(s.clone()),
                RelayEvent::Done => None,
            })
            .collect();
        assert_eq!(updates.last().unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn test_exactly_one_done() {
        let response = response_from(vec![Ok("chunk".to_string())]);
        let events = collect(relay(response, RelayConfig::default())).await;
        let dones = events.iter().filter(|e| **e == RelayEvent::Done).count();
        assert_eq!(dones, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiting_coalesces_updates() {
        // 50 chunks spread over 200ms: at most 2 intermediate updates
        // plus the guaranteed final flush.
        let stream = futures::stream::unfold(0u32, |n| async move {
            if n >= 50 {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(4)).await;
            Some((Ok(format!("c{n} ")), n + 1))
        });
        let response = StreamingResponse::new(Box::pin(stream));
        let events = collect(relay(response, RelayConfig::default())).await;

        let updates = events
            .iter()
            .filter(|e| matches!(e, RelayEvent::Update(_)))
            .count();
        assert!(updates <= 3, "expected at most 3 updates, got {updates}");
        assert!(updates >= 1);
        assert_eq!(events.last(), Some(&RelayEvent::Done));

        // Final update carries all 50 chunks.
        let last_update = events
            .iter()
            .rev()
            .find_map(|e| match e {
                RelayEvent::Update(s) => Some(s.clone()),
                RelayEvent::Done => None,
            })
            .unwrap();
        assert!(last_update.contains("c0 "));
        assert!(last_update.contains("c49 "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_apology_and_done() {
        // A stream that never produces anything.
        let stream = futures::stream::unfold((), |()| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Some((Ok(String::new()), ()))
        });
        let response = StreamingResponse::new(Box::pin(stream));
        let config = RelayConfig {
            timeout: Duration::from_secs(30),
            ..RelayConfig::default()
        };
        let events = collect(relay(response, config)).await;

        assert_eq!(
            events,
            vec![
                RelayEvent::Update(TIMEOUT_MESSAGE.to_string()),
                RelayEvent::Done
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_client_stops_stream_consumption() {
        use std::sync::atomic::AtomicU32;
        use std::sync::atomic::Ordering;
        use std::sync::Arc;

        let produced = Arc::new(AtomicU32::new(0));
        let counter = produced.clone();
        let stream = futures::stream::unfold(0u32, move |n| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Some((Ok(format!("c{n}")), n + 1))
            }
        });
        let response = StreamingResponse::new(Box::pin(stream));

        let mut events = Box::pin(relay(response, RelayConfig::default()));
        let first = events.next().await;
        assert!(matches!(first, Some(RelayEvent::Update(_))));
        drop(events);

        // One more chunk may be mid-flight when the channel closes; the
        // relay must stop consuming after the failed forward.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(produced.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_error_classified_as_database_message() {
        let response = response_from(vec![
            Ok("partial".to_string()),
            Err(MinervaError::Retrieval("index query failed".to_string())),
        ]);
        let events = collect(relay(response, RelayConfig::default())).await;

        assert_eq!(
            events.last(),
            Some(&RelayEvent::Done)
        );
        assert!(events.contains(&RelayEvent::Update(DATABASE_MESSAGE.to_string())));
    }

    #[tokio::test]
    async fn test_error_classified_as_generic_message() {
        let response = response_from(vec![Err(MinervaError::Generation(
            "connection reset by peer".to_string(),
        ))]);
        let events = collect(relay(response, RelayConfig::default())).await;
        assert!(events.contains(&RelayEvent::Update(GENERIC_MESSAGE.to_string())));
    }

    #[test]
    fn test_user_facing_message_classification() {
        assert_eq!(user_facing_message("Stream timeout"), TIMEOUT_MESSAGE);
        assert_eq!(user_facing_message("database is down"), DATABASE_MESSAGE);
        assert_eq!(user_facing_message("retrieval exploded"), DATABASE_MESSAGE);
        assert_eq!(user_facing_message("something else"), GENERIC_MESSAGE);
    }

    #[tokio::test]
    async fn test_single_message_stream() {
        let events = collect(single_message("config broken")).await;
        assert_eq!(
            events,
            vec![
                RelayEvent::Update("config broken".to_string()),
                RelayEvent::Done
            ]
        );
    }
}
