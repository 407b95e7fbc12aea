// # Channel Event Source
//
// EventSource backed by a bounded tokio mpsc channel.
//
// Producers hold the `Sender` half; the router consumes the stream. When
// every sender is dropped the stream ends, which stops the router's run
// loop.

use std::pin::Pin;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::traits::event_source::{ChangeEvent, EventSource};

/// Event source fed through a bounded channel
///
/// # Example
///
/// ```rust
/// use nori_core::state::ChannelEventSource;
/// use nori_core::traits::{ChangeEvent, EventSource};
///
/// let (source, tx) = ChannelEventSource::bounded(16);
/// tx.try_send(ChangeEvent::remove(3)).unwrap();
/// let _events = source.events();
/// ```
pub struct ChannelEventSource {
    receiver: Mutex<Option<mpsc::Receiver<ChangeEvent>>>,
}

impl ChannelEventSource {
    /// Create a source and the sender that feeds it
    ///
    /// `capacity` must be > 0; a full channel makes `send().await` wait.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Sender<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                receiver: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl EventSource for ChannelEventSource {
    fn events(&self) -> Pin<Box<dyn Stream<Item = ChangeEvent> + Send + 'static>> {
        let receiver = match self.receiver.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match receiver {
            Some(rx) => Box::pin(ReceiverStream::new(rx)),
            None => {
                warn!("Channel event source already consumed, returning empty stream");
                Box::pin(tokio_stream::empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_events_arrive_in_order_and_end() {
        let (source, tx) = ChannelEventSource::bounded(4);
        let mut events = source.events();

        tx.send(ChangeEvent::remove(1)).await.unwrap();
        tx.send(ChangeEvent::remove(2)).await.unwrap();
        drop(tx);

        assert_eq!(events.next().await, Some(ChangeEvent::remove(1)));
        assert_eq!(events.next().await, Some(ChangeEvent::remove(2)));
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn test_second_subscription_is_empty() {
        let (source, _tx) = ChannelEventSource::bounded(4);
        let _first = source.events();
        let mut second = source.events();

        assert_eq!(second.next().await, None);
    }
}
