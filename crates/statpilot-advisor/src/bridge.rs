//! Push-to-pull bridge for streamed text
//!
//! Providers deliver deltas through a callback while consumers want to step
//! through them one at a time. The bridge is a mailbox shared by one sender
//! and one receiver: a FIFO queue plus a wake-up signal for a parked
//! receiver. Every item goes through the queue and is only removed by the
//! receiver, so abandoning a pending `next()` (inside `select!` or a
//! timeout) never loses an item.
//!
//! The queue is unbounded. A consumer that stops pulling while the producer
//! keeps streaming makes it grow for as long as the stream lasts; chunks are
//! never dropped to cap it.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::AdvisorError;
use crate::models::StreamCompletion;

/// One item pulled from a stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// Text delta, in emission order
    Chunk(String),
    /// Successful end of the stream
    Done(StreamCompletion),
    /// Failed end of the stream
    Error(AdvisorError),
}

impl StreamItem {
    /// Whether this item ends the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamItem::Chunk(_))
    }
}

#[derive(Debug, Default)]
struct Mailbox {
    queue: VecDeque<StreamItem>,
    terminated: bool,
    receiver_closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    mailbox: Mutex<Mailbox>,
    item_ready: Notify,
}

/// Create a connected sender/receiver pair
pub fn channel() -> (BridgeSender, BridgeReceiver) {
    let shared = Arc::new(Shared::default());
    (
        BridgeSender {
            shared: Arc::clone(&shared),
        },
        BridgeReceiver {
            shared,
            finished: false,
        },
    )
}

/// Producer half
#[derive(Debug)]
pub struct BridgeSender {
    shared: Arc<Shared>,
}

impl BridgeSender {
    /// Enqueue a text delta
    pub fn push_chunk(&self, text: impl Into<String>) {
        self.deliver(StreamItem::Chunk(text.into()));
    }

    /// End the stream successfully
    pub fn finish(&self, completion: StreamCompletion) {
        self.deliver(StreamItem::Done(completion));
    }

    /// End the stream with an error
    pub fn fail(&self, error: AdvisorError) {
        self.deliver(StreamItem::Error(error));
    }

    fn deliver(&self, item: StreamItem) {
        {
            let mut mailbox = self.shared.mailbox.lock();
            if mailbox.terminated {
                debug!("Ignoring stream item pushed after the terminal item");
                return;
            }
            if mailbox.receiver_closed {
                return;
            }
            mailbox.terminated = item.is_terminal();
            mailbox.queue.push_back(item);
        }
        // Stores a permit when nobody is parked yet
        self.shared.item_ready.notify_one();
    }
}

impl Drop for BridgeSender {
    fn drop(&mut self) {
        let terminated = self.shared.mailbox.lock().terminated;
        if !terminated {
            self.fail(AdvisorError::InvalidResponse(
                "Stream producer stopped without a result".to_string(),
            ));
        }
    }
}

/// Consumer half
#[derive(Debug)]
pub struct BridgeReceiver {
    shared: Arc<Shared>,
    finished: bool,
}

impl BridgeReceiver {
    /// Next item in emission order; `None` once the terminal item was returned.
    ///
    /// Cancel-safe: dropping the future before it completes leaves every
    /// undelivered item in the queue.
    pub async fn next(&mut self) -> Option<StreamItem> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(item) = self.shared.mailbox.lock().queue.pop_front() {
                self.finished = item.is_terminal();
                return Some(item);
            }
            self.shared.item_ready.notified().await;
        }
    }

    /// Adapt into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = StreamItem> + Send + 'static {
        futures::stream::unfold(self, |mut receiver| async move {
            let item = receiver.next().await?;
            Some((item, receiver))
        })
    }
}

impl Drop for BridgeReceiver {
    fn drop(&mut self) {
        let mut mailbox = self.shared.mailbox.lock();
        mailbox.receiver_closed = true;
        mailbox.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderKind;
    use futures::StreamExt;
    use std::time::Duration;

    fn completion(model: &str) -> StreamCompletion {
        StreamCompletion {
            model: model.to_string(),
            provider: ProviderKind::Remote,
        }
    }

    #[tokio::test]
    async fn test_items_arrive_in_order_then_terminal() {
        let (tx, mut rx) = channel();
        tx.push_chunk("Hel");
        tx.push_chunk("lo");
        tx.finish(completion("model-x"));

        assert_eq!(rx.next().await, Some(StreamItem::Chunk("Hel".to_string())));
        assert_eq!(rx.next().await, Some(StreamItem::Chunk("lo".to_string())));
        assert_eq!(rx.next().await, Some(StreamItem::Done(completion("model-x"))));
        assert_eq!(rx.next().await, None);
    }

    #[tokio::test]
    async fn test_parked_receiver_is_woken() {
        let (tx, mut rx) = channel();
        let consumer = tokio::spawn(async move {
            let mut items = Vec::new();
            while let Some(item) = rx.next().await {
                items.push(item);
            }
            items
        });

        for chunk in ["a", "b", "c"] {
            tokio::task::yield_now().await;
            tx.push_chunk(chunk);
        }
        tx.finish(completion("m"));

        let items = consumer.await.unwrap();
        assert_eq!(
            items,
            vec![
                StreamItem::Chunk("a".to_string()),
                StreamItem::Chunk("b".to_string()),
                StreamItem::Chunk("c".to_string()),
                StreamItem::Done(completion("m")),
            ]
        );
    }

    #[tokio::test]
    async fn test_terminal_accepted_once() {
        let (tx, mut rx) = channel();
        tx.fail(AdvisorError::Cancelled);
        tx.finish(completion("late"));
        tx.push_chunk("late chunk");

        assert_eq!(rx.next().await, Some(StreamItem::Error(AdvisorError::Cancelled)));
        assert_eq!(rx.next().await, None);
    }

    #[tokio::test]
    async fn test_dropped_sender_yields_error() {
        let (tx, mut rx) = channel();
        tx.push_chunk("partial");
        drop(tx);

        assert_eq!(rx.next().await, Some(StreamItem::Chunk("partial".to_string())));
        assert!(matches!(rx.next().await, Some(StreamItem::Error(_))));
        assert_eq!(rx.next().await, None);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let (tx, rx) = channel();
        tx.push_chunk("x");
        tx.finish(completion("m"));

        let items: Vec<StreamItem> = rx.into_stream().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_terminal());
    }

    #[test]
    fn test_pending_receiver_woken_by_push() {
        let (tx, mut rx) = channel();
        let mut next = tokio_test::task::spawn(rx.next());
        tokio_test::assert_pending!(next.poll());

        tx.push_chunk("a");
        assert!(next.is_woken());
        assert_eq!(
            tokio_test::assert_ready!(next.poll()),
            Some(StreamItem::Chunk("a".to_string()))
        );
    }

    #[test]
    fn test_abandoned_wait_keeps_item_queued() {
        let (tx, mut rx) = channel();
        {
            let mut next = tokio_test::task::spawn(rx.next());
            tokio_test::assert_pending!(next.poll());
        }
        tx.push_chunk("kept");

        let mut next = tokio_test::task::spawn(rx.next());
        assert_eq!(
            tokio_test::assert_ready!(next.poll()),
            Some(StreamItem::Chunk("kept".to_string()))
        );
    }

    #[test]
    fn test_item_sent_to_abandoned_wait_is_not_lost() {
        let (tx, mut rx) = channel();
        {
            let mut next = tokio_test::task::spawn(rx.next());
            tokio_test::assert_pending!(next.poll());
            tx.push_chunk("kept");
            assert!(next.is_woken());
        }
        tx.push_chunk("second");

        let mut next = tokio_test::task::spawn(rx.next());
        assert_eq!(
            tokio_test::assert_ready!(next.poll()),
            Some(StreamItem::Chunk("kept".to_string()))
        );
        drop(next);
        let mut next = tokio_test::task::spawn(rx.next());
        assert_eq!(
            tokio_test::assert_ready!(next.poll()),
            Some(StreamItem::Chunk("second".to_string()))
        );
    }

    #[tokio::test]
    async fn test_terminal_sent_to_abandoned_wait_still_arrives() {
        let (tx, mut rx) = channel();
        {
            let mut next = tokio_test::task::spawn(rx.next());
            tokio_test::assert_pending!(next.poll());
            tx.finish(completion("m"));
        }
        drop(tx);

        let item = tokio::time::timeout(Duration::from_millis(500), rx.next())
            .await
            .expect("receiver must not hang");
        assert_eq!(item, Some(StreamItem::Done(completion("m"))));
        assert_eq!(rx.next().await, None);
    }

    #[tokio::test]
    async fn test_select_timeouts_do_not_drop_chunks() {
        let (tx, mut rx) = channel();
        let producer = tokio::spawn(async move {
            for i in 0..50 {
                tx.push_chunk(i.to_string());
                tokio::task::yield_now().await;
            }
            tx.finish(completion("m"));
        });

        let mut received = Vec::new();
        loop {
            tokio::select! {
                item = rx.next() => match item {
                    Some(StreamItem::Chunk(text)) => received.push(text),
                    Some(_) | None => break,
                },
                _ = tokio::task::yield_now() => {}
            }
        }
        producer.await.unwrap();

        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_push_after_receiver_dropped_is_discarded() {
        let (tx, rx) = channel();
        drop(rx);
        tx.push_chunk("ignored");
        assert!(tx.shared.mailbox.lock().queue.is_empty());
    }
}
