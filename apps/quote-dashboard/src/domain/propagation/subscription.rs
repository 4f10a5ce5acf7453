//! Node subscriptions.

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Identifier of a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

/// A node value delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdate<K, V> {
    /// The node that changed.
    pub node: K,
    /// Its new value; `None` means absent.
    pub value: Option<V>,
    /// Batch that produced the value (the current batch for the initial
    /// delivery).
    pub batch: u64,
}

/// Receiving end of a node subscription.
///
/// Dropping it ends the subscription; the engine prunes the sender on its
/// next delivery attempt.
#[derive(Debug)]
pub struct Subscription<K, V> {
    id: SubscriptionId,
    node: K,
    rx: mpsc::UnboundedReceiver<NodeUpdate<K, V>>,
}

impl<K: Copy, V> Subscription<K, V> {
    pub(crate) const fn new(
        id: SubscriptionId,
        node: K,
        rx: mpsc::UnboundedReceiver<NodeUpdate<K, V>>,
    ) -> Self {
        Self { id, node, rx }
    }

    /// Subscription identifier, used to unsubscribe.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The subscribed node.
    #[must_use]
    pub const fn node(&self) -> K {
        self.node
    }

    /// Take the next pending update without waiting.
    pub fn try_next(&mut self) -> Option<NodeUpdate<K, V>> {
        self.rx.try_recv().ok()
    }

    /// Drain every pending update.
    pub fn drain(&mut self) -> Vec<NodeUpdate<K, V>> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Wait for the next update. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<NodeUpdate<K, V>> {
        self.rx.recv().await
    }

    /// Convert into a `Stream` of updates.
    #[must_use]
    pub fn into_stream(self) -> UnboundedReceiverStream<NodeUpdate<K, V>> {
        UnboundedReceiverStream::new(self.rx)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, task};

    use crate::domain::propagation::{GraphBuilder, PropagationGraph};

    fn doubling() -> PropagationGraph<&'static str, i64> {
        GraphBuilder::new()
            .leaf("a")
            .derived("b", &["a"], |v| v[0].map(|a| a * 2))
            .build()
            .unwrap()
    }

    #[test]
    fn recv_wakes_on_change() {
        let mut graph = doubling();
        let mut sub = graph.subscribe("b").unwrap();
        assert_eq!(sub.try_next().unwrap().value, None);

        {
            let mut next = task::spawn(sub.recv());
            assert_pending!(next.poll());

            graph.apply([("a", Some(21))]).unwrap();

            assert!(next.is_woken());
            let update = assert_ready!(next.poll()).unwrap();
            assert_eq!(update.value, Some(42));
            assert_eq!(update.batch, 1);
        }

        // Equal value, no delivery.
        graph.apply([("a", Some(21))]).unwrap();
        let mut next = task::spawn(sub.recv());
        assert_pending!(next.poll());
    }

    #[test]
    fn stream_ends_when_unsubscribed() {
        let mut graph = doubling();
        let sub = graph.subscribe("a").unwrap();
        let id = sub.id();
        let mut stream = task::spawn(sub.into_stream());

        let initial = assert_ready!(stream.poll_next()).unwrap();
        assert_eq!(initial.node, "a");
        assert_pending!(stream.poll_next());

        assert!(graph.unsubscribe(id));
        assert_ready_eq!(stream.poll_next(), None);
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned() {
        let mut graph = doubling();
        let kept = graph.subscribe("b").unwrap();
        drop(graph.subscribe("b").unwrap());
        assert_eq!(graph.subscriber_count(), 2);

        graph.apply([("a", Some(1))]).unwrap();

        assert_eq!(graph.subscriber_count(), 1);
        let values: Vec<_> = kept.into_stream().take(2).map(|u| u.value).collect().await;
        assert_eq!(values, vec![None, Some(2)]);
    }
}
