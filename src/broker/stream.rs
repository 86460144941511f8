use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::broker::channel::SubscriptionId;
use crate::broker::engine::PubSubEngine;
use crate::broker::message::Message;

/// Messages of one topic as a `Stream`.
///
/// Built only on `subscribe`/`unsubscribe`: the registered handler feeds an
/// unbounded queue, and dropping the stream removes the subscription. If the
/// topic already holds a value it is the first item yielded.
pub struct SubscriptionStream<E: PubSubEngine> {
    engine: E,
    id: SubscriptionId,
    rx: UnboundedReceiver<Message>,
}

impl<E: PubSubEngine> SubscriptionStream<E> {
    pub fn new(engine: E, topic: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = engine.subscribe(
            topic,
            Arc::new(move |message: &Message| {
                let _ = tx.send(message.clone());
            }),
        );
        Self { engine, id, rx }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next accepted message.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl<E: PubSubEngine + Unpin> Stream for SubscriptionStream<E> {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<E: PubSubEngine> Drop for SubscriptionStream<E> {
    fn drop(&mut self) {
        self.engine.unsubscribe(self.id);
    }
}
