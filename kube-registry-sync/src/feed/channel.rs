use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::feed::{ChangeFeed, FeedEvent, FeedStream};
use crate::store::MirroredItem;
use crate::{Error, Result};

/// Creates an in-memory feed and the sender driving it.
pub fn channel_feed<K>(buffer: usize) -> (FeedSender<K>, ChannelFeed<K>) {
    let (tx, rx) = mpsc::channel(buffer);
    (FeedSender { tx }, ChannelFeed { rx: Some(rx) })
}

pub struct FeedSender<K> {
    tx: mpsc::Sender<FeedEvent<K>>,
}

impl<K> Clone for FeedSender<K> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<K> FeedSender<K> {
    pub async fn send(&self, event: FeedEvent<K>) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Connection("channel feed receiver dropped".into()))
    }

    /// Sends a complete listing of `items`.
    pub async fn bootstrap(&self, items: impl IntoIterator<Item = K>) -> Result<()> {
        self.send(FeedEvent::Listing).await?;
        for item in items {
            self.send(FeedEvent::Added(item)).await?;
        }
        self.send(FeedEvent::Bootstrapped).await
    }
}

/// [`ChangeFeed`] fed through a [`FeedSender`]. It can only be started once.
pub struct ChannelFeed<K> {
    rx: Option<mpsc::Receiver<FeedEvent<K>>>,
}

impl<K: MirroredItem> ChangeFeed for ChannelFeed<K> {
    type Item = K;

    async fn start(&mut self) -> Result<FeedStream<K>> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| Error::Connection("channel feed already started".into()))?;
        Ok(ReceiverStream::new(rx).boxed())
    }
}
