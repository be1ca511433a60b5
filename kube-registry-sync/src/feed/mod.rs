pub mod channel;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, error, info, trace, warn};

use crate::Result;
use crate::gate::ReadyGate;
use crate::store::{LocalStore, MirroredItem, StoreWriter};

pub type FeedStream<K> = BoxStream<'static, FeedEvent<K>>;

/// A change observed on a remote collection.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent<K> {
    /// A full listing begins. Items not listed again before the next
    /// `Bootstrapped` are treated as deleted.
    Listing,
    Added(K),
    Updated(K),
    Deleted(K),
    /// The full listing has been delivered.
    Bootstrapped,
}

/// Subscription to a remote collection: a bootstrap listing followed by a
/// live stream of changes.
pub trait ChangeFeed: Send + 'static {
    type Item: MirroredItem;

    /// Connects to the remote collection. Fails with
    /// [`crate::Error::Connection`] when the remote can't be reached.
    fn start(&mut self) -> impl Future<Output = Result<FeedStream<Self::Item>>> + Send;

    /// Delay before the `attempt`th retry of a failed [`Self::start`], or
    /// `None` to give up.
    fn retry_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }
}

pub trait EventHandler<K>: Send + Sync {
    fn on_add(&self, _item: &Arc<K>) {}

    fn on_update(&self, _old: &Arc<K>, _new: &Arc<K>) {}

    fn on_delete(&self, _item: &Arc<K>) {}
}

type ItemFn<K> = Box<dyn Fn(&Arc<K>) + Send + Sync>;
type UpdateFn<K> = Box<dyn Fn(&Arc<K>, &Arc<K>) + Send + Sync>;

/// [`EventHandler`] built from optional closures.
pub struct HandlerFuncs<K> {
    add: Option<ItemFn<K>>,
    update: Option<UpdateFn<K>>,
    delete: Option<ItemFn<K>>,
}

impl<K> Default for HandlerFuncs<K> {
    fn default() -> Self {
        Self {
            add: None,
            update: None,
            delete: None,
        }
    }
}

impl<K> HandlerFuncs<K> {
    pub fn with_add(mut self, f: impl Fn(&Arc<K>) + Send + Sync + 'static) -> Self {
        self.add = Some(Box::new(f));
        self
    }

    pub fn with_update(mut self, f: impl Fn(&Arc<K>, &Arc<K>) + Send + Sync + 'static) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    pub fn with_delete(mut self, f: impl Fn(&Arc<K>) + Send + Sync + 'static) -> Self {
        self.delete = Some(Box::new(f));
        self
    }
}

impl<K> EventHandler<K> for HandlerFuncs<K> {
    fn on_add(&self, item: &Arc<K>) {
        if let Some(f) = &self.add {
            f(item)
        }
    }

    fn on_update(&self, old: &Arc<K>, new: &Arc<K>) {
        if let Some(f) = &self.update {
            f(old, new)
        }
    }

    fn on_delete(&self, item: &Arc<K>) {
        if let Some(f) = &self.delete {
            f(item)
        }
    }
}

/// Drives one [`ChangeFeed`] into its store, notifying subscribed handlers
/// and marking its gate once the bootstrap listing has been applied.
pub struct Informer<F: ChangeFeed> {
    feed: F,
    writer: StoreWriter<F::Item>,
    handlers: Vec<Arc<dyn EventHandler<F::Item>>>,
    gate: ReadyGate,
}

impl<F: ChangeFeed> Informer<F> {
    pub fn new(feed: F, writer: StoreWriter<F::Item>) -> Self {
        Self {
            feed,
            writer,
            handlers: Vec::new(),
            gate: ReadyGate::new(),
        }
    }

    /// Informer over a new empty store.
    pub fn from_feed(feed: F) -> Self {
        let (_, writer) = crate::store::store();
        Self::new(feed, writer)
    }

    /// Handlers are invoked in subscription order, once per applied event,
    /// after the store has been updated.
    pub fn subscribe(&mut self, handler: impl EventHandler<F::Item> + 'static) -> &mut Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn reader(&self) -> LocalStore<F::Item> {
        self.writer.reader()
    }

    pub fn gate(&self) -> ReadyGate {
        self.gate.clone()
    }

    pub fn has_synced(&self) -> bool {
        self.gate.is_ready()
    }

    pub async fn run(mut self) -> Result<()> {
        let mut stream = self.connect().await?;
        info!("started change feed");
        while let Some(event) = stream.next().await {
            self.apply(event);
        }
        warn!("change feed ended");
        Ok(())
    }

    async fn connect(&mut self) -> Result<FeedStream<F::Item>> {
        let mut attempt = 0;
        loop {
            match self.feed.start().await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    attempt += 1;
                    let Some(delay) = self.feed.retry_delay(attempt) else {
                        error!(%e, "failed to start change feed");
                        return Err(e);
                    };
                    warn!(%e, attempt, "failed to start change feed, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn apply(&mut self, event: FeedEvent<F::Item>) {
        match event {
            FeedEvent::Listing => {
                debug!("listing started");
                self.writer.begin_relist();
            }
            FeedEvent::Added(item) => {
                let item = Arc::new(item);
                let old = self.writer.apply_add(item.clone());
                self.notify_upsert(old, &item);
            }
            FeedEvent::Updated(item) => {
                let item = Arc::new(item);
                let old = self.writer.apply_update(item.clone());
                self.notify_upsert(old, &item);
            }
            FeedEvent::Deleted(item) => {
                let key = item.key();
                match self.writer.apply_delete(&key) {
                    Some(old) => {
                        trace!("deleted {key}");
                        self.handlers.iter().for_each(|h| h.on_delete(&old));
                    }
                    None => debug!("ignoring delete of unknown item {key}"),
                }
            }
            FeedEvent::Bootstrapped => {
                for stale in self.writer.finish_relist() {
                    debug!("pruned {} missing from listing", stale.key());
                    self.handlers.iter().for_each(|h| h.on_delete(&stale));
                }
                if self.gate.mark_ready() {
                    info!("bootstrap complete with {} items", self.writer.reader().len());
                }
            }
        }
    }

    fn notify_upsert(&self, old: Option<Arc<F::Item>>, new: &Arc<F::Item>) {
        match old {
            Some(old) => {
                trace!("updated {}", new.key());
                self.handlers.iter().for_each(|h| h.on_update(&old, new));
            }
            None => {
                trace!("added {}", new.key());
                self.handlers.iter().for_each(|h| h.on_add(new));
            }
        }
    }
}
