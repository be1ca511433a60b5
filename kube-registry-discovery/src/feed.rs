use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use futures::{StreamExt, future};
use kube::api::ListParams;
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Event, watcher};
use kube::{Api, Resource};
use kube_registry_sync::{ChangeFeed, FeedEvent, FeedStream, MirroredItem};
use serde::de::DeserializeOwned;
use tracing::{error, warn};

use crate::Error;

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// [`ChangeFeed`] over a kube watcher, converting every object to `T`.
pub struct KubeFeed<K, T> {
    api: Api<K>,
    config: watcher::Config,
    _record: PhantomData<fn() -> T>,
}

impl<K, T> KubeFeed<K, T> {
    pub fn new(api: Api<K>) -> Self {
        Self {
            api,
            config: watcher::Config::default(),
            _record: PhantomData,
        }
    }

    pub fn with_config(mut self, config: watcher::Config) -> Self {
        self.config = config;
        self
    }
}

impl<K, T> ChangeFeed for KubeFeed<K, T>
where
    K: Resource + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
    T: MirroredItem + TryFrom<K, Error = Error>,
{
    type Item = T;

    async fn start(&mut self) -> kube_registry_sync::Result<FeedStream<T>> {
        // watcher retries forever on its own, so probe reachability first
        self.api
            .list(&ListParams::default().limit(1))
            .await
            .map_err(|e| kube_registry_sync::Error::Connection(e.to_string()))?;

        let stream = watcher(self.api.clone(), self.config.clone())
            .default_backoff()
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => feed_event(event),
                    Err(e) => {
                        error!(%e, "unexpected error with watch stream");
                        None
                    }
                })
            })
            .boxed();
        Ok(stream)
    }

    fn retry_delay(&mut self, attempt: u32) -> Option<Duration> {
        Some(retry_delay(attempt))
    }
}

fn retry_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    INITIAL_RETRY_DELAY
        .saturating_mul(factor)
        .min(MAX_RETRY_DELAY)
}

fn feed_event<K, T>(event: Event<K>) -> Option<FeedEvent<T>>
where
    T: TryFrom<K, Error = Error>,
{
    let convert = |obj: K| match T::try_from(obj) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(%e, "skipping object");
            None
        }
    };
    match event {
        Event::Init => Some(FeedEvent::Listing),
        Event::InitApply(obj) => convert(obj).map(FeedEvent::Added),
        Event::InitDone => Some(FeedEvent::Bootstrapped),
        Event::Apply(obj) => convert(obj).map(FeedEvent::Updated),
        Event::Delete(obj) => convert(obj).map(FeedEvent::Deleted),
    }
}
