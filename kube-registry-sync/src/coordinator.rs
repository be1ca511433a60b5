use std::any::Any;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::feed::{ChangeFeed, Informer};
use crate::gate::ReadyGate;
use crate::query::{Catalog, QueryFacade, lookup};
use crate::store::{LocalStore, MirroredItem};
use crate::{Error, Result};

#[derive(Clone, Debug, Default)]
pub struct SyncConfig {
    /// Upper bound on the wait for every collection to sync. `None` waits
    /// until cancelled.
    pub timeout: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionState {
    Unstarted,
    Bootstrapping,
    Synced,
}

struct Collection {
    id: String,
    gate: ReadyGate,
    store: Arc<dyn Any + Send + Sync>,
    task: Option<BoxFuture<'static, Result<()>>>,
}

/// Owns the informers of every mirrored collection and the barrier that
/// passes once all of them have completed their bootstrap.
pub struct SyncCoordinator {
    config: SyncConfig,
    collections: Vec<Collection>,
    started: bool,
    ready: ReadyGate,
}

impl Default for SyncCoordinator {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl SyncCoordinator {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            collections: Vec::new(),
            started: false,
            ready: ReadyGate::new(),
        }
    }

    /// Registers a collection. Must happen before [`Self::run`].
    pub fn register<F: ChangeFeed>(
        &mut self,
        id: impl Into<String>,
        informer: Informer<F>,
    ) -> Result<LocalStore<F::Item>> {
        let id = id.into();
        if self.started {
            return Err(Error::AlreadyStarted);
        }
        if self.collections.iter().any(|c| c.id == id) {
            return Err(Error::DuplicateCollection(id));
        }

        let store = informer.reader();
        debug!("registered collection {id}");
        self.collections.push(Collection {
            id,
            gate: informer.gate(),
            store: Arc::new(store.clone()),
            task: Some(informer.run().boxed()),
        });
        Ok(store)
    }

    /// Starts every registered feed, then waits until all of them have
    /// synced, `cancel` fires or the configured timeout elapses. Feeds keep
    /// running when the wait is aborted.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyStarted);
        }
        self.started = true;

        info!("starting {} collection feeds", self.collections.len());
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
        for collection in self.collections.iter_mut() {
            let Some(task) = collection.task.take() else {
                continue;
            };
            let id = collection.id.clone();
            let exit_tx = exit_tx.clone();
            let span = info_span!("collection", id = %id);
            tokio::spawn(
                async move {
                    let res = task.await;
                    let _ = exit_tx.send((id, res));
                }
                .instrument(span),
            );
        }
        drop(exit_tx);

        let gates: Vec<(String, ReadyGate)> = self
            .collections
            .iter()
            .map(|c| (c.id.clone(), c.gate.clone()))
            .collect();
        // the barrier passes once every collection synced, even after the
        // wait below was cancelled or timed out
        let barrier = self.ready.clone();
        let collection_gates: Vec<ReadyGate> =
            gates.iter().map(|(_, gate)| gate.clone()).collect();
        tokio::spawn(async move {
            join_all(collection_gates.iter().map(|gate| gate.ready())).await;
            if barrier.mark_ready() {
                info!("readiness barrier passed");
            }
        });
        let ready = self.ready.clone();
        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => pending::<()>().await,
            }
        };
        // a feed exiting before it synced will never sync
        let failed = async {
            while let Some((id, res)) = exit_rx.recv().await {
                if gates.iter().any(|(gid, gate)| *gid == id && gate.is_ready()) {
                    continue;
                }
                return match res {
                    Ok(()) => Error::Connection(format!("feed for {id} ended before it synced")),
                    Err(e) => e,
                };
            }
            pending().await
        };

        let outcome = select! {
            biased;
            _ = cancel.cancelled() => Err(Error::SyncAborted { pending: unsynced(&gates) }),
            _ = deadline => Err(Error::Timeout(timeout.unwrap_or_default())),
            e = failed => Err(e),
            _ = ready.ready() => Ok(()),
        };

        match &outcome {
            Ok(()) => {
                info!("all {} collections synced", self.collections.len());
            }
            Err(Error::SyncAborted { pending }) => {
                warn!("cancelled before collections synced: {}", pending.join(", "));
            }
            Err(e) => {
                error!(%e, "failed waiting for collections to sync: {}", unsynced(&gates).join(", "));
            }
        }
        outcome
    }

    pub fn state(&self, id: &str) -> Option<CollectionState> {
        let collection = self.collections.iter().find(|c| c.id == id)?;
        let state = if !self.started {
            CollectionState::Unstarted
        } else if collection.gate.is_ready() {
            CollectionState::Synced
        } else {
            CollectionState::Bootstrapping
        };
        Some(state)
    }

    /// Ids of the collections that haven't synced yet.
    pub fn pending(&self) -> Vec<String> {
        self.collections
            .iter()
            .filter(|c| !c.gate.is_ready())
            .map(|c| c.id.clone())
            .collect()
    }

    /// Whether the barrier has passed.
    pub fn is_synced(&self) -> bool {
        self.ready.is_ready()
    }

    /// Gate marked once the barrier has passed.
    pub fn ready_gate(&self) -> ReadyGate {
        self.ready.clone()
    }

    pub fn store<K: MirroredItem>(&self, id: &str) -> Result<LocalStore<K>> {
        lookup(&self.catalog(), id)
    }

    pub fn query(&self) -> QueryFacade {
        QueryFacade::new(self.ready.clone(), self.catalog())
    }

    fn catalog(&self) -> Catalog {
        self.collections
            .iter()
            .map(|c| (c.id.clone(), c.store.clone()))
            .collect()
    }
}

fn unsynced(gates: &[(String, ReadyGate)]) -> Vec<String> {
    gates
        .iter()
        .filter(|(_, gate)| !gate.is_ready())
        .map(|(id, _)| id.clone())
        .collect()
}
