use std::time::Duration;

use thiserror::Error;

use crate::store::CollectionKey;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to connect to remote: {0}")]
    Connection(String),

    #[error("timed out after {0:?} waiting for readiness")]
    Timeout(Duration),

    #[error("sync aborted before collections synced: [{}]", .pending.join(", "))]
    SyncAborted { pending: Vec<String> },

    #[error("{key} not found in collection {collection}")]
    NotFound {
        collection: String,
        key: CollectionKey,
    },

    #[error("sync coordinator already started")]
    AlreadyStarted,

    #[error("collection {0} is already registered")]
    DuplicateCollection(String),

    #[error("collection {0} is not registered")]
    UnknownCollection(String),

    #[error("collection {collection} does not hold the requested item type")]
    CollectionType { collection: String },

    #[error("caches have not synced yet")]
    NotReady,

    #[error("wait for readiness was cancelled")]
    Cancelled,

    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
