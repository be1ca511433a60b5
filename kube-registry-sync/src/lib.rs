pub mod coordinator;
pub mod error;
pub mod feed;
pub mod gate;
pub mod query;
pub mod selector;
pub mod store;

#[cfg(test)]
mod testing;

pub use coordinator::{CollectionState, SyncConfig, SyncCoordinator};
pub use error::{Error, Result};
pub use feed::channel::{ChannelFeed, FeedSender, channel_feed};
pub use feed::{ChangeFeed, EventHandler, FeedEvent, FeedStream, HandlerFuncs, Informer};
pub use gate::ReadyGate;
pub use query::{QueryFacade, Related};
pub use selector::Selector;
pub use store::{CollectionKey, LocalStore, MirroredItem, StoreWriter, store};
