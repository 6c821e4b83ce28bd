//! Domain ports for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod local_store;
mod story_remote;

#[cfg(test)]
pub use local_store::MockLocalStore;
pub use local_store::{
    CURRENT_SCHEMA_VERSION, Collection, CollectionIndex, KeyKind, LocalStore, LocalStoreError,
    RecordKey, StoredDocument, check_index, check_put_key,
};
#[cfg(test)]
pub use story_remote::MockStoryRemote;
pub use story_remote::{
    FixtureStoryRemote, RemoteStory, StoryRemote, StoryRemoteError, SubmitReceipt,
};
