pub mod session;
pub mod store;

pub use session::{PlaybackSession, PlaybackStatus};
pub use store::{
    FilePositionBackend, InMemoryPositionBackend, PlaybackPositionStore, PositionBackend,
    StoreError,
};
