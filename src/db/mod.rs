//! Persistence for doubtdesk
//!
//! `Store` is the seam the action handlers use. `MongoStore` implements it
//! over the typed collection wrapper in `mongo`; `MemoryStore` keeps
//! everything in process for dev mode and tests.

pub mod memory;
pub mod mongo;
pub mod mongo_store;
pub mod schemas;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use mongo_store::MongoStore;
pub use store::{FollowChange, QuestionFilter, Store, UserCounterDelta};
