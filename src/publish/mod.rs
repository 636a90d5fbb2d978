//! Publishing — remote document store, read-verify-write, email sink.

pub mod email;
pub mod publisher;
pub mod store;

pub use email::EmailSink;
pub use publisher::{PublishReceipt, Publisher};
pub use store::{DocumentStore, GitHubStore, MemoryStore, RemoteDocument};
