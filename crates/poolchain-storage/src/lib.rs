//! Persistent block storage for the chain.

pub mod sled_store;

pub use sled_store::SledStore;
