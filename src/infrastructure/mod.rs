//! Adapters implementing the domain ports.

pub mod directory;
pub mod in_memory;
pub mod notify;
pub mod processor;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod sandbox;
mod stock;
