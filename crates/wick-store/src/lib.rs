//! Persistence for Wick.
//!
//! Defines the repository ports the storefront talks to and an in-process
//! implementation backed by a versioned JSON document store.
//!
//! # Example
//!
//! ```rust,ignore
//! use wick_store::prelude::*;
//!
//! let store = MemoryStore::new();
//! let saved = CartRepository::save(&store, cart).await?;
//! assert_eq!(saved.version, 1);
//! ```

mod error;
mod kv;
mod memory;
mod repo;

pub use error::StoreError;
pub use kv::{KvStore, Txn};
pub use memory::MemoryStore;
pub use repo::{
    CartRepository, CheckoutRepository, InsertedOrder, OrderRepository, ParkOutcome,
    ProductRepository, Versioned,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        CartRepository, CheckoutRepository, MemoryStore, OrderRepository, ProductRepository,
        StoreError,
    };
}
