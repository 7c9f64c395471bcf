//! In-process repositories over [`KvStore`].

mod carts;
mod checkouts;
mod orders;
mod products;

use crate::kv::{KvStore, Txn};
use crate::repo::Versioned;
use crate::StoreError;
use serde::Serialize;

/// One store behind every repository port.
#[derive(Debug, Default)]
pub struct MemoryStore {
    kv: KvStore,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw document access, mainly for seeding and inspection.
    pub fn kv(&self) -> &KvStore {
        &self.kv
    }
}

/// Stage a conditional write of `doc` and bump its version.
fn save_versioned<T: Versioned + Serialize>(
    txn: &mut Txn<'_>,
    key: &str,
    doc: &mut T,
) -> Result<(), StoreError> {
    let expected = doc.version();
    doc.set_version(expected + 1);
    txn.put_if_version(key, expected, doc)?;
    Ok(())
}

/// Load every document under `prefix`.
fn load_all<T: serde::de::DeserializeOwned>(
    txn: &Txn<'_>,
    prefix: &str,
) -> Result<Vec<T>, StoreError> {
    let mut docs = Vec::new();
    for key in txn.keys(prefix) {
        if let Some(doc) = txn.get(&key)? {
            docs.push(doc);
        }
    }
    Ok(docs)
}
