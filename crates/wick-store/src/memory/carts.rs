use super::{load_all, save_versioned, MemoryStore};
use crate::repo::CartRepository;
use crate::{store_key, StoreError, Txn};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wick_commerce::cart::{Cart, CartOwner};
use wick_commerce::ids::CartId;

fn cart_key(id: &CartId) -> String {
    store_key!("cart", id)
}

fn owner_key(owner: &CartOwner) -> String {
    store_key!("cart-owner", owner.key())
}

/// Stage a conditional cart write and keep the owner index in step.
fn stage_save(txn: &mut Txn<'_>, cart: &mut Cart) -> Result<(), StoreError> {
    let key = cart_key(&cart.id);
    let index = owner_key(&cart.owner);
    if let Some(holder) = txn.get::<CartId>(&index)? {
        if holder != cart.id && txn.exists(&cart_key(&holder)) {
            return Err(StoreError::Duplicate {
                index: "cart owner",
                value: cart.owner.key(),
            });
        }
    }
    // The owner changes when a guest cart is handed to a user.
    if let Some(previous) = txn.get::<Cart>(&key)? {
        if previous.owner != cart.owner {
            txn.delete(&owner_key(&previous.owner));
        }
    }
    save_versioned(txn, &key, cart)?;
    txn.put(&index, &cart.id)?;
    Ok(())
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn get(&self, id: &CartId) -> Result<Option<Cart>, StoreError> {
        self.kv.get(&cart_key(id))
    }

    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError> {
        let now = Utc::now();
        self.kv.transact(|txn| {
            let Some(cart_id) = txn.get::<CartId>(&owner_key(owner))? else {
                return Ok(None);
            };
            let Some(cart) = txn.get::<Cart>(&cart_key(&cart_id))? else {
                txn.delete(&owner_key(owner));
                return Ok(None);
            };
            if cart.is_expired(now) {
                tracing::debug!(cart_id = %cart.id, "dropping expired cart");
                txn.delete(&cart_key(&cart.id));
                txn.delete(&owner_key(owner));
                return Ok(None);
            }
            Ok(Some(cart))
        })
    }

    async fn save(&self, mut cart: Cart) -> Result<Cart, StoreError> {
        self.kv.transact(|txn| stage_save(txn, &mut cart))?;
        Ok(cart)
    }

    async fn save_merged(&self, mut cart: Cart, consumed: &CartId) -> Result<Cart, StoreError> {
        self.kv.transact(|txn| {
            if let Some(guest) = txn.get::<Cart>(&cart_key(consumed))? {
                txn.delete(&cart_key(consumed));
                txn.delete(&owner_key(&guest.owner));
            }
            stage_save(txn, &mut cart)
        })?;
        Ok(cart)
    }

    async fn delete(&self, id: &CartId) -> Result<bool, StoreError> {
        self.kv.transact(|txn| {
            let key = cart_key(id);
            match txn.get::<Cart>(&key)? {
                Some(cart) => {
                    let index = owner_key(&cart.owner);
                    if txn.get::<CartId>(&index)?.as_ref() == Some(id) {
                        txn.delete(&index);
                    }
                    Ok(txn.delete(&key))
                }
                None => Ok(false),
            }
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let purged = self.kv.transact(|txn| {
            let carts: Vec<Cart> = load_all(txn, "cart:")?;
            let mut purged = 0;
            for cart in carts.iter().filter(|c| c.is_expired(now)) {
                txn.delete(&cart_key(&cart.id));
                txn.delete(&owner_key(&cart.owner));
                purged += 1;
            }
            Ok(purged)
        })?;
        if purged > 0 {
            tracing::info!(purged, "purged expired carts");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wick_commerce::ids::{GuestId, UserId};
    use wick_commerce::Currency;

    #[tokio::test]
    async fn test_save_bumps_version_and_indexes_owner() {
        let store = MemoryStore::new();
        let cart = Cart::for_user(UserId::new("u1"), Currency::USD);

        let saved = store.save(cart).await.unwrap();
        assert_eq!(saved.version, 1);

        let found = store
            .find_by_owner(&CartOwner::User(UserId::new("u1")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, saved.id);
        assert_eq!(found.version, 1);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let store = MemoryStore::new();
        let saved = store
            .save(Cart::for_user(UserId::new("u1"), Currency::USD))
            .await
            .unwrap();
        let stale = saved.clone();

        store.save(saved).await.unwrap();
        let err = store.save(stale).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_second_cart_for_owner_is_rejected() {
        let store = MemoryStore::new();
        store
            .save(Cart::for_user(UserId::new("u1"), Currency::USD))
            .await
            .unwrap();
        let err = store
            .save(Cart::for_user(UserId::new("u1"), Currency::USD))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_reassigning_owner_moves_index() {
        let store = MemoryStore::new();
        let guest = CartOwner::Guest(GuestId::new("g1"));
        let mut cart = store
            .save(Cart::for_guest(GuestId::new("g1"), Currency::USD, Duration::days(7)))
            .await
            .unwrap();

        cart.assign_to(UserId::new("u1"));
        store.save(cart).await.unwrap();

        assert!(store.find_by_owner(&guest).await.unwrap().is_none());
        assert!(store
            .find_by_owner(&CartOwner::User(UserId::new("u1")))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_expired_guest_carts() {
        let store = MemoryStore::new();
        let owner = CartOwner::Guest(GuestId::new("g1"));
        let cart = store
            .save(Cart::for_guest(GuestId::new("g1"), Currency::USD, Duration::seconds(-1)))
            .await
            .unwrap();

        assert!(store.find_by_owner(&owner).await.unwrap().is_none());
        assert!(store.get(&cart.id).await.unwrap().is_none());

        store
            .save(Cart::for_guest(GuestId::new("g2"), Currency::USD, Duration::seconds(-1)))
            .await
            .unwrap();
        store
            .save(Cart::for_user(UserId::new("u1"), Currency::USD))
            .await
            .unwrap();
        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_merged_consumes_guest_cart() {
        let store = MemoryStore::new();
        let guest_owner = CartOwner::Guest(GuestId::new("g1"));
        let guest = store
            .save(Cart::for_guest(GuestId::new("g1"), Currency::USD, Duration::days(7)))
            .await
            .unwrap();
        let user_cart = store
            .save(Cart::for_user(UserId::new("u1"), Currency::USD))
            .await
            .unwrap();

        let saved = store.save_merged(user_cart, &guest.id).await.unwrap();
        assert_eq!(saved.version, 2);
        assert!(store.get(&guest.id).await.unwrap().is_none());
        assert!(store.find_by_owner(&guest_owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_merge_keeps_guest_cart() {
        let store = MemoryStore::new();
        let guest = store
            .save(Cart::for_guest(GuestId::new("g1"), Currency::USD, Duration::days(7)))
            .await
            .unwrap();
        let user_cart = store
            .save(Cart::for_user(UserId::new("u1"), Currency::USD))
            .await
            .unwrap();
        store.save(user_cart.clone()).await.unwrap();

        let err = store.save_merged(user_cart, &guest.id).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(store.get(&guest.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_clears_index() {
        let store = MemoryStore::new();
        let owner = CartOwner::User(UserId::new("u1"));
        let cart = store
            .save(Cart::for_user(UserId::new("u1"), Currency::USD))
            .await
            .unwrap();

        assert!(store.delete(&cart.id).await.unwrap());
        assert!(!store.delete(&cart.id).await.unwrap());
        assert!(store.find_by_owner(&owner).await.unwrap().is_none());
    }
}
