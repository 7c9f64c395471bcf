use super::{load_all, save_versioned, MemoryStore};
use crate::repo::CheckoutRepository;
use crate::{store_key, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wick_commerce::checkout::CheckoutSession;
use wick_commerce::ids::{CartId, CheckoutId};

fn checkout_key(id: &CheckoutId) -> String {
    store_key!("checkout", id)
}

#[async_trait]
impl CheckoutRepository for MemoryStore {
    async fn get(&self, id: &CheckoutId) -> Result<Option<CheckoutSession>, StoreError> {
        self.kv.get(&checkout_key(id))
    }

    async fn save(&self, mut session: CheckoutSession) -> Result<CheckoutSession, StoreError> {
        self.kv
            .transact(|txn| save_versioned(txn, &checkout_key(&session.id), &mut session))?;
        Ok(session)
    }

    async fn delete(&self, id: &CheckoutId) -> Result<bool, StoreError> {
        self.kv.delete(&checkout_key(id))
    }

    async fn discard_others_for_cart(&self, cart_id: &CartId, keep: &CheckoutId) -> Result<usize, StoreError> {
        self.kv.transact(|txn| {
            let sessions: Vec<CheckoutSession> = load_all(txn, "checkout:")?;
            let mut discarded = 0;
            for session in sessions.iter().filter(|s| {
                &s.cart_id == cart_id && &s.id != keep && !s.is_confirmed() && !s.confirming
            }) {
                txn.delete(&checkout_key(&session.id));
                discarded += 1;
            }
            Ok(discarded)
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let purged = self.kv.transact(|txn| {
            let sessions: Vec<CheckoutSession> = load_all(txn, "checkout:")?;
            let mut purged = 0;
            for session in sessions
                .iter()
                .filter(|s| !s.is_confirmed() && s.is_expired(now))
            {
                txn.delete(&checkout_key(&session.id));
                purged += 1;
            }
            Ok(purged)
        })?;
        if purged > 0 {
            tracing::info!(purged, "purged expired checkout sessions");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wick_commerce::cart::CartOwner;
    use wick_commerce::ids::GuestId;

    fn session(ttl: Duration) -> CheckoutSession {
        CheckoutSession::new(
            CartId::new("c1"),
            CartOwner::Guest(GuestId::new("g1")),
            ttl,
        )
    }

    #[tokio::test]
    async fn test_only_one_writer_wins() {
        let store = MemoryStore::new();
        let saved = store.save(session(Duration::minutes(30))).await.unwrap();

        let mut first = saved.clone();
        let mut second = saved;
        first.confirming = true;
        second.confirming = true;

        assert!(store.save(first).await.is_ok());
        assert!(store.save(second).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_discard_others_for_cart() {
        let store = MemoryStore::new();
        let stale = store.save(session(Duration::minutes(30))).await.unwrap();
        let mut busy = session(Duration::minutes(30));
        busy.confirming = true;
        let busy = store.save(busy).await.unwrap();
        let other_cart = store
            .save(CheckoutSession::new(
                CartId::new("c2"),
                CartOwner::Guest(GuestId::new("g1")),
                Duration::minutes(30),
            ))
            .await
            .unwrap();
        let fresh = store.save(session(Duration::minutes(30))).await.unwrap();

        let discarded = store
            .discard_others_for_cart(&CartId::new("c1"), &fresh.id)
            .await
            .unwrap();
        assert_eq!(discarded, 1);
        assert!(store.get(&stale.id).await.unwrap().is_none());
        assert!(store.get(&busy.id).await.unwrap().is_some());
        assert!(store.get(&other_cart.id).await.unwrap().is_some());
        assert!(store.get(&fresh.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_expired_sessions() {
        let store = MemoryStore::new();
        let live = store.save(session(Duration::minutes(30))).await.unwrap();
        store.save(session(Duration::seconds(-1))).await.unwrap();

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.get(&live.id).await.unwrap().is_some());
        assert!(store.delete(&live.id).await.unwrap());
        assert!(store.get(&live.id).await.unwrap().is_none());
    }
}
