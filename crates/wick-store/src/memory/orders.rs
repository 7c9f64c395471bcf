use super::{save_versioned, MemoryStore};
use crate::repo::{InsertedOrder, OrderRepository, ParkOutcome};
use crate::{store_key, StoreError, Txn};
use async_trait::async_trait;
use chrono::NaiveDate;
use wick_commerce::checkout::{Order, PaymentEvent};
use wick_commerce::ids::{CheckoutId, OrderId, PaymentIntentId, UserId};

fn order_key(id: &OrderId) -> String {
    store_key!("order", id)
}

fn number_key(order_number: &str) -> String {
    store_key!("order-number", order_number)
}

fn checkout_key(id: &CheckoutId) -> String {
    store_key!("order-checkout", id)
}

fn intent_key(id: &PaymentIntentId) -> String {
    store_key!("order-intent", id)
}

fn inbox_key(id: &PaymentIntentId) -> String {
    store_key!("inbox", id)
}

fn by_index(txn: &Txn<'_>, index: &str) -> Result<Option<Order>, StoreError> {
    match txn.get::<OrderId>(index)? {
        Some(id) => txn.get(&order_key(&id)),
        None => Ok(None),
    }
}

impl MemoryStore {
    fn order_by_index(&self, index: &str) -> Result<Option<Order>, StoreError> {
        self.kv.transact(|txn| by_index(txn, index))
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert(&self, mut order: Order) -> Result<InsertedOrder, StoreError> {
        let parked_events = self.kv.transact(|txn| {
            let number = number_key(&order.order_number);
            if txn.exists(&number) {
                return Err(StoreError::Duplicate {
                    index: "order number",
                    value: order.order_number.clone(),
                });
            }
            let checkout = checkout_key(&order.checkout_id);
            if txn.exists(&checkout) {
                return Err(StoreError::Duplicate {
                    index: "checkout id",
                    value: order.checkout_id.to_string(),
                });
            }

            save_versioned(txn, &order_key(&order.id), &mut order)?;
            txn.put(&number, &order.id)?;
            txn.put(&checkout, &order.id)?;
            txn.put(&intent_key(&order.payment.transaction_id), &order.id)?;
            if let Some(user_id) = &order.user_id {
                txn.put(&store_key!("order-user", user_id, order.id), &order.id)?;
            }

            let inbox = inbox_key(&order.payment.transaction_id);
            let parked: Vec<PaymentEvent> = txn.get(&inbox)?.unwrap_or_default();
            txn.delete(&inbox);
            Ok(parked)
        })?;

        tracing::info!(
            order_number = %order.order_number,
            parked = parked_events.len(),
            "order inserted"
        );
        Ok(InsertedOrder {
            order,
            parked_events,
        })
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.kv.get(&order_key(id))
    }

    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        self.order_by_index(&number_key(order_number))
    }

    async fn find_by_checkout(&self, checkout_id: &CheckoutId) -> Result<Option<Order>, StoreError> {
        self.order_by_index(&checkout_key(checkout_id))
    }

    async fn find_by_intent(&self, intent_id: &PaymentIntentId) -> Result<Option<Order>, StoreError> {
        self.order_by_index(&intent_key(intent_id))
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let prefix = format!("{}:", store_key!("order-user", user_id));
        let mut orders = self.kv.transact(|txn| {
            let mut orders = Vec::new();
            for key in txn.keys(&prefix) {
                // The prefix also matches ids that merely start with this one.
                match by_index(txn, &key)? {
                    Some(order) if order.user_id.as_ref() == Some(user_id) => orders.push(order),
                    _ => {}
                }
            }
            Ok(orders)
        })?;
        orders.sort_by(|a: &Order, b: &Order| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update(&self, mut order: Order) -> Result<Order, StoreError> {
        self.kv.transact(|txn| {
            let key = order_key(&order.id);
            if !txn.exists(&key) {
                return Err(StoreError::NotFound {
                    entity: "order",
                    id: order.id.to_string(),
                });
            }
            save_versioned(txn, &key, &mut order)
        })?;
        Ok(order)
    }

    async fn next_sequence(&self, date: NaiveDate) -> Result<u64, StoreError> {
        let key = store_key!("order-seq", date.format("%Y%m%d"));
        self.kv.transact(|txn| {
            let next = txn.get::<u64>(&key)?.unwrap_or(0) + 1;
            txn.put(&key, &next)?;
            Ok(next)
        })
    }

    async fn park_event(&self, event: PaymentEvent) -> Result<ParkOutcome, StoreError> {
        let outcome = self.kv.transact(|txn| {
            if let Some(order_id) = txn.get::<OrderId>(&intent_key(&event.intent_id))? {
                return Ok(ParkOutcome::OrderExists(order_id));
            }
            let inbox = inbox_key(&event.intent_id);
            let mut parked: Vec<PaymentEvent> = txn.get(&inbox)?.unwrap_or_default();
            if parked.iter().any(|e| e.id == event.id) {
                return Ok(ParkOutcome::AlreadyParked);
            }
            parked.push(event.clone());
            txn.put(&inbox, &parked)?;
            Ok(ParkOutcome::Parked)
        })?;
        tracing::debug!(event_id = %event.id, intent = %event.intent_id, ?outcome, "payment event parked");
        Ok(outcome)
    }
}
