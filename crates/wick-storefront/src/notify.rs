//! Customer notifications.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use wick_commerce::checkout::Order;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotifyError>;
}

/// Writes confirmations to the log instead of sending mail.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(
            order_number = %order.order_number,
            email = %order.email,
            total = %order.totals.total.display(),
            "order confirmation sent"
        );
        Ok(())
    }
}

/// Send the confirmation on its own task. Failures are logged and never
/// reach the caller.
pub fn dispatch_confirmation(notifier: Arc<dyn Notifier>, order: Order) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.send_order_confirmation(&order).await {
            tracing::warn!(order_number = %order.order_number, error = %e, "order confirmation failed");
        }
    })
}
