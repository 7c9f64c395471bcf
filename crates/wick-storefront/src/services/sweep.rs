use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use wick_commerce::CommerceError;
use wick_store::{CartRepository, CheckoutRepository};

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub carts: usize,
    pub checkouts: usize,
}

/// Delete guest carts and checkout sessions that expired before `now`.
pub async fn sweep_once(
    carts: &dyn CartRepository,
    checkouts: &dyn CheckoutRepository,
    now: DateTime<Utc>,
) -> Result<SweepReport, CommerceError> {
    Ok(SweepReport {
        carts: carts.purge_expired(now).await?,
        checkouts: checkouts.purge_expired(now).await?,
    })
}

/// Run [`sweep_once`] every `every` until the runtime shuts down.
pub fn spawn_sweeper(
    carts: Arc<dyn CartRepository>,
    checkouts: Arc<dyn CheckoutRepository>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval = ?every, "expiry sweeper started");
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_once(carts.as_ref(), checkouts.as_ref(), Utc::now()).await {
                Ok(report) if report == SweepReport::default() => {}
                Ok(report) => tracing::info!(
                    carts = report.carts,
                    checkouts = report.checkouts,
                    "expired carts and checkouts removed"
                ),
                Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
            }
        }
    })
}
