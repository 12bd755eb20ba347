//! Broker connection status aggregation.
//!
//! One status fetch per known broker, issued concurrently, with per-broker
//! failure isolation: a broker that errors degrades to an `Error` record
//! instead of failing the whole view. A polling loop re-checks on a fixed
//! cadence until its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{ApiClient, ApiResult};

/// The fixed set of broker integrations the backend knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerId {
    Zerodha,
    Upstox,
    Groww,
    Dhan,
}

impl BrokerId {
    /// Returns all known brokers, in reporting order.
    pub fn all() -> &'static [BrokerId] {
        &[
            BrokerId::Zerodha,
            BrokerId::Upstox,
            BrokerId::Groww,
            BrokerId::Dhan,
        ]
    }

    /// Returns the identifier used in backend paths.
    pub fn id(&self) -> &'static str {
        match self {
            BrokerId::Zerodha => "ZERODHA",
            BrokerId::Upstox => "UPSTOX",
            BrokerId::Groww => "GROWW",
            BrokerId::Dhan => "DHAN",
        }
    }

    /// Returns the human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            BrokerId::Zerodha => "Zerodha",
            BrokerId::Upstox => "Upstox",
            BrokerId::Groww => "Groww",
            BrokerId::Dhan => "Dhan",
        }
    }
}

/// Connection state reported per broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    /// Status could not be determined (fetch failed).
    Error,
}

/// One broker's status at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerStatus {
    pub broker: BrokerId,
    pub connected: bool,
    pub status: ConnectionState,
    pub last_checked: DateTime<Utc>,
}

impl BrokerStatus {
    /// The degraded record reported when a broker's status fetch fails.
    fn error_record(broker: BrokerId) -> Self {
        Self {
            broker,
            connected: false,
            status: ConnectionState::Error,
            last_checked: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: ConnectionState,
    connected: bool,
}

/// Fetches and aggregates per-broker connection status.
pub struct StatusAggregator {
    client: Arc<ApiClient>,
}

impl StatusAggregator {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Returns exactly one record per known broker, never an error.
    ///
    /// Fetches run concurrently; each broker's `Result` is reduced to a
    /// record, with failures mapped to `Error`/disconnected.
    pub async fn all_statuses(&self) -> Vec<BrokerStatus> {
        let fetches = BrokerId::all()
            .iter()
            .map(|&broker| async move { (broker, self.fetch_one(broker).await) });

        join_all(fetches)
            .await
            .into_iter()
            .map(|(broker, result)| match result {
                Ok(status) => status,
                Err(e) => {
                    warn!(broker = broker.id(), error = %e, "broker status fetch failed");
                    BrokerStatus::error_record(broker)
                }
            })
            .collect()
    }

    async fn fetch_one(&self, broker: BrokerId) -> ApiResult<BrokerStatus> {
        let path = format!("/brokers/{}/status", broker.id());
        let response: StatusResponse = self.client.get(&path).await?;
        Ok(BrokerStatus {
            broker,
            connected: response.connected,
            status: response.status,
            last_checked: Utc::now(),
        })
    }

    /// Polls statuses on `interval`, publishing each round to `tx`, until
    /// `cancel` fires or every receiver is gone.
    pub async fn poll(
        &self,
        interval: Duration,
        cancel: CancellationToken,
        tx: watch::Sender<Vec<BrokerStatus>>,
    ) {
        loop {
            let statuses = self.all_statuses().await;
            if tx.send(statuses).is_err() {
                debug!("status watchers gone, stopping poll loop");
                break;
            }
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("status poll loop cancelled");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
            }
        }
    }
}
