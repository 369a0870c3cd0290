//! The telemetry feed seam.
//!
//! The synchronization core never speaks to the simulation backend directly.
//! Whatever transport reaches it (rosbridge, a recorded session, a test
//! harness) implements [`TelemetryFeed`] and hands over a stream of
//! [`TelemetryBatch`] values in delivery order.
//!
//! # Overview
//!
//! - [`TelemetryFeed`] – the trait every feed must implement.
//! - [`ChannelFeed`] – an in-process feed backed by a Tokio `mpsc` channel.
//! - [`ReplayFeed`] – replays newline-delimited JSON batches from a file,
//!   optionally paced by a fixed interval.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use holoped_types::{HoloError, TelemetryBatch};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Every telemetry source must implement this trait.
///
/// # Contract
///
/// * `subscribe` – establishes the subscription and returns the stream of
///   batches.  The stream ends only when the source is exhausted or torn
///   down.  A feed may refuse a second subscription.
#[async_trait]
pub trait TelemetryFeed: Send + Sync {
    /// Subscribe to the feed.
    async fn subscribe(&self) -> Result<BoxStream<'static, TelemetryBatch>, HoloError>;
}

// ────────────────────────────────────────────────────────────────────────────
// ChannelFeed
// ────────────────────────────────────────────────────────────────────────────

/// Feed whose batches are pushed through a Tokio `mpsc` channel.
///
/// # Example
///
/// ```rust
/// use holoped_middleware::ChannelFeed;
/// use holoped_types::TelemetryBatch;
///
/// let (tx, feed) = ChannelFeed::new(8);
/// tx.try_send(TelemetryBatch::default()).unwrap();
/// # drop(feed);
/// ```
pub struct ChannelFeed {
    receiver: Mutex<Option<mpsc::Receiver<TelemetryBatch>>>,
}

impl ChannelFeed {
    /// Create a feed and the sender that drives it.
    pub fn new(capacity: usize) -> (mpsc::Sender<TelemetryBatch>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                receiver: Mutex::new(Some(rx)),
            },
        )
    }
}

#[async_trait]
impl TelemetryFeed for ChannelFeed {
    async fn subscribe(&self) -> Result<BoxStream<'static, TelemetryBatch>, HoloError> {
        let receiver = self
            .receiver
            .lock()
            .map_err(|_| HoloError::Feed("channel feed lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| HoloError::Feed("channel feed already subscribed".to_string()))?;

        Ok(stream::unfold(receiver, |mut rx| async move {
            rx.recv().await.map(|batch| (batch, rx))
        })
        .boxed())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ReplayFeed
// ────────────────────────────────────────────────────────────────────────────

/// Feed that replays a recorded session: one JSON-encoded
/// [`TelemetryBatch`] per line.  Blank lines are skipped.
#[derive(Debug, Clone)]
pub struct ReplayFeed {
    path: PathBuf,
    interval: Option<Duration>,
}

impl ReplayFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: None,
        }
    }

    /// Wait `interval` before delivering each batch.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a whole recording.
    ///
    /// # Errors
    ///
    /// Returns [`HoloError::Feed`] naming the first line that is not a valid
    /// batch.
    pub fn parse(raw: &str) -> Result<Vec<TelemetryBatch>, HoloError> {
        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .map_err(|e| HoloError::Feed(format!("line {}: {e}", n + 1)))
            })
            .collect()
    }
}

#[async_trait]
impl TelemetryFeed for ReplayFeed {
    async fn subscribe(&self) -> Result<BoxStream<'static, TelemetryBatch>, HoloError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            HoloError::Feed(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let batches = Self::parse(&raw)?;
        info!(path = %self.path.display(), batches = batches.len(), "replay feed loaded");

        let batches = stream::iter(batches);
        match self.interval {
            None => Ok(batches.boxed()),
            Some(interval) => Ok(batches
                .then(move |batch| async move {
                    tokio::time::sleep(interval).await;
                    debug!("replay feed delivering batch");
                    batch
                })
                .boxed()),
        }
    }
}
