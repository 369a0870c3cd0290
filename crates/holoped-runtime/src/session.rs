//! [`Session`] – wires the readiness gate, staged store, signal bus and
//! frame synchronizer into one visualization session.
//!
//! The session runs two contexts:
//!
//! 1. **Producer** – a Tokio task spawned by [`Session::attach_feed`].  It
//!    subscribes to the [`TelemetryFeed`], marks telemetry as connected and
//!    ingests every batch in delivery order.
//! 2. **Consumer** – whoever calls [`Session::tick`] once per rendered frame.
//!    A tick drains pending readiness signals into the gate, then runs one
//!    [`FrameSynchronizer`] tick.
//!
//! The only state shared between the two is the [`StagedAgentStore`] and the
//! [`ReadinessGate`] it holds.

use std::sync::Arc;

use futures_util::StreamExt;
use holoped_kernel::{IngestOutcome, ReadinessGate, StagedAgentStore, WorldTransform};
use holoped_middleware::{SignalBus, SignalSubscription, TelemetryFeed};
use holoped_types::{HoloError, ReadinessSignal};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span};

use crate::frame_sync::{FrameSynchronizer, TickReport};
use crate::surface::{OriginProvider, RenderSurface};

/// Source name the producer uses when announcing the telemetry connection.
const FEED_SOURCE: &str = "telemetry-feed";

pub struct Session<S: RenderSurface, O: OriginProvider> {
    gate: Arc<ReadinessGate>,
    store: Arc<StagedAgentStore>,
    bus: SignalBus,
    signals: Option<SignalSubscription>,
    synchronizer: FrameSynchronizer<S, O>,
    producer: Option<JoinHandle<()>>,
}

impl<S: RenderSurface, O: OriginProvider> Session<S, O> {
    /// Create a session around `synchronizer`.
    ///
    /// The session subscribes to `bus` immediately; flags raised before this
    /// call are applied on the first tick.
    pub fn new(synchronizer: FrameSynchronizer<S, O>, bus: SignalBus) -> Self {
        let gate = Arc::new(ReadinessGate::new());
        let store = Arc::new(StagedAgentStore::new(Arc::clone(&gate)));
        let signals = Some(bus.subscribe());
        Self {
            gate,
            store,
            bus,
            signals,
            synchronizer,
            producer: None,
        }
    }

    /// Start ingesting from `feed` on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`HoloError::Feed`] while a previously attached feed is still
    /// running.
    pub fn attach_feed<F>(&mut self, feed: Arc<F>, runtime: &Handle) -> Result<(), HoloError>
    where
        F: TelemetryFeed + 'static,
    {
        if !self.feed_finished() {
            return Err(HoloError::Feed("a telemetry feed is already attached".to_string()));
        }
        let store = Arc::clone(&self.store);
        let bus = self.bus.clone();
        self.producer = Some(
            runtime.spawn(pump(feed, store, bus).instrument(info_span!("telemetry_producer"))),
        );
        Ok(())
    }

    /// Run one render tick.
    ///
    /// # Errors
    ///
    /// Propagates render failures from [`FrameSynchronizer::tick`].
    pub fn tick(&mut self) -> Result<TickReport, HoloError> {
        if let Some(signals) = self.signals.as_mut()
            && let Some(raised) = signals.try_recv()
        {
            let applied = self.gate.merge(&raised);
            if applied > 0 {
                debug!(applied, ready = self.gate.is_ready(), "readiness signals applied");
            }
        }
        self.synchronizer.tick(&self.store)
    }

    /// `true` when no producer is running.
    pub fn feed_finished(&self) -> bool {
        self.producer.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Convert a tracked world transform into backend coordinates.
    pub fn export_pose(&self, world: &WorldTransform) -> WorldTransform {
        self.synchronizer.export_pose(world)
    }

    pub fn gate(&self) -> &Arc<ReadinessGate> {
        &self.gate
    }

    pub fn store(&self) -> &Arc<StagedAgentStore> {
        &self.store
    }

    pub fn synchronizer(&self) -> &FrameSynchronizer<S, O> {
        &self.synchronizer
    }

    /// Stop the producer and detach from the signal bus.  Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        if let Some(signals) = self.signals.take() {
            signals.unsubscribe();
            info!("session shut down");
        }
    }
}

impl<S: RenderSurface, O: OriginProvider> Drop for Session<S, O> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn pump<F>(feed: Arc<F>, store: Arc<StagedAgentStore>, bus: SignalBus)
where
    F: TelemetryFeed + ?Sized,
{
    let mut batches = match feed.subscribe().await {
        Ok(batches) => batches,
        Err(e) => {
            error!(error = %e, "telemetry subscription failed");
            return;
        }
    };

    store.gate().set_telemetry_connected();
    bus.notify(ReadinessSignal::TelemetryConnected, FEED_SOURCE);

    let mut accepted = 0usize;
    while let Some(batch) = batches.next().await {
        // Rejections are logged by the store.
        if let Ok(IngestOutcome::PopulationFixed { .. } | IngestOutcome::Staged { .. }) =
            store.ingest(&batch)
        {
            accepted += 1;
        }
    }
    info!(accepted, "telemetry feed ended");
}
