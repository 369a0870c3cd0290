//! Headless replay – drives a full session from a recorded telemetry file.
//!
//! There is no headset here: the [`LoggingSurface`] stands in for the
//! renderer and the CLI announces mapping and origin placement itself, the
//! way the speech and placement flows would on the device.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use holoped_middleware::{ReplayFeed, SignalBus};
use holoped_runtime::{
    FrameSynchronizer, RenderSurface, Session, SharedOrigin, WorldTransform,
};
use holoped_types::{AgentId, AgentRecord, HoloError, ReadinessSignal, Vec3};
use tracing::{debug, info};

use crate::config::Config;

/// Source name for the readiness signals raised by the CLI.
const CLI_SOURCE: &str = "holoped-cli";

// ─────────────────────────────────────────────────────────────────────────────
// LoggingSurface
// ─────────────────────────────────────────────────────────────────────────────

/// What the logging surface remembers about one agent.
#[derive(Debug, Clone)]
pub struct LoggedAgent {
    pub id: AgentId,
    pub position: Vec3,
}

/// Render surface that writes every call to the log.
#[derive(Debug, Default)]
pub struct LoggingSurface;

impl RenderSurface for LoggingSurface {
    type Handle = LoggedAgent;

    fn spawn(&mut self, agent: &AgentRecord) -> Result<LoggedAgent, HoloError> {
        info!(agent = %agent.id, radius = agent.radius, kind = ?agent.agent_type, "agent spawned");
        Ok(LoggedAgent {
            id: agent.id,
            position: Vec3::zero(),
        })
    }

    fn set_scale(&mut self, handle: &mut LoggedAgent, scale: f32) {
        debug!(agent = %handle.id, scale, "scale set");
    }

    fn set_transform(&mut self, handle: &mut LoggedAgent, transform: &WorldTransform) {
        handle.position = transform.position;
        debug!(
            agent = %handle.id,
            x = transform.position.x,
            y = transform.position.y,
            z = transform.position.z,
            "agent moved"
        );
    }

    fn set_animation_rate(&mut self, handle: &mut LoggedAgent, rate: f32) {
        debug!(agent = %handle.id, rate, "animation rate set");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Replay
// ─────────────────────────────────────────────────────────────────────────────

/// Totals reported at the end of a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    pub ticks: u64,
    pub agents: usize,
    pub created: usize,
    pub updates: usize,
    pub last_sequence: u64,
}

/// Replay `path` through a fresh session until the recording ends or
/// `shutdown` is raised.
pub fn run_replay(
    cfg: &Config,
    path: &Path,
    shutdown: Arc<AtomicBool>,
) -> Result<ReplaySummary, HoloError> {
    if !path.is_file() {
        return Err(HoloError::Feed(format!("no recording at {}", path.display())));
    }
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| HoloError::Feed(format!("failed to start async runtime: {e}")))?;

    let bus = SignalBus::default();
    let synchronizer = FrameSynchronizer::builder()
        .surface(LoggingSurface::default())
        .origin(SharedOrigin::default())
        .config(cfg.session.clone())
        .build()?;
    let mut session = Session::new(synchronizer, bus.clone());

    bus.notify(ReadinessSignal::MappingFinished, CLI_SOURCE);
    bus.notify(ReadinessSignal::OriginSet, CLI_SOURCE);
    // Apply both signals before any telemetry can arrive.
    session.tick()?;

    let feed = ReplayFeed::new(path).with_interval(cfg.replay_interval());
    info!(path = %feed.path().display(), tick_hz = cfg.tick_hz, "replay started");
    session.attach_feed(Arc::new(feed), runtime.handle())?;

    let mut summary = ReplaySummary::default();
    let tick_interval = cfg.tick_interval();
    loop {
        let started = Instant::now();
        // Sample before ticking so the batch that finished the feed is
        // still rendered.
        let finished = session.feed_finished();
        let report = session.tick()?;
        summary.ticks += 1;
        summary.created += report.created;
        summary.updates += report.updated;

        if finished || shutdown.load(Ordering::SeqCst) {
            break;
        }
        if let Some(rest) = tick_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    session.shutdown();
    summary.agents = session.store().len();
    summary.last_sequence = session.store().snapshot().sequence;
    info!(?summary, "replay finished");
    Ok(summary)
}
