//! [`StagedAgentStore`] – producer/consumer handoff for agent telemetry.
//!
//! The telemetry context calls [`StagedAgentStore::ingest`] whenever a batch
//! arrives; the render tick calls [`StagedAgentStore::take_lifecycle_signal`]
//! once per frame.  All shared state lives behind a single lock, and the
//! consumer never reads records in place: every signal carries an
//! [`AgentFrame`] copied under that lock, so a frame always reflects exactly
//! one fully applied batch.
//!
//! # Lifecycle
//!
//! ```text
//! NotReady ──(first update batch)──▶ Initial ──(CreateNeeded taken)──▶ Waiting
//!                                                                       │  ▲
//!                                                        (update batch) ▼  │ (UpdateNeeded taken)
//!                                                                      Ready
//! ```
//!
//! The first batch accepted while the [`ReadinessGate`] is open only fixes
//! the population (ids and radii).  The next one supplies poses and moves the
//! store to `Initial`.  Several batches landing between two polls coalesce
//! into a single signal carrying the latest data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use holoped_types::{AgentId, AgentRecord, HoloError, TelemetryBatch};
use tracing::{debug, info, warn};

use crate::readiness_gate::ReadinessGate;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Session-wide lifecycle of the staged agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No pose data has been ingested yet.
    NotReady,
    /// Pose data is available; agents have not been created.
    Initial,
    /// New pose data is waiting to be applied to existing agents.
    Ready,
    /// The render tick has consumed everything ingested so far.
    Waiting,
}

/// Immutable copy of every agent as of one ingested batch.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentFrame {
    /// Number of batches the store had accepted when the frame was taken.
    pub sequence: u64,
    pub agents: Vec<AgentRecord>,
}

/// What the render tick should do this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleSignal {
    /// Nothing to do.
    Idle,
    /// Create a rendering handle for every agent in the frame.  Issued once
    /// per session.
    CreateNeeded(AgentFrame),
    /// Apply the frame's poses to the existing handles.
    UpdateNeeded(AgentFrame),
}

/// Result of a successful [`StagedAgentStore::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The readiness gate was closed; the batch was dropped untouched.
    Gated,
    /// The batch fixed the agent population.
    PopulationFixed { agents: usize },
    /// The batch's poses were staged for the render tick.
    Staged { sequence: u64 },
}

// ────────────────────────────────────────────────────────────────────────────
// Internal state
// ────────────────────────────────────────────────────────────────────────────

struct StoreInner {
    records: Vec<AgentRecord>,
    index: HashMap<AgentId, usize>,
    population_fixed: bool,
    state: LifecycleState,
    sequence: u64,
}

impl StoreInner {
    fn frame(&self) -> AgentFrame {
        AgentFrame {
            sequence: self.sequence,
            agents: self.records.clone(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// StagedAgentStore
// ────────────────────────────────────────────────────────────────────────────

/// Agent collection written by a single telemetry producer and read by a
/// single render-tick consumer.
pub struct StagedAgentStore {
    gate: Arc<ReadinessGate>,
    inner: Mutex<StoreInner>,
}

impl StagedAgentStore {
    /// Create an empty store whose ingestion is gated by `gate`.
    pub fn new(gate: Arc<ReadinessGate>) -> Self {
        Self {
            gate,
            inner: Mutex::new(StoreInner {
                records: Vec::new(),
                index: HashMap::new(),
                population_fixed: false,
                state: LifecycleState::NotReady,
                sequence: 0,
            }),
        }
    }

    /// Ingest one telemetry batch.  Called from the telemetry context only.
    ///
    /// While the readiness gate is closed the batch is dropped.  The first
    /// batch accepted afterwards registers one record per id; every later
    /// batch overwrites pose, velocity and goal position of the known agents.
    /// Preferred speed is never refreshed from telemetry.
    ///
    /// # Errors
    ///
    /// - [`HoloError::MalformedBatch`] – the parallel arrays disagree in
    ///   length or an id repeats.
    /// - [`HoloError::PopulationMismatch`] – the batch size differs from the
    ///   fixed population.
    /// - [`HoloError::UnknownAgent`] – the batch names an id outside the
    ///   fixed population.
    ///
    /// A rejected batch leaves the store unchanged.
    pub fn ingest(&self, batch: &TelemetryBatch) -> Result<IngestOutcome, HoloError> {
        if !self.gate.is_ready() {
            debug!(agents = batch.len(), "readiness gate closed; telemetry batch dropped");
            return Ok(IngestOutcome::Gated);
        }
        batch.validate()?;

        let mut inner = self.lock();

        if !inner.population_fixed {
            for (slot, (&id, &radius)) in batch.ids.iter().zip(&batch.radii).enumerate() {
                inner.records.push(AgentRecord::registered(id, radius));
                inner.index.insert(id, slot);
            }
            inner.population_fixed = true;
            inner.sequence += 1;
            info!(agents = inner.records.len(), "agent population fixed");
            return Ok(IngestOutcome::PopulationFixed {
                agents: inner.records.len(),
            });
        }

        if batch.len() != inner.records.len() {
            let err = HoloError::PopulationMismatch {
                expected: inner.records.len(),
                actual: batch.len(),
            };
            warn!(error = %err, "telemetry batch rejected");
            return Err(err);
        }

        // Resolve every slot before touching a record so a rejection cannot
        // leave a partially applied batch behind.
        let mut slots = Vec::with_capacity(batch.len());
        for id in &batch.ids {
            match inner.index.get(id) {
                Some(&slot) => slots.push(slot),
                None => {
                    warn!(agent = %id, "telemetry batch rejected: unknown agent");
                    return Err(HoloError::UnknownAgent(*id));
                }
            }
        }

        for (i, slot) in slots.into_iter().enumerate() {
            let record = &mut inner.records[slot];
            record.pose = batch.poses[i];
            record.velocity = batch.velocities[i];
            record.goal_position = batch.goal_positions[i];
        }
        inner.sequence += 1;

        inner.state = match inner.state {
            LifecycleState::NotReady => LifecycleState::Initial,
            LifecycleState::Waiting => LifecycleState::Ready,
            unchanged => unchanged,
        };

        debug!(sequence = inner.sequence, state = ?inner.state, "telemetry batch staged");
        Ok(IngestOutcome::Staged {
            sequence: inner.sequence,
        })
    }

    /// Take this frame's [`LifecycleSignal`].  Called from the render tick
    /// only.
    ///
    /// Returns [`LifecycleSignal::Idle`] before any pose data exists, while
    /// the gate is closed, and whenever nothing new arrived since the last
    /// call.
    pub fn take_lifecycle_signal(&self) -> LifecycleSignal {
        let mut inner = self.lock();
        if !self.gate.is_ready() {
            return LifecycleSignal::Idle;
        }
        match inner.state {
            LifecycleState::Initial => {
                inner.state = LifecycleState::Waiting;
                LifecycleSignal::CreateNeeded(inner.frame())
            }
            LifecycleState::Ready => {
                inner.state = LifecycleState::Waiting;
                LifecycleSignal::UpdateNeeded(inner.frame())
            }
            LifecycleState::NotReady | LifecycleState::Waiting => LifecycleSignal::Idle,
        }
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Copy of the current records, without consuming any signal.
    pub fn snapshot(&self) -> AgentFrame {
        self.lock().frame()
    }

    /// Size of the fixed population (0 until it is fixed).
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn gate(&self) -> &Arc<ReadinessGate> {
        &self.gate
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Every mutation is validated before it starts, so state behind a
        // poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holoped_types::{Pose2D, Vec3};
    use std::thread;

    fn ready_gate() -> Arc<ReadinessGate> {
        let gate = Arc::new(ReadinessGate::new());
        gate.set_telemetry_connected();
        gate.set_mapping_finished();
        gate.set_origin_set();
        gate
    }

    /// A batch where every agent's pose x, velocity x and goal x equal `tag`.
    fn tagged_batch(ids: &[i32], tag: f32) -> TelemetryBatch {
        TelemetryBatch {
            ids: ids.iter().copied().map(AgentId).collect(),
            radii: vec![0.3; ids.len()],
            poses: vec![Pose2D::new(Vec3::new(tag, 0.0, 0.0), 0.0); ids.len()],
            velocities: vec![Vec3::new(tag, 0.0, 0.0); ids.len()],
            goal_positions: vec![Vec3::new(tag, 0.0, 0.0); ids.len()],
        }
    }

    fn ids_of(frame: &AgentFrame) -> Vec<AgentId> {
        frame.agents.iter().map(|a| a.id).collect()
    }

    #[test]
    fn query_before_any_ingest_is_idle() {
        let store = StagedAgentStore::new(ready_gate());
        assert_eq!(store.take_lifecycle_signal(), LifecycleSignal::Idle);
        assert_eq!(store.lifecycle_state(), LifecycleState::NotReady);
        assert!(store.is_empty());
    }

    #[test]
    fn batches_are_dropped_while_gate_closed() {
        let gate = Arc::new(ReadinessGate::new());
        gate.set_telemetry_connected();
        let store = StagedAgentStore::new(Arc::clone(&gate));

        assert_eq!(store.ingest(&tagged_batch(&[1, 2], 1.0)), Ok(IngestOutcome::Gated));
        assert!(store.is_empty());

        gate.set_mapping_finished();
        gate.set_origin_set();
        assert_eq!(
            store.ingest(&tagged_batch(&[1, 2], 2.0)),
            Ok(IngestOutcome::PopulationFixed { agents: 2 })
        );
    }

    #[test]
    fn first_batch_registers_ids_and_radii_only() {
        let store = StagedAgentStore::new(ready_gate());
        let mut batch = tagged_batch(&[10, 11], 9.0);
        batch.radii = vec![0.2, 0.4];
        store.ingest(&batch).unwrap();

        let frame = store.snapshot();
        assert_eq!(ids_of(&frame), vec![AgentId(10), AgentId(11)]);
        assert!((frame.agents[1].radius - 0.4).abs() < f32::EPSILON);
        assert_eq!(frame.agents[0].pose, Pose2D::default());
        // Population fixing alone never asks for creation.
        assert_eq!(store.take_lifecycle_signal(), LifecycleSignal::Idle);
    }

    #[test]
    fn create_needed_exactly_once_after_first_update_batch() {
        let store = StagedAgentStore::new(ready_gate());
        store.ingest(&tagged_batch(&[1, 2, 3], 0.0)).unwrap();
        store.ingest(&tagged_batch(&[1, 2, 3], 1.0)).unwrap();

        let LifecycleSignal::CreateNeeded(frame) = store.take_lifecycle_signal() else {
            panic!("expected CreateNeeded");
        };
        assert_eq!(frame.agents.len(), 3);
        assert!((frame.agents[0].pose.position.x - 1.0).abs() < f32::EPSILON);

        assert_eq!(store.take_lifecycle_signal(), LifecycleSignal::Idle);

        let mut creates = 0;
        for tag in 2..10 {
            store.ingest(&tagged_batch(&[1, 2, 3], tag as f32)).unwrap();
            match store.take_lifecycle_signal() {
                LifecycleSignal::CreateNeeded(_) => creates += 1,
                LifecycleSignal::UpdateNeeded(frame) => {
                    assert!((frame.agents[2].pose.position.x - tag as f32).abs() < f32::EPSILON);
                }
                LifecycleSignal::Idle => panic!("expected a signal after a new batch"),
            }
        }
        assert_eq!(creates, 0);
    }

    #[test]
    fn batches_between_polls_coalesce_to_latest() {
        let store = StagedAgentStore::new(ready_gate());
        store.ingest(&tagged_batch(&[1], 0.0)).unwrap();
        store.ingest(&tagged_batch(&[1], 1.0)).unwrap();
        store.ingest(&tagged_batch(&[1], 2.0)).unwrap();

        let LifecycleSignal::CreateNeeded(frame) = store.take_lifecycle_signal() else {
            panic!("expected CreateNeeded");
        };
        assert!((frame.agents[0].pose.position.x - 2.0).abs() < f32::EPSILON);
        assert_eq!(frame.sequence, 3);

        store.ingest(&tagged_batch(&[1], 3.0)).unwrap();
        store.ingest(&tagged_batch(&[1], 4.0)).unwrap();
        let LifecycleSignal::UpdateNeeded(frame) = store.take_lifecycle_signal() else {
            panic!("expected UpdateNeeded");
        };
        assert!((frame.agents[0].pose.position.x - 4.0).abs() < f32::EPSILON);
        assert_eq!(store.take_lifecycle_signal(), LifecycleSignal::Idle);
    }

    #[test]
    fn lifecycle_walks_the_documented_states() {
        let store = StagedAgentStore::new(ready_gate());
        store.ingest(&tagged_batch(&[1], 0.0)).unwrap();
        assert_eq!(store.lifecycle_state(), LifecycleState::NotReady);
        store.ingest(&tagged_batch(&[1], 1.0)).unwrap();
        assert_eq!(store.lifecycle_state(), LifecycleState::Initial);
        store.take_lifecycle_signal();
        assert_eq!(store.lifecycle_state(), LifecycleState::Waiting);
        store.ingest(&tagged_batch(&[1], 2.0)).unwrap();
        assert_eq!(store.lifecycle_state(), LifecycleState::Ready);
        store.take_lifecycle_signal();
        assert_eq!(store.lifecycle_state(), LifecycleState::Waiting);
    }

    #[test]
    fn population_mismatch_leaves_store_unchanged() {
        let store = StagedAgentStore::new(ready_gate());
        store.ingest(&tagged_batch(&[1, 2], 0.0)).unwrap();
        store.ingest(&tagged_batch(&[1, 2], 1.0)).unwrap();
        let before = store.snapshot();
        let state_before = store.lifecycle_state();

        let err = store.ingest(&tagged_batch(&[1, 2, 3], 5.0)).unwrap_err();
        assert_eq!(
            err,
            HoloError::PopulationMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.lifecycle_state(), state_before);
    }

    #[test]
    fn unknown_id_is_rejected_without_partial_apply() {
        let store = StagedAgentStore::new(ready_gate());
        store.ingest(&tagged_batch(&[1, 2], 0.0)).unwrap();
        store.ingest(&tagged_batch(&[1, 2], 1.0)).unwrap();
        let before = store.snapshot();

        let err = store.ingest(&tagged_batch(&[1, 99], 7.0)).unwrap_err();
        assert_eq!(err, HoloError::UnknownAgent(AgentId(99)));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn malformed_batch_is_rejected() {
        let store = StagedAgentStore::new(ready_gate());
        let mut batch = tagged_batch(&[1, 2], 0.0);
        batch.poses.pop();
        assert!(matches!(store.ingest(&batch), Err(HoloError::MalformedBatch(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn updates_match_records_by_id_not_position() {
        let store = StagedAgentStore::new(ready_gate());
        store.ingest(&tagged_batch(&[1, 2], 0.0)).unwrap();

        let mut reordered = tagged_batch(&[2, 1], 0.0);
        reordered.poses[0].position.x = 20.0;
        reordered.poses[1].position.x = 10.0;
        store.ingest(&reordered).unwrap();

        let frame = store.snapshot();
        assert_eq!(ids_of(&frame), vec![AgentId(1), AgentId(2)]);
        assert!((frame.agents[0].pose.position.x - 10.0).abs() < f32::EPSILON);
        assert!((frame.agents[1].pose.position.x - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn id_set_never_changes_after_first_batch() {
        let store = StagedAgentStore::new(ready_gate());
        store.ingest(&tagged_batch(&[5, 6, 7], 0.0)).unwrap();
        let fixed = ids_of(&store.snapshot());

        let attempts = [
            tagged_batch(&[5, 6, 7], 1.0),
            tagged_batch(&[5, 6], 2.0),
            tagged_batch(&[5, 6, 7, 8], 3.0),
            tagged_batch(&[5, 6, 9], 4.0),
            tagged_batch(&[7, 6, 5], 5.0),
        ];
        for batch in &attempts {
            let _ = store.ingest(batch);
            assert_eq!(ids_of(&store.snapshot()), fixed);
        }
    }

    #[test]
    fn preferred_speed_is_not_refreshed_by_updates() {
        let store = StagedAgentStore::new(ready_gate());
        store.ingest(&tagged_batch(&[1], 0.0)).unwrap();
        store.ingest(&tagged_batch(&[1], 3.0)).unwrap();
        let frame = store.snapshot();
        assert_eq!(frame.agents[0].pref_speed, 0.0);
        assert!((frame.agents[0].speed() - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn consumer_never_observes_a_torn_batch() {
        const BATCHES: usize = 2_000;
        let ids: Vec<i32> = (0..16).collect();
        let store = Arc::new(StagedAgentStore::new(ready_gate()));
        store.ingest(&tagged_batch(&ids, 0.0)).unwrap();

        let producer = {
            let store = Arc::clone(&store);
            let ids = ids.clone();
            thread::spawn(move || {
                for tag in 1..=BATCHES {
                    store.ingest(&tagged_batch(&ids, tag as f32)).unwrap();
                }
            })
        };

        let mut last_seen = 0.0_f32;
        let mut signals = 0;
        loop {
            let finished = producer.is_finished();
            let frame = match store.take_lifecycle_signal() {
                LifecycleSignal::CreateNeeded(frame) | LifecycleSignal::UpdateNeeded(frame) => frame,
                LifecycleSignal::Idle if finished => break,
                LifecycleSignal::Idle => continue,
            };
            signals += 1;
            let tag = frame.agents[0].pose.position.x;
            for agent in &frame.agents {
                assert_eq!(agent.pose.position.x, tag, "pose from a different batch");
                assert_eq!(agent.velocity.x, tag, "velocity from a different batch");
                assert_eq!(agent.goal_position.x, tag, "goal from a different batch");
            }
            assert!(tag >= last_seen, "batches observed out of delivery order");
            last_seen = tag;
        }
        producer.join().unwrap();

        assert!(signals >= 1);
        assert_eq!(last_seen, BATCHES as f32);
    }
}
