//! `holoped-kernel` – Telemetry Staging & Readiness
//!
//! The synchronization core between the asynchronous telemetry feed and the
//! single-threaded render tick.  It does not render anything; it decides what
//! the render tick is allowed to see and when.
//!
//! # Modules
//!
//! - [`readiness_gate`] – [`ReadinessGate`][readiness_gate::ReadinessGate]:
//!   three monotonic preconditions (telemetry connected, mapping finished,
//!   origin set) combined by logical AND.
//! - [`agent_store`] – [`StagedAgentStore`][agent_store::StagedAgentStore]:
//!   the producer/consumer handoff.  The telemetry context ingests batches,
//!   the render tick takes at most one [`LifecycleSignal`][agent_store::LifecycleSignal]
//!   per frame, each carrying an immutable snapshot of the latest fully
//!   applied batch.
//! - [`coordinate`] – [`OriginFrame`][coordinate::OriginFrame]: remaps backend
//!   poses into the headset's world frame (and back) around a user-placed
//!   origin.

pub mod agent_store;
pub mod coordinate;
pub mod readiness_gate;

pub use agent_store::{AgentFrame, IngestOutcome, LifecycleSignal, LifecycleState, StagedAgentStore};
pub use coordinate::{DEFAULT_SCALE, OriginFrame, WorldTransform};
pub use readiness_gate::{ReadinessGate, ReadinessSnapshot};
