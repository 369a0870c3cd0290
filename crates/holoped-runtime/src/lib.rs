//! `holoped-runtime` – the render-side half of a visualization session.
//!
//! # Modules
//!
//! - [`frame_sync`] – [`FrameSynchronizer`][frame_sync::FrameSynchronizer]:
//!   takes one lifecycle signal per tick from the staged agent store and
//!   creates or moves rendering handles accordingly.
//! - [`session`] – [`Session`][session::Session]: owns the readiness gate,
//!   the store, the signal subscription and the synchronizer; spawns the
//!   telemetry producer task.
//! - [`surface`] – the [`RenderSurface`][surface::RenderSurface] and
//!   [`OriginProvider`][surface::OriginProvider] seams implemented by the
//!   host application.
//! - [`config`] – [`SessionConfig`][config::SessionConfig]: world scale and
//!   animation tuning.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.

pub mod config;
pub mod frame_sync;
pub mod session;
pub mod surface;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use frame_sync::{FrameSynchronizer, FrameSynchronizerBuilder, TickReport};
pub use session::Session;
pub use surface::{OriginProvider, RenderSurface, SharedOrigin};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};

// Re-exported so hosts can name the store types without depending on
// holoped-kernel directly.
pub use holoped_kernel::{
    AgentFrame, LifecycleSignal, OriginFrame, StagedAgentStore, WorldTransform,
};
