//! `holoped-middleware` – Signal & Telemetry Plumbing
//!
//! Routes asynchronous notifications into the synchronization core without
//! caring what produced them (speech commands, a placement gesture, a
//! rosbridge subscription, a replay file).
//!
//! # Modules
//!
//! - [`signal_bus`] – one-shot readiness notifications accumulated in a Tokio
//!   watch channel, with subscriptions that unsubscribe when dropped.
//! - [`feed`] – the [`TelemetryFeed`] seam plus two in-process
//!   implementations: [`ChannelFeed`] and [`ReplayFeed`].

pub mod feed;
pub mod signal_bus;

pub use feed::{ChannelFeed, ReplayFeed, TelemetryFeed};
pub use signal_bus::{SignalBus, SignalSubscription};
