//! [`ReadinessGate`] – the combined "system ready" precondition.
//!
//! Agents may only become visible once three independent events have
//! happened: the telemetry subscription is up, the user has accepted the
//! spatial mapping, and the origin has been placed.  Each event raises one
//! flag.  Flags only ever move from `false` to `true` within a session, so the
//! gate is monotonic and needs no locking beyond the atomics themselves.
//!
//! Readiness is re-evaluated on every [`ReadinessGate::is_ready`] call; it is
//! never cached.
//!
//! # Example
//!
//! ```
//! use holoped_kernel::ReadinessGate;
//!
//! let gate = ReadinessGate::new();
//! gate.set_telemetry_connected();
//! gate.set_mapping_finished();
//! assert!(!gate.is_ready());
//!
//! assert!(gate.set_origin_set());   // first call raises the flag
//! assert!(!gate.set_origin_set());  // second call is a no-op
//! assert!(gate.is_ready());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

pub use holoped_types::ReadinessSnapshot;
use holoped_types::ReadinessSignal;
use tracing::info;

/// Three monotonic flags whose AND is the session's readiness.
///
/// Share it between the telemetry context and the render tick via `Arc`.
#[derive(Debug, Default)]
pub struct ReadinessGate {
    telemetry_connected: AtomicBool,
    mapping_finished: AtomicBool,
    origin_set: AtomicBool,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the telemetry subscription as established.
    ///
    /// Returns `true` only on the call that actually raised the flag.
    pub fn set_telemetry_connected(&self) -> bool {
        Self::raise(&self.telemetry_connected, "telemetry_connected")
    }

    /// Mark spatial mapping as finished.
    ///
    /// Returns `true` only on the call that actually raised the flag.
    pub fn set_mapping_finished(&self) -> bool {
        Self::raise(&self.mapping_finished, "mapping_finished")
    }

    /// Mark the origin as placed.
    ///
    /// Returns `true` only on the call that actually raised the flag.
    pub fn set_origin_set(&self) -> bool {
        Self::raise(&self.origin_set, "origin_set")
    }

    /// Route a [`ReadinessSignal`] to the matching setter.
    pub fn apply(&self, signal: ReadinessSignal) -> bool {
        match signal {
            ReadinessSignal::TelemetryConnected => self.set_telemetry_connected(),
            ReadinessSignal::MappingFinished => self.set_mapping_finished(),
            ReadinessSignal::OriginSet => self.set_origin_set(),
        }
    }

    /// Apply every flag raised in `raised`.  Returns how many were new.
    pub fn merge(&self, raised: &ReadinessSnapshot) -> usize {
        raised.signals().filter(|signal| self.apply(*signal)).count()
    }

    /// `true` when all three preconditions hold.
    pub fn is_ready(&self) -> bool {
        self.telemetry_connected.load(Ordering::Acquire)
            && self.mapping_finished.load(Ordering::Acquire)
            && self.origin_set.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ReadinessSnapshot {
        ReadinessSnapshot {
            telemetry_connected: self.telemetry_connected.load(Ordering::Acquire),
            mapping_finished: self.mapping_finished.load(Ordering::Acquire),
            origin_set: self.origin_set.load(Ordering::Acquire),
        }
    }

    fn raise(flag: &AtomicBool, name: &'static str) -> bool {
        let raised = !flag.swap(true, Ordering::AcqRel);
        if raised {
            info!(flag = name, "readiness precondition satisfied");
        }
        raised
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fresh_gate_is_not_ready() {
        let gate = ReadinessGate::new();
        assert!(!gate.is_ready());
        assert_eq!(gate.snapshot(), ReadinessSnapshot::default());
    }

    #[test]
    fn ready_only_when_all_three_flags_raised() {
        let gate = ReadinessGate::new();
        gate.set_telemetry_connected();
        assert!(!gate.is_ready());
        gate.set_mapping_finished();
        assert!(!gate.is_ready());
        gate.set_origin_set();
        assert!(gate.is_ready());
    }

    #[test]
    fn order_of_signals_does_not_matter() {
        let gate = ReadinessGate::new();
        gate.set_origin_set();
        gate.set_mapping_finished();
        gate.set_telemetry_connected();
        assert!(gate.is_ready());
    }

    #[test]
    fn setting_origin_twice_matches_setting_once() {
        let once = ReadinessGate::new();
        once.set_origin_set();

        let twice = ReadinessGate::new();
        assert!(twice.set_origin_set());
        assert!(!twice.set_origin_set());

        assert_eq!(once.snapshot(), twice.snapshot());
        assert_eq!(once.is_ready(), twice.is_ready());
    }

    #[test]
    fn apply_routes_each_signal() {
        let gate = ReadinessGate::new();
        assert!(gate.apply(ReadinessSignal::MappingFinished));
        assert!(gate.snapshot().mapping_finished);
        assert!(!gate.snapshot().origin_set);
        assert!(gate.apply(ReadinessSignal::OriginSet));
        assert!(gate.apply(ReadinessSignal::TelemetryConnected));
        assert!(!gate.apply(ReadinessSignal::TelemetryConnected));
        assert!(gate.snapshot().is_ready());
    }

    #[test]
    fn merge_applies_only_raised_flags() {
        let gate = ReadinessGate::new();
        gate.set_origin_set();
        let raised = ReadinessSnapshot {
            mapping_finished: true,
            origin_set: true,
            ..ReadinessSnapshot::default()
        };
        assert_eq!(gate.merge(&raised), 1);
        assert!(gate.snapshot().mapping_finished);
        assert!(!gate.snapshot().telemetry_connected);
    }

    #[test]
    fn concurrent_setters_raise_each_flag_exactly_once() {
        let gate = Arc::new(ReadinessGate::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.set_mapping_finished())
            })
            .collect();
        let raised = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|raised| *raised)
            .count();
        assert_eq!(raised, 1);
    }
}
