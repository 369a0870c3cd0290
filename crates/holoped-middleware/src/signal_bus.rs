//! Readiness signal bus.
//!
//! The events that open the readiness gate (mapping accepted, origin placed,
//! telemetry connected) come from collaborators the core does not own.  They
//! publish a [`ReadinessSignal`] on the [`SignalBus`]; the session holds a
//! [`SignalSubscription`] for its whole lifetime and drains it once per tick.
//!
//! The bus carries the accumulated [`ReadinessSnapshot`] over a
//! [`tokio::sync::watch`] channel.  Every `notify` ORs one flag into it, so
//! however many notifications pile up between two reads, a subscriber always
//! sees every flag that was raised.  A new subscription starts with the
//! flags raised so far.  Dropping the subscription (or calling
//! [`SignalSubscription::unsubscribe`]) detaches it.

use std::sync::Arc;

use holoped_types::{ReadinessSignal, ReadinessSnapshot};
use tokio::sync::watch;
use tracing::{debug, info};

/// Shared signal bus. Clone it cheaply – all clones publish into the same
/// snapshot.
#[derive(Clone, Debug)]
pub struct SignalBus {
    sender: Arc<watch::Sender<ReadinessSnapshot>>,
}

impl SignalBus {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ReadinessSnapshot::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish `signal` on behalf of `source`.
    ///
    /// Returns `true` when this call raised the flag, `false` when it was
    /// already raised.  Publishing never fails, with or without subscribers.
    pub fn notify(&self, signal: ReadinessSignal, source: &str) -> bool {
        let raised = self.sender.send_if_modified(|flags| flags.raise(signal));
        if raised {
            info!(?signal, source, "readiness signal published");
        } else {
            debug!(?signal, source, "readiness signal already raised");
        }
        raised
    }

    /// Attach a new subscription.
    pub fn subscribe(&self) -> SignalSubscription {
        SignalSubscription {
            receiver: self.sender.subscribe(),
            primed: false,
        }
    }

    /// Flags raised so far.
    pub fn current(&self) -> ReadinessSnapshot {
        *self.sender.borrow()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to the [`SignalBus`].
pub struct SignalSubscription {
    receiver: watch::Receiver<ReadinessSnapshot>,
    /// Set once the flags present at subscription time were handed out.
    primed: bool,
}

impl SignalSubscription {
    /// Wait until the raised flags change.
    ///
    /// The first call returns immediately with the flags raised before the
    /// subscription existed.  Returns `None` once every [`SignalBus`] clone
    /// has been dropped.
    pub async fn recv(&mut self) -> Option<ReadinessSnapshot> {
        if !self.primed {
            self.primed = true;
            return Some(*self.receiver.borrow_and_update());
        }
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }

    /// Return the raised flags if they changed since the last read, without
    /// waiting.
    pub fn try_recv(&mut self) -> Option<ReadinessSnapshot> {
        let changed = !self.primed || self.receiver.has_changed().unwrap_or(false);
        self.primed = true;
        changed.then(|| *self.receiver.borrow_and_update())
    }

    /// Detach from the bus.
    pub fn unsubscribe(self) {
        drop(self.receiver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_and_receive() -> Result<(), Box<dyn std::error::Error>> {
        let bus = SignalBus::default();
        let mut sub = bus.subscribe();
        assert_eq!(sub.recv().await, Some(ReadinessSnapshot::default()));

        assert!(bus.notify(ReadinessSignal::MappingFinished, "speech"));

        let raised = sub.recv().await.ok_or("no signal received")?;
        assert!(raised.mapping_finished);
        assert!(!raised.origin_set);
        Ok(())
    }

    #[tokio::test]
    async fn every_subscription_sees_every_flag() -> Result<(), Box<dyn std::error::Error>> {
        let bus = SignalBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.notify(ReadinessSignal::OriginSet, "placement");

        assert!(a.recv().await.ok_or("a")?.origin_set);
        assert!(b.recv().await.ok_or("b")?.origin_set);
        Ok(())
    }

    #[test]
    fn notify_without_subscribers_still_records_the_flag() {
        let bus = SignalBus::default();
        assert!(bus.notify(ReadinessSignal::OriginSet, "placement"));
        assert!(!bus.notify(ReadinessSignal::OriginSet, "placement"));
        assert!(bus.current().origin_set);
    }

    #[test]
    fn try_recv_reports_changes_once() {
        let bus = SignalBus::default();
        let mut sub = bus.subscribe();
        assert_eq!(sub.try_recv(), Some(ReadinessSnapshot::default()));
        assert!(sub.try_recv().is_none());

        bus.notify(ReadinessSignal::MappingFinished, "speech");
        bus.notify(ReadinessSignal::OriginSet, "speech");
        let raised = sub.try_recv().unwrap();
        assert!(raised.mapping_finished && raised.origin_set);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn burst_of_repeated_signals_keeps_the_first_one() {
        let bus = SignalBus::default();
        let mut sub = bus.subscribe();
        bus.notify(ReadinessSignal::MappingFinished, "speech");
        for _ in 0..64 {
            bus.notify(ReadinessSignal::OriginSet, "speech");
        }

        let raised = sub.try_recv().unwrap();
        assert!(raised.mapping_finished);
        assert!(raised.origin_set);
    }

    #[test]
    fn late_subscription_sees_earlier_signals() {
        let bus = SignalBus::default();
        bus.notify(ReadinessSignal::MappingFinished, "speech");

        let mut late = bus.subscribe();
        assert!(late.try_recv().unwrap().mapping_finished);
    }

    #[test]
    fn unsubscribe_detaches_listener() {
        let bus = SignalBus::default();
        let sub = bus.subscribe();
        let other = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(other);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
