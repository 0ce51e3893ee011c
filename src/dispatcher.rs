//! The notification dispatcher ties the throttle ledger, the message
//! formatter and the transport together behind a single `notify` entry point.
//!
//! The one correctness property that matters here: an emission is recorded
//! in the ledger only after the transport confirms the send. Recording
//! before sending would let a burst of failing sends exhaust the throttle
//! window without the subject ever seeing a message.

use crate::core::{
    Clock, DeliveryObserver, IssueKind, MetricMap, NotifyOutcome, SystemClock, TracingObserver,
    Transport,
};
use crate::formatting::build_notification;
use crate::throttle::ThrottleLedger;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Receives raw issue reports and emits at most one user-facing notification
/// per (subject, issue) slot per throttle window.
pub struct NotificationDispatcher {
    ledger: ThrottleLedger,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn DeliveryObserver>,
    clock: Arc<dyn Clock>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher with the given ledger and transport, logging
    /// delivery failures through `tracing` and reading the system clock.
    pub fn new(ledger: ThrottleLedger, transport: Arc<dyn Transport>) -> Self {
        Self {
            ledger,
            transport,
            observer: Arc::new(TracingObserver),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the delivery-failure observer.
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the clock. Tests use this to drive the throttle window
    /// deterministically.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Handles one detected issue: admits or suppresses it, and on admission
    /// formats and delivers a notification.
    ///
    /// Never returns an error. Throttling and transport failure both come
    /// back as a non-delivered [`NotifyOutcome`] with a reason, so upstream
    /// audio processing is never blocked by notification trouble.
    ///
    /// The ledger lock is only touched in `is_allowed` and
    /// `record_emission`; it is never held across the transport send.
    pub async fn notify(
        &self,
        subject: &str,
        issue: IssueKind,
        metrics: &MetricMap,
    ) -> NotifyOutcome {
        let now = self.clock.now();

        if !self.ledger.is_allowed(subject, issue, now) {
            debug!(subject = %subject, issue = %issue, "Notification suppressed by throttle");
            metrics::counter!("notifications_throttled_total").increment(1);
            return NotifyOutcome::throttled();
        }

        let notification = build_notification(issue, metrics, now);
        let payload = match serde_json::to_string(&notification) {
            Ok(payload) => payload,
            Err(e) => {
                // Should be unreachable for this message shape; treated as a
                // failed delivery rather than a panic.
                error!(subject = %subject, issue = %issue, error = %e,
                    "Failed to serialize notification");
                metrics::counter!("notifications_failed_total").increment(1);
                return NotifyOutcome::transport_error();
            }
        };

        match self.transport.send(subject, &payload).await {
            Ok(()) => {
                self.ledger.record_emission(subject, issue, now);
                info!(subject = %subject, issue = %issue, "Quality notification delivered");
                metrics::counter!("notifications_sent_total").increment(1);
                NotifyOutcome::delivered()
            }
            Err(e) => {
                // The throttle slot is deliberately not consumed: the next
                // attempt for this slot must still be admitted.
                self.observer.on_delivery_failure(subject, issue, &e);
                metrics::counter!("notifications_failed_total").increment(1);
                NotifyOutcome::transport_error()
            }
        }
    }

    /// Drops all throttle state for a subject. Hosts call this on subject
    /// disconnect; it is the only thing bounding ledger growth.
    pub fn clear(&self, subject: &str) {
        debug!(subject = %subject, "Clearing throttle state for subject");
        self.ledger.clear(subject);
    }

    /// Drops all throttle state for every subject.
    pub fn clear_all(&self) {
        debug!("Clearing all throttle state");
        self.ledger.clear_all();
    }

    /// Number of live throttle slots, exposed for host diagnostics.
    pub fn throttle_slots(&self) -> usize {
        self.ledger.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    // A fake transport that records sends and can be told to fail.
    #[derive(Debug)]
    struct FakeTransport {
        sent: Mutex<Vec<(String, String)>>,
        fail: std::sync::atomic::AtomicBool,
    }

    impl FakeTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: std::sync::atomic::AtomicBool::new(false),
            })
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, subject: &str, payload: &str) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("simulated transport outage");
            }
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), payload.to_string()));
            Ok(())
        }
    }

    // A clock the test moves by hand.
    struct ManualClock(Mutex<f64>);

    impl ManualClock {
        fn new(start: f64) -> Arc<Self> {
            Arc::new(Self(Mutex::new(start)))
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> f64 {
            *self.0.lock().unwrap()
        }
    }

    struct CountingObserver(AtomicUsize);

    impl DeliveryObserver for CountingObserver {
        fn on_delivery_failure(&self, _: &str, _: IssueKind, _: &anyhow::Error) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn dispatcher_with(
        transport: Arc<FakeTransport>,
        clock: Arc<ManualClock>,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(ThrottleLedger::new(Duration::from_secs(60)), transport)
            .with_clock(clock)
    }

    #[tokio::test]
    async fn test_second_call_within_window_is_throttled() {
        let transport = FakeTransport::new();
        let clock = ManualClock::new(1000.0);
        let dispatcher = dispatcher_with(transport.clone(), clock.clone());
        let metrics = MetricMap::new();

        let first = dispatcher.notify("conn-1", IssueKind::SnrLow, &metrics).await;
        let second = dispatcher.notify("conn-1", IssueKind::SnrLow, &metrics).await;

        assert_eq!(first, NotifyOutcome::delivered());
        assert_eq!(second, NotifyOutcome::throttled());
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_does_not_consume_slot() {
        let transport = FakeTransport::new();
        let clock = ManualClock::new(1000.0);
        let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
        let dispatcher =
            dispatcher_with(transport.clone(), clock.clone()).with_observer(observer.clone());
        let metrics = MetricMap::new();

        transport.set_failing(true);
        let failed = dispatcher.notify("conn-1", IssueKind::Echo, &metrics).await;
        assert_eq!(failed, NotifyOutcome::transport_error());
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);

        // An immediate retry for the same slot is still admitted.
        transport.set_failing(false);
        let retried = dispatcher.notify("conn-1", IssueKind::Echo, &metrics).await;
        assert_eq!(retried, NotifyOutcome::delivered());
    }

    #[tokio::test]
    async fn test_payload_is_canonical_json() {
        let transport = FakeTransport::new();
        let clock = ManualClock::new(1000.0);
        let dispatcher = dispatcher_with(transport.clone(), clock.clone());

        let mut metrics = MetricMap::new();
        metrics.insert("snr".to_string(), serde_json::json!(15.2));
        metrics.insert("threshold".to_string(), serde_json::json!(20.0));

        dispatcher.notify("conn-1", IssueKind::SnrLow, &metrics).await;

        let sent = transport.sent();
        let (subject, payload) = &sent[0];
        assert_eq!(subject, "conn-1");
        let parsed: crate::core::QualityNotification = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.message_type, "audio_quality_warning");
        assert_eq!(parsed.issue, "snr_low");
        assert_eq!(parsed.timestamp, 1000.0);
        assert!(parsed.message.contains("15.2"));
    }

    #[tokio::test]
    async fn test_clear_reopens_subject_slots() {
        let transport = FakeTransport::new();
        let clock = ManualClock::new(1000.0);
        let dispatcher = dispatcher_with(transport.clone(), clock.clone());
        let metrics = MetricMap::new();

        dispatcher.notify("conn-1", IssueKind::Silence, &metrics).await;
        assert_eq!(dispatcher.throttle_slots(), 1);

        dispatcher.clear("conn-1");
        assert_eq!(dispatcher.throttle_slots(), 0);

        let again = dispatcher.notify("conn-1", IssueKind::Silence, &metrics).await;
        assert_eq!(again, NotifyOutcome::delivered());
    }
}
