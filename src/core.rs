//! Core domain types and service traits for AudioWatch
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The fixed discriminator identifying quality notifications to downstream
/// consumers.
pub const NOTIFICATION_TYPE: &str = "audio_quality_warning";

/// The category of detected audio-quality degradation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Signal-to-noise ratio below the acceptable floor.
    SnrLow,
    /// Input signal clipping above the acceptable percentage.
    Clipping,
    /// Acoustic echo level above threshold.
    Echo,
    /// No audio observed for a sustained period.
    Silence,
}

impl IssueKind {
    /// The wire name of the issue, as embedded in outgoing messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::SnrLow => "snr_low",
            IssueKind::Clipping => "clipping",
            IssueKind::Echo => "echo",
            IssueKind::Silence => "silence",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw metric values attached to an issue report. Recognized keys depend on
/// the issue kind (e.g. `snr` and `threshold` for [`IssueKind::SnrLow`]).
pub type MetricMap = Map<String, Value>;

/// An inbound report from the audio analysis layer: one detected issue on
/// one subject, with the metrics that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueReport {
    /// Opaque stable identifier of the connection/session.
    pub subject: String,
    /// The detected issue category.
    pub issue: IssueKind,
    /// Metric values supporting the detection.
    #[serde(default)]
    pub metrics: MetricMap,
}

/// A user-facing quality notification, constructed once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityNotification {
    /// Fixed message-class discriminator, see [`NOTIFICATION_TYPE`].
    #[serde(rename = "type")]
    pub message_type: String,
    /// The issue kind as a string.
    pub issue: String,
    /// Human-readable description plus remediation guidance.
    pub message: String,
    /// Raw metric values used to build the message, plus the violated
    /// threshold, for clients that render additional UI.
    pub details: Map<String, Value>,
    /// Time of message construction, seconds since epoch with sub-second
    /// precision.
    pub timestamp: f64,
}

/// Why a `notify` call did not deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// A notification for this (subject, issue) was delivered within the
    /// current throttle window.
    Throttled,
    /// The transport reported or raised a delivery failure.
    TransportError,
}

/// Result of a single `notify` call. Throttling and delivery failure are
/// normal outcomes, not errors; callers inspect the reason if they care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyOutcome {
    /// Whether the notification was handed to the transport and confirmed.
    pub delivered: bool,
    /// Set only when `delivered` is false.
    pub reason: Option<SuppressReason>,
}

impl NotifyOutcome {
    pub fn delivered() -> Self {
        Self {
            delivered: true,
            reason: None,
        }
    }

    pub fn throttled() -> Self {
        Self {
            delivered: false,
            reason: Some(SuppressReason::Throttled),
        }
    }

    pub fn transport_error() -> Self {
        Self {
            delivered: false,
            reason: Some(SuppressReason::TransportError),
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Delivers a serialized notification to a specific subject over whatever
/// real-time channel the host provides.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Pushes a serialized message to the given subject.
    ///
    /// # Returns
    /// * `Ok(())` once the transport has accepted the message
    /// * `Err` for any delivery failure; the dispatcher converts this to a
    ///   non-delivered outcome and never propagates it
    async fn send(&self, subject: &str, payload: &str) -> anyhow::Result<()>;
}

/// Side-channel observer for delivery failures. The dispatcher reports every
/// failed send here instead of raising.
pub trait DeliveryObserver: Send + Sync {
    fn on_delivery_failure(&self, subject: &str, issue: IssueKind, error: &anyhow::Error);
}

/// Default observer that logs delivery failures through `tracing`.
pub struct TracingObserver;

impl DeliveryObserver for TracingObserver {
    fn on_delivery_failure(&self, subject: &str, issue: IssueKind, error: &anyhow::Error) {
        tracing::error!(
            subject = %subject,
            issue = %issue,
            error = %error,
            "Failed to deliver quality notification"
        );
    }
}

/// Source of "now" for throttling decisions and message timestamps, seconds
/// since epoch. Injected so tests can drive time deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall-clock time via `chrono`, with microsecond precision.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_kind_serializes_to_snake_case() {
        let json = serde_json::to_string(&IssueKind::SnrLow).unwrap();
        assert_eq!(json, "\"snr_low\"");
        let back: IssueKind = serde_json::from_str("\"clipping\"").unwrap();
        assert_eq!(back, IssueKind::Clipping);
    }

    #[test]
    fn test_issue_report_metrics_default_to_empty() {
        let report: IssueReport =
            serde_json::from_str(r#"{"subject": "conn-1", "issue": "silence"}"#).unwrap();
        assert_eq!(report.subject, "conn-1");
        assert_eq!(report.issue, IssueKind::Silence);
        assert!(report.metrics.is_empty());
    }

    #[test]
    fn test_system_clock_returns_epoch_seconds() {
        let clock = SystemClock;
        // Any plausible wall clock is well past 2023 in epoch seconds.
        assert!(clock.now() > 1_700_000_000.0);
    }
}
