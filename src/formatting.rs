// src/formatting.rs

use crate::core::{IssueKind, MetricMap, QualityNotification, NOTIFICATION_TYPE};
use serde_json::{Map, Value};

/// Literal rendered for a metric that is absent or not a number. Formatting
/// never fails; degraded input degrades the text, not the call.
const UNAVAILABLE: &str = "N/A";

/// Builds the user-facing notification for one detected issue.
///
/// Pure: same inputs and timestamp yield an identical message. The `details`
/// map carries the raw metric values the text was built from (with the
/// `N/A` marker standing in for missing ones) so clients can render exact
/// numbers themselves.
pub fn build_notification(
    issue: IssueKind,
    metrics: &MetricMap,
    timestamp: f64,
) -> QualityNotification {
    let (message, detail_keys) = match issue {
        IssueKind::SnrLow => (
            format!(
                "Audio quality is low (SNR: {} dB). \
                 Try moving closer to the microphone or reducing background noise.",
                render_metric(metrics, "snr")
            ),
            &["snr", "threshold"][..],
        ),
        IssueKind::Clipping => (
            format!(
                "Audio is clipping ({}%). \
                 Try reducing the microphone volume or moving further away.",
                render_metric(metrics, "clip_pct")
            ),
            &["clip_pct", "threshold"][..],
        ),
        IssueKind::Echo => (
            format!(
                "Echo detected (level: {} dB). \
                 Try enabling echo cancellation or using headphones.",
                render_metric(metrics, "echo_db")
            ),
            &["echo_db", "threshold"][..],
        ),
        IssueKind::Silence => (
            format!(
                "No audio detected for {} seconds. \
                 Check that the microphone is not muted or disconnected.",
                render_metric(metrics, "seconds")
            ),
            &["seconds", "threshold"][..],
        ),
    };

    let mut details = Map::new();
    for key in detail_keys {
        let value = metrics
            .get(*key)
            .cloned()
            .unwrap_or_else(|| Value::String(UNAVAILABLE.to_string()));
        details.insert((*key).to_string(), value);
    }

    QualityNotification {
        message_type: NOTIFICATION_TYPE.to_string(),
        issue: issue.as_str().to_string(),
        message,
        details,
        timestamp,
    }
}

/// Renders one metric with a fixed single decimal place, or the `N/A`
/// marker when the value is missing or not numeric.
fn render_metric(metrics: &MetricMap, key: &str) -> String {
    match metrics.get(key).and_then(Value::as_f64) {
        Some(value) => format!("{:.1}", value),
        None => UNAVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metrics_from(value: Value) -> MetricMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test metrics must be an object"),
        }
    }

    #[test]
    fn test_snr_low_message() {
        let metrics = metrics_from(json!({ "snr": 15.2, "threshold": 20.0 }));
        let n = build_notification(IssueKind::SnrLow, &metrics, 42.5);

        assert_eq!(
            n.message,
            "Audio quality is low (SNR: 15.2 dB). \
             Try moving closer to the microphone or reducing background noise."
        );
        assert_eq!(n.message_type, "audio_quality_warning");
        assert_eq!(n.issue, "snr_low");
        assert_eq!(n.details["snr"], json!(15.2));
        assert_eq!(n.details["threshold"], json!(20.0));
        assert_eq!(n.timestamp, 42.5);
    }

    #[test]
    fn test_clipping_message() {
        let metrics = metrics_from(json!({ "clip_pct": 7.35, "threshold": 5.0 }));
        let n = build_notification(IssueKind::Clipping, &metrics, 0.0);

        assert_eq!(
            n.message,
            "Audio is clipping (7.3%). \
             Try reducing the microphone volume or moving further away."
        );
        // Details keep the raw value, not the rounded rendering.
        assert_eq!(n.details["clip_pct"], json!(7.35));
    }

    #[test]
    fn test_echo_message() {
        let metrics = metrics_from(json!({ "echo_db": -12.0, "threshold": -20.0 }));
        let n = build_notification(IssueKind::Echo, &metrics, 0.0);

        assert_eq!(
            n.message,
            "Echo detected (level: -12.0 dB). \
             Try enabling echo cancellation or using headphones."
        );
    }

    #[test]
    fn test_silence_message() {
        let metrics = metrics_from(json!({ "seconds": 10.0, "threshold": 5.0 }));
        let n = build_notification(IssueKind::Silence, &metrics, 0.0);

        assert_eq!(
            n.message,
            "No audio detected for 10.0 seconds. \
             Check that the microphone is not muted or disconnected."
        );
    }

    #[test]
    fn test_missing_metrics_render_as_not_available() {
        let metrics = MetricMap::new();
        let n = build_notification(IssueKind::Silence, &metrics, 0.0);

        assert_eq!(
            n.message,
            "No audio detected for N/A seconds. \
             Check that the microphone is not muted or disconnected."
        );
        assert_eq!(n.details["seconds"], json!("N/A"));
        assert_eq!(n.details["threshold"], json!("N/A"));
    }

    #[test]
    fn test_non_numeric_metric_renders_as_not_available() {
        let metrics = metrics_from(json!({ "snr": "garbled", "threshold": 20.0 }));
        let n = build_notification(IssueKind::SnrLow, &metrics, 0.0);

        assert!(n.message.contains("SNR: N/A dB"));
        // The raw (malformed) value still lands in details untouched.
        assert_eq!(n.details["snr"], json!("garbled"));
    }

    #[test]
    fn test_notification_round_trips_through_json() {
        for issue in [
            IssueKind::SnrLow,
            IssueKind::Clipping,
            IssueKind::Echo,
            IssueKind::Silence,
        ] {
            let metrics = metrics_from(json!({ "threshold": 20.0 }));
            let original = build_notification(issue, &metrics, 1_720_000_000.25);
            let payload = serde_json::to_string(&original).unwrap();
            let parsed: QualityNotification = serde_json::from_str(&payload).unwrap();
            assert_eq!(parsed, original);
        }
    }

    #[test]
    fn test_round_trip_with_missing_fields_is_deterministic() {
        let a = build_notification(IssueKind::Echo, &MetricMap::new(), 7.0);
        let b = build_notification(IssueKind::Echo, &MetricMap::new(), 7.0);
        assert_eq!(a, b);

        let payload = serde_json::to_string(&a).unwrap();
        let parsed: QualityNotification = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed, a);
    }
}
