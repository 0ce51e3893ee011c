//! AudioWatch - Audio Quality Notification Dispatcher
//!
//! Host binary: wires configuration, transport and dispatcher together,
//! then reads newline-delimited JSON issue reports from stdin and
//! dispatches them. A report whose `issue` field is the literal
//! `"disconnect"` tears down the subject's throttle state instead.

use anyhow::Result;
use audiowatch::{
    cli::Cli, config::Config, dispatcher::NotificationDispatcher,
    internal_metrics::LoggingRecorder, throttle::ThrottleLedger, transport::build_transport,
    IssueReport, SuppressReason,
};
use clap::Parser;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {}", err);
        // Exit if configuration fails, as it's a critical step.
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("AudioWatch starting up...");
    info!("Throttle window: {}s", config.throttle.window_seconds);

    // Install the logging metrics recorder if enabled; without a recorder
    // the counters and gauges emitted by the dispatcher go nowhere.
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let mut metrics_task: Option<JoinHandle<()>> = None;
    if config.metrics.log_metrics {
        info!(
            "Logging recorder enabled. Metrics will be printed every {} seconds.",
            config.metrics.log_aggregation_seconds
        );
        let (recorder, handle) = LoggingRecorder::new(
            Duration::from_secs(config.metrics.log_aggregation_seconds),
            shutdown_rx,
        );
        metrics::set_global_recorder(recorder).expect("Failed to install logging recorder");
        metrics_task = Some(handle);
    }

    // Transport selection is the one fatal step: a missing endpoint is a
    // wiring error, surfaced here and never per-call.
    let transport = build_transport(&config.transport)?;

    let ledger = ThrottleLedger::new(Duration::from_secs(config.throttle.window_seconds));
    let dispatcher = NotificationDispatcher::new(ledger, transport);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        handle_line(&dispatcher, line).await;
    }

    info!("Input closed, shutting down");
    dispatcher.clear_all();

    drop(shutdown_tx);
    if let Some(handle) = metrics_task {
        let _ = handle.await;
    }
    Ok(())
}

async fn handle_line(dispatcher: &NotificationDispatcher, line: &str) {
    // Disconnect reports only carry a subject; peek before full parsing.
    if let Ok(value) = serde_json::from_str::<Value>(line) {
        if value.get("issue").and_then(Value::as_str) == Some("disconnect") {
            if let Some(subject) = value.get("subject").and_then(Value::as_str) {
                info!(subject = %subject, "Subject disconnected, clearing throttle state");
                dispatcher.clear(subject);
            }
            return;
        }
    }

    match serde_json::from_str::<IssueReport>(line) {
        Ok(report) => {
            let outcome = dispatcher
                .notify(&report.subject, report.issue, &report.metrics)
                .await;
            match outcome.reason {
                None => {}
                Some(SuppressReason::Throttled) => {}
                Some(SuppressReason::TransportError) => {
                    warn!(subject = %report.subject, issue = %report.issue,
                        "Notification not delivered, transport error");
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Ignoring malformed issue report");
        }
    }
}
