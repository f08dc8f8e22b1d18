//! OpenTelemetry instruments for the client engine
//!
//! Instruments are created against the global meter, so everything here is
//! a no-op until the host installs a meter provider. The engine records
//! unconditionally and leaves exporter wiring to the application.

use crate::connection::ConnectionState;
use opentelemetry::metrics::{Counter, Gauge, Histogram};
use opentelemetry::{global, KeyValue};

/// Bundle of instruments shared across the client, supervisor and router.
#[derive(Clone)]
pub struct ClientMetrics {
    connection_state: Gauge<i64>,
    calls: Counter<u64>,
    call_duration: Histogram<f64>,
    reconnect_attempts: Counter<u64>,
    reconnect_successes: Counter<u64>,
    notifications: Counter<u64>,
    protocol_violations: Counter<u64>,
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientMetrics {
    pub fn new() -> Self {
        let meter = global::meter("playlink.client");
        Self {
            connection_state: meter
                .i64_gauge("playlink.client.connection.state")
                .with_description("Connection lifecycle state (0=disconnected .. 4=failed)")
                .build(),
            calls: meter
                .u64_counter("playlink.client.calls")
                .with_description("Completed calls by method and outcome")
                .build(),
            call_duration: meter
                .f64_histogram("playlink.client.call.duration")
                .with_description("Call round-trip time in seconds")
                .build(),
            reconnect_attempts: meter
                .u64_counter("playlink.client.reconnect.attempts")
                .with_description("Reconnection attempts scheduled")
                .build(),
            reconnect_successes: meter
                .u64_counter("playlink.client.reconnect.successes")
                .with_description("Connections re-established after a loss")
                .build(),
            notifications: meter
                .u64_counter("playlink.client.notifications")
                .with_description("Server pushes received by method")
                .build(),
            protocol_violations: meter
                .u64_counter("playlink.client.protocol.violations")
                .with_description("Inbound frames dropped as invalid")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: &ConnectionState) {
        self.connection_state.record(
            state.metric_code(),
            &[KeyValue::new("state", state.as_label())],
        );
    }

    pub fn record_call(&self, method: &str, outcome: &'static str, seconds: f64) {
        self.calls.add(
            1,
            &[
                KeyValue::new("method", method.to_string()),
                KeyValue::new("outcome", outcome),
            ],
        );
        self.call_duration
            .record(seconds, &[KeyValue::new("method", method.to_string())]);
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.add(1, &[]);
    }

    pub fn record_reconnect_success(&self) {
        self.reconnect_successes.add(1, &[]);
    }

    pub fn record_notification(&self, method: &str) {
        self.notifications
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    pub fn record_violation(&self) {
        self.protocol_violations.add(1, &[]);
    }
}
