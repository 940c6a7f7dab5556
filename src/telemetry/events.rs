//! Core telemetry event types describing detector diagnostics exposed to
//! the CLI and any host-side subscriber.

use serde::{Deserialize, Serialize};

use crate::analysis::impulse::RejectionReason;

/// Diagnostic events covering gate verdicts, sequencing, and buffer health.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    GateRejected {
        reason: RejectionReason,
    },
    ClassifierScore {
        probability: f32,
    },
    ClassifierLatency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    ClapCounted {
        count: u32,
        timestamp_ms: u64,
    },
    EchoSuppressed {
        interval_ms: u64,
    },
    SequenceExpired {
        timestamp_ms: u64,
    },
    Triggered {
        timestamp_ms: u64,
    },
    BufferOccupancy {
        channel: String,
        percent: f32,
    },
    Status {
        message: String,
    },
    Error {
        code: i32,
        context: String,
    },
}
