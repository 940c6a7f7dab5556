// ClapSequencer - counts accepted clap events into a confirmed sequence
//
// State machine over (count, first, last) timestamps:
// - events closer than `min_interval_ms` to the last counted clap are echoes
// - a sequence that outlives `max_sequence_duration_ms` from its first clap
//   is discarded, either lazily on the next event or by `check_timeout`
// - reaching `required_claps` fires the trigger once and rewinds to zero
//
// Timestamps are plain milliseconds from whatever clock the caller uses; the
// pipeline feeds stream time so replays are deterministic.

use serde::{Deserialize, Serialize};

use crate::config::SequencerConfig;

/// What a single event did to the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequenceOutcome {
    /// Clap accepted; `count` claps in the current sequence
    Counted { count: u32 },
    /// Discarded as a reflection of the previous clap
    EchoSuppressed { interval_ms: u64 },
    /// Sequence completed; the counter is already back at zero
    Triggered { duration_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct ClapSequencer {
    config: SequencerConfig,
    count: u32,
    first_event_ms: u64,
    last_event_ms: u64,
}

impl ClapSequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            count: 0,
            first_event_ms: 0,
            last_event_ms: 0,
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Claps counted in the open sequence
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Timestamp of the first clap of the open sequence (meaningless at count 0)
    pub fn first_event_ms(&self) -> u64 {
        self.first_event_ms
    }

    pub fn last_event_ms(&self) -> u64 {
        self.last_event_ms
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.first_event_ms = 0;
        self.last_event_ms = 0;
    }

    fn is_expired(&self, now_ms: u64) -> bool {
        self.count > 0
            && now_ms.saturating_sub(self.first_event_ms) > self.config.max_sequence_duration_ms
    }

    /// Register one classifier-confirmed clap at `now_ms`
    pub fn process_event(&mut self, now_ms: u64) -> SequenceOutcome {
        if self.is_expired(now_ms) {
            tracing::debug!(
                "[ClapSequencer] Sequence of {} expired at {} ms, restarting",
                self.count,
                now_ms
            );
            self.reset();
        }

        if self.count > 0 {
            let interval_ms = now_ms.saturating_sub(self.last_event_ms);
            if interval_ms < self.config.min_interval_ms {
                tracing::debug!(
                    "[ClapSequencer] Echo suppressed ({} ms after last clap)",
                    interval_ms
                );
                return SequenceOutcome::EchoSuppressed { interval_ms };
            }
        }

        self.count += 1;
        self.last_event_ms = now_ms;
        if self.count == 1 {
            self.first_event_ms = now_ms;
        }
        tracing::info!(
            "[ClapSequencer] Clap {}/{} at {} ms",
            self.count,
            self.config.required_claps,
            now_ms
        );

        if self.count >= self.config.required_claps {
            let duration_ms = now_ms.saturating_sub(self.first_event_ms);
            tracing::info!(
                "[ClapSequencer] Sequence confirmed after {} ms",
                duration_ms
            );
            self.count = 0;
            return SequenceOutcome::Triggered { duration_ms };
        }

        SequenceOutcome::Counted { count: self.count }
    }

    /// [`Self::process_event`] that invokes `trigger` when the sequence completes
    pub fn process_event_with<F: FnOnce()>(&mut self, now_ms: u64, trigger: F) -> SequenceOutcome {
        let outcome = self.process_event(now_ms);
        if matches!(outcome, SequenceOutcome::Triggered { .. }) {
            trigger();
        }
        outcome
    }

    /// Drop an open sequence whose window has elapsed; true if one was dropped
    pub fn check_timeout(&mut self, now_ms: u64) -> bool {
        if self.is_expired(now_ms) {
            tracing::debug!(
                "[ClapSequencer] Timeout: {} clap(s) discarded at {} ms",
                self.count,
                now_ms
            );
            self.reset();
            true
        } else {
            false
        }
    }
}

impl Default for ClapSequencer {
    fn default() -> Self {
        Self::new(SequencerConfig::default())
    }
}
