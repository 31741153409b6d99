//! Running counters sampled into periodic `StatisticsEvent`s.

use crate::logging::StatisticsEvent;
use chrono::Utc;
use std::time::Instant;

/// Accumulates decode outcome counters and emits a snapshot on interval.
pub struct TelemetryAggregator {
    bursts_decoded: u64,
    fcs_failures: u64,
    acars_complete: u64,
    acars_other: u64,
    output_overflow_count: u64,

    last_sample_time: Instant,
    sample_interval_secs: f64,
}

impl TelemetryAggregator {
    pub fn new(sample_interval_secs: f64) -> Self {
        Self {
            bursts_decoded: 0,
            fcs_failures: 0,
            acars_complete: 0,
            acars_other: 0,
            output_overflow_count: 0,
            last_sample_time: Instant::now(),
            sample_interval_secs,
        }
    }

    pub fn record_message(&mut self, crc_ok: bool, acars_status: Option<&str>) {
        self.bursts_decoded += 1;
        if !crc_ok {
            self.fcs_failures += 1;
        }
        match acars_status {
            Some("Complete") => self.acars_complete += 1,
            Some(_) => self.acars_other += 1,
            None => {}
        }
    }

    pub fn record_output_overflow(&mut self, count: u64) {
        self.output_overflow_count = count;
    }

    pub fn should_sample(&self) -> bool {
        self.last_sample_time.elapsed().as_secs_f64() >= self.sample_interval_secs
    }

    /// Snapshot the counters into a `StatisticsEvent` if the interval has
    /// elapsed, resetting the sample clock (not the counters, which are
    /// cumulative for the run).
    pub fn sample(&mut self, run_duration_secs: f64) -> Option<StatisticsEvent> {
        if !self.should_sample() {
            return None;
        }
        self.last_sample_time = Instant::now();
        Some(StatisticsEvent {
            timestamp: Utc::now(),
            duration_secs: run_duration_secs,
            bursts_decoded: self.bursts_decoded,
            fcs_failures: self.fcs_failures,
            acars_complete: self.acars_complete,
            acars_other: self.acars_other,
            output_overflow_count: self.output_overflow_count,
        })
    }
}
