/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::{Duration, Instant};

use crate::{Meter, MeterSnapshot, SampleSnapshot, UniformSample};

/// Duration distribution in nanoseconds together with the rate of events.
#[derive(Default)]
pub struct Timer {
    sample: UniformSample,
    meter: Meter,
}

#[derive(Clone, Debug)]
pub struct TimerSnapshot {
    pub sample: SampleSnapshot,
    pub meter: MeterSnapshot,
}

impl Timer {
    pub fn record(&self, d: Duration) {
        self.record_nanos(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX));
    }

    pub fn record_nanos(&self, nanos: i64) {
        self.sample.update(nanos);
        self.meter.mark(1);
    }

    pub fn record_since(&self, start: Instant) {
        self.record(start.elapsed());
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            sample: self.sample.snapshot(),
            meter: self.meter.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record() {
        let t = Timer::default();
        t.record(Duration::from_micros(1));
        t.record(Duration::from_micros(3));
        t.record_nanos(2_000);

        let snap = t.snapshot();
        assert_eq!(snap.sample.count(), 3);
        assert_eq!(snap.sample.min(), 1_000);
        assert_eq!(snap.sample.max(), 3_000);
        assert_eq!(snap.sample.mean(), 2_000.0);
        assert_eq!(snap.meter.count, 3);
    }

    #[test]
    fn saturate() {
        let t = Timer::default();
        t.record(Duration::MAX);
        assert_eq!(t.snapshot().sample.max(), i64::MAX);
    }
}
