/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const TICK_INTERVAL: Duration = Duration::from_secs(5);

struct Ewma {
    alpha: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    fn with_minutes(minutes: f64) -> Self {
        let alpha = 1.0 - (-TICK_INTERVAL.as_secs_f64() / 60.0 / minutes).exp();
        Ewma {
            alpha,
            rate: 0.0,
            initialized: false,
        }
    }

    fn tick(&mut self, uncounted: u64) {
        let instant_rate = uncounted as f64 / TICK_INTERVAL.as_secs_f64();
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }
}

struct MeterState {
    count: u64,
    uncounted: u64,
    last_tick: Instant,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl MeterState {
    fn tick_if_necessary(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        let ticks = elapsed.as_nanos() / TICK_INTERVAL.as_nanos();
        if ticks == 0 {
            return;
        }
        self.last_tick += TICK_INTERVAL * (ticks as u32);

        let uncounted = std::mem::take(&mut self.uncounted);
        self.tick_all(uncounted);
        for _ in 1..ticks {
            self.tick_all(0);
        }
    }

    fn tick_all(&mut self, uncounted: u64) {
        self.m1.tick(uncounted);
        self.m5.tick(uncounted);
        self.m15.tick(uncounted);
    }
}

/// Counts events and keeps 1, 5 and 15 minute exponentially-weighted moving
/// average rates, plus the mean rate since creation.
///
/// The moving averages advance lazily in 5 second steps whenever the meter
/// is marked or read, so no background ticker is needed.
pub struct Meter {
    start: Instant,
    state: Mutex<MeterState>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeterSnapshot {
    pub count: u64,
    pub rate1: f64,
    pub rate5: f64,
    pub rate15: f64,
    pub rate_mean: f64,
}

impl Meter {
    pub fn new() -> Self {
        Meter::started_at(Instant::now())
    }

    fn started_at(start: Instant) -> Self {
        Meter {
            start,
            state: Mutex::new(MeterState {
                count: 0,
                uncounted: 0,
                last_tick: start,
                m1: Ewma::with_minutes(1.0),
                m5: Ewma::with_minutes(5.0),
                m15: Ewma::with_minutes(15.0),
            }),
        }
    }

    pub fn mark(&self, n: u64) {
        self.mark_at(n, Instant::now());
    }

    fn mark_at(&self, n: u64, now: Instant) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.tick_if_necessary(now);
        state.count = state.count.wrapping_add(n);
        state.uncounted = state.uncounted.wrapping_add(n);
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&self, now: Instant) -> MeterSnapshot {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.tick_if_necessary(now);

        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        let rate_mean = if elapsed > 0.0 {
            state.count as f64 / elapsed
        } else {
            0.0
        };
        MeterSnapshot {
            count: state.count,
            rate1: state.m1.rate,
            rate5: state.m5.rate,
            rate15: state.m15.rate,
            rate_mean,
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Meter::new()
    }
}
