/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use g3_metrics_registry::{Counter, Gauge, GaugeFloat, Histogram, MetricsRegistry, Timer};

/// A metric handle that can be looked up from a registry.
///
/// The default value is a no-op handle that discards all writes.
pub trait VectorMetric: Default {
    fn lookup(registry: &MetricsRegistry, key: &str) -> Self;

    fn is_noop(&self) -> bool;
}

macro_rules! impl_stat_handle {
    ($name:ident, $inner:ty, $get:ident) => {
        #[derive(Clone, Default)]
        pub struct $name(Option<Arc<$inner>>);

        impl VectorMetric for $name {
            fn lookup(registry: &MetricsRegistry, key: &str) -> Self {
                $name(registry.$get(key))
            }

            fn is_noop(&self) -> bool {
                self.0.is_none()
            }
        }
    };
}

impl_stat_handle!(StatCounter, Counter, counter);
impl_stat_handle!(StatGauge, Gauge, gauge);
impl_stat_handle!(StatGaugeFloat, GaugeFloat, gauge_float);
impl_stat_handle!(StatTimer, Timer, timer);
impl_stat_handle!(StatHistogram, Histogram, histogram);

impl StatCounter {
    pub fn incr(&self, n: i64) {
        if let Some(c) = &self.0 {
            c.incr(n);
        }
    }

    pub fn decr(&self, n: i64) {
        if let Some(c) = &self.0 {
            c.decr(n);
        }
    }

    pub fn count(&self) -> i64 {
        self.0.as_ref().map(|c| c.count()).unwrap_or_default()
    }
}

impl StatGauge {
    pub fn set(&self, v: i64) {
        if let Some(g) = &self.0 {
            g.set(v);
        }
    }

    pub fn incr(&self, n: i64) {
        if let Some(g) = &self.0 {
            g.incr(n);
        }
    }

    pub fn decr(&self, n: i64) {
        if let Some(g) = &self.0 {
            g.decr(n);
        }
    }

    pub fn value(&self) -> i64 {
        self.0.as_ref().map(|g| g.value()).unwrap_or_default()
    }
}

impl StatGaugeFloat {
    pub fn set(&self, v: f64) {
        if let Some(g) = &self.0 {
            g.set(v);
        }
    }

    pub fn value(&self) -> f64 {
        self.0.as_ref().map(|g| g.value()).unwrap_or_default()
    }
}

impl StatTimer {
    pub fn record(&self, d: Duration) {
        if let Some(t) = &self.0 {
            t.record(d);
        }
    }

    pub fn record_nanos(&self, nanos: i64) {
        if let Some(t) = &self.0 {
            t.record_nanos(nanos);
        }
    }

    /// Start timing, the elapsed time is recorded when the guard drops.
    pub fn start(&self) -> TimerGuard {
        TimerGuard {
            timer: self.0.clone(),
            start: Instant::now(),
        }
    }
}

pub struct TimerGuard {
    timer: Option<Arc<Timer>>,
    start: Instant,
}

impl TimerGuard {
    /// Drop without recording.
    pub fn cancel(mut self) {
        self.timer = None;
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if let Some(t) = self.timer.take() {
            t.record_since(self.start);
        }
    }
}

impl StatHistogram {
    pub fn record(&self, v: i64) {
        if let Some(h) = &self.0 {
            h.record(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_handles() {
        let c = StatCounter::default();
        assert!(c.is_noop());
        c.incr(1);
        c.decr(2);
        assert_eq!(c.count(), 0);

        let g = StatGauge::default();
        g.set(3);
        assert_eq!(g.value(), 0);

        let t = StatTimer::default();
        t.record(Duration::from_secs(1));
        drop(t.start());

        StatHistogram::default().record(1);
        StatGaugeFloat::default().set(1.5);
    }

    #[test]
    fn lookup() {
        let registry = MetricsRegistry::default();
        let c = StatCounter::lookup(&registry, "a");
        c.incr(3);
        c.decr(1);
        assert_eq!(StatCounter::lookup(&registry, "a").count(), 2);

        let g = StatGauge::lookup(&registry, "a");
        assert!(g.is_noop());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn timer_guard() {
        let registry = MetricsRegistry::default();
        let t = StatTimer::lookup(&registry, "t");
        {
            let _guard = t.start();
        }
        t.start().cancel();
        let snap = registry.timer("t").unwrap().snapshot();
        assert_eq!(snap.sample.count(), 1);
    }
}
