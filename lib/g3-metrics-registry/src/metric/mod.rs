/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

mod value;
pub use value::MetricValue;

mod counter;
pub use counter::Counter;

mod gauge;
pub use gauge::{Gauge, GaugeFloat};

mod histogram;
pub use histogram::Histogram;

mod timer;
pub use timer::{Timer, TimerSnapshot};

/// Named field values taken from a metric snapshot, in a stable order.
pub type MetricFields = Vec<(&'static str, MetricValue)>;

const QUANTILES: [f64; 5] = [0.5, 0.75, 0.95, 0.99, 0.999];
const QUANTILE_FIELDS: [&str; 5] = ["p50", "p75", "p95", "p99", "p999"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    GaugeFloat,
    Timer,
    Histogram,
}

#[derive(Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    GaugeFloat(Arc<GaugeFloat>),
    Timer(Arc<Timer>),
    Histogram(Arc<Histogram>),
}

impl Metric {
    pub fn new(metric_type: MetricType) -> Self {
        match metric_type {
            MetricType::Counter => Metric::Counter(Arc::new(Counter::default())),
            MetricType::Gauge => Metric::Gauge(Arc::new(Gauge::default())),
            MetricType::GaugeFloat => Metric::GaugeFloat(Arc::new(GaugeFloat::default())),
            MetricType::Timer => Metric::Timer(Arc::new(Timer::default())),
            MetricType::Histogram => Metric::Histogram(Arc::new(Histogram::default())),
        }
    }

    pub fn metric_type(&self) -> MetricType {
        match self {
            Metric::Counter(_) => MetricType::Counter,
            Metric::Gauge(_) => MetricType::Gauge,
            Metric::GaugeFloat(_) => MetricType::GaugeFloat,
            Metric::Timer(_) => MetricType::Timer,
            Metric::Histogram(_) => MetricType::Histogram,
        }
    }

    /// Take a point-in-time copy of the metric as publishable fields.
    pub fn snapshot_fields(&self) -> MetricFields {
        match self {
            Metric::Counter(c) => vec![("count", MetricValue::Signed(c.count()))],
            Metric::Gauge(g) => vec![("value", MetricValue::Signed(g.value()))],
            Metric::GaugeFloat(g) => vec![("value", MetricValue::Double(g.value()))],
            Metric::Histogram(h) => {
                let snap = h.snapshot();
                let mut fields = Vec::with_capacity(10);
                push_sample_fields(&mut fields, &snap);
                fields
            }
            Metric::Timer(t) => {
                let snap = t.snapshot();
                let mut fields = Vec::with_capacity(14);
                push_sample_fields(&mut fields, &snap.sample);
                fields.push(("1m.rate", MetricValue::Double(snap.meter.rate1)));
                fields.push(("5m.rate", MetricValue::Double(snap.meter.rate5)));
                fields.push(("15m.rate", MetricValue::Double(snap.meter.rate15)));
                fields.push(("mean.rate", MetricValue::Double(snap.meter.rate_mean)));
                fields
            }
        }
    }

    /// Check if two handles refer to the same metric instance.
    pub fn ptr_eq(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Counter(a), Metric::Counter(b)) => Arc::ptr_eq(a, b),
            (Metric::Gauge(a), Metric::Gauge(b)) => Arc::ptr_eq(a, b),
            (Metric::GaugeFloat(a), Metric::GaugeFloat(b)) => Arc::ptr_eq(a, b),
            (Metric::Timer(a), Metric::Timer(b)) => Arc::ptr_eq(a, b),
            (Metric::Histogram(a), Metric::Histogram(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn push_sample_fields(fields: &mut MetricFields, snap: &crate::SampleSnapshot) {
    fields.push(("count", MetricValue::Signed(snap.count() as i64)));
    fields.push(("min", MetricValue::Signed(snap.min())));
    fields.push(("max", MetricValue::Signed(snap.max())));
    fields.push(("mean", MetricValue::Double(snap.mean())));
    fields.push(("stddev", MetricValue::Double(snap.std_dev())));
    let ps = snap.percentiles(&QUANTILES);
    for (name, v) in QUANTILE_FIELDS.iter().zip(ps) {
        fields.push((*name, MetricValue::Double(v)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn field(fields: &MetricFields, name: &str) -> Option<MetricValue> {
        fields.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }

    #[test]
    fn counter_fields() {
        let m = Metric::new(MetricType::Counter);
        let Metric::Counter(c) = &m else {
            panic!("not a counter");
        };
        c.incr(5);
        c.decr(2);
        let fields = m.snapshot_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(field(&fields, "count"), Some(MetricValue::Signed(3)));
    }

    #[test]
    fn gauge_fields() {
        let m = Metric::new(MetricType::GaugeFloat);
        let Metric::GaugeFloat(g) = &m else {
            panic!("not a float gauge");
        };
        g.set(1.5);
        let fields = m.snapshot_fields();
        assert_eq!(field(&fields, "value"), Some(MetricValue::Double(1.5)));
    }

    #[test]
    fn histogram_fields() {
        let m = Metric::new(MetricType::Histogram);
        let Metric::Histogram(h) = &m else {
            panic!("not a histogram");
        };
        h.record(10);
        h.record(20);
        let fields = m.snapshot_fields();
        assert_eq!(fields.len(), 10);
        assert_eq!(field(&fields, "count"), Some(MetricValue::Signed(2)));
        assert_eq!(field(&fields, "min"), Some(MetricValue::Signed(10)));
        assert_eq!(field(&fields, "max"), Some(MetricValue::Signed(20)));
        assert_eq!(field(&fields, "mean"), Some(MetricValue::Double(15.0)));
        assert!(field(&fields, "p999").is_some());
        assert!(field(&fields, "1m.rate").is_none());
    }

    #[test]
    fn timer_fields() {
        let m = Metric::new(MetricType::Timer);
        let Metric::Timer(t) = &m else {
            panic!("not a timer");
        };
        t.record(Duration::from_millis(2));
        let fields = m.snapshot_fields();
        assert_eq!(fields.len(), 14);
        assert_eq!(field(&fields, "count"), Some(MetricValue::Signed(1)));
        assert_eq!(field(&fields, "max"), Some(MetricValue::Signed(2_000_000)));
        assert!(field(&fields, "mean.rate").is_some());
        assert!(field(&fields, "15m.rate").is_some());
    }

    #[test]
    fn identity() {
        let a = Metric::new(MetricType::Counter);
        let b = a.clone();
        let c = Metric::new(MetricType::Counter);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.metric_type(), MetricType::Counter);
    }
}
