/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use foldhash::fast::FixedState;

use crate::{Counter, Gauge, GaugeFloat, Histogram, Metric, MetricType, Timer};

/// Flat keyed store of live metrics.
///
/// Entries are never evicted, a metric lives as long as the registry.
pub struct MetricsRegistry {
    inner: Mutex<HashMap<String, Metric, FixedState>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        MetricsRegistry {
            inner: Mutex::new(HashMap::with_hasher(FixedState::with_seed(0))),
        }
    }
}

macro_rules! impl_typed_get {
    ($f:ident, $variant:ident, $t:ty) => {
        /// Get or create the metric at `key`.
        ///
        /// Returns `None` if the key is already taken by another metric type.
        pub fn $f(&self, key: &str) -> Option<Arc<$t>> {
            match self.get_or_register(key, || Metric::new(MetricType::$variant)) {
                Metric::$variant(m) => Some(m),
                _ => None,
            }
        }
    };
}

impl MetricsRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Metric, FixedState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the metric registered at `key`, or register the one built by
    /// `factory`.
    ///
    /// The factory is called with the registry lock held, so it runs at most
    /// once per key even with racing callers.
    pub fn get_or_register<F>(&self, key: &str, factory: F) -> Metric
    where
        F: FnOnce() -> Metric,
    {
        let mut ht = self.lock();
        if let Some(m) = ht.get(key) {
            return m.clone();
        }
        let m = factory();
        ht.insert(key.to_string(), m.clone());
        m
    }

    pub fn get(&self, key: &str) -> Option<Metric> {
        let ht = self.lock();
        ht.get(key).cloned()
    }

    impl_typed_get!(counter, Counter, Counter);
    impl_typed_get!(gauge, Gauge, Gauge);
    impl_typed_get!(gauge_float, GaugeFloat, GaugeFloat);
    impl_typed_get!(timer, Timer, Timer);
    impl_typed_get!(histogram, Histogram, Histogram);

    /// Call `f` on a copy of all entries.
    ///
    /// The lock is not held while `f` runs, so producers are never blocked by
    /// a slow consumer. Metrics registered in the meantime may be missed.
    pub fn foreach<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Metric),
    {
        let entries = {
            let ht = self.lock();
            ht.iter()
                .map(|(k, m)| (k.clone(), m.clone()))
                .collect::<Vec<_>>()
        };
        for (k, m) in &entries {
            f(k, m);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_or_register_same_instance() {
        let registry = MetricsRegistry::default();
        let a = registry.get_or_register("a", || Metric::new(MetricType::Counter));
        let b = registry.get_or_register("a", || Metric::new(MetricType::Counter));
        assert!(a.ptr_eq(&b));
        assert_eq!(registry.len(), 1);

        let c1 = registry.counter("c").unwrap();
        let c2 = registry.counter("c").unwrap();
        assert!(Arc::ptr_eq(&c1, &c2));
    }

    #[test]
    fn type_mismatch() {
        let registry = MetricsRegistry::default();
        assert!(registry.counter("x").is_some());
        assert!(registry.gauge("x").is_none());
        assert!(registry.timer("x").is_none());
        assert!(registry.counter("x").is_some());
    }

    #[test]
    fn factory_called_once_racing() {
        const THREADS: usize = 8;

        let registry = Arc::new(MetricsRegistry::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles = (0..THREADS)
            .map(|_| {
                let registry = registry.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.get_or_register("shared", || {
                        calls.fetch_add(1, Ordering::Relaxed);
                        Metric::new(MetricType::Histogram)
                    })
                })
            })
            .collect::<Vec<_>>();

        let metrics = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        for m in &metrics[1..] {
            assert!(m.ptr_eq(&metrics[0]));
        }
    }

    #[test]
    fn foreach() {
        let registry = MetricsRegistry::default();
        assert!(registry.is_empty());
        registry.counter("a").unwrap().incr(1);
        registry.gauge("b").unwrap().set(2);

        let mut keys = Vec::new();
        registry.foreach(|k, m| {
            keys.push((k.to_string(), m.metric_type()));
            // registering from within the callback must not deadlock
            registry.counter("c");
        });
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), MetricType::Counter),
                ("b".to_string(), MetricType::Gauge)
            ]
        );
        assert_eq!(registry.len(), 3);
    }
}
