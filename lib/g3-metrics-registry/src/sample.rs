/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::{Mutex, PoisonError};

const DEFAULT_RESERVOIR_SIZE: usize = 1028;

struct SampleInner {
    count: u64,
    values: Vec<i64>,
}

/// A uniform random sample of a stream of values, using reservoir sampling.
///
/// Memory use is bounded by the reservoir size, while `count` keeps track of
/// all values ever recorded.
pub struct UniformSample {
    reservoir_size: usize,
    inner: Mutex<SampleInner>,
}

impl UniformSample {
    pub fn new(reservoir_size: usize) -> Self {
        let reservoir_size = reservoir_size.max(1);
        UniformSample {
            reservoir_size,
            inner: Mutex::new(SampleInner {
                count: 0,
                values: Vec::with_capacity(reservoir_size.min(64)),
            }),
        }
    }

    pub fn update(&self, v: i64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.count += 1;
        if inner.values.len() < self.reservoir_size {
            inner.values.push(v);
        } else {
            let r = fastrand::u64(0..inner.count) as usize;
            if r < self.reservoir_size {
                inner.values[r] = v;
            }
        }
    }

    pub fn snapshot(&self) -> SampleSnapshot {
        let (count, values) = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            (inner.count, inner.values.clone())
        };
        SampleSnapshot::new(count, values)
    }
}

impl Default for UniformSample {
    fn default() -> Self {
        UniformSample::new(DEFAULT_RESERVOIR_SIZE)
    }
}

/// A read-only, sorted copy of a sample.
#[derive(Clone, Debug, Default)]
pub struct SampleSnapshot {
    count: u64,
    sorted: Vec<i64>,
}

impl SampleSnapshot {
    fn new(count: u64, mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        SampleSnapshot {
            count,
            sorted: values,
        }
    }

    /// Total number of recorded values, which may exceed the reservoir size.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.sorted.len()
    }

    pub fn min(&self) -> i64 {
        self.sorted.first().copied().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.sorted.last().copied().unwrap_or(0)
    }

    pub fn mean(&self) -> f64 {
        if self.sorted.is_empty() {
            return 0.0;
        }
        self.sorted.iter().map(|v| *v as f64).sum::<f64>() / self.sorted.len() as f64
    }

    pub fn variance(&self) -> f64 {
        if self.sorted.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let sum = self
            .sorted
            .iter()
            .map(|v| {
                let d = *v as f64 - mean;
                d * d
            })
            .sum::<f64>();
        sum / self.sorted.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Value at quantile `q` in `[0, 1]`, interpolated between neighbours.
    pub fn percentile(&self, q: f64) -> f64 {
        let len = self.sorted.len();
        if len == 0 {
            return 0.0;
        }
        let pos = q * (len + 1) as f64;
        if pos < 1.0 {
            self.sorted[0] as f64
        } else if pos >= len as f64 {
            self.sorted[len - 1] as f64
        } else {
            let lower = self.sorted[pos as usize - 1] as f64;
            let upper = self.sorted[pos as usize] as f64;
            lower + (pos - pos.floor()) * (upper - lower)
        }
    }

    pub fn percentiles(&self, quantiles: &[f64]) -> Vec<f64> {
        quantiles.iter().map(|q| self.percentile(*q)).collect()
    }
}
