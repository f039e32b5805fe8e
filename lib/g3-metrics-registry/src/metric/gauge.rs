/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicI64, Ordering};

use portable_atomic::AtomicF64;

#[derive(Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    #[inline]
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn incr(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn decr(&self, n: i64) {
        self.value.fetch_sub(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

pub struct GaugeFloat {
    value: AtomicF64,
}

impl GaugeFloat {
    #[inline]
    pub fn set(&self, v: f64) {
        self.value.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for GaugeFloat {
    fn default() -> Self {
        GaugeFloat {
            value: AtomicF64::new(0.0),
        }
    }
}
