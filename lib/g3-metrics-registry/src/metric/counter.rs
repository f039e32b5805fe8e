/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    #[inline]
    pub fn incr(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn decr(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}
