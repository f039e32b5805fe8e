/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use crate::{SampleSnapshot, UniformSample};

#[derive(Default)]
pub struct Histogram {
    sample: UniformSample,
}

impl Histogram {
    #[inline]
    pub fn record(&self, v: i64) {
        self.sample.update(v);
    }

    pub fn snapshot(&self) -> SampleSnapshot {
        self.sample.snapshot()
    }
}
