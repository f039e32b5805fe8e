/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod codec;
pub use codec::{DecodedName, decode_name, encode_name};

mod sample;
pub use sample::{SampleSnapshot, UniformSample};

mod meter;
pub use meter::{Meter, MeterSnapshot};

mod metric;
pub use metric::{
    Counter, Gauge, GaugeFloat, Histogram, Metric, MetricFields, MetricType, MetricValue, Timer,
    TimerSnapshot,
};

mod registry;
pub use registry::MetricsRegistry;
