/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

#[cfg(test)]
#[macro_use]
mod macros;

mod yaml;

pub use g3_metrics_registry::{MetricValue, MetricsRegistry};

mod config;
pub use config::{
    InfluxdbSinkConfig, MetricsIncludeConfig, TimestampPrecision, TlsClientConfig,
    WriteConsistency,
};

mod mapping;
pub use mapping::{MappedPath, PathMapping, PathMappingRule, RulePathMapping};

mod point;
pub use point::{Point, PointBatch, PointError};

mod transport;
pub use transport::{
    EndpointTransportBuilder, MetricsTransport, TransportBuildError, TransportBuilder,
};

mod connection;
mod report;
mod runtime;
mod scheduler;

mod sink;
pub use sink::{
    InfluxdbSink, InfluxdbSinkBuilder, MetricVector, StatCounter, StatCounterVec, StatGauge,
    StatGaugeFloat, StatGaugeFloatVec, StatGaugeVec, StatHistogram, StatHistogramVec, StatTimer,
    StatTimerVec, TimerGuard, VectorMetric,
};
