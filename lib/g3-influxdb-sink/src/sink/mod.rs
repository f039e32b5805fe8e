/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, anyhow};
use log::{info, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use g3_metrics_registry::{MetricsRegistry, encode_name};

use crate::connection::ConnectionManager;
use crate::scheduler::{BatchBuilder, FlushScheduler};
use crate::{
    EndpointTransportBuilder, InfluxdbSinkConfig, PathMapping, RulePathMapping, TransportBuilder,
};

mod stat;
pub use stat::{
    StatCounter, StatGauge, StatGaugeFloat, StatHistogram, StatTimer, TimerGuard, VectorMetric,
};

mod vector;
pub use vector::MetricVector;

pub type StatCounterVec = MetricVector<StatCounter>;
pub type StatGaugeVec = MetricVector<StatGauge>;
pub type StatGaugeFloatVec = MetricVector<StatGaugeFloat>;
pub type StatTimerVec = MetricVector<StatTimer>;
pub type StatHistogramVec = MetricVector<StatHistogram>;

struct SinkShared {
    registry: Arc<MetricsRegistry>,
    mapping: Arc<dyn PathMapping>,
    closed: AtomicBool,
}

impl SinkShared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

pub struct InfluxdbSinkBuilder {
    config: InfluxdbSinkConfig,
    mapping: Option<Arc<dyn PathMapping>>,
    transport_builder: Option<Arc<dyn TransportBuilder>>,
}

impl InfluxdbSinkBuilder {
    pub fn new(config: InfluxdbSinkConfig) -> Self {
        InfluxdbSinkBuilder {
            config,
            mapping: None,
            transport_builder: None,
        }
    }

    /// Use a custom path mapping instead of the configured rules.
    pub fn path_mapping(mut self, mapping: Arc<dyn PathMapping>) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Use a custom transport instead of the one derived from the url.
    pub fn transport_builder(mut self, builder: Arc<dyn TransportBuilder>) -> Self {
        self.transport_builder = Some(builder);
        self
    }

    /// Connect and start the background flush task on the current runtime.
    pub async fn spawn(self) -> anyhow::Result<InfluxdbSink> {
        let config = self.config;
        config.check().context("invalid influxdb sink config")?;
        let handle =
            Handle::try_current().map_err(|e| anyhow!("no tokio runtime available: {e}"))?;

        let mapping = match self.mapping {
            Some(mapping) => mapping,
            None => {
                let mapping = RulePathMapping::new(&config.path_mapping)
                    .context("invalid path mapping config")?;
                Arc::new(mapping)
            }
        };
        let transport_builder = match self.transport_builder {
            Some(builder) => builder,
            None => {
                let builder = EndpointTransportBuilder::new(&config)
                    .context("unable to setup influxdb transport")?;
                Arc::new(builder)
            }
        };
        let connection = ConnectionManager::build(transport_builder, config.timeout).await?;

        let registry = Arc::new(MetricsRegistry::default());
        let runtime_registry = if config.include.is_empty() {
            None
        } else {
            Some(Arc::new(MetricsRegistry::default()))
        };

        let quit = CancellationToken::new();
        let mut tasks = Vec::with_capacity(3);

        let batch_builder = BatchBuilder::new(
            registry.clone(),
            runtime_registry.clone(),
            mapping.clone(),
            config.global_tags.clone(),
            config.precision,
        );
        let scheduler = FlushScheduler::new(
            batch_builder,
            connection,
            config.emit_interval,
            config.ping_interval,
        );
        tasks.push(handle.spawn(scheduler.into_running(quit.clone())));

        if let Some(runtime_registry) = &runtime_registry {
            tasks.extend(crate::runtime::spawn_capture_tasks(
                &config.include,
                runtime_registry,
                &handle,
                &quit,
            ));
        }

        if let Some(url) = config.url() {
            info!(
                "influxdb sink started, endpoint {url}, emit interval {:?}",
                config.emit_interval
            );
        }

        Ok(InfluxdbSink {
            shared: Arc::new(SinkShared {
                registry,
                mapping,
                closed: AtomicBool::new(false),
            }),
            quit,
            tasks: Mutex::new(tasks),
        })
    }
}

/// Metrics front end publishing to InfluxDB in the background.
///
/// All accessors are total: a dropped path, a type conflict or a closed sink
/// yields a no-op handle.
pub struct InfluxdbSink {
    shared: Arc<SinkShared>,
    quit: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl InfluxdbSink {
    fn get<T: VectorMetric>(&self, path: &str) -> T {
        if self.shared.is_closed() {
            return T::default();
        }
        let Some(mapped) = self.shared.mapping.map(path) else {
            return T::default();
        };
        if mapped.name.is_empty() {
            return T::default();
        }
        let key = encode_name(&mapped.name, &mapped.tag_keys, &mapped.tag_values);
        T::lookup(&self.shared.registry, &key)
    }

    fn get_vec<T: VectorMetric, S: AsRef<str>>(
        &self,
        path: &str,
        label_names: &[S],
    ) -> MetricVector<T> {
        if self.shared.is_closed() {
            return MetricVector::noop();
        }
        match self.shared.mapping.map(path) {
            Some(mapped) if !mapped.name.is_empty() => {
                MetricVector::new(self.shared.clone(), mapped, label_names)
            }
            _ => MetricVector::noop(),
        }
    }

    pub fn counter(&self, path: &str) -> StatCounter {
        self.get(path)
    }

    pub fn counter_vec<S: AsRef<str>>(&self, path: &str, label_names: &[S]) -> StatCounterVec {
        self.get_vec(path, label_names)
    }

    pub fn gauge(&self, path: &str) -> StatGauge {
        self.get(path)
    }

    pub fn gauge_vec<S: AsRef<str>>(&self, path: &str, label_names: &[S]) -> StatGaugeVec {
        self.get_vec(path, label_names)
    }

    pub fn gauge_float(&self, path: &str) -> StatGaugeFloat {
        self.get(path)
    }

    pub fn gauge_float_vec<S: AsRef<str>>(
        &self,
        path: &str,
        label_names: &[S],
    ) -> StatGaugeFloatVec {
        self.get_vec(path, label_names)
    }

    pub fn timer(&self, path: &str) -> StatTimer {
        self.get(path)
    }

    pub fn timer_vec<S: AsRef<str>>(&self, path: &str, label_names: &[S]) -> StatTimerVec {
        self.get_vec(path, label_names)
    }

    pub fn histogram(&self, path: &str) -> StatHistogram {
        self.get(path)
    }

    pub fn histogram_vec<S: AsRef<str>>(
        &self,
        path: &str,
        label_names: &[S],
    ) -> StatHistogramVec {
        self.get_vec(path, label_names)
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.shared.registry
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stop publishing after one final flush, and close the client.
    ///
    /// Calling it again is a no-op.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.quit.cancel();

        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!("influxdb sink task exited abnormally: {e}");
            }
        }
        info!("influxdb sink closed");
    }
}

impl Drop for InfluxdbSink {
    fn drop(&mut self) {
        self.quit.cancel();
    }
}
