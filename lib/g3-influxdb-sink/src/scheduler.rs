/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use g3_metrics_registry::{Metric, MetricsRegistry, decode_name};

use crate::connection::ConnectionManager;
use crate::report::{ErrorReporter, PublishErrorKind};
use crate::{PathMapping, Point, PointBatch, TimestampPrecision};

/// Turns registry snapshots into point batches.
pub(crate) struct BatchBuilder {
    registry: Arc<MetricsRegistry>,
    runtime_registry: Option<Arc<MetricsRegistry>>,
    mapping: Arc<dyn PathMapping>,
    global_tags: BTreeMap<String, String>,
    precision: TimestampPrecision,
}

impl BatchBuilder {
    pub(crate) fn new(
        registry: Arc<MetricsRegistry>,
        runtime_registry: Option<Arc<MetricsRegistry>>,
        mapping: Arc<dyn PathMapping>,
        global_tags: BTreeMap<String, String>,
        precision: TimestampPrecision,
    ) -> Self {
        BatchBuilder {
            registry,
            runtime_registry,
            mapping,
            global_tags,
            precision,
        }
    }

    fn push_point(
        &self,
        batch: &mut PointBatch,
        name: String,
        mut tags: BTreeMap<String, String>,
        metric: &Metric,
        time: DateTime<Utc>,
    ) {
        for (k, v) in &self.global_tags {
            tags.insert(k.clone(), v.clone());
        }
        match Point::new(name, tags, metric.snapshot_fields(), time) {
            Ok(point) => batch.push(point),
            Err(e) => debug!("skipped invalid point: {e}"),
        }
    }

    pub(crate) fn build(&self, time: DateTime<Utc>) -> PointBatch {
        let mut batch = PointBatch::with_capacity(self.precision, self.registry.len());

        self.registry.foreach(|key, metric| {
            let decoded = decode_name(key);
            self.push_point(&mut batch, decoded.name, decoded.tags, metric, time);
        });

        if let Some(registry) = &self.runtime_registry {
            registry.foreach(|key, metric| {
                let Some(name) = self.mapping.map_no_tags(key) else {
                    return;
                };
                if name.is_empty() {
                    return;
                }
                self.push_point(&mut batch, name, BTreeMap::new(), metric, time);
            });
        }

        batch
    }
}

pub(crate) struct FlushScheduler {
    batch_builder: BatchBuilder,
    connection: ConnectionManager,
    emit_interval: Duration,
    ping_interval: Duration,
    reporter: ErrorReporter,
}

impl FlushScheduler {
    pub(crate) fn new(
        batch_builder: BatchBuilder,
        connection: ConnectionManager,
        emit_interval: Duration,
        ping_interval: Duration,
    ) -> Self {
        FlushScheduler {
            batch_builder,
            connection,
            emit_interval,
            ping_interval,
            reporter: ErrorReporter::new(),
        }
    }

    async fn publish(&mut self) {
        let batch = self.batch_builder.build(Utc::now());
        if batch.is_empty() {
            trace!("no metrics to publish");
            return;
        }
        match self.connection.write(&batch).await {
            Ok(_) => debug!("{} influxdb points written", batch.len()),
            Err(e) => self.reporter.report(PublishErrorKind::Write, &e),
        }
    }

    async fn check_health(&mut self) {
        match self.connection.ping().await {
            Ok(rtt) => trace!("influxdb ping ok, rtt {rtt:?}"),
            Err(e) => {
                self.reporter.report(PublishErrorKind::Ping, &e);
                if let Err(e) = self.connection.rebuild().await {
                    self.reporter.report(PublishErrorKind::Rebuild, &e);
                }
            }
        }
    }

    pub(crate) async fn into_running(mut self, quit: CancellationToken) {
        let now = Instant::now();
        let mut emit_interval =
            tokio::time::interval_at(now + self.emit_interval, self.emit_interval);
        emit_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ping_interval =
            tokio::time::interval_at(now + self.ping_interval, self.ping_interval);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = quit.cancelled() => break,
                _ = emit_interval.tick() => self.publish().await,
                _ = ping_interval.tick() => self.check_health().await,
            }
        }

        self.publish().await;
        if let Err(e) = self.connection.close().await {
            warn!("failed to close influxdb client: {e:?}");
        }
        debug!("influxdb flush scheduler quit");
    }
}
