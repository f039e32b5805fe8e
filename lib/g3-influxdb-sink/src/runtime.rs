/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::runtime::{Handle, RuntimeMetrics};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use g3_metrics_registry::MetricsRegistry;

use crate::MetricsIncludeConfig;

const METRIC_NAME_TOKIO_NUM_WORKERS: &str = "tokio.num_workers";
const METRIC_NAME_TOKIO_ALIVE_TASKS: &str = "tokio.num_alive_tasks";
const METRIC_NAME_TOKIO_GLOBAL_QUEUE_DEPTH: &str = "tokio.global_queue_depth";

fn set_gauge(registry: &MetricsRegistry, name: &str, v: i64) {
    if let Some(g) = registry.gauge(name) {
        g.set(v);
    }
}

#[cfg(unix)]
mod rusage {
    use super::set_gauge;
    use g3_metrics_registry::MetricsRegistry;

    const METRIC_NAME_MAX_RSS: &str = "runtime.max_rss";
    const METRIC_NAME_USER_TIME: &str = "runtime.user_time_us";
    const METRIC_NAME_SYSTEM_TIME: &str = "runtime.system_time_us";
    const METRIC_NAME_MINOR_FAULTS: &str = "runtime.minor_faults";
    const METRIC_NAME_MAJOR_FAULTS: &str = "runtime.major_faults";
    const METRIC_NAME_VOLUNTARY_CTX_SWITCHES: &str = "runtime.voluntary_ctx_switches";
    const METRIC_NAME_INVOLUNTARY_CTX_SWITCHES: &str = "runtime.involuntary_ctx_switches";

    fn timeval_us(tv: &libc::timeval) -> i64 {
        (tv.tv_sec as i64)
            .saturating_mul(1_000_000)
            .saturating_add(tv.tv_usec as i64)
    }

    pub(super) fn capture(registry: &MetricsRegistry) -> std::io::Result<()> {
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        let r = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
        if r != 0 {
            return Err(std::io::Error::last_os_error());
        }

        set_gauge(registry, METRIC_NAME_MAX_RSS, usage.ru_maxrss as i64);
        set_gauge(registry, METRIC_NAME_USER_TIME, timeval_us(&usage.ru_utime));
        set_gauge(registry, METRIC_NAME_SYSTEM_TIME, timeval_us(&usage.ru_stime));
        set_gauge(registry, METRIC_NAME_MINOR_FAULTS, usage.ru_minflt as i64);
        set_gauge(registry, METRIC_NAME_MAJOR_FAULTS, usage.ru_majflt as i64);
        set_gauge(
            registry,
            METRIC_NAME_VOLUNTARY_CTX_SWITCHES,
            usage.ru_nvcsw as i64,
        );
        set_gauge(
            registry,
            METRIC_NAME_INVOLUNTARY_CTX_SWITCHES,
            usage.ru_nivcsw as i64,
        );
        Ok(())
    }
}

fn capture_tokio(registry: &MetricsRegistry, metrics: &RuntimeMetrics) {
    set_gauge(
        registry,
        METRIC_NAME_TOKIO_NUM_WORKERS,
        metrics.num_workers() as i64,
    );
    set_gauge(
        registry,
        METRIC_NAME_TOKIO_ALIVE_TASKS,
        metrics.num_alive_tasks() as i64,
    );
    set_gauge(
        registry,
        METRIC_NAME_TOKIO_GLOBAL_QUEUE_DEPTH,
        metrics.global_queue_depth() as i64,
    );
}

fn spawn_periodic<F>(
    handle: &Handle,
    interval: Duration,
    quit: CancellationToken,
    mut capture: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    handle.spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;

                _ = quit.cancelled() => break,
                _ = interval.tick() => capture(),
            }
        }
    })
}

/// Start the configured capture tasks, they exit when `quit` is cancelled.
pub(crate) fn spawn_capture_tasks(
    include: &MetricsIncludeConfig,
    registry: &Arc<MetricsRegistry>,
    handle: &Handle,
    quit: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::with_capacity(2);

    if let Some(interval) = include.runtime {
        #[cfg(unix)]
        {
            let registry = registry.clone();
            tasks.push(spawn_periodic(handle, interval, quit.clone(), move || {
                if let Err(e) = rusage::capture(&registry) {
                    debug!("failed to get process resource usage: {e}");
                }
            }));
        }
        #[cfg(not(unix))]
        debug!("process resource usage capture is not supported, interval {interval:?} ignored");
    }

    if let Some(interval) = include.tokio_runtime {
        let registry = registry.clone();
        let metrics = handle.metrics();
        tasks.push(spawn_periodic(handle, interval, quit.clone(), move || {
            capture_tokio(&registry, &metrics)
        }));
    }

    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn rusage() {
        let registry = MetricsRegistry::default();
        rusage::capture(&registry).unwrap();
        assert!(registry.gauge("runtime.max_rss").unwrap().value() > 0);
        assert!(registry.get("runtime.involuntary_ctx_switches").is_some());
    }

    #[tokio::test]
    async fn tokio_capture() {
        let registry = Arc::new(MetricsRegistry::default());
        let include = MetricsIncludeConfig {
            runtime: None,
            tokio_runtime: Some(Duration::from_millis(10)),
        };
        let quit = CancellationToken::new();
        let tasks = spawn_capture_tasks(&include, &registry, &Handle::current(), &quit);
        assert_eq!(tasks.len(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        quit.cancel();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(registry.gauge("tokio.num_workers").unwrap().value(), 1);
        assert!(registry.get("tokio.global_queue_depth").is_some());
    }
}
