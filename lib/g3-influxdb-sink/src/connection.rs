/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use log::{debug, info};

use crate::{MetricsTransport, PointBatch, TransportBuilder};

/// Owns the single live transport client.
pub(crate) struct ConnectionManager {
    builder: Arc<dyn TransportBuilder>,
    client: Box<dyn MetricsTransport>,
    timeout: Duration,
}

impl ConnectionManager {
    pub(crate) async fn build(
        builder: Arc<dyn TransportBuilder>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = tokio::time::timeout(timeout, builder.build())
            .await
            .map_err(|_| anyhow!("timed out building influxdb client"))?
            .context("failed to build influxdb client")?;
        Ok(ConnectionManager {
            builder,
            client,
            timeout,
        })
    }

    pub(crate) async fn write(&mut self, batch: &PointBatch) -> anyhow::Result<()> {
        tokio::time::timeout(self.timeout, self.client.write(batch))
            .await
            .map_err(|_| anyhow!("write timed out after {:?}", self.timeout))?
    }

    pub(crate) async fn ping(&mut self) -> anyhow::Result<Duration> {
        tokio::time::timeout(self.timeout, self.client.ping(self.timeout))
            .await
            .map_err(|_| anyhow!("ping timed out after {:?}", self.timeout))?
    }

    /// Replace the client with a newly built one.
    ///
    /// The current client is kept if the build fails.
    pub(crate) async fn rebuild(&mut self) -> anyhow::Result<()> {
        let client = tokio::time::timeout(self.timeout, self.builder.build())
            .await
            .map_err(|_| anyhow!("timed out rebuilding influxdb client"))?
            .context("failed to rebuild influxdb client")?;
        let mut old = std::mem::replace(&mut self.client, client);
        if let Err(e) = old.close().await {
            debug!("error when closing the old influxdb client: {e:?}");
        }
        info!("influxdb client rebuilt");
        Ok(())
    }

    pub(crate) async fn close(&mut self) -> anyhow::Result<()> {
        tokio::time::timeout(self.timeout, self.client.close())
            .await
            .map_err(|_| anyhow!("close timed out after {:?}", self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::TimestampPrecision;

    #[derive(Default)]
    struct Counts {
        built: AtomicUsize,
        closed: AtomicUsize,
        writes: AtomicUsize,
    }

    struct StubTransport {
        counts: Arc<Counts>,
        id: usize,
        hang: bool,
    }

    #[async_trait]
    impl MetricsTransport for StubTransport {
        async fn write(&mut self, _batch: &PointBatch) -> anyhow::Result<()> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.counts.writes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn ping(&mut self, _timeout: Duration) -> anyhow::Result<Duration> {
            if self.id == 0 {
                Err(anyhow!("first client is broken"))
            } else {
                Ok(Duration::from_millis(1))
            }
        }

        async fn close(&mut self) -> anyhow::Result<()> {
            self.counts.closed.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct StubBuilder {
        counts: Arc<Counts>,
        fail_after: usize,
        hang: bool,
    }

    #[async_trait]
    impl TransportBuilder for StubBuilder {
        async fn build(&self) -> anyhow::Result<Box<dyn MetricsTransport>> {
            let id = self.counts.built.fetch_add(1, Ordering::Relaxed);
            if id >= self.fail_after {
                return Err(anyhow!("build failure"));
            }
            Ok(Box::new(StubTransport {
                counts: self.counts.clone(),
                id,
                hang: self.hang,
            }))
        }
    }

    fn stub(fail_after: usize, hang: bool) -> (Arc<Counts>, Arc<dyn TransportBuilder>) {
        let counts = Arc::new(Counts::default());
        let builder = StubBuilder {
            counts: counts.clone(),
            fail_after,
            hang,
        };
        (counts, Arc::new(builder))
    }

    #[tokio::test]
    async fn rebuild_replaces_client() {
        let (counts, builder) = stub(usize::MAX, false);
        let mut manager = ConnectionManager::build(builder, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(manager.ping().await.is_err());
        manager.rebuild().await.unwrap();
        assert_eq!(counts.built.load(Ordering::Relaxed), 2);
        assert_eq!(counts.closed.load(Ordering::Relaxed), 1);
        assert!(manager.ping().await.is_ok());

        let batch = PointBatch::new(TimestampPrecision::Seconds);
        manager.write(&batch).await.unwrap();
        assert_eq!(counts.writes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn rebuild_failure_keeps_client() {
        let (counts, builder) = stub(1, false);
        let mut manager = ConnectionManager::build(builder, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(manager.rebuild().await.is_err());
        assert_eq!(counts.closed.load(Ordering::Relaxed), 0);

        let batch = PointBatch::new(TimestampPrecision::Seconds);
        manager.write(&batch).await.unwrap();
        assert_eq!(counts.writes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn build_failure() {
        let (_counts, builder) = stub(0, false);
        assert!(
            ConnectionManager::build(builder, Duration::from_secs(1))
                .await
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn write_timeout() {
        let (counts, builder) = stub(usize::MAX, true);
        let mut manager = ConnectionManager::build(builder, Duration::from_secs(5))
            .await
            .unwrap();
        let batch = PointBatch::new(TimestampPrecision::Seconds);
        let e = manager.write(&batch).await.unwrap_err();
        assert!(e.to_string().contains("timed out"));
        assert_eq!(counts.writes.load(Ordering::Relaxed), 0);
    }
}
