/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::net::UdpSocket;

use super::{MetricsTransport, TransportBuildError};
use crate::PointBatch;

pub(super) struct UdpTransport {
    socket: UdpSocket,
    payload_size: usize,
    closed: bool,
}

impl UdpTransport {
    pub(super) async fn connect(
        host: &str,
        port: u16,
        payload_size: usize,
    ) -> Result<Self, TransportBuildError> {
        let peer_s = format!("{host}:{port}");
        let peer = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| TransportBuildError::ResolveFailed(peer_s.clone(), e))?
            .next()
            .ok_or(TransportBuildError::NoAddressResolved(peer_s))?;

        let bind = match peer {
            SocketAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
            SocketAddr::V6(_) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
        };
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(TransportBuildError::UdpSocketFailed)?;
        socket
            .connect(peer)
            .await
            .map_err(TransportBuildError::UdpSocketFailed)?;

        Ok(UdpTransport {
            socket,
            payload_size,
            closed: false,
        })
    }

    async fn send_payload(&self, payload: &[u8]) -> anyhow::Result<()> {
        self.socket
            .send(payload)
            .await
            .map_err(|e| anyhow!("failed to send udp packet: {e}"))?;
        Ok(())
    }
}

/// Pack whole lines into payloads of at most `payload_size` bytes.
///
/// A line longer than the limit is sent alone.
fn pack_lines(batch: &PointBatch, payload_size: usize) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    let mut payload = Vec::with_capacity(payload_size);
    let mut line = Vec::with_capacity(128);
    for point in batch.points() {
        line.clear();
        point.encode_line(batch.precision(), &mut line);
        if !payload.is_empty() && payload.len() + line.len() > payload_size {
            payloads.push(std::mem::replace(
                &mut payload,
                Vec::with_capacity(payload_size),
            ));
        }
        payload.extend_from_slice(&line);
    }
    if !payload.is_empty() {
        payloads.push(payload);
    }
    payloads
}

#[async_trait]
impl MetricsTransport for UdpTransport {
    async fn write(&mut self, batch: &PointBatch) -> anyhow::Result<()> {
        if self.closed {
            return Err(anyhow!("the client has been closed"));
        }
        for payload in pack_lines(batch, self.payload_size) {
            self.send_payload(&payload).await?;
        }
        Ok(())
    }

    async fn ping(&mut self, _timeout: Duration) -> anyhow::Result<Duration> {
        Ok(Duration::ZERO)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};
    use g3_metrics_registry::MetricValue;

    use crate::{Point, TimestampPrecision};

    fn build_batch(n: usize) -> PointBatch {
        let time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut batch = PointBatch::new(TimestampPrecision::Seconds);
        for i in 0..n {
            let point = Point::new(
                format!("m{i}"),
                BTreeMap::new(),
                vec![("value", MetricValue::Signed(1))],
                time,
            )
            .unwrap();
            batch.push(point);
        }
        batch
    }

    #[test]
    fn pack() {
        // each line is "mN value=1i 1700000000\n", 23 bytes
        let batch = build_batch(5);
        let payloads = pack_lines(&batch, 50);
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[0].len(), 46);
        assert_eq!(payloads[2].len(), 23);

        let payloads = pack_lines(&batch, 10);
        assert_eq!(payloads.len(), 5);

        assert!(pack_lines(&build_batch(0), 512).is_empty());
    }

    #[tokio::test]
    async fn write_packets() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut transport = UdpTransport::connect("127.0.0.1", port, 50).await.unwrap();
        transport.write(&build_batch(3)).await.unwrap();

        let mut buf = [0u8; 128];
        let n = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(
            &buf[..n],
            b"m0 value=1i 1700000000\nm1 value=1i 1700000000\n"
        );
        let n = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"m2 value=1i 1700000000\n");

        transport.close().await.unwrap();
        assert!(transport.write(&build_batch(1)).await.is_err());
    }
}
