/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::{InfluxdbSinkConfig, PointBatch};

mod http;
use self::http::{HttpTransport, HttpTransportConfig};

mod udp;
use udp::UdpTransport;

const DEFAULT_UDP_PORT: u16 = 8089;

#[derive(Debug, Error)]
pub enum TransportBuildError {
    #[error("no url has been set")]
    NoUrl,
    #[error("no host found in url")]
    NoHost,
    #[error("unsupported url scheme {0}")]
    UnsupportedScheme(String),
    #[error("invalid tls client config: {0:?}")]
    InvalidTlsConfig(anyhow::Error),
    #[error("failed to resolve {0}: {1}")]
    ResolveFailed(String, io::Error),
    #[error("no address resolved for {0}")]
    NoAddressResolved(String),
    #[error("failed to setup udp socket: {0}")]
    UdpSocketFailed(io::Error),
}

/// A client connection to the metrics database.
#[async_trait]
pub trait MetricsTransport: Send {
    async fn write(&mut self, batch: &PointBatch) -> anyhow::Result<()>;

    /// Check the health of the remote end, returning the round trip time.
    async fn ping(&mut self, timeout: Duration) -> anyhow::Result<Duration>;

    async fn close(&mut self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TransportBuilder: Send + Sync {
    async fn build(&self) -> anyhow::Result<Box<dyn MetricsTransport>>;
}

enum Endpoint {
    Http(Arc<HttpTransportConfig>),
    Udp {
        host: String,
        port: u16,
        payload_size: usize,
    },
}

/// Builds transports from the endpoint url scheme, `http`, `https` or `udp`.
pub struct EndpointTransportBuilder {
    endpoint: Endpoint,
}

impl EndpointTransportBuilder {
    pub fn new(config: &InfluxdbSinkConfig) -> Result<Self, TransportBuildError> {
        let url = config.url().ok_or(TransportBuildError::NoUrl)?;
        let host = url
            .host_str()
            .ok_or(TransportBuildError::NoHost)?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let endpoint = match url.scheme() {
            "http" | "https" => {
                let http_config = HttpTransportConfig::new(config, host)?;
                Endpoint::Http(Arc::new(http_config))
            }
            "udp" => Endpoint::Udp {
                host,
                port: url.port().unwrap_or(DEFAULT_UDP_PORT),
                payload_size: config.udp_payload_size,
            },
            s => return Err(TransportBuildError::UnsupportedScheme(s.to_string())),
        };
        Ok(EndpointTransportBuilder { endpoint })
    }
}

#[async_trait]
impl TransportBuilder for EndpointTransportBuilder {
    async fn build(&self) -> anyhow::Result<Box<dyn MetricsTransport>> {
        match &self.endpoint {
            Endpoint::Http(config) => Ok(Box::new(HttpTransport::new(config.clone()))),
            Endpoint::Udp {
                host,
                port,
                payload_size,
            } => {
                let transport = UdpTransport::connect(host, *port, *payload_size).await?;
                Ok(Box::new(transport))
            }
        }
    }
}
