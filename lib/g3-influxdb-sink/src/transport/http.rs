/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use log::trace;
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_rustls::TlsConnector;

use super::{MetricsTransport, TransportBuildError};
use crate::{InfluxdbSinkConfig, PointBatch};

const MAX_RESPONSE_SIZE: usize = 64 * 1024;
const MAX_RESPONSE_HEADERS: usize = 64;

struct TlsContext {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

pub(super) struct HttpTransportConfig {
    host: String,
    port: u16,
    tls: Option<TlsContext>,
    write_path: String,
    ping_path: String,
    static_headers: HeaderMap,
}

impl HttpTransportConfig {
    pub(super) fn new(
        config: &InfluxdbSinkConfig,
        host: String,
    ) -> Result<Self, TransportBuildError> {
        let url = config.url().ok_or(TransportBuildError::NoUrl)?;
        let port = url.port_or_known_default().unwrap_or(8086);

        let tls = if url.scheme() == "https" {
            let tls_config = config.tls_client();
            let client_config = tls_config
                .build()
                .map_err(TransportBuildError::InvalidTlsConfig)?;
            let server_name = tls_config
                .server_name(&host)
                .map_err(TransportBuildError::InvalidTlsConfig)?;
            Some(TlsContext {
                connector: TlsConnector::from(client_config),
                server_name,
            })
        } else {
            None
        };

        let mut static_headers = HeaderMap::new();
        let host_value = match url.port() {
            Some(port) => format!("{}:{port}", url.host_str().unwrap_or(&host)),
            None => url.host_str().unwrap_or(&host).to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&host_value) {
            static_headers.insert(header::HOST, value);
        }
        static_headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(concat!("g3-influxdb-sink/", env!("CARGO_PKG_VERSION"))),
        );
        static_headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        if let Some((username, password)) = config.basic_auth() {
            let token = BASE64_STANDARD.encode(format!("{username}:{password}"));
            if let Ok(mut value) = HeaderValue::from_str(&format!("Basic {token}")) {
                value.set_sensitive(true);
                static_headers.insert(header::AUTHORIZATION, value);
            }
        }

        Ok(HttpTransportConfig {
            host,
            port,
            tls,
            write_path: config.build_write_path(),
            ping_path: config.build_ping_path(),
            static_headers,
        })
    }

    fn write_request_header(
        &self,
        method: &Method,
        path: &str,
        extra_headers: &[(HeaderName, HeaderValue)],
        header_buf: &mut Vec<u8>,
    ) {
        header_buf.extend_from_slice(method.as_str().as_bytes());
        header_buf.push(b' ');
        header_buf.extend_from_slice(path.as_bytes());
        header_buf.extend_from_slice(b" HTTP/1.1\r\n");
        let headers = self
            .static_headers
            .iter()
            .chain(extra_headers.iter().map(|(k, v)| (k, v)));
        for (name, value) in headers {
            header_buf.extend_from_slice(name.as_str().as_bytes());
            header_buf.extend_from_slice(b": ");
            header_buf.extend_from_slice(value.as_bytes());
            header_buf.extend_from_slice(b"\r\n");
        }
        header_buf.extend_from_slice(b"\r\n");
    }
}

struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl HttpResponse {
    fn parse(mut data: &[u8]) -> anyhow::Result<Self> {
        loop {
            let mut header_slots = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
            let mut rsp = httparse::Response::new(&mut header_slots);
            let header_len = match rsp.parse(data) {
                Ok(httparse::Status::Complete(n)) => n,
                Ok(httparse::Status::Partial) => {
                    return Err(anyhow!("incomplete response header"));
                }
                Err(e) => return Err(anyhow!("invalid response header: {e}")),
            };
            let code = rsp
                .code
                .ok_or_else(|| anyhow!("no status code in response"))?;
            let status = StatusCode::from_u16(code)
                .map_err(|e| anyhow!("invalid status code {code}: {e}"))?;
            if status.is_informational() {
                trace!("skipped interim response {status}");
                data = &data[header_len..];
                continue;
            }

            let mut headers = HeaderMap::with_capacity(rsp.headers.len());
            for h in rsp.headers.iter() {
                let name = HeaderName::from_bytes(h.name.as_bytes())
                    .map_err(|e| anyhow!("invalid header name {}: {e}", h.name))?;
                let value = HeaderValue::from_bytes(h.value)
                    .map_err(|e| anyhow!("invalid value for header {name}: {e}"))?;
                headers.append(name, value);
            }

            let raw_body = &data[header_len..];
            let chunked = headers
                .get(header::TRANSFER_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.eq_ignore_ascii_case("chunked"))
                .unwrap_or(false);
            let body = if chunked {
                decode_chunked(raw_body)?
            } else if let Some(len) = headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| usize::from_str(v).ok())
            {
                raw_body[..len.min(raw_body.len())].to_vec()
            } else {
                raw_body.to_vec()
            };

            return Ok(HttpResponse {
                status,
                headers,
                body,
            });
        }
    }

    fn error_detail(&self) -> String {
        let detail = String::from_utf8_lossy(&self.body);
        let detail = detail.trim();
        if detail.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {detail}", self.status)
        }
    }
}

fn decode_chunked(mut data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut body = Vec::with_capacity(data.len());
    loop {
        let line_end = memchr::memmem::find(data, b"\r\n")
            .ok_or_else(|| anyhow!("incomplete chunk size line"))?;
        let size_line = std::str::from_utf8(&data[..line_end])
            .map_err(|_| anyhow!("invalid chunk size line"))?;
        let size_s = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_s, 16)
            .map_err(|e| anyhow!("invalid chunk size {size_s}: {e}"))?;
        data = &data[line_end + 2..];
        if size == 0 {
            return Ok(body);
        }
        if data.len() < size {
            body.extend_from_slice(data);
            return Ok(body);
        }
        body.extend_from_slice(&data[..size]);
        data = &data[size..];
        data = data.strip_prefix(b"\r\n").unwrap_or(data);
    }
}

async fn exchange<S>(mut stream: S, header: &[u8], body: &[u8]) -> anyhow::Result<HttpResponse>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(header)
        .await
        .map_err(|e| anyhow!("failed to send request header: {e}"))?;
    if !body.is_empty() {
        stream
            .write_all(body)
            .await
            .map_err(|e| anyhow!("failed to send request body: {e}"))?;
    }
    stream
        .flush()
        .await
        .map_err(|e| anyhow!("failed to flush request: {e}"))?;

    let mut buf = Vec::with_capacity(1024);
    loop {
        if buf.len() > MAX_RESPONSE_SIZE {
            break;
        }
        match stream.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            // peers may close without tls close_notify
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !buf.is_empty() => break,
            Err(e) => return Err(anyhow!("failed to read response: {e}")),
        }
    }
    let _ = stream.shutdown().await;

    HttpResponse::parse(&buf)
}

pub(super) struct HttpTransport {
    config: Arc<HttpTransportConfig>,
    closed: bool,
    header_buf: Vec<u8>,
}

impl HttpTransport {
    pub(super) fn new(config: Arc<HttpTransportConfig>) -> Self {
        HttpTransport {
            config,
            closed: false,
            header_buf: Vec::with_capacity(512),
        }
    }

    async fn send_request(
        &mut self,
        method: Method,
        path: &str,
        extra_headers: &[(HeaderName, HeaderValue)],
        body: &[u8],
    ) -> anyhow::Result<HttpResponse> {
        if self.closed {
            return Err(anyhow!("the client has been closed"));
        }

        self.header_buf.clear();
        self.config
            .write_request_header(&method, path, extra_headers, &mut self.header_buf);

        let config = &self.config;
        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|e| anyhow!("failed to connect to {}:{}: {e}", config.host, config.port))?;
        let _ = stream.set_nodelay(true);

        if let Some(tls) = &config.tls {
            let tls_stream = tls
                .connector
                .connect(tls.server_name.clone(), stream)
                .await
                .map_err(|e| anyhow!("tls handshake with {} failed: {e}", config.host))?;
            exchange(tls_stream, &self.header_buf, body).await
        } else {
            exchange(stream, &self.header_buf, body).await
        }
    }
}

#[async_trait]
impl MetricsTransport for HttpTransport {
    async fn write(&mut self, batch: &PointBatch) -> anyhow::Result<()> {
        if self.closed {
            return Err(anyhow!("the client has been closed"));
        }
        if batch.is_empty() {
            return Ok(());
        }
        let body = batch.encode();
        let extra_headers = [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(body.len())),
        ];
        let path = self.config.write_path.clone();
        let rsp = self
            .send_request(Method::POST, &path, &extra_headers, &body)
            .await
            .context("write request failed")?;
        if rsp.status.is_success() {
            Ok(())
        } else {
            Err(anyhow!("write failed: {}", rsp.error_detail()))
        }
    }

    async fn ping(&mut self, timeout: Duration) -> anyhow::Result<Duration> {
        let start = Instant::now();
        let path = self.config.ping_path.clone();
        let rsp = tokio::time::timeout(timeout, self.send_request(Method::GET, &path, &[], &[]))
            .await
            .map_err(|_| anyhow!("ping timed out after {timeout:?}"))?
            .context("ping request failed")?;
        match rsp.status {
            StatusCode::NO_CONTENT | StatusCode::OK => {
                if let Some(version) = rsp
                    .headers
                    .get("X-Influxdb-Version")
                    .and_then(|v| v.to_str().ok())
                {
                    trace!("influxdb server version {version}");
                }
                Ok(start.elapsed())
            }
            _ => Err(anyhow!("ping failed: {}", rsp.error_detail())),
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        Ok(())
    }
}
