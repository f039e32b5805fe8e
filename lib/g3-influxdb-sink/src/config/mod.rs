/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use url::Url;

use crate::mapping::PathMappingRule;

mod precision;
pub use precision::TimestampPrecision;

mod tls;
pub use tls::TlsClientConfig;

mod yaml;

const DEFAULT_EMIT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(20);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_UDP_PAYLOAD_SIZE: usize = 512;
const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteConsistency {
    Any,
    One,
    Quorum,
    All,
}

impl WriteConsistency {
    pub fn query_value(self) -> &'static str {
        match self {
            WriteConsistency::Any => "any",
            WriteConsistency::One => "one",
            WriteConsistency::Quorum => "quorum",
            WriteConsistency::All => "all",
        }
    }
}

impl FromStr for WriteConsistency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(WriteConsistency::Any),
            "one" => Ok(WriteConsistency::One),
            "quorum" => Ok(WriteConsistency::Quorum),
            "all" => Ok(WriteConsistency::All),
            _ => Err(anyhow!("invalid write consistency: {s}")),
        }
    }
}

/// Intervals of the optional runtime capture tasks, `None` means disabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsIncludeConfig {
    pub runtime: Option<Duration>,
    pub tokio_runtime: Option<Duration>,
}

impl MetricsIncludeConfig {
    pub fn is_empty(&self) -> bool {
        self.runtime.is_none() && self.tokio_runtime.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct InfluxdbSinkConfig {
    url: Option<Url>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    tls: TlsClientConfig,
    pub(crate) emit_interval: Duration,
    pub(crate) ping_interval: Duration,
    pub(crate) timeout: Duration,
    pub(crate) precision: TimestampPrecision,
    retention_policy: Option<String>,
    write_consistency: Option<WriteConsistency>,
    pub(crate) global_tags: BTreeMap<String, String>,
    pub(crate) include: MetricsIncludeConfig,
    pub(crate) path_mapping: Vec<PathMappingRule>,
    pub(crate) udp_payload_size: usize,
}

impl Default for InfluxdbSinkConfig {
    fn default() -> Self {
        InfluxdbSinkConfig {
            url: None,
            database: None,
            username: None,
            password: None,
            tls: TlsClientConfig::default(),
            emit_interval: DEFAULT_EMIT_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            precision: TimestampPrecision::default(),
            retention_policy: None,
            write_consistency: None,
            global_tags: BTreeMap::new(),
            include: MetricsIncludeConfig::default(),
            path_mapping: Vec::new(),
            udp_payload_size: DEFAULT_UDP_PAYLOAD_SIZE,
        }
    }
}

impl InfluxdbSinkConfig {
    pub fn new(url: &str, database: &str) -> anyhow::Result<Self> {
        let mut config = InfluxdbSinkConfig::default();
        config.set_url(url)?;
        config.set_database(database.to_string());
        Ok(config)
    }

    pub fn set_url(&mut self, url: &str) -> anyhow::Result<()> {
        let url = Url::parse(url).map_err(|e| anyhow!("invalid url {url}: {e}"))?;
        if url.host_str().is_none() {
            return Err(anyhow!("no host found in url {url}"));
        }
        self.url = Some(url);
        Ok(())
    }

    pub fn set_database(&mut self, db: String) {
        self.database = Some(db);
    }

    pub fn set_username(&mut self, username: String) {
        self.username = Some(username);
    }

    pub fn set_password(&mut self, password: String) {
        self.password = Some(password);
    }

    pub fn set_tls_client(&mut self, tls: TlsClientConfig) {
        self.tls = tls;
    }

    pub fn set_emit_interval(&mut self, interval: Duration) {
        self.emit_interval = interval;
    }

    pub fn set_ping_interval(&mut self, interval: Duration) {
        self.ping_interval = interval;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_precision(&mut self, precision: TimestampPrecision) {
        self.precision = precision;
    }

    pub fn set_retention_policy(&mut self, rp: String) {
        self.retention_policy = Some(rp);
    }

    pub fn set_write_consistency(&mut self, consistency: WriteConsistency) {
        self.write_consistency = Some(consistency);
    }

    pub fn add_global_tag(&mut self, key: &str, value: &str) {
        self.global_tags.insert(key.to_string(), value.to_string());
    }

    pub fn set_include(&mut self, include: MetricsIncludeConfig) {
        self.include = include;
    }

    pub fn push_path_mapping_rule(&mut self, rule: PathMappingRule) {
        self.path_mapping.push(rule);
    }

    pub fn set_udp_payload_size(&mut self, size: usize) {
        self.udp_payload_size = size;
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub(crate) fn tls_client(&self) -> &TlsClientConfig {
        &self.tls
    }

    pub(crate) fn basic_auth(&self) -> Option<(&str, &str)> {
        self.username
            .as_deref()
            .map(|u| (u, self.password.as_deref().unwrap_or_default()))
    }

    fn is_http(&self) -> bool {
        self.url
            .as_ref()
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.url.is_none() {
            return Err(anyhow!("url is not set"));
        }
        if self.is_http() {
            if self.database.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
                return Err(anyhow!("database is required for http(s) endpoint"));
            }
            self.tls.check()?;
        }
        if self.emit_interval.is_zero() {
            return Err(anyhow!("emit interval should not be zero"));
        }
        if self.ping_interval.is_zero() {
            return Err(anyhow!("ping interval should not be zero"));
        }
        if self.timeout.is_zero() {
            return Err(anyhow!("timeout should not be zero"));
        }
        if self.udp_payload_size == 0 {
            return Err(anyhow!("udp payload size should not be zero"));
        }
        if self.include.runtime.is_some_and(|d| d.is_zero()) {
            return Err(anyhow!("runtime capture interval should not be zero"));
        }
        if self.include.tokio_runtime.is_some_and(|d| d.is_zero()) {
            return Err(anyhow!("tokio runtime capture interval should not be zero"));
        }
        Ok(())
    }

    fn path_prefix(&self) -> &str {
        self.url
            .as_ref()
            .map(|u| u.path().trim_end_matches('/'))
            .unwrap_or_default()
    }

    /// Request target of the write api, with the query string.
    pub(crate) fn build_write_path(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(db) = &self.database {
            query.append_pair("db", db);
        }
        query.append_pair("precision", self.precision.query_value());
        if let Some(rp) = &self.retention_policy {
            query.append_pair("rp", rp);
        }
        if let Some(consistency) = self.write_consistency {
            query.append_pair("consistency", consistency.query_value());
        }
        format!("{}/write?{}", self.path_prefix(), query.finish())
    }

    pub(crate) fn build_ping_path(&self) -> String {
        format!("{}/ping", self.path_prefix())
    }
}
