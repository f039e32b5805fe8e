/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

use super::{
    DEFAULT_CAPTURE_INTERVAL, InfluxdbSinkConfig, MetricsIncludeConfig, TimestampPrecision,
    TlsClientConfig, WriteConsistency,
};
use crate::mapping::PathMappingRule;
use crate::yaml;

impl MetricsIncludeConfig {
    fn parse_interval(v: &Yaml) -> anyhow::Result<Option<std::time::Duration>> {
        match v {
            Yaml::Boolean(true) => Ok(Some(DEFAULT_CAPTURE_INTERVAL)),
            Yaml::Boolean(false) | Yaml::Null => Ok(None),
            _ => {
                let interval = yaml::as_duration(v)?;
                if interval.is_zero() {
                    Ok(None)
                } else {
                    Ok(Some(interval))
                }
            }
        }
    }

    pub(super) fn parse_yaml(v: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = v {
            let mut config = MetricsIncludeConfig::default();
            yaml::foreach_kv(map, |k, v| match yaml::normalize_key(k).as_str() {
                "runtime" | "process" => {
                    config.runtime = Self::parse_interval(v)
                        .context(format!("invalid interval value for key {k}"))?;
                    Ok(())
                }
                "tokio_runtime" | "tokio" => {
                    config.tokio_runtime = Self::parse_interval(v)
                        .context(format!("invalid interval value for key {k}"))?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            Ok(config)
        } else {
            Err(anyhow!("yaml value type for 'include' should be 'map'"))
        }
    }
}

impl InfluxdbSinkConfig {
    pub fn parse_yaml(v: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = v {
            let mut config = InfluxdbSinkConfig::default();
            yaml::foreach_kv(map, |k, v| config.set_by_yaml_kv(k, v))?;
            config.check()?;
            Ok(config)
        } else {
            Err(anyhow!(
                "yaml value type for 'influxdb sink config' should be 'map'"
            ))
        }
    }

    fn set_by_yaml_kv(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match yaml::normalize_key(k).as_str() {
            "url" | "addr" | "address" => {
                let url = yaml::as_string(v).context(format!("invalid string value for key {k}"))?;
                self.set_url(&url)
                    .context(format!("invalid url value for key {k}"))?;
            }
            "db" | "database" => {
                let db = yaml::as_string(v).context(format!("invalid string value for key {k}"))?;
                self.set_database(db);
            }
            "username" | "user" => {
                let name =
                    yaml::as_string(v).context(format!("invalid string value for key {k}"))?;
                self.set_username(name);
            }
            "password" => {
                let password =
                    yaml::as_string(v).context(format!("invalid string value for key {k}"))?;
                self.set_password(password);
            }
            "tls" | "tls_client" => {
                self.tls = TlsClientConfig::parse_yaml(v)
                    .context(format!("invalid tls client config value for key {k}"))?;
            }
            "interval" | "emit_interval" => {
                self.emit_interval = yaml::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
            }
            "ping_interval" => {
                self.ping_interval = yaml::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
            }
            "timeout" => {
                self.timeout = yaml::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
            }
            "precision" => {
                self.precision = TimestampPrecision::parse_yaml(v)
                    .context(format!("invalid timestamp precision value for key {k}"))?;
            }
            "retention_policy" | "rp" => {
                let rp = yaml::as_string(v).context(format!("invalid string value for key {k}"))?;
                self.set_retention_policy(rp);
            }
            "write_consistency" | "consistency" => {
                let s = yaml::as_string(v).context(format!("invalid string value for key {k}"))?;
                let consistency = s
                    .parse::<WriteConsistency>()
                    .context(format!("invalid write consistency value for key {k}"))?;
                self.set_write_consistency(consistency);
            }
            "tags" | "global_tags" => {
                let tags = yaml::as_string_map(v)
                    .context(format!("invalid string map value for key {k}"))?;
                self.global_tags.extend(tags);
            }
            "include" => {
                self.include = MetricsIncludeConfig::parse_yaml(v)
                    .context(format!("invalid include config value for key {k}"))?;
            }
            "path_mapping" => {
                if let Yaml::Array(seq) = v {
                    for (i, rule) in seq.iter().enumerate() {
                        let rule = PathMappingRule::parse_yaml(rule)
                            .context(format!("invalid path mapping rule #{i} for key {k}"))?;
                        self.push_path_mapping_rule(rule);
                    }
                } else {
                    return Err(anyhow!("yaml value type for key {k} should be 'array'"));
                }
            }
            "udp_payload_size" | "max_payload_size" => {
                self.udp_payload_size =
                    yaml::as_usize(v).context(format!("invalid usize value for key {k}"))?;
            }
            _ => return Err(anyhow!("invalid key {k}")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_yaml_ok() {
        let yaml = yaml_doc!(
            r#"
                url: http://127.0.0.1:8086
                db: metrics
                username: writer
                password: secret
                emit_interval: 10s
                ping-interval: 30s
                timeout: 2s
                precision: ms
                retention_policy: one_week
                write_consistency: all
                tags:
                  zone: a
                  host: node1
                include:
                  runtime: 5s
                  tokio_runtime: true
                udp_payload_size: 1400
            "#
        );
        let config = InfluxdbSinkConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.url().unwrap().as_str(), "http://127.0.0.1:8086/");
        assert_eq!(config.database(), Some("metrics"));
        assert_eq!(config.basic_auth(), Some(("writer", "secret")));
        assert_eq!(config.emit_interval, Duration::from_secs(10));
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.precision, TimestampPrecision::MilliSeconds);
        assert_eq!(config.global_tags.len(), 2);
        assert_eq!(config.global_tags.get("zone").unwrap(), "a");
        assert_eq!(config.include.runtime, Some(Duration::from_secs(5)));
        assert_eq!(config.include.tokio_runtime, Some(DEFAULT_CAPTURE_INTERVAL));
        assert_eq!(config.udp_payload_size, 1400);
        assert_eq!(
            config.build_write_path(),
            "/write?db=metrics&precision=ms&rp=one_week&consistency=all"
        );
    }

    #[test]
    fn parse_yaml_interval_alias() {
        let yaml = yaml_doc!(
            r#"
                url: udp://127.0.0.1:8089
                interval: 15
            "#
        );
        let config = InfluxdbSinkConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.emit_interval, Duration::from_secs(15));
    }

    #[test]
    fn parse_yaml_path_mapping() {
        let yaml = yaml_doc!(
            r#"
                url: udp://127.0.0.1:8089
                path_mapping:
                  - match: '^output\.(\w+)\.sent$'
                    name: output_sent
                    tags:
                      output: '$1'
                  - match: '^internal\.'
                    drop: true
            "#
        );
        let config = InfluxdbSinkConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.path_mapping.len(), 2);
    }

    #[test]
    fn parse_yaml_err() {
        let yaml = yaml_doc!("db: metrics");
        assert!(InfluxdbSinkConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc!(
            r#"
                url: http://127.0.0.1:8086
            "#
        );
        assert!(InfluxdbSinkConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc!(
            r#"
                url: udp://127.0.0.1:8089
                unknown: 1
            "#
        );
        assert!(InfluxdbSinkConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc!(
            r#"
                url: udp://127.0.0.1:8089
                precision: minute
            "#
        );
        assert!(InfluxdbSinkConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc!(
            r#"
                url: udp://127.0.0.1:8089
                path_mapping:
                  match: '^a'
            "#
        );
        assert!(InfluxdbSinkConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc!(
            r#"
                url: udp://127.0.0.1:8089
                include:
                  heap: 1s
            "#
        );
        assert!(InfluxdbSinkConfig::parse_yaml(&yaml).is_err());

        assert!(InfluxdbSinkConfig::parse_yaml(&Yaml::Null).is_err());
    }
}
