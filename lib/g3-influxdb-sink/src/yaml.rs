/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use humanize_rs::ParseError;
use yaml_rust::{Yaml, yaml};

pub(crate) fn normalize_key(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}

pub(crate) fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

pub(crate) fn as_string(v: &Yaml) -> anyhow::Result<String> {
    match v {
        Yaml::String(s) => Ok(s.to_string()),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Real(s) => Ok(s.to_string()),
        _ => Err(anyhow!(
            "yaml value type for string should be 'string' / 'integer' / 'real'"
        )),
    }
}

pub(crate) fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(anyhow!("invalid yaml string value for 'bool': {s}")),
        },
        Yaml::Boolean(value) => Ok(*value),
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!(
            "yaml value type for 'bool' should be 'boolean' / 'string' / 'integer'"
        )),
    }
}

pub(crate) fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(s) => Ok(usize::from_str(s)?),
        Yaml::Integer(i) => Ok(usize::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'usize' should be 'string' or 'integer'"
        )),
    }
}

pub(crate) fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(value) => match humanize_rs::duration::parse(value) {
            Ok(v) => Ok(v),
            Err(ParseError::MissingUnit) => {
                if let Ok(u) = u64::from_str(value) {
                    Ok(Duration::from_secs(u))
                } else {
                    Err(anyhow!("invalid duration string"))
                }
            }
            Err(e) => Err(anyhow!("invalid humanize duration string: {e}")),
        },
        Yaml::Integer(value) => {
            if let Ok(u) = u64::try_from(*value) {
                Ok(Duration::from_secs(u))
            } else {
                Err(anyhow!("unsupported duration string"))
            }
        }
        Yaml::Real(s) => {
            let f = f64::from_str(s).map_err(|e| anyhow!("invalid f64 value: {e}"))?;
            Duration::try_from_secs_f64(f).map_err(anyhow::Error::new)
        }
        _ => Err(anyhow!(
            "yaml value type for humanize duration should be 'string' or 'integer' or 'real'"
        )),
    }
}

pub(crate) fn as_absolute_path(v: &Yaml) -> anyhow::Result<PathBuf> {
    if let Yaml::String(path) = v {
        let path = PathBuf::from_str(path).map_err(|e| anyhow!("invalid path: {e:?}"))?;
        if path.is_absolute() {
            Ok(path)
        } else {
            Err(anyhow!("the path should be absolute"))
        }
    } else {
        Err(anyhow!("yaml value type for 'path' should be 'string'"))
    }
}

pub(crate) fn as_string_map(v: &Yaml) -> anyhow::Result<BTreeMap<String, String>> {
    if let Yaml::Hash(map) = v {
        let mut tags = BTreeMap::new();
        foreach_kv(map, |k, v| {
            let value = as_string(v).context(format!("invalid string value for key {k}"))?;
            if tags.insert(k.to_string(), value).is_some() {
                Err(anyhow!("found duplicate value for key {k}"))
            } else {
                Ok(())
            }
        })?;
        Ok(tags)
    } else {
        Err(anyhow!("yaml value type for 'string map' should be 'map'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key() {
        assert_eq!(normalize_key("Ping-Interval"), "ping_interval");
    }

    #[test]
    fn duration() {
        let v = Yaml::String("1h2m".to_string());
        assert_eq!(as_duration(&v).unwrap(), Duration::from_secs(3600 + 120));

        let v = Yaml::String("100ms".to_string());
        assert_eq!(as_duration(&v).unwrap(), Duration::from_millis(100));

        let v = Yaml::String("1000".to_string());
        assert_eq!(as_duration(&v).unwrap(), Duration::from_secs(1000));

        let v = Yaml::String("-1000h".to_string());
        assert!(as_duration(&v).is_err());

        let v = Yaml::String("foo".to_string());
        assert!(as_duration(&v).is_err());

        let v = Yaml::Integer(-1);
        assert!(as_duration(&v).is_err());

        let v = Yaml::Array(vec![Yaml::Integer(1)]);
        assert!(as_duration(&v).is_err());
    }

    #[test]
    fn bool_value() {
        assert!(as_bool(&Yaml::Boolean(true)).unwrap());
        assert!(!as_bool(&Yaml::String("off".to_string())).unwrap());
        assert!(as_bool(&Yaml::String("maybe".to_string())).is_err());
    }

    #[test]
    fn string_map() {
        let v = yaml_doc!("hostname: localhost\nzone: danger\nport: 8086");
        let map = as_string_map(&v).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("zone").unwrap(), "danger");
        assert_eq!(map.get("port").unwrap(), "8086");

        let v = yaml_doc!("- a\n- b");
        assert!(as_string_map(&v).is_err());
    }

    #[test]
    fn absolute_path() {
        let v = Yaml::String("/etc/ssl/ca.pem".to_string());
        assert_eq!(as_absolute_path(&v).unwrap(), PathBuf::from("/etc/ssl/ca.pem"));

        let v = Yaml::String("relative/ca.pem".to_string());
        assert!(as_absolute_path(&v).is_err());
    }
}
