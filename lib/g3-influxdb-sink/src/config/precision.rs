/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use yaml_rust::Yaml;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimestampPrecision {
    #[default]
    Seconds,
    MilliSeconds,
    MicroSeconds,
    NanoSeconds,
}

impl TimestampPrecision {
    pub fn query_value(self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::MilliSeconds => "ms",
            Self::MicroSeconds => "us",
            Self::NanoSeconds => "ns",
        }
    }

    /// Timestamp in this precision, truncated toward the epoch.
    ///
    /// Nanosecond values out of the i64 range fall back to microseconds
    /// scaled up, which saturates.
    pub fn timestamp(self, time: &DateTime<Utc>) -> i64 {
        match self {
            Self::Seconds => time.timestamp(),
            Self::MilliSeconds => time.timestamp_millis(),
            Self::MicroSeconds => time.timestamp_micros(),
            Self::NanoSeconds => time
                .timestamp_nanos_opt()
                .unwrap_or_else(|| time.timestamp_micros().saturating_mul(1000)),
        }
    }

    pub(super) fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::String(s) = value {
            TimestampPrecision::from_str(s)
        } else {
            Err(anyhow!(
                "yaml value type for timestamp precision should be string"
            ))
        }
    }
}

impl FromStr for TimestampPrecision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s" | "second" | "seconds" => Ok(TimestampPrecision::Seconds),
            "ms" | "millisecond" | "milliseconds" => Ok(TimestampPrecision::MilliSeconds),
            "us" | "microsecond" | "microseconds" => Ok(TimestampPrecision::MicroSeconds),
            "ns" | "nanosecond" | "nanoseconds" => Ok(TimestampPrecision::NanoSeconds),
            _ => Err(anyhow!("invalid timestamp precision: {s}")),
        }
    }
}
