/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use g3_metrics_registry::{MetricFields, MetricValue};

use crate::TimestampPrecision;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PointError {
    #[error("empty measurement name")]
    EmptyMeasurement,
    #[error("no field in point {0}")]
    NoFields(String),
    #[error("non-finite value for field {1} in point {0}")]
    NonFiniteField(String, &'static str),
    #[error("invalid measurement name {0:?}")]
    InvalidMeasurement(String),
    #[error("invalid tag {1:?} in point {0}")]
    InvalidTag(String, String),
}

/// Line breaks can not be escaped, and a trailing escape char would eat the
/// following separator.
fn is_encodable(s: &str) -> bool {
    !s.ends_with('\\') && memchr::memchr2(b'\n', b'\r', s.as_bytes()).is_none()
}

/// A single measurement ready to be written.
#[derive(Clone, Debug)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: MetricFields,
    time: DateTime<Utc>,
}

impl Point {
    pub fn new(
        measurement: String,
        tags: BTreeMap<String, String>,
        fields: MetricFields,
        time: DateTime<Utc>,
    ) -> Result<Self, PointError> {
        if measurement.is_empty() {
            return Err(PointError::EmptyMeasurement);
        }
        if !is_encodable(&measurement) {
            return Err(PointError::InvalidMeasurement(measurement));
        }
        if let Some((k, v)) = tags
            .iter()
            .find(|(k, v)| !is_encodable(k) || !is_encodable(v))
        {
            let tag = format!("{k}={v}");
            return Err(PointError::InvalidTag(measurement, tag));
        }
        if fields.is_empty() {
            return Err(PointError::NoFields(measurement));
        }
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PointError::NonFiniteField(measurement, *name));
        }
        Ok(Point {
            measurement,
            tags,
            fields,
            time,
        })
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|s| s.as_str())
    }

    pub fn fields(&self) -> &[(&'static str, MetricValue)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<MetricValue> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
    }

    pub fn time(&self) -> &DateTime<Utc> {
        &self.time
    }

    /// Append the line protocol form, with a trailing newline.
    pub fn encode_line(&self, precision: TimestampPrecision, buf: &mut Vec<u8>) {
        escape_into(&self.measurement, b", ", buf);
        for (k, v) in &self.tags {
            if k.is_empty() || v.is_empty() {
                continue;
            }
            buf.push(b',');
            escape_into(k, b",= ", buf);
            buf.push(b'=');
            escape_into(v, b",= ", buf);
        }

        let mut sep = b' ';
        for (name, value) in &self.fields {
            buf.push(sep);
            sep = b',';
            escape_into(name, b",= ", buf);
            buf.push(b'=');
            match value {
                MetricValue::Signed(i) => {
                    buf.extend_from_slice(itoa::Buffer::new().format(*i).as_bytes());
                    buf.push(b'i');
                }
                MetricValue::Double(_) => {
                    buf.extend_from_slice(value.to_string().as_bytes());
                }
            }
        }

        buf.push(b' ');
        let ts = precision.timestamp(&self.time);
        buf.extend_from_slice(itoa::Buffer::new().format(ts).as_bytes());
        buf.push(b'\n');
    }
}

fn escape_into(s: &str, special: &[u8], buf: &mut Vec<u8>) {
    for b in s.bytes() {
        if special.contains(&b) {
            buf.push(b'\\');
        }
        buf.push(b);
    }
}

/// Points of one flush cycle.
#[derive(Clone, Debug)]
pub struct PointBatch {
    precision: TimestampPrecision,
    points: Vec<Point>,
}

impl PointBatch {
    pub fn new(precision: TimestampPrecision) -> Self {
        PointBatch {
            precision,
            points: Vec::new(),
        }
    }

    pub fn with_capacity(precision: TimestampPrecision, capacity: usize) -> Self {
        PointBatch {
            precision,
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn precision(&self) -> TimestampPrecision {
        self.precision
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn find(&self, measurement: &str) -> Option<&Point> {
        self.points.iter().find(|p| p.measurement == measurement)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.points.len() * 64);
        for point in &self.points {
            point.encode_line(self.precision, &mut buf);
        }
        buf
    }
}
