/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Double(f64),
    Signed(i64),
}

impl MetricValue {
    pub fn is_finite(&self) -> bool {
        match self {
            MetricValue::Double(f) => f.is_finite(),
            MetricValue::Signed(_) => true,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Signed(i) => itoa::Buffer::new().format(*i).fmt(f),
            MetricValue::Double(v) => ryu::Buffer::new().format(*v).fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(MetricValue::Signed(-10).to_string(), "-10");
        assert_eq!(MetricValue::Double(1.0).to_string(), "1.0");
        assert_eq!(MetricValue::Double(0.25).to_string(), "0.25");
    }

    #[test]
    fn finite() {
        assert!(MetricValue::Signed(1).is_finite());
        assert!(!MetricValue::Double(f64::NAN).is_finite());
        assert!(!MetricValue::Double(f64::INFINITY).is_finite());
    }
}
