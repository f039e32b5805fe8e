/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::marker::PhantomData;
use std::sync::Arc;

use log::debug;

use g3_metrics_registry::encode_name;

use super::SinkShared;
use super::stat::VectorMetric;
use crate::MappedPath;

struct VectorTarget {
    shared: Arc<SinkShared>,
    mapped: MappedPath,
    label_count: usize,
}

/// A family of metrics sharing a base path, one per label value tuple.
///
/// Nothing is registered until `with_labels` is called.
pub struct MetricVector<T> {
    target: Option<VectorTarget>,
    _metric: PhantomData<fn() -> T>,
}

impl<T: VectorMetric> MetricVector<T> {
    pub(super) fn noop() -> Self {
        MetricVector {
            target: None,
            _metric: PhantomData,
        }
    }

    pub(super) fn new<S: AsRef<str>>(
        shared: Arc<SinkShared>,
        mut mapped: MappedPath,
        label_names: &[S],
    ) -> Self {
        if mapped.tag_keys.len() != mapped.tag_values.len() {
            debug!(
                "metric {}: mapped {} tag keys but {} tag values",
                mapped.name,
                mapped.tag_keys.len(),
                mapped.tag_values.len()
            );
            return MetricVector::noop();
        }
        mapped
            .tag_keys
            .extend(label_names.iter().map(|s| s.as_ref().to_string()));
        MetricVector {
            target: Some(VectorTarget {
                shared,
                mapped,
                label_count: label_names.len(),
            }),
            _metric: PhantomData,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.target.is_none()
    }

    pub fn with_labels<S: AsRef<str>>(&self, label_values: &[S]) -> T {
        let Some(target) = &self.target else {
            return T::default();
        };
        if target.shared.is_closed() {
            return T::default();
        }
        if label_values.len() != target.label_count {
            debug!(
                "metric {}: expect {} label values but got {}",
                target.mapped.name,
                target.label_count,
                label_values.len()
            );
            return T::default();
        }

        let mut values = target.mapped.tag_values.clone();
        values.extend(label_values.iter().map(|s| s.as_ref().to_string()));
        let key = encode_name(&target.mapped.name, &target.mapped.tag_keys, &values);
        T::lookup(&target.shared.registry, &key)
    }
}
