/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod rule;
pub use rule::{PathMappingRule, RulePathMapping};

/// Result of mapping a dotted metric path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappedPath {
    pub name: String,
    pub tag_keys: Vec<String>,
    pub tag_values: Vec<String>,
}

impl MappedPath {
    pub fn new(name: String) -> Self {
        MappedPath {
            name,
            tag_keys: Vec::new(),
            tag_values: Vec::new(),
        }
    }

    pub fn push_tag(&mut self, key: String, value: String) {
        self.tag_keys.push(key);
        self.tag_values.push(value);
    }
}

/// Maps metric paths to measurement names and tags.
///
/// Returning `None` drops the metric.
pub trait PathMapping: Send + Sync {
    fn map(&self, path: &str) -> Option<MappedPath>;

    fn map_no_tags(&self, path: &str) -> Option<String> {
        self.map(path).map(|m| m.name)
    }
}
