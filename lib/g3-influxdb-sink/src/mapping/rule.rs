/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use anyhow::{Context, anyhow};
use regex::Regex;
use yaml_rust::Yaml;

use super::{MappedPath, PathMapping};
use crate::yaml;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathMappingRule {
    pattern: String,
    name: Option<String>,
    tags: Vec<(String, String)>,
    drop: bool,
}

impl PathMappingRule {
    pub fn new(pattern: &str) -> Self {
        PathMappingRule {
            pattern: pattern.to_string(),
            name: None,
            tags: Vec::new(),
            drop: false,
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn push_tag(&mut self, key: &str, value: &str) {
        self.tags.push((key.to_string(), value.to_string()));
    }

    pub fn set_drop(&mut self) {
        self.drop = true;
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.pattern.is_empty() {
            return Err(anyhow!("no match pattern set"));
        }
        if self.name.is_none() && !self.drop {
            return Err(anyhow!("either name or drop should be set"));
        }
        Ok(())
    }

    pub(crate) fn parse_yaml(v: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = v else {
            return Err(anyhow!(
                "yaml value type for 'path mapping rule' should be 'map'"
            ));
        };

        let mut rule = PathMappingRule::new("");
        yaml::foreach_kv(map, |k, v| match yaml::normalize_key(k).as_str() {
            "match" | "regex" => {
                rule.pattern =
                    yaml::as_string(v).context(format!("invalid string value for key {k}"))?;
                Ok(())
            }
            "name" => {
                rule.name =
                    Some(yaml::as_string(v).context(format!("invalid string value for key {k}"))?);
                Ok(())
            }
            "tags" => {
                let tags = yaml::as_string_map(v)
                    .context(format!("invalid string map value for key {k}"))?;
                rule.tags = tags.into_iter().collect();
                Ok(())
            }
            "drop" => {
                rule.drop = yaml::as_bool(v)?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        })?;
        rule.check()?;
        Ok(rule)
    }
}

struct CompiledRule {
    regex: Regex,
    name: String,
    tags: Vec<(String, String)>,
    drop: bool,
}

/// Ordered regex rules, the first matching rule wins.
///
/// Paths matching no rule pass through unchanged without tags.
pub struct RulePathMapping {
    rules: Vec<CompiledRule>,
}

impl RulePathMapping {
    pub fn new(rules: &[PathMappingRule]) -> anyhow::Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            rule.check()
                .context(format!("invalid path mapping rule #{i}"))?;
            let regex = Regex::new(&rule.pattern).map_err(|e| {
                anyhow!("invalid match pattern {} in path mapping rule #{i}: {e}", rule.pattern)
            })?;
            compiled.push(CompiledRule {
                regex,
                name: rule.name.clone().unwrap_or_default(),
                tags: rule.tags.clone(),
                drop: rule.drop,
            });
        }
        Ok(RulePathMapping { rules: compiled })
    }

    fn map_with(&self, path: &str, with_tags: bool) -> Option<MappedPath> {
        for rule in &self.rules {
            let Some(caps) = rule.regex.captures(path) else {
                continue;
            };
            if rule.drop {
                return None;
            }

            let mut name = String::new();
            caps.expand(&rule.name, &mut name);
            if name.is_empty() {
                return None;
            }
            let mut mapped = MappedPath::new(name);
            if with_tags {
                for (key, template) in &rule.tags {
                    let mut value = String::new();
                    caps.expand(template, &mut value);
                    mapped.push_tag(key.clone(), value);
                }
            }
            return Some(mapped);
        }

        if path.is_empty() {
            None
        } else {
            Some(MappedPath::new(path.to_string()))
        }
    }
}

impl PathMapping for RulePathMapping {
    fn map(&self, path: &str) -> Option<MappedPath> {
        self.map_with(path, true)
    }

    fn map_no_tags(&self, path: &str) -> Option<String> {
        self.map_with(path, false).map(|m| m.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_mapping() -> RulePathMapping {
        let mut sent = PathMappingRule::new(r"^output\.(\w+)\.sent$");
        sent.set_name("output_sent");
        sent.push_tag("output", "$1");

        let mut internal = PathMappingRule::new(r"^internal\.");
        internal.set_drop();

        let mut rename = PathMappingRule::new(r"^(?P<kind>input|output)\.(?P<rest>.+)$");
        rename.set_name("${kind}_${rest}");

        RulePathMapping::new(&[sent, internal, rename]).unwrap()
    }

    #[test]
    fn first_match_wins() {
        let mapping = build_mapping();
        let mapped = mapping.map("output.kafka.sent").unwrap();
        assert_eq!(mapped.name, "output_sent");
        assert_eq!(mapped.tag_keys, vec!["output".to_string()]);
        assert_eq!(mapped.tag_values, vec!["kafka".to_string()]);

        let mapped = mapping.map("output.kafka.error").unwrap();
        assert_eq!(mapped.name, "output_kafka.error");
        assert!(mapped.tag_keys.is_empty());
    }

    #[test]
    fn dropped() {
        let mapping = build_mapping();
        assert!(mapping.map("internal.queue.depth").is_none());
        assert!(mapping.map_no_tags("internal.queue.depth").is_none());
    }

    #[test]
    fn pass_through() {
        let mapping = build_mapping();
        let mapped = mapping.map("requests.total").unwrap();
        assert_eq!(mapped, MappedPath::new("requests.total".to_string()));
        assert!(mapping.map("").is_none());
    }

    #[test]
    fn no_tags() {
        let mapping = build_mapping();
        assert_eq!(
            mapping.map_no_tags("output.kafka.sent").as_deref(),
            Some("output_sent")
        );
    }

    #[test]
    fn empty_name_drops() {
        let mut rule = PathMappingRule::new(r"^tmp\.(\w*)$");
        rule.set_name("$1");
        let mapping = RulePathMapping::new(&[rule]).unwrap();
        assert!(mapping.map("tmp.").is_none());
        assert_eq!(mapping.map("tmp.x").unwrap().name, "x");
    }

    #[test]
    fn invalid_rules() {
        let mut rule = PathMappingRule::new(r"^(unclosed");
        rule.set_name("x");
        assert!(RulePathMapping::new(&[rule]).is_err());

        let rule = PathMappingRule::new(r"^a");
        assert!(RulePathMapping::new(&[rule]).is_err());
    }

    #[test]
    fn parse_yaml() {
        let v = yaml_doc!(
            r#"
                match: '^output\.(\w+)\.sent$'
                name: output_sent
                tags:
                  output: '$1'
            "#
        );
        let rule = PathMappingRule::parse_yaml(&v).unwrap();
        assert_eq!(rule.name.as_deref(), Some("output_sent"));
        assert_eq!(rule.tags, vec![("output".to_string(), "$1".to_string())]);

        let v = yaml_doc!("match: '^a'\ndrop: true");
        let rule = PathMappingRule::parse_yaml(&v).unwrap();
        assert!(rule.drop);

        let v = yaml_doc!("match: '^a'");
        assert!(PathMappingRule::parse_yaml(&v).is_err());

        let v = yaml_doc!("name: a");
        assert!(PathMappingRule::parse_yaml(&v).is_err());

        let v = yaml_doc!("match: '^a'\nname: b\nrename: c");
        assert!(PathMappingRule::parse_yaml(&v).is_err());
    }
}
