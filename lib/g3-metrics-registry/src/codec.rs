/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;

const ESCAPE: char = '\\';
const TAG_DELIMITER: char = ',';
const VALUE_DELIMITER: char = '=';

/// Name and tags recovered from a registry key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedName {
    pub name: String,
    pub tags: BTreeMap<String, String>,
}

fn push_escaped(buf: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, ESCAPE | TAG_DELIMITER | VALUE_DELIMITER) {
            buf.push(ESCAPE);
        }
        buf.push(c);
    }
}

/// Fold a metric name and its tags into a single flat registry key.
///
/// Tags are written in key order, so the same set of pairs always yields the
/// same key whatever order the caller supplied them in. For duplicated keys
/// the last value wins. Only the common prefix of `tag_keys` and
/// `tag_values` is paired.
pub fn encode_name<K, V>(name: &str, tag_keys: &[K], tag_values: &[V]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut tags = BTreeMap::new();
    for (k, v) in tag_keys.iter().zip(tag_values.iter()) {
        tags.insert(k.as_ref(), v.as_ref());
    }

    let mut buf = String::with_capacity(name.len() + tags.len() * 16);
    push_escaped(&mut buf, name);
    for (k, v) in tags {
        buf.push(TAG_DELIMITER);
        push_escaped(&mut buf, k);
        buf.push(VALUE_DELIMITER);
        push_escaped(&mut buf, v);
    }
    buf
}

/// Reverse of [`encode_name`].
pub fn decode_name(key: &str) -> DecodedName {
    let mut decoded = DecodedName::default();

    let mut token = String::new();
    let mut tag_key: Option<String> = None;
    let mut in_name = true;
    let mut escaped = false;

    let mut finish_field = |token: &mut String, tag_key: &mut Option<String>, in_name: &mut bool| {
        let value = std::mem::take(token);
        if *in_name {
            decoded.name = value;
            *in_name = false;
        } else if let Some(k) = tag_key.take() {
            decoded.tags.insert(k, value);
        } else if !value.is_empty() {
            decoded.tags.insert(value, String::new());
        }
    };

    for c in key.chars() {
        if escaped {
            token.push(c);
            escaped = false;
            continue;
        }
        match c {
            ESCAPE => escaped = true,
            TAG_DELIMITER => finish_field(&mut token, &mut tag_key, &mut in_name),
            VALUE_DELIMITER if !in_name && tag_key.is_none() => {
                tag_key = Some(std::mem::take(&mut token));
            }
            _ => token.push(c),
        }
    }
    if escaped {
        token.push(ESCAPE);
    }
    finish_field(&mut token, &mut tag_key, &mut in_name);

    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tags() {
        let key = encode_name::<&str, &str>("requests.total", &[], &[]);
        assert_eq!(key, "requests.total");

        let decoded = decode_name(&key);
        assert_eq!(decoded.name, "requests.total");
        assert!(decoded.tags.is_empty());
    }

    #[test]
    fn with_tags() {
        let key = encode_name("http_requests", &["path", "code"], &["/api", "200"]);
        assert_eq!(key, "http_requests,code=200,path=/api");

        let decoded = decode_name(&key);
        assert_eq!(decoded.name, "http_requests");
        assert_eq!(decoded.tags.len(), 2);
        assert_eq!(decoded.tags.get("path").unwrap(), "/api");
        assert_eq!(decoded.tags.get("code").unwrap(), "200");
    }

    #[test]
    fn order_insensitive() {
        let k1 = encode_name("m", &["a", "b"], &["1", "2"]);
        let k2 = encode_name("m", &["b", "a"], &["2", "1"]);
        assert_eq!(k1, k2);
    }

    #[test]
    fn duplicate_key_last_wins() {
        let key = encode_name("m", &["zone", "zone"], &["a", "b"]);
        let decoded = decode_name(&key);
        assert_eq!(decoded.tags.len(), 1);
        assert_eq!(decoded.tags.get("zone").unwrap(), "b");
    }

    #[test]
    fn delimiters_escaped() {
        let key = encode_name("name,with=delims", &["k,1", "k\\2"], &["v=1", "v,2\\"]);
        let decoded = decode_name(&key);
        assert_eq!(decoded.name, "name,with=delims");
        assert_eq!(decoded.tags.get("k,1").unwrap(), "v=1");
        assert_eq!(decoded.tags.get("k\\2").unwrap(), "v,2\\");

        // a tag value looking like another tag must not create a new one
        let key = encode_name("m", &["a"], &["x,b=y"]);
        let decoded = decode_name(&key);
        assert_eq!(decoded.tags.len(), 1);
        assert_eq!(decoded.tags.get("a").unwrap(), "x,b=y");
    }

    #[test]
    fn mismatched_lengths() {
        let key = encode_name("m", &["a", "b"], &["1"]);
        let decoded = decode_name(&key);
        assert_eq!(decoded.tags.len(), 1);
        assert_eq!(decoded.tags.get("a").unwrap(), "1");
    }

    #[test]
    fn empty_tag_value() {
        let key = encode_name("m", &["a"], &[""]);
        assert_eq!(key, "m,a=");
        let decoded = decode_name(&key);
        assert_eq!(decoded.tags.get("a").unwrap(), "");
    }
}
