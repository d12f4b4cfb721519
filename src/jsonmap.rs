/*
 * SPDX-FileCopyrightText: Copyright (c) 2022 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: MIT
 *
 * Permission is hereby granted, free of charge, to any person obtaining a
 * copy of this software and associated documentation files (the "Software"),
 * to deal in the Software without restriction, including without limitation
 * the rights to use, copy, modify, merge, publish, distribute, sublicense,
 * and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in
 * all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
 * THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
 * FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
 * DEALINGS IN THE SOFTWARE.
 */

// jsonmap.rs
// Helpers for extracting values from JSON maps and for comparing and
// merging JSON documents, which is most of what converging a Redfish
// resource amounts to.

use std::collections::HashMap;

use serde_json::Value;

use crate::ImcError;

// JsonMap is a trait that abstracts over serde_json::Map and HashMap,
// allowing us to write generic functions that work with both.
pub trait JsonMap {
    // get_value retrieves a reference to a JSON value by key.
    fn get_value(&self, key: &str) -> Option<&Value>;
}

impl JsonMap for serde_json::Map<String, Value> {
    fn get_value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl JsonMap for HashMap<String, Value> {
    fn get_value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

fn missing_key_error(key: &str, url: &str) -> ImcError {
    ImcError::MissingKey {
        key: key.to_string(),
        url: url.to_string(),
    }
}

fn invalid_type_error(key: &str, expected_type: &str, url: &str) -> ImcError {
    ImcError::InvalidKeyType {
        key: key.to_string(),
        expected_type: expected_type.to_string(),
        url: url.to_string(),
    }
}

// get_value retrieves a JSON value from a map, returning MissingKey
// error if the key is not found.
pub fn get_value<'a, M: JsonMap>(map: &'a M, key: &str, url: &str) -> Result<&'a Value, ImcError> {
    map.get_value(key).ok_or_else(|| missing_key_error(key, url))
}

// get_str extracts a string value from a JSON map, returning appropriate
// errors if the key is missing or the value is not a string.
pub fn get_str<'a, M: JsonMap>(map: &'a M, key: &str, url: &str) -> Result<&'a str, ImcError> {
    get_value(map, key, url)?
        .as_str()
        .ok_or_else(|| invalid_type_error(key, "string", url))
}

// get_array extracts an array from a JSON map, returning appropriate
// errors if the key is missing or the value is not an array.
pub fn get_array<'a, M: JsonMap>(
    map: &'a M,
    key: &str,
    url: &str,
) -> Result<&'a Vec<Value>, ImcError> {
    get_value(map, key, url)?
        .as_array()
        .ok_or_else(|| invalid_type_error(key, "array", url))
}

// is_subset reports whether every property requested in `desired` holds in
// `current`. Objects are compared key by key, recursively, so properties the
// caller did not ask about are ignored. Arrays must have the same length and
// match element-wise. Everything else must be equal.
pub fn is_subset(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        // A desired null means "unset", which an absent or null value satisfies
        (Value::Object(d), Value::Object(c)) => d.iter().all(|(k, dv)| match c.get(k) {
            Some(cv) => is_subset(dv, cv),
            None => dv.is_null(),
        }),
        (Value::Array(d), Value::Array(c)) => {
            d.len() == c.len() && d.iter().zip(c).all(|(dv, cv)| is_subset(dv, cv))
        }
        (Value::Number(d), Value::Number(c)) => match (d.as_f64(), c.as_f64()) {
            (Some(d), Some(c)) => d == c,
            _ => d == c,
        },
        (d, c) => d == c,
    }
}

// merge applies `patch` onto `target` with PATCH semantics: objects merge
// recursively, any other value replaces what was there.
pub fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (k, pv) in p {
                match t.get_mut(k) {
                    Some(tv) if tv.is_object() && pv.is_object() => merge(tv, pv),
                    _ => {
                        t.insert(k.clone(), pv.clone());
                    }
                }
            }
        }
        (t, p) => *t = p.clone(),
    }
}

// without_nulls drops null members from objects, recursively, along with
// members left empty once their nulls are gone. Optional desired-state
// fields serialize as null when unset and must not be compared or sent.
pub fn without_nulls(value: Value) -> Value {
    match value {
        Value::Object(m) => Value::Object(
            m.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, without_nulls(v)))
                .filter(|(_, v)| !v.as_object().is_some_and(|o| o.is_empty()))
                .collect(),
        ),
        Value::Array(a) => Value::Array(a.into_iter().map(without_nulls).collect()),
        v => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // test_get_str_success tests that get_str correctly extracts a string value.
    #[test]
    fn test_get_str_success() {
        let value = json!({
            "UserName": "admin",
            "Id": "1"
        });
        let map = value.as_object().unwrap();

        let result = get_str(map, "UserName", "AccountService/Accounts/1");
        assert_eq!(result.unwrap(), "admin");
    }

    // test_get_str_missing_key tests that get_str returns MissingKey error when key doesn't exist.
    #[test]
    fn test_get_str_missing_key() {
        let value = json!({ "UserName": "admin" });
        let map = value.as_object().unwrap();

        let result = get_str(map, "RoleId", "AccountService/Accounts/1");
        assert!(matches!(result, Err(ImcError::MissingKey { .. })));
    }

    // test_get_array_wrong_type tests that get_array rejects a scalar.
    #[test]
    fn test_get_array_wrong_type() {
        let mut map: HashMap<String, Value> = HashMap::new();
        map.insert("Members".to_string(), json!(3));

        let result = get_array(&map, "Members", "Systems");
        assert!(matches!(result, Err(ImcError::InvalidKeyType { .. })));
    }

    // test_is_subset_ignores_unrequested_properties checks partial matching of objects.
    #[test]
    fn test_is_subset_ignores_unrequested_properties() {
        let current = json!({
            "SNMP": { "ProtocolEnabled": true, "Port": 161, "HideCommunityStrings": true },
            "HTTPS": { "ProtocolEnabled": true }
        });
        assert!(is_subset(
            &json!({ "SNMP": { "ProtocolEnabled": true, "Port": 161 } }),
            &current
        ));
        assert!(!is_subset(
            &json!({ "SNMP": { "ProtocolEnabled": true, "Port": 1161 } }),
            &current
        ));
        assert!(!is_subset(&json!({ "IPMI": { "ProtocolEnabled": true } }), &current));
    }

    // test_is_subset_arrays_are_ordered checks that arrays compare positionally.
    #[test]
    fn test_is_subset_arrays_are_ordered() {
        let current = json!({ "BootOrder": ["hdd", "pxe"] });
        assert!(is_subset(&json!({ "BootOrder": ["hdd", "pxe"] }), &current));
        assert!(!is_subset(&json!({ "BootOrder": ["pxe", "hdd"] }), &current));
        assert!(!is_subset(&json!({ "BootOrder": ["hdd"] }), &current));
    }

    // test_merge_is_recursive checks PATCH semantics.
    #[test]
    fn test_merge_is_recursive() {
        let mut target = json!({ "NTP": { "ProtocolEnabled": false, "NTPServers": ["a"] }, "Name": "x" });
        merge(
            &mut target,
            &json!({ "NTP": { "ProtocolEnabled": true, "NTPServers": ["b", "c"] } }),
        );
        assert_eq!(
            target,
            json!({ "NTP": { "ProtocolEnabled": true, "NTPServers": ["b", "c"] }, "Name": "x" })
        );
    }

    // test_without_nulls checks that unset optional fields disappear.
    #[test]
    fn test_without_nulls() {
        let v = without_nulls(json!({ "a": null, "b": { "c": null, "d": 1 } }));
        assert_eq!(v, json!({ "b": { "d": 1 } }));
        let v = without_nulls(json!({ "Oem": { "Cisco": { "Filter": null } }, "e": [] }));
        assert_eq!(v, json!({ "e": [] }));
    }
}
