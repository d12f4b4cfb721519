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

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{jsonmap, ImcError};

pub mod account_service;
pub mod flag;
pub mod system;

pub use flag::Flag;

/// A single resource on the controller: its path relative to `redfish/v1`
/// and the JSON body last read from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedObject {
    pub path: String,
    pub body: Value,
}

impl ManagedObject {
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        ManagedObject {
            path: path.into(),
            body,
        }
    }

    pub fn odata_type(&self) -> Option<&str> {
        self.body.get("@odata.type").and_then(Value::as_str)
    }

    /// Looks up a nested value with a JSON pointer such as `/SNMP/ProtocolEnabled`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.body.pointer(pointer)
    }

    pub fn flag(&self, pointer: &str) -> Option<bool> {
        self.pointer(pointer).and_then(Value::as_bool)
    }

    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.pointer(pointer).and_then(Value::as_str)
    }

    /// True when every property of `desired` holds on this object.
    pub fn contains(&self, desired: &Value) -> bool {
        jsonmap::is_subset(desired, &self.body)
    }

    /// Deserializes the body into one of the typed models.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, ImcError> {
        serde_json::from_value(self.body.clone()).map_err(|e| ImcError::JsonDeserializeError {
            url: self.path.clone(),
            body: self.body.to_string(),
            source: e,
        })
    }
}

/// Whether the caller wants the resource to exist (or be enabled) or not.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

impl Ensure {
    pub fn is_present(self) -> bool {
        self == Ensure::Present
    }
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// File transfer protocols the controller can pull profiles and certificates with.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TransferProtocol {
    Ftp,
    Http,
    None,
    Scp,
    Sftp,
    Tftp,
}

impl fmt::Display for TransferProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_managed_object_pointer_access() {
        let mo = ManagedObject::new(
            "Managers/CIMC/NetworkProtocol",
            json!({
                "@odata.type": "#ManagerNetworkProtocol.v1_5_0.ManagerNetworkProtocol",
                "SNMP": { "ProtocolEnabled": true, "Port": 161 },
                "HostName": "cimc-1"
            }),
        );
        assert_eq!(
            mo.odata_type(),
            Some("#ManagerNetworkProtocol.v1_5_0.ManagerNetworkProtocol")
        );
        assert_eq!(mo.flag("/SNMP/ProtocolEnabled"), Some(true));
        assert_eq!(mo.str_at("/HostName"), Some("cimc-1"));
        assert_eq!(mo.flag("/IPMI/ProtocolEnabled"), None);
        assert!(mo.contains(&json!({ "SNMP": { "Port": 161 } })));
    }

    #[test]
    fn test_ensure_defaults_to_present() {
        #[derive(Deserialize)]
        struct P {
            #[serde(default)]
            state: Ensure,
        }
        let p: P = serde_json::from_value(json!({})).unwrap();
        assert!(p.state.is_present());
        let p: P = serde_json::from_value(json!({ "state": "absent" })).unwrap();
        assert_eq!(p.state, Ensure::Absent);
    }
}
