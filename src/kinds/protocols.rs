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

//! Switches on `Managers/{m}/NetworkProtocol` that carry few or no settings:
//! NTP, IPMI over LAN and the Redfish service itself.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::{
    check_server_id, default_server_id, network_protocol_path, read_required, toggle_matches,
    toggle_write,
};
use crate::reconcile::Resource;
use crate::{Controller, Ensure, ImcError, ManagedObject, ValidationError};

const NTP_ENABLED: &str = "/NTP/ProtocolEnabled";
const IPMI_ENABLED: &str = "/IPMI/ProtocolEnabled";
const REDFISH_ENABLED: &str = "/Oem/Cisco/Redfish/Enabled";

const MAX_NTP_SERVERS: usize = 4;

/// NTP time sync. Present also pins the server list, in order.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ntp {
    #[serde(default)]
    pub ntp_servers: Vec<String>,
    pub state: Ensure,
}

impl Ntp {
    fn desired(&self) -> Value {
        json!({ "NTP": { "ProtocolEnabled": true, "NTPServers": self.ntp_servers } })
    }
}

impl Resource for Ntp {
    const KIND: &'static str = "ntp";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.ntp_servers.len() > MAX_NTP_SERVERS {
            return Err(ValidationError::invalid(
                "ntp_servers",
                format!("at most {MAX_NTP_SERVERS} servers"),
            ));
        }
        if self.ntp_servers.iter().any(|s| s.trim().is_empty()) {
            return Err(ValidationError::invalid("ntp_servers", "empty server name"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, &network_protocol_path(ctl))
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        toggle_matches(current, NTP_ENABLED, self.state, &self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        toggle_write(ctl, current, NTP_ENABLED, self.state, self.desired())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IpmiPrivilege {
    #[default]
    ReadOnly,
    User,
    Admin,
}

/// IPMI over LAN. The encryption key cannot be read back and is only sent.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ipmi {
    #[serde(default, rename = "priv")]
    pub privilege: IpmiPrivilege,
    #[serde(default = "default_key")]
    pub key: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
    #[serde(default)]
    pub state: Ensure,
}

fn default_key() -> String {
    "0".repeat(40)
}

impl Ipmi {
    fn desired(&self) -> Value {
        json!({
            "IPMI": { "ProtocolEnabled": true },
            "Oem": { "Cisco": { "IPMI": { "Privilege": self.privilege } } }
        })
    }

    fn body(&self) -> Value {
        let mut body = self.desired();
        crate::jsonmap::merge(
            &mut body,
            &json!({ "Oem": { "Cisco": { "IPMI": { "EncryptionKey": self.key } } } }),
        );
        body
    }
}

impl Resource for Ipmi {
    const KIND: &'static str = "ipmi";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        if self.key.len() != 40 || !self.key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::invalid("key", "40 hexadecimal characters"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, &network_protocol_path(ctl))
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        toggle_matches(current, IPMI_ENABLED, self.state, &self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        toggle_write(ctl, current, IPMI_ENABLED, self.state, self.body())
    }
}

/// The Redfish service. Disabling it over Redfish ends the session with it,
/// so `absent` is mostly useful in check mode.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Redfish {
    #[serde(default)]
    pub state: Ensure,
}

impl Resource for Redfish {
    const KIND: &'static str = "redfish";
    type State = ManagedObject;

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, &network_protocol_path(ctl))
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        toggle_matches(current, REDFISH_ENABLED, self.state, &json!({}))
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        let enable = super::nest(REDFISH_ENABLED, Value::Bool(true));
        toggle_write(ctl, current, REDFISH_ENABLED, self.state, enable)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::kinds::testing::{assert_converges, run};
    use crate::memory::{MemoryController, FIXTURE_MANAGER_ID};

    fn network_protocol(imc: &MemoryController) -> serde_json::Value {
        imc.object(&format!("Managers/{FIXTURE_MANAGER_ID}/NetworkProtocol"))
            .unwrap()
    }

    #[test]
    fn test_ntp_servers_are_ordered() {
        let imc = MemoryController::new();
        let servers = json!({ "ntp_servers": ["10.0.0.1", "pool.ntp.org"], "state": "present" });
        assert_converges(&imc, "ntp", servers);
        let reordered = json!({ "ntp_servers": ["pool.ntp.org", "10.0.0.1"], "state": "present" });
        assert!(run(&imc, "ntp", reordered, false).changed);
        assert_eq!(
            network_protocol(&imc)["NTP"]["NTPServers"],
            json!(["pool.ntp.org", "10.0.0.1"])
        );
        assert_converges(&imc, "ntp", json!({ "state": "absent" }));
    }

    #[test]
    fn test_ntp_state_is_required() {
        let imc = MemoryController::new();
        assert!(run(&imc, "ntp", json!({ "ntp_servers": ["a"] }), false).failed);
        let five = json!({ "ntp_servers": ["a", "b", "c", "d", "e"], "state": "present" });
        assert!(run(&imc, "ntp", five, false).failed);
    }

    #[test]
    fn test_ipmi() {
        let imc = MemoryController::new();
        assert_converges(&imc, "ipmi", json!({ "priv": "admin" }));
        let np = network_protocol(&imc);
        assert_eq!(np["IPMI"]["ProtocolEnabled"], true);
        assert_eq!(np["Oem"]["Cisco"]["IPMI"]["Privilege"], "admin");
        assert_converges(&imc, "ipmi", json!({ "state": "absent" }));
        assert!(run(&imc, "ipmi", json!({ "key": "xyz" }), false).failed);
    }

    #[test]
    fn test_redfish_toggle() {
        let imc = MemoryController::new();
        let r = run(&imc, "redfish", json!({}), false);
        assert!(!r.changed);
        assert!(run(&imc, "redfish", json!({ "state": "absent" }), true).changed);
        assert_eq!(imc.writes(), 0);
        assert_converges(&imc, "redfish", json!({ "state": "absent" }));
        assert_converges(&imc, "redfish", json!({ "state": "present" }));
    }
}
