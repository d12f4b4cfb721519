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

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::{find_member, network_protocol_path, read_required, toggle_matches, toggle_write, ACCOUNTS};
use crate::reconcile::Resource;
use crate::{jsonmap, Controller, Ensure, ImcError, ManagedObject, ValidationError};

const SNMP_ENABLED: &str = "/SNMP/ProtocolEnabled";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase", deserialize = "lowercase"))]
pub enum CommunityAccess {
    #[default]
    Disabled,
    Limited,
    Full,
}

/// The SNMP agent and its v2c community.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snmp {
    pub community: Option<String>,
    #[serde(default, alias = "com2_sec")]
    pub privilege: CommunityAccess,
    pub trap_community: Option<String>,
    pub sys_contact: Option<String>,
    pub sys_location: Option<String>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub state: Ensure,
}

fn default_port() -> u16 {
    161
}

impl Snmp {
    fn desired(&self) -> Value {
        jsonmap::without_nulls(json!({
            "SNMP": { "ProtocolEnabled": true, "Port": self.port },
            "Oem": { "Cisco": { "SNMP": {
                "Community": self.community,
                "CommunityAccess": self.privilege,
                "TrapCommunity": self.trap_community,
                "SysContact": self.sys_contact,
                "SysLocation": self.sys_location,
            } } }
        }))
    }
}

impl Resource for Snmp {
    const KIND: &'static str = "snmp";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        for (field, value, max) in [
            ("community", &self.community, 18),
            ("trap_community", &self.trap_community, 18),
            ("sys_contact", &self.sys_contact, 64),
            ("sys_location", &self.sys_location, 64),
        ] {
            if value.as_ref().is_some_and(|v| v.len() > max) {
                return Err(ValidationError::invalid(field, format!("at most {max} characters")));
            }
        }
        if self.port == 0 {
            return Err(ValidationError::invalid("port", "must be 1-65535"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, &network_protocol_path(ctl))
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        toggle_matches(current, SNMP_ENABLED, self.state, &self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        toggle_write(ctl, current, SNMP_ENABLED, self.state, self.desired())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    #[default]
    AuthPriv,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AuthProtocol {
    #[default]
    #[serde(alias = "md5")]
    MD5,
    #[serde(alias = "sha")]
    SHA,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PrivacyProtocol {
    #[default]
    #[serde(alias = "aes")]
    AES,
    #[serde(alias = "des")]
    DES,
}

/// An SNMPv3 user. Keys cannot be read back, so only the user's protocols
/// and security level decide whether it matches.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnmpUser {
    pub name: String,
    #[serde(default)]
    pub security_level: SecurityLevel,
    #[serde(default)]
    pub auth: AuthProtocol,
    pub auth_pwd: Option<String>,
    #[serde(default)]
    pub privacy: PrivacyProtocol,
    pub privacy_pwd: Option<String>,
    #[serde(default)]
    pub state: Ensure,
}

impl SnmpUser {
    fn protocols(&self) -> (&'static str, &'static str, &'static str) {
        let auth = match self.auth {
            AuthProtocol::MD5 => "HMAC_MD5",
            AuthProtocol::SHA => "HMAC_SHA96",
        };
        let privacy = match self.privacy {
            PrivacyProtocol::AES => "CFB128_AES128",
            PrivacyProtocol::DES => "CBC_DES",
        };
        match self.security_level {
            SecurityLevel::NoAuthNoPriv => ("None", "None", "noAuthNoPriv"),
            SecurityLevel::AuthNoPriv => (auth, "None", "authNoPriv"),
            SecurityLevel::AuthPriv => (auth, privacy, "authPriv"),
        }
    }

    fn comparable(&self) -> Value {
        let (auth, privacy, level) = self.protocols();
        json!({
            "UserName": self.name,
            "AccountTypes": ["SNMP"],
            "SNMP": { "AuthenticationProtocol": auth, "EncryptionProtocol": privacy },
            "Oem": { "Cisco": { "SecurityLevel": level } }
        })
    }

    fn body(&self) -> Value {
        let mut body = self.comparable();
        let keys = jsonmap::without_nulls(json!({
            "RoleId": "ReadOnly",
            "SNMP": { "AuthenticationKey": self.auth_pwd, "EncryptionKey": self.privacy_pwd }
        }));
        jsonmap::merge(&mut body, &keys);
        body
    }
}

fn is_snmp_account(mo: &ManagedObject) -> bool {
    mo.pointer("/AccountTypes")
        .and_then(Value::as_array)
        .is_some_and(|types| types.iter().any(|t| t == "SNMP"))
}

impl Resource for SnmpUser {
    const KIND: &'static str = "snmp_user";
    type State = Option<ManagedObject>;

    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.name.is_empty() || self.name.len() > 31 {
            return Err(ValidationError::invalid("name", "1-31 characters"));
        }
        if !self.state.is_present() {
            return Ok(());
        }
        let needs_auth = self.security_level != SecurityLevel::NoAuthNoPriv;
        let needs_privacy = self.security_level == SecurityLevel::AuthPriv;
        for (field, value, needed) in [
            ("auth_pwd", &self.auth_pwd, needs_auth),
            ("privacy_pwd", &self.privacy_pwd, needs_privacy),
        ] {
            match value {
                None if needed => return Err(ValidationError::Missing(field)),
                Some(pwd) if needed && pwd.len() < 8 => {
                    return Err(ValidationError::invalid(field, "at least 8 characters"))
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<Option<ManagedObject>, ImcError> {
        find_member(ctl, ACCOUNTS, |mo| {
            is_snmp_account(mo) && mo.str_at("/UserName") == Some(self.name.as_str())
        })
    }

    fn matches(&self, current: &Option<ManagedObject>) -> bool {
        match (self.state, current) {
            (Ensure::Present, Some(user)) => user.contains(&self.comparable()),
            (Ensure::Present, None) => false,
            (Ensure::Absent, user) => user.is_none(),
        }
    }

    fn write(&self, ctl: &dyn Controller, current: &Option<ManagedObject>) -> Result<(), ImcError> {
        match (self.state, current) {
            (Ensure::Present, Some(user)) => ctl.patch_resource(&user.path, self.body()),
            (Ensure::Present, None) => ctl.create_member(ACCOUNTS, self.body()).map(|_| ()),
            (Ensure::Absent, Some(user)) => ctl.delete_resource(&user.path),
            (Ensure::Absent, None) => Ok(()),
        }
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
    fn test_enable_with_community() {
        let imc = MemoryController::new();
        assert_converges(&imc, "snmp", json!({ "community": "public", "privilege": "full" }));
        let np = network_protocol(&imc);
        assert_eq!(np["SNMP"]["ProtocolEnabled"], true);
        assert_eq!(np["Oem"]["Cisco"]["SNMP"]["Community"], "public");
        assert_eq!(np["Oem"]["Cisco"]["SNMP"]["CommunityAccess"], "Full");
    }

    #[test]
    fn test_changed_community_is_rewritten() {
        let imc = MemoryController::new();
        assert_converges(&imc, "snmp", json!({ "community": "public" }));
        assert!(run(&imc, "snmp", json!({ "community": "private" }), false).changed);
        assert_eq!(network_protocol(&imc)["Oem"]["Cisco"]["SNMP"]["Community"], "private");
    }

    #[test]
    fn test_disable_only_looks_at_the_switch() {
        let imc = MemoryController::new();
        let r = run(&imc, "snmp", json!({ "community": "public", "state": "absent" }), false);
        assert!(!r.changed);
        assert_eq!(imc.writes(), 0);

        assert_converges(&imc, "snmp", json!({ "port": "1161" }));
        assert_converges(&imc, "snmp", json!({ "state": "absent" }));
        assert_eq!(network_protocol(&imc)["SNMP"]["ProtocolEnabled"], false);
    }

    #[test]
    fn test_long_community_is_rejected() {
        let imc = MemoryController::new();
        let r = run(&imc, "snmp", json!({ "community": "a-very-long-community-string" }), false);
        assert!(r.failed);
        assert_eq!(imc.writes(), 0);
    }

    #[test]
    fn test_snmp_user_lifecycle() {
        let imc = MemoryController::new();
        let user = json!({
            "name": "snmpuser",
            "auth": "SHA",
            "auth_pwd": "authpassword",
            "privacy_pwd": "privpassword"
        });
        assert_converges(&imc, "snmp_user", user);
        let created = imc.object("AccountService/Accounts/2").unwrap();
        assert_eq!(created["SNMP"]["AuthenticationProtocol"], "HMAC_SHA96");
        assert_eq!(created["Oem"]["Cisco"]["SecurityLevel"], "authPriv");

        let downgrade = json!({
            "name": "snmpuser",
            "security_level": "authnopriv",
            "auth_pwd": "authpassword"
        });
        assert_converges(&imc, "snmp_user", downgrade);
        assert_converges(&imc, "snmp_user", json!({ "name": "snmpuser", "state": "absent" }));
        assert!(imc.object("AccountService/Accounts/2").is_none());
    }

    #[test]
    fn test_snmp_user_needs_keys() {
        let imc = MemoryController::new();
        let r = run(&imc, "snmp_user", json!({ "name": "u", "auth_pwd": "authpassword" }), false);
        assert_eq!(r.msg.as_deref(), Some("missing required parameter privacy_pwd"));
    }

    #[test]
    fn test_regular_account_is_not_an_snmp_user() {
        let imc = MemoryController::new();
        let r = run(&imc, "snmp_user", json!({ "name": "admin", "state": "absent" }), false);
        assert!(!r.changed);
        assert!(imc.object("AccountService/Accounts/1").is_some());
    }
}
