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

use super::{read_required, ACCOUNT_SERVICE};
use crate::model::Flag;
use crate::reconcile::Resource;
use crate::{jsonmap, Controller, Ensure, ImcError, ManagedObject, ValidationError};

const LDAP_ENABLED: &str = "/LDAP/ServiceEnabled";
const MAX_LDAP_SERVERS: usize = 6;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LdapServer {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u8,
    pub ip: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_ldap_port")]
    pub port: u16,
}

fn default_ldap_port() -> u16 {
    3268
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindMethod {
    Anonymous,
    ConfiguredCredentials,
    #[default]
    LoginCredentials,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainSource {
    #[default]
    ExtractedDomain,
    ConfiguredDomain,
    ConfiguredExtractedDomain,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchPrecedence {
    #[default]
    LocalUserDb,
    LdapUserDb,
}

/// LDAP authentication against one or more directory servers.
///
/// The bind password is write-only on the controller and never takes part
/// in matching.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ldap {
    pub basedn: Option<String>,
    pub domain: Option<String>,
    #[serde_as(as = "Flag")]
    #[serde(default = "enabled")]
    pub encryption: bool,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default)]
    pub ldap_servers: Vec<LdapServer>,
    #[serde(default)]
    pub bind_method: BindMethod,
    pub bind_dn: Option<String>,
    #[serde(alias = "ldap_password")]
    pub password: Option<String>,
    pub filter: Option<String>,
    pub attribute: Option<String>,
    pub group_attribute: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub group_nested_search: Option<u32>,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub group_auth: bool,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub locate_directory_using_dns: bool,
    #[serde(default)]
    pub dns_domain_source: DomainSource,
    pub dns_search_domain: Option<String>,
    pub dns_search_forest: Option<String>,
    #[serde(default)]
    pub user_search_precedence: SearchPrecedence,
    pub state: Ensure,
}

fn enabled() -> bool {
    true
}

fn default_timeout() -> u32 {
    60
}

impl Ldap {
    fn desired(&self) -> Value {
        let mut servers: Vec<_> = self.ldap_servers.iter().collect();
        servers.sort_by_key(|s| s.id);
        let addresses: Vec<_> = servers.iter().map(|s| format!("{}:{}", s.ip, s.port)).collect();
        jsonmap::without_nulls(json!({
            "LDAP": {
                "ServiceEnabled": true,
                "ServiceAddresses": if addresses.is_empty() { Value::Null } else { json!(addresses) },
                "Authentication": { "Username": self.bind_dn },
                "LDAPService": { "SearchSettings": {
                    "BaseDistinguishedNames": self.basedn.as_ref().map(|dn| vec![dn]),
                    "UsernameAttribute": self.attribute,
                    "GroupsAttribute": self.group_attribute,
                } }
            },
            "Oem": { "Cisco": { "LDAP": {
                "Domain": self.domain,
                "Encryption": self.encryption,
                "Timeout": self.timeout,
                "BindMethod": self.bind_method,
                "Filter": self.filter,
                "GroupNestedSearch": self.group_nested_search,
                "GroupAuthorization": self.group_auth,
                "LocateDirectoryUsingDNS": self.locate_directory_using_dns,
                "DNSDomainSource": self.dns_domain_source,
                "DNSSearchDomain": self.dns_search_domain,
                "DNSSearchForest": self.dns_search_forest,
                "UserSearchPrecedence": self.user_search_precedence,
            } } }
        }))
    }

    fn body(&self) -> Value {
        let mut body = self.desired();
        if let Some(password) = &self.password {
            jsonmap::merge(
                &mut body,
                &json!({ "LDAP": { "Authentication": { "Password": password } } }),
            );
        }
        body
    }
}

impl Resource for Ldap {
    const KIND: &'static str = "ldap";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.ldap_servers.len() > MAX_LDAP_SERVERS {
            return Err(ValidationError::invalid(
                "ldap_servers",
                format!("at most {MAX_LDAP_SERVERS} servers"),
            ));
        }
        let mut ids: Vec<_> = self.ldap_servers.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.ldap_servers.len() {
            return Err(ValidationError::invalid("ldap_servers", "server ids must be unique"));
        }
        if ids.iter().any(|&id| id == 0 || id as usize > MAX_LDAP_SERVERS) {
            return Err(ValidationError::invalid("ldap_servers", "server ids are 1-6"));
        }
        if !(1..=180).contains(&self.timeout) {
            return Err(ValidationError::invalid("timeout", "must be 1-180 seconds"));
        }
        if self.state.is_present()
            && self.bind_method == BindMethod::ConfiguredCredentials
            && self.bind_dn.is_none()
        {
            return Err(ValidationError::Missing("bind_dn"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, ACCOUNT_SERVICE)
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        super::toggle_matches(current, LDAP_ENABLED, self.state, &self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        super::toggle_write(ctl, current, LDAP_ENABLED, self.state, self.body())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::kinds::testing::{assert_converges, run};
    use crate::memory::MemoryController;

    fn ldap_params() -> serde_json::Value {
        json!({
            "basedn": "DC=example,DC=com",
            "domain": "example.com",
            "timeout": "30",
            "ldap_servers": [
                { "id": 2, "ip": "10.0.0.12" },
                { "id": 1, "ip": "10.0.0.11", "port": 636 }
            ],
            "bind_method": "configured-credentials",
            "bind_dn": "CN=imc,DC=example,DC=com",
            "password": "secret",
            "group_auth": "yes",
            "state": "present"
        })
    }

    #[test]
    fn test_enable_ldap() {
        let imc = MemoryController::new();
        assert_converges(&imc, "ldap", ldap_params());
        let svc = imc.object("AccountService").unwrap();
        assert_eq!(svc["LDAP"]["ServiceEnabled"], true);
        assert_eq!(
            svc["LDAP"]["ServiceAddresses"],
            json!(["10.0.0.11:636", "10.0.0.12:3268"])
        );
        assert_eq!(svc["Oem"]["Cisco"]["LDAP"]["GroupAuthorization"], true);
        assert_eq!(svc["Oem"]["Cisco"]["LDAP"]["Timeout"], 30);
    }

    #[test]
    fn test_password_alone_does_not_force_a_change() {
        let imc = MemoryController::new();
        assert_converges(&imc, "ldap", ldap_params());
        let mut other = ldap_params();
        other["password"] = json!("rotated");
        assert!(!run(&imc, "ldap", other, false).changed);
    }

    #[test]
    fn test_disable_ldap() {
        let imc = MemoryController::new();
        assert!(!run(&imc, "ldap", json!({ "state": "absent" }), false).changed);
        assert_converges(&imc, "ldap", ldap_params());
        assert_converges(&imc, "ldap", json!({ "state": "absent" }));
        let svc = imc.object("AccountService").unwrap();
        assert_eq!(svc["LDAP"]["ServiceEnabled"], false);
        assert_eq!(svc["Oem"]["Cisco"]["LDAP"]["Domain"], "example.com");
    }

    #[test]
    fn test_invalid_servers() {
        let imc = MemoryController::new();
        let dup = json!({
            "ldap_servers": [{ "id": 1, "ip": "a" }, { "id": 1, "ip": "b" }],
            "state": "present"
        });
        assert!(run(&imc, "ldap", dup, false).failed);
        let r = run(&imc, "ldap", json!({ "bind_method": "configured-credentials", "state": "present" }), false);
        assert_eq!(r.msg.as_deref(), Some("missing required parameter bind_dn"));
    }
}
