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

use super::{manager_path, read_required};
use crate::reconcile::Resource;
use crate::{jsonmap, Controller, ImcError, ManagedObject, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Informational,
    Debug,
}

/// Minimum severity logged locally and sent to the remote servers.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Syslog {
    pub local_severity: Option<Severity>,
    pub remote_severity: Option<Severity>,
}

impl Syslog {
    fn desired(&self) -> Value {
        jsonmap::without_nulls(json!({
            "Oem": { "Cisco": { "Syslog": {
                "LocalSeverity": self.local_severity,
                "RemoteSeverity": self.remote_severity,
            } } }
        }))
    }
}

impl Resource for Syslog {
    const KIND: &'static str = "syslog";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.local_severity.is_none() && self.remote_severity.is_none() {
            return Err(ValidationError::Missing("local_severity or remote_severity"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, &manager_path(ctl))
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        current.contains(&self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        ctl.patch_resource(&current.path, self.desired())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteServer {
    #[default]
    Primary,
    Secondary,
    Tertiary,
}

impl RemoteServer {
    fn key(self) -> &'static str {
        match self {
            RemoteServer::Primary => "Primary",
            RemoteServer::Secondary => "Secondary",
            RemoteServer::Tertiary => "Tertiary",
        }
    }
}

/// `clear` forgets the host as well as disabling the slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteState {
    #[default]
    Present,
    Absent,
    Clear,
}

const CLEARED_HOST: &str = "0.0.0.0";

/// One of the three remote syslog destinations.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyslogRemote {
    pub hostname: Option<String>,
    #[serde(default)]
    pub name: RemoteServer,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub state: RemoteState,
}

fn default_port() -> u16 {
    514
}

impl SyslogRemote {
    fn slot(&self) -> String {
        format!("/Oem/Cisco/RemoteSyslog/{}", self.name.key())
    }

    fn desired(&self) -> Value {
        let slot = match self.state {
            RemoteState::Present => json!({
                "Enabled": true,
                "Hostname": self.hostname,
                "Port": self.port,
            }),
            RemoteState::Absent => json!({ "Enabled": false }),
            RemoteState::Clear => json!({
                "Enabled": false,
                "Hostname": CLEARED_HOST,
                "Port": default_port(),
            }),
        };
        super::nest(&self.slot(), slot)
    }
}

impl Resource for SyslogRemote {
    const KIND: &'static str = "syslog_remote";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.state == RemoteState::Present && self.hostname.as_deref().unwrap_or("").is_empty() {
            return Err(ValidationError::Missing("hostname"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, &manager_path(ctl))
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        current.contains(&self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        ctl.patch_resource(&current.path, self.desired())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::kinds::testing::{assert_converges, run};
    use crate::memory::{MemoryController, FIXTURE_MANAGER_ID};

    fn remote(imc: &MemoryController, slot: &str) -> serde_json::Value {
        imc.object(&format!("Managers/{FIXTURE_MANAGER_ID}")).unwrap()["Oem"]["Cisco"]
            ["RemoteSyslog"][slot]
            .clone()
    }

    #[test]
    fn test_severities() {
        let imc = MemoryController::new();
        assert_converges(&imc, "syslog", json!({ "remote_severity": "warning" }));
        let m = imc.object(&format!("Managers/{FIXTURE_MANAGER_ID}")).unwrap();
        assert_eq!(m["Oem"]["Cisco"]["Syslog"]["RemoteSeverity"], "warning");
        assert_eq!(m["Oem"]["Cisco"]["Syslog"]["LocalSeverity"], "informational");
        assert!(run(&imc, "syslog", json!({ "local_severity": "loud" }), false).failed);
        assert!(run(&imc, "syslog", json!({}), false).failed);
    }

    #[test]
    fn test_remote_enable_disable_clear() {
        let imc = MemoryController::new();
        let params = json!({ "hostname": "10.10.10.10", "name": "secondary", "port": "5514" });
        assert_converges(&imc, "syslog_remote", params);
        assert_eq!(
            remote(&imc, "Secondary"),
            json!({ "Enabled": true, "Hostname": "10.10.10.10", "Port": 5514 })
        );
        assert_eq!(remote(&imc, "Primary")["Enabled"], false);

        assert_converges(&imc, "syslog_remote", json!({ "name": "secondary", "state": "absent" }));
        assert_eq!(remote(&imc, "Secondary")["Hostname"], "10.10.10.10");

        assert_converges(&imc, "syslog_remote", json!({ "name": "secondary", "state": "clear" }));
        assert_eq!(remote(&imc, "Secondary")["Hostname"], "0.0.0.0");
    }

    #[test]
    fn test_remote_needs_hostname_when_present() {
        let imc = MemoryController::new();
        let r = run(&imc, "syslog_remote", json!({ "name": "primary" }), false);
        assert_eq!(r.msg.as_deref(), Some("missing required parameter hostname"));
    }
}
