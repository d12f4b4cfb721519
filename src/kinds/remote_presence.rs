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

//! Remote console access: serial over LAN, KVM, virtual media and the
//! images mounted through it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::{
    check_server_id, default_server_id, network_protocol_path, read_required, system_path,
    toggle_matches, toggle_write,
};
use crate::model::Flag;
use crate::reconcile::Resource;
use crate::{jsonmap, Controller, Ensure, ImcError, ManagedObject, ValidationError};

const SOL_ENABLED: &str = "/SerialConsole/IPMI/ServiceEnabled";
const KVM_ENABLED: &str = "/KVMIP/ProtocolEnabled";
const VMEDIA_ENABLED: &str = "/VirtualMedia/ProtocolEnabled";

const BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComPort {
    #[default]
    Com0,
    Com1,
}

/// Serial over LAN on one of the servers.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sol {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default, alias = "comport")]
    pub com_port: ComPort,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
    #[serde(default)]
    pub state: Ensure,
}

fn default_speed() -> u32 {
    115200
}

fn default_ssh_port() -> u16 {
    22
}

impl Sol {
    fn desired(&self) -> Value {
        json!({
            "SerialConsole": { "IPMI": { "ServiceEnabled": true } },
            "Oem": { "Cisco": { "SerialOverLan": {
                "BaudRate": self.speed,
                "ComPort": self.com_port,
                "SshPort": self.ssh_port,
            } } }
        })
    }
}

impl Resource for Sol {
    const KIND: &'static str = "sol";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        if !BAUD_RATES.contains(&self.speed) {
            return Err(ValidationError::invalid("speed", format!("one of {BAUD_RATES:?}")));
        }
        if self.ssh_port == 0 {
            return Err(ValidationError::invalid("ssh_port", "must be 1-65535"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, &system_path(ctl, self.server_id)?)
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        toggle_matches(current, SOL_ENABLED, self.state, &self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        toggle_write(ctl, current, SOL_ENABLED, self.state, self.desired())
    }
}

/// The KVM console service.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Kvm {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_kvm_port")]
    pub port: u16,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_sessions")]
    pub total_sessions: u8,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub encryption_state: bool,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub local_video_state: bool,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
    #[serde(default)]
    pub state: Ensure,
}

fn default_kvm_port() -> u16 {
    2068
}

fn default_sessions() -> u8 {
    1
}

impl Kvm {
    fn desired(&self) -> Value {
        json!({
            "KVMIP": { "ProtocolEnabled": true, "Port": self.port },
            "Oem": { "Cisco": { "KVMIP": {
                "MaxSessions": self.total_sessions,
                "Encryption": self.encryption_state,
                "LocalVideo": self.local_video_state,
            } } }
        })
    }
}

impl Resource for Kvm {
    const KIND: &'static str = "kvm";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        if !(1..=4).contains(&self.total_sessions) {
            return Err(ValidationError::invalid("total_sessions", "must be 1-4"));
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
        toggle_matches(current, KVM_ENABLED, self.state, &self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        toggle_write(ctl, current, KVM_ENABLED, self.state, self.desired())
    }
}

/// The virtual media service.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vmedia {
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub encryption_state: bool,
    #[serde_as(as = "Flag")]
    #[serde(default, alias = "low_power_usb")]
    pub low_power_usb_state: bool,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
    #[serde(default)]
    pub state: Ensure,
}

impl Vmedia {
    fn desired(&self) -> Value {
        json!({
            "VirtualMedia": { "ProtocolEnabled": true },
            "Oem": { "Cisco": { "VirtualMedia": {
                "Encryption": self.encryption_state,
                "LowPowerUsb": self.low_power_usb_state,
            } } }
        })
    }
}

impl Resource for Vmedia {
    const KIND: &'static str = "vmedia";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, &network_protocol_path(ctl))
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        toggle_matches(current, VMEDIA_ENABLED, self.state, &self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        toggle_write(ctl, current, VMEDIA_ENABLED, self.state, self.desired())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    Cifs,
    Nfs,
    Www,
}

/// An image mounted on a virtual media volume.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VmediaMount {
    pub volume_name: String,
    pub remote_share: Option<String>,
    pub remote_file: Option<String>,
    pub map: Option<MountType>,
    pub mount_options: Option<String>,
    #[serde(alias = "user_id")]
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
    #[serde(default)]
    pub state: Ensure,
}

impl VmediaMount {
    fn volume_path(&self, ctl: &dyn Controller) -> String {
        format!("Managers/{}/VirtualMedia/{}", ctl.manager_id(), self.volume_name)
    }

    fn image(&self) -> String {
        let share = self.remote_share.as_deref().unwrap_or_default();
        let file = self.remote_file.as_deref().unwrap_or_default();
        format!("{}/{}", share.trim_end_matches('/'), file.trim_start_matches('/'))
    }

    fn transfer_protocol(&self) -> &'static str {
        match self.map {
            Some(MountType::Cifs) => "CIFS",
            Some(MountType::Nfs) => "NFS",
            _ if self.image().starts_with("https:") => "HTTPS",
            _ => "HTTP",
        }
    }

    fn mount(&self) -> Value {
        jsonmap::without_nulls(json!({ "Oem": { "Cisco": {
            "Map": self.map,
            "RemoteShare": self.remote_share,
            "RemoteFile": self.remote_file,
            "MountOptions": self.mount_options,
        } } }))
    }

    fn insert_body(&self) -> Value {
        let mut body = jsonmap::without_nulls(json!({
            "Image": self.image(),
            "TransferProtocolType": self.transfer_protocol(),
            "UserName": self.username,
            "Password": self.password,
            "Inserted": true,
        }));
        jsonmap::merge(&mut body, &self.mount());
        body
    }
}

impl Resource for VmediaMount {
    const KIND: &'static str = "vmedia_mount";
    type State = Option<ManagedObject>;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        if self.volume_name.is_empty() || self.volume_name.contains('/') {
            return Err(ValidationError::invalid("volume_name", "a plain volume name"));
        }
        if !self.state.is_present() {
            return Ok(());
        }
        for (field, value) in [
            ("remote_share", &self.remote_share),
            ("remote_file", &self.remote_file),
        ] {
            if value.as_deref().unwrap_or_default().is_empty() {
                return Err(ValidationError::Missing(field));
            }
        }
        if self.map.is_none() {
            return Err(ValidationError::Missing("map"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<Option<ManagedObject>, ImcError> {
        ctl.get_resource(&self.volume_path(ctl))
    }

    fn matches(&self, current: &Option<ManagedObject>) -> bool {
        let inserted = current
            .as_ref()
            .is_some_and(|v| v.flag("/Inserted").unwrap_or(false));
        match self.state {
            Ensure::Present => {
                inserted && current.as_ref().is_some_and(|v| v.contains(&self.mount()))
            }
            Ensure::Absent => !inserted,
        }
    }

    fn write(&self, ctl: &dyn Controller, _current: &Option<ManagedObject>) -> Result<(), ImcError> {
        let volume = self.volume_path(ctl);
        let (action, body) = match self.state {
            Ensure::Present => ("VirtualMedia.InsertMedia", self.insert_body()),
            Ensure::Absent => ("VirtualMedia.EjectMedia", json!({})),
        };
        ctl.post_action(&format!("{volume}/Actions/{action}"), body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::kinds::testing::{assert_converges, run};
    use crate::memory::{MemoryController, FIXTURE_MANAGER_ID, FIXTURE_SYSTEM_ID};

    fn network_protocol(imc: &MemoryController) -> serde_json::Value {
        imc.object(&format!("Managers/{FIXTURE_MANAGER_ID}/NetworkProtocol"))
            .unwrap()
    }

    #[test]
    fn test_sol() {
        let imc = MemoryController::new();
        assert_converges(&imc, "sol", json!({ "speed": "9600", "com_port": "com1" }));
        let system = imc.object(&format!("Systems/{FIXTURE_SYSTEM_ID}")).unwrap();
        assert_eq!(system["SerialConsole"]["IPMI"]["ServiceEnabled"], true);
        assert_eq!(
            system["Oem"]["Cisco"]["SerialOverLan"],
            json!({ "BaudRate": 9600, "ComPort": "com1", "SshPort": 22 })
        );
        assert_converges(&imc, "sol", json!({ "state": "absent" }));
        assert!(run(&imc, "sol", json!({ "speed": 4800 }), false).failed);
    }

    #[test]
    fn test_kvm() {
        let imc = MemoryController::new();
        let params = json!({ "total_sessions": 2, "encryption_state": "enabled", "local_video_state": "yes" });
        assert_converges(&imc, "kvm", params);
        let kvm = &network_protocol(&imc)["Oem"]["Cisco"]["KVMIP"];
        assert_eq!(kvm["MaxSessions"], 2);
        assert_eq!(kvm["Encryption"], true);
        assert!(run(&imc, "kvm", json!({ "total_sessions": 5 }), false).failed);
        assert_converges(&imc, "kvm", json!({ "state": "absent" }));
    }

    #[test]
    fn test_vmedia() {
        let imc = MemoryController::new();
        assert_converges(&imc, "vmedia", json!({ "encryption_state": true }));
        assert_eq!(
            network_protocol(&imc)["Oem"]["Cisco"]["VirtualMedia"],
            json!({ "Encryption": true, "LowPowerUsb": false })
        );
        assert_converges(&imc, "vmedia", json!({ "state": "absent" }));
    }

    #[test]
    fn test_mount_and_unmount() {
        let imc = MemoryController::new();
        let mount = json!({
            "volume_name": "rhel",
            "remote_share": "http://10.0.0.9/isos/",
            "remote_file": "rhel-9.iso",
            "map": "www",
            "username": "web",
            "password": "secret"
        });
        assert_converges(&imc, "vmedia_mount", mount);
        let volume = format!("Managers/{FIXTURE_MANAGER_ID}/VirtualMedia/rhel");
        let v = imc.object(&volume).unwrap();
        assert_eq!(v["Image"], "http://10.0.0.9/isos/rhel-9.iso");
        assert_eq!(v["TransferProtocolType"], "HTTP");
        assert!(v.get("Password").is_none());

        assert_converges(&imc, "vmedia_mount", json!({ "volume_name": "rhel", "state": "absent" }));
        assert_eq!(imc.object(&volume).unwrap()["Inserted"], false);
    }

    #[test]
    fn test_unmount_of_unknown_volume_is_noop() {
        let imc = MemoryController::new();
        let r = run(&imc, "vmedia_mount", json!({ "volume_name": "none", "state": "absent" }), false);
        assert!(!r.changed && !r.failed);
        let r = run(&imc, "vmedia_mount", json!({ "volume_name": "x" }), false);
        assert_eq!(r.msg.as_deref(), Some("missing required parameter remote_share"));
    }
}
