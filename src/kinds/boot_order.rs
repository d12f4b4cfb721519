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

//! Boot order, in the precision form (named devices with a type) and the
//! legacy form (one entry per device class).
//!
//! Both live under `Boot` of `Systems/{s}`. Secure boot is a separate
//! resource, `Systems/{s}/SecureBoot`, and only read when asked about.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::{check_server_id, default_server_id, read_required, system_path};
use crate::model::Flag;
use crate::reconcile::Resource;
use crate::{jsonmap, Controller, ImcError, ManagedObject, ValidationError};

#[derive(Debug)]
pub struct BootState {
    system: ManagedObject,
    secure_boot: Option<ManagedObject>,
}

fn read_boot(
    ctl: &dyn Controller,
    server_id: u32,
    secure_boot: Option<bool>,
) -> Result<BootState, ImcError> {
    let system = read_required(ctl, &system_path(ctl, server_id)?)?;
    let secure_boot = match secure_boot {
        Some(_) => Some(read_required(ctl, &format!("{}/SecureBoot", system.path))?),
        None => None,
    };
    Ok(BootState {
        system,
        secure_boot,
    })
}

fn secure_boot_matches(current: &BootState, wanted: Option<bool>) -> bool {
    match (wanted, &current.secure_boot) {
        (Some(enable), Some(sb)) => sb.flag("/SecureBootEnable") == Some(enable),
        (Some(_), None) => false,
        (None, _) => true,
    }
}

/// PATCHes whichever of the two resources differ from what is wanted.
fn write_boot(
    ctl: &dyn Controller,
    current: &BootState,
    desired: &Value,
    body: Value,
    secure_boot: Option<bool>,
) -> Result<(), ImcError> {
    if !current.system.contains(desired) {
        ctl.patch_resource(&current.system.path, body)?;
    }
    if let (Some(enable), false) = (secure_boot, secure_boot_matches(current, secure_boot)) {
        let path = format!("{}/SecureBoot", current.system.path);
        ctl.patch_resource(&path, json!({ "SecureBootEnable": enable }))?;
    }
    Ok(())
}

fn check_orders(orders: impl Iterator<Item = u8>, count: usize) -> Result<(), ValidationError> {
    if count == 0 {
        return Err(ValidationError::Missing("boot_devices"));
    }
    let mut seen = BTreeSet::new();
    for order in orders {
        if order == 0 {
            return Err(ValidationError::invalid("boot_devices", "order starts at 1"));
        }
        if !seen.insert(order) {
            return Err(ValidationError::invalid(
                "boot_devices",
                format!("order {order} is used more than once"),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "UPPERCASE", deserialize = "lowercase"))]
pub enum DeviceType {
    Efi,
    #[serde(rename(serialize = "LOCALHDD", deserialize = "hdd"))]
    Hdd,
    Lan,
    Storage,
    Iscsi,
    PchStorage,
    Pxe,
    San,
    SdCard,
    UefiShell,
    Usb,
    Vmedia,
    Nvme,
    LocalCdd,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootMode {
    #[default]
    #[serde(alias = "legacy")]
    Legacy,
    #[serde(alias = "none")]
    None,
    #[serde(alias = "uefi")]
    Uefi,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrecisionDevice {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub order: u8,
    #[serde(rename = "type", alias = "device_type", alias = "device-type")]
    pub device_type: DeviceType,
    pub name: String,
    pub slot: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub port: Option<u32>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub lun: Option<u32>,
    pub subtype: Option<String>,
    #[serde_as(as = "Flag")]
    #[serde(default = "enabled")]
    pub state: bool,
}

fn enabled() -> bool {
    true
}

/// Precision boot order: an ordered list of named boot devices.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Precision {
    pub boot_devices: Vec<PrecisionDevice>,
    #[serde(default)]
    pub configured_boot_mode: BootMode,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub reapply: bool,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub reboot_on_update: bool,
    #[serde_as(as = "Option<Flag>")]
    #[serde(default)]
    pub secure_boot: Option<bool>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
}

impl Precision {
    fn desired(&self) -> Value {
        let devices: Vec<Value> = self
            .boot_devices
            .iter()
            .map(|d| {
                jsonmap::without_nulls(json!({
                    "Name": d.name,
                    "Type": d.device_type,
                    "Order": d.order,
                    "Slot": d.slot,
                    "Port": d.port,
                    "Lun": d.lun,
                    "Subtype": d.subtype,
                    "Enabled": d.state,
                }))
            })
            .collect();
        let order: Vec<&str> = self.boot_devices.iter().map(|d| d.name.as_str()).collect();
        json!({ "Boot": {
            "BootOrder": order,
            "Oem": { "Cisco": {
                "ConfiguredBootMode": self.configured_boot_mode,
                "BootDevices": devices,
            } }
        } })
    }

    fn body(&self) -> Value {
        let mut body = self.desired();
        jsonmap::merge(
            &mut body,
            &json!({ "Boot": { "Oem": { "Cisco": { "RebootOnUpdate": self.reboot_on_update } } } }),
        );
        body
    }
}

impl Resource for Precision {
    const KIND: &'static str = "boot_order_precision";
    const ALIASES: &'static [&'static str] = &["boot_order"];
    type State = BootState;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        check_orders(self.boot_devices.iter().map(|d| d.order), self.boot_devices.len())?;
        let mut names = BTreeSet::new();
        for d in &self.boot_devices {
            if d.name.trim().is_empty() {
                return Err(ValidationError::invalid("boot_devices", "every device needs a name"));
            }
            if !names.insert(d.name.as_str()) {
                return Err(ValidationError::invalid(
                    "boot_devices",
                    format!("device {} is listed twice", d.name),
                ));
            }
        }
        self.boot_devices.sort_by_key(|d| d.order);
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<BootState, ImcError> {
        read_boot(ctl, self.server_id, self.secure_boot)
    }

    fn matches(&self, current: &BootState) -> bool {
        !self.reapply
            && current.system.contains(&self.desired())
            && secure_boot_matches(current, self.secure_boot)
    }

    fn write(&self, ctl: &dyn Controller, current: &BootState) -> Result<(), ImcError> {
        if self.reapply {
            ctl.patch_resource(&current.system.path, self.body())?;
            return write_boot(ctl, current, &json!({}), json!({}), self.secure_boot);
        }
        write_boot(ctl, current, &self.desired(), self.body(), self.secure_boot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all(serialize = "UPPERCASE", deserialize = "lowercase"))]
pub enum LegacyDevice {
    Cdrom,
    Efi,
    Fdd,
    Hdd,
    Lan,
    Pxe,
    Storage,
    Usb,
    Vmedia,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyEntry {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub order: u8,
    #[serde(alias = "device-type")]
    pub device: LegacyDevice,
}

/// Legacy boot order: device classes in the order they are tried.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Legacy {
    pub boot_devices: Vec<LegacyEntry>,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub secure_boot: bool,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub reboot_on_update: bool,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
}

impl Legacy {
    fn desired(&self) -> Value {
        let order: Vec<_> = self.boot_devices.iter().map(|e| e.device).collect();
        let entries: Vec<_> = self
            .boot_devices
            .iter()
            .map(|e| json!({ "Device": e.device, "Order": e.order }))
            .collect();
        json!({ "Boot": {
            "BootOrder": order,
            "Oem": { "Cisco": { "LegacyBootOrder": entries } }
        } })
    }

    fn body(&self) -> Value {
        let mut body = self.desired();
        jsonmap::merge(
            &mut body,
            &json!({ "Boot": { "Oem": { "Cisco": { "RebootOnUpdate": self.reboot_on_update } } } }),
        );
        body
    }
}

impl Resource for Legacy {
    const KIND: &'static str = "boot_order_legacy";
    type State = BootState;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        check_orders(self.boot_devices.iter().map(|e| e.order), self.boot_devices.len())?;
        let distinct: BTreeSet<_> = self.boot_devices.iter().map(|e| e.device).collect();
        if distinct.len() != self.boot_devices.len() {
            return Err(ValidationError::invalid("boot_devices", "a device class is listed twice"));
        }
        self.boot_devices.sort_by_key(|e| e.order);
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<BootState, ImcError> {
        read_boot(ctl, self.server_id, Some(self.secure_boot))
    }

    fn matches(&self, current: &BootState) -> bool {
        current.system.contains(&self.desired()) && secure_boot_matches(current, Some(self.secure_boot))
    }

    fn write(&self, ctl: &dyn Controller, current: &BootState) -> Result<(), ImcError> {
        write_boot(ctl, current, &self.desired(), self.body(), Some(self.secure_boot))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::kinds::testing::{assert_converges, run};
    use crate::memory::{MemoryController, FIXTURE_SYSTEM_ID};

    fn boot(imc: &MemoryController) -> serde_json::Value {
        imc.object(&format!("Systems/{FIXTURE_SYSTEM_ID}")).unwrap()["Boot"].clone()
    }

    fn precision() -> serde_json::Value {
        json!({
            "boot_devices": [
                { "order": 2, "type": "pxe", "name": "pxe-lan1", "slot": "L", "port": 1 },
                { "order": "1", "type": "hdd", "name": "raid-boot" }
            ],
            "configured_boot_mode": "Uefi",
            "reboot_on_update": "no"
        })
    }

    #[test]
    fn test_precision_order() {
        let imc = MemoryController::new();
        assert_converges(&imc, "boot_order", precision());
        let b = boot(&imc);
        assert_eq!(b["BootOrder"], json!(["raid-boot", "pxe-lan1"]));
        assert_eq!(b["Oem"]["Cisco"]["ConfiguredBootMode"], "Uefi");
        assert_eq!(b["Oem"]["Cisco"]["BootDevices"][0]["Type"], "LOCALHDD");
        assert_eq!(b["Oem"]["Cisco"]["BootDevices"][1]["Slot"], "L");
    }

    #[test]
    fn test_storage_and_lan_devices() {
        let imc = MemoryController::new();
        let params = json!({ "boot_devices": [
            { "order": "1", "type": "storage", "name": "ext-hdd1" },
            { "order": "2", "type": "lan", "name": "office-lan" }
        ] });
        assert_converges(&imc, "boot_order", params);
        let b = boot(&imc);
        assert_eq!(b["BootOrder"], json!(["ext-hdd1", "office-lan"]));
        assert_eq!(b["Oem"]["Cisco"]["BootDevices"][0]["Type"], "STORAGE");
        assert_eq!(b["Oem"]["Cisco"]["BootDevices"][1]["Type"], "LAN");
    }

    #[test]
    fn test_device_type_key_spelled_with_a_dash() {
        let imc = MemoryController::new();
        let params = json!({ "boot_devices": [
            { "order": "1", "device-type": "hdd", "name": "hdd" },
            { "order": "2", "device-type": "efi", "name": "efi-shell" }
        ] });
        assert_converges(&imc, "boot_order_precision", params);
        assert_eq!(boot(&imc)["Oem"]["Cisco"]["BootDevices"][1]["Type"], "EFI");
    }

    #[test]
    fn test_reapply_always_writes() {
        let imc = MemoryController::new();
        assert_converges(&imc, "boot_order_precision", precision());
        let mut again = precision();
        again["reapply"] = json!("yes");
        assert!(run(&imc, "boot_order_precision", again, false).changed);
        assert_eq!(imc.writes(), 2);
    }

    #[test]
    fn test_precision_secure_boot() {
        let imc = MemoryController::new();
        let mut params = precision();
        params["secure_boot"] = json!(true);
        assert_converges(&imc, "boot_order_precision", params);
        let sb = imc.object(&format!("Systems/{FIXTURE_SYSTEM_ID}/SecureBoot")).unwrap();
        assert_eq!(sb["SecureBootEnable"], true);
    }

    #[test]
    fn test_duplicate_orders_are_rejected() {
        let imc = MemoryController::new();
        let params = json!({ "boot_devices": [
            { "order": 1, "type": "pxe", "name": "a" },
            { "order": 1, "type": "usb", "name": "b" }
        ] });
        let r = run(&imc, "boot_order_precision", params, false);
        assert!(r.failed);
        assert!(r.msg.unwrap().contains("order 1"));
        assert!(run(&imc, "boot_order_precision", json!({ "boot_devices": [] }), false).failed);
    }

    #[test]
    fn test_legacy_order() {
        let imc = MemoryController::new();
        let params = json!({ "boot_devices": [
            { "order": 2, "device": "hdd" },
            { "order": 1, "device-type": "pxe" },
            { "order": 3, "device": "cdrom" }
        ] });
        assert_converges(&imc, "boot_order_legacy", params);
        let b = boot(&imc);
        assert_eq!(b["BootOrder"], json!(["PXE", "HDD", "CDROM"]));
        assert_eq!(b["Oem"]["Cisco"]["LegacyBootOrder"][0], json!({ "Device": "PXE", "Order": 1 }));
    }

    #[test]
    fn test_legacy_secure_boot_only() {
        let imc = MemoryController::new();
        let params = json!({ "boot_devices": [{ "order": 1, "device": "hdd" }] });
        assert_converges(&imc, "boot_order_legacy", params.clone());
        assert_eq!(imc.writes(), 1);
        let mut secure = params;
        secure["secure_boot"] = json!("enabled");
        assert_converges(&imc, "boot_order_legacy", secure);
        assert_eq!(imc.writes(), 2);
    }
}
