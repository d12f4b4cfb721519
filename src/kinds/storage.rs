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

use super::{check_server_id, default_server_id, read_required, system_path};
use crate::model::Flag;
use crate::reconcile::Resource;
use crate::{jsonmap, Controller, Ensure, ImcError, ManagedObject, ValidationError};

const RAID_LEVELS: [u8; 7] = [0, 1, 5, 6, 10, 50, 60];
const STRIP_SIZES: [&str; 5] = ["64k", "128k", "256k", "512k", "1024k"];
const MAX_SPANS: usize = 8;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPolicy {
    #[default]
    ReadWrite,
    ReadOnly,
    Blocked,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadPolicy {
    #[default]
    NoReadAhead,
    AlwaysReadAhead,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    #[default]
    DirectIo,
    CachedIo,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiskCachePolicy {
    #[default]
    Unchanged,
    Enabled,
    Disabled,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WritePolicy {
    #[default]
    #[serde(rename = "Write Through", alias = "write-through")]
    WriteThrough,
    #[serde(rename = "Write Back Good BBU", alias = "write-back-good-bbu")]
    WriteBackGoodBbu,
    #[serde(rename = "Always Write Back", alias = "always-write-back")]
    AlwaysWriteBack,
}

/// A RAID virtual drive built from physical drives on one controller.
///
/// `drive_group` lists spans of physical drive numbers. Levels 0, 1, 5 and 6
/// take one span; the nested levels 10, 50 and 60 take two or more. When no
/// name is given the drive is called `RAID{level}_{drives}`, for example
/// `RAID1_12` for a mirror of drives 1 and 2. Removing a drive by name
/// needs no `drive_group`.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualDrive {
    #[serde(default)]
    pub drive_group: Vec<Vec<u32>>,
    #[serde(default = "default_controller_type")]
    pub controller_type: String,
    pub controller_slot: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub raid_level: u8,
    pub virtual_drive_name: Option<String>,
    #[serde(default)]
    pub access_policy: AccessPolicy,
    #[serde(default)]
    pub read_policy: ReadPolicy,
    #[serde(default)]
    pub cache_policy: CachePolicy,
    #[serde(default)]
    pub disk_cache_policy: DiskCachePolicy,
    #[serde(default)]
    pub write_policy: WritePolicy,
    #[serde(default = "default_strip_size")]
    pub strip_size: String,
    pub size: Option<String>,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub boot_drive: bool,
    pub admin_action: Option<String>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
    #[serde(default)]
    pub state: Ensure,
}

fn default_controller_type() -> String {
    "SAS".to_string()
}

fn default_strip_size() -> String {
    "64k".to_string()
}

fn min_drives_per_span(level: u8) -> usize {
    match level {
        0 => 1,
        1 | 10 => 2,
        5 | 50 => 3,
        _ => 4,
    }
}

impl VirtualDrive {
    fn name(&self) -> &str {
        self.virtual_drive_name.as_deref().unwrap_or_default()
    }

    fn storage_path(&self, ctl: &dyn Controller) -> Result<String, ImcError> {
        Ok(format!(
            "{}/Storage/{}",
            system_path(ctl, self.server_id)?,
            self.controller_slot
        ))
    }

    fn create_body(&self, storage: &str) -> Value {
        let drives: Vec<Value> = self
            .drive_group
            .iter()
            .flatten()
            .map(|d| json!({ "@odata.id": format!("/redfish/v1/{storage}/Drives/{d}") }))
            .collect();
        jsonmap::without_nulls(json!({
            "Name": self.name(),
            "RAIDType": format!("RAID{}", self.raid_level),
            "Links": { "Drives": drives },
            "Oem": { "Cisco": {
                "DriveGroup": self.drive_group,
                "AccessPolicy": self.access_policy,
                "ReadPolicy": self.read_policy,
                "CachePolicy": self.cache_policy,
                "DiskCachePolicy": self.disk_cache_policy,
                "WritePolicy": self.write_policy,
                "StripSize": self.strip_size,
                "Size": self.size,
                "AdminAction": self.admin_action,
            } }
        }))
    }

    fn set_boot_drive(&self, ctl: &dyn Controller, volume: &str) -> Result<(), ImcError> {
        ctl.post_action(&format!("{volume}/Actions/Oem/CiscoVolume.SetBootDrive"), json!({}))?;
        Ok(())
    }
}

impl Resource for VirtualDrive {
    const KIND: &'static str = "virtual_drive";
    type State = Option<ManagedObject>;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        if self.controller_slot.is_empty() {
            return Err(ValidationError::Missing("controller_slot"));
        }
        if !self.controller_type.eq_ignore_ascii_case("SAS") {
            return Err(ValidationError::invalid("controller_type", "only SAS controllers hold virtual drives"));
        }
        let level = self.raid_level;
        if !RAID_LEVELS.contains(&level) {
            return Err(ValidationError::invalid("raid_level", format!("one of {RAID_LEVELS:?}")));
        }
        if !STRIP_SIZES.contains(&self.strip_size.as_str()) {
            return Err(ValidationError::invalid("strip_size", format!("one of {STRIP_SIZES:?}")));
        }
        let spans = self.drive_group.len();
        let nested = level >= 10;
        if spans == 0 && (self.state.is_present() || self.virtual_drive_name.is_none()) {
            return Err(ValidationError::Missing("drive_group"));
        }
        if spans > 0 {
            if !nested && spans != 1 {
                return Err(ValidationError::invalid("drive_group", format!("RAID {level} takes one span")));
            }
            if nested && !(2..=MAX_SPANS).contains(&spans) {
                return Err(ValidationError::invalid(
                    "drive_group",
                    format!("RAID {level} takes 2-{MAX_SPANS} spans"),
                ));
            }
            let min = min_drives_per_span(level);
            if let Some(short) = self.drive_group.iter().find(|span| span.len() < min) {
                return Err(ValidationError::invalid(
                    "drive_group",
                    format!("RAID {level} needs at least {min} drives per span, got {short:?}"),
                ));
            }
            let mut drives: Vec<u32> = self.drive_group.iter().flatten().copied().collect();
            drives.sort_unstable();
            let total = drives.len();
            drives.dedup();
            if drives.len() != total {
                return Err(ValidationError::invalid("drive_group", "a drive is used twice"));
            }
        }
        if self.virtual_drive_name.is_none() {
            let drives: String = self
                .drive_group
                .iter()
                .flatten()
                .map(|d| d.to_string())
                .collect();
            self.virtual_drive_name = Some(format!("RAID{level}_{drives}"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<Option<ManagedObject>, ImcError> {
        let storage = read_required(ctl, &self.storage_path(ctl)?)?;
        let volumes = format!("{}/Volumes", storage.path);
        match super::find_member(ctl, &volumes, |v| v.str_at("/Name") == Some(self.name())) {
            Err(e) if e.is_not_found() => Ok(None),
            found => found,
        }
    }

    fn matches(&self, current: &Option<ManagedObject>) -> bool {
        match (self.state, current) {
            (Ensure::Present, Some(volume)) => {
                !self.boot_drive || volume.flag("/Oem/Cisco/BootDrive") == Some(true)
            }
            (Ensure::Present, None) => false,
            (Ensure::Absent, volume) => volume.is_none(),
        }
    }

    fn write(&self, ctl: &dyn Controller, current: &Option<ManagedObject>) -> Result<(), ImcError> {
        match (self.state, current) {
            (Ensure::Present, Some(volume)) => self.set_boot_drive(ctl, &volume.path),
            (Ensure::Present, None) => {
                let storage = self.storage_path(ctl)?;
                let created =
                    ctl.create_member(&format!("{storage}/Volumes"), self.create_body(&storage))?;
                if self.boot_drive {
                    self.set_boot_drive(ctl, &created)?;
                }
                Ok(())
            }
            (Ensure::Absent, Some(volume)) => ctl.delete_resource(&volume.path),
            (Ensure::Absent, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::kinds::testing::{assert_converges, run};
    use crate::memory::{MemoryController, FIXTURE_SYSTEM_ID};

    fn volumes() -> String {
        format!("Systems/{FIXTURE_SYSTEM_ID}/Storage/MRAID/Volumes")
    }

    #[test]
    fn test_mirror_gets_a_derived_name() {
        let imc = MemoryController::new();
        let params = json!({ "drive_group": [[1, 2]], "controller_slot": "MRAID", "raid_level": "1" });
        assert_converges(&imc, "virtual_drive", params);
        let vd = imc.object(&format!("{}/1", volumes())).unwrap();
        assert_eq!(vd["Name"], "RAID1_12");
        assert_eq!(vd["RAIDType"], "RAID1");
        assert_eq!(vd["Oem"]["Cisco"]["WritePolicy"], "Write Through");
        assert_eq!(
            vd["Links"]["Drives"][1]["@odata.id"],
            format!("/redfish/v1/Systems/{FIXTURE_SYSTEM_ID}/Storage/MRAID/Drives/2")
        );
    }

    #[test]
    fn test_boot_drive() {
        let imc = MemoryController::new();
        let params = json!({
            "drive_group": [[1, 2, 3], [4, 5, 6]],
            "controller_slot": "MRAID",
            "raid_level": 50,
            "virtual_drive_name": "data",
            "boot_drive": "yes"
        });
        assert_converges(&imc, "virtual_drive", params);
        let vd = imc.object(&format!("{}/1", volumes())).unwrap();
        assert_eq!(vd["Oem"]["Cisco"]["BootDrive"], true);
    }

    #[test]
    fn test_delete_by_name() {
        let imc = MemoryController::new();
        let create = json!({ "drive_group": [[3]], "controller_slot": "MRAID" });
        assert_converges(&imc, "virtual_drive", create);
        let delete = json!({ "controller_slot": "MRAID", "virtual_drive_name": "RAID0_3", "state": "absent" });
        assert_converges(&imc, "virtual_drive", delete);
        assert!(imc.object(&format!("{}/1", volumes())).is_none());
    }

    #[test]
    fn test_create_needs_a_drive_group() {
        let imc = MemoryController::new();
        let r = run(&imc, "virtual_drive", json!({ "controller_slot": "MRAID", "virtual_drive_name": "data" }), false);
        assert!(r.failed);
        assert!(r.msg.unwrap().contains("drive_group"));
        assert_eq!(imc.writes(), 0);
    }

    #[test]
    fn test_write_policy_in_lower_case() {
        let imc = MemoryController::new();
        let params = json!({
            "drive_group": [[1, 2]],
            "controller_slot": "MRAID",
            "raid_level": 1,
            "write_policy": "write-back-good-bbu"
        });
        assert_converges(&imc, "virtual_drive", params);
        let vd = imc.object(&format!("{}/1", volumes())).unwrap();
        assert_eq!(vd["Oem"]["Cisco"]["WritePolicy"], "Write Back Good BBU");
    }

    #[test]
    fn test_invalid_groups() {
        let imc = MemoryController::new();
        for params in [
            json!({ "drive_group": [[1]], "controller_slot": "MRAID", "raid_level": 5 }),
            json!({ "drive_group": [[1, 2]], "controller_slot": "MRAID", "raid_level": 10 }),
            json!({ "drive_group": [[1, 2], [2, 3]], "controller_slot": "MRAID", "raid_level": 10 }),
            json!({ "drive_group": [[1]], "controller_slot": "MRAID", "raid_level": 3 }),
        ] {
            assert!(run(&imc, "virtual_drive", params, false).failed);
        }
        assert_eq!(imc.writes(), 0);
    }

    #[test]
    fn test_unknown_controller() {
        let imc = MemoryController::new();
        let r = run(&imc, "virtual_drive", json!({ "drive_group": [[1]], "controller_slot": "SLOT-9" }), false);
        assert!(r.failed);
        assert!(r.msg.unwrap().contains("Storage/SLOT-9"));
    }
}
