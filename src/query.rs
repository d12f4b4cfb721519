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

//! Read-only lookups. Nothing here writes to the controller.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::{Controller, ImcError};

/// Reads each path. Paths the controller does not have map to `null`.
pub fn by_path<S: AsRef<str>>(
    ctl: &dyn Controller,
    paths: &[S],
) -> Result<BTreeMap<String, Value>, ImcError> {
    let mut out = BTreeMap::new();
    for path in paths {
        let path = path.as_ref().trim();
        let body = ctl.get_resource(path)?.map(|mo| mo.body).unwrap_or(Value::Null);
        out.insert(path.to_string(), body);
    }
    Ok(out)
}

/// Reads every member of each collection. A collection the controller does
/// not have is empty.
pub fn by_collection<S: AsRef<str>>(
    ctl: &dyn Controller,
    collections: &[S],
) -> Result<BTreeMap<String, Vec<Value>>, ImcError> {
    let mut out = BTreeMap::new();
    for collection in collections {
        let collection = collection.as_ref().trim();
        out.insert(collection.to_string(), member_bodies(ctl, collection)?);
    }
    Ok(out)
}

fn member_bodies(ctl: &dyn Controller, collection: &str) -> Result<Vec<Value>, ImcError> {
    let members = match ctl.get_members(collection) {
        Ok(m) => m,
        Err(e) if e.is_not_found() => return Ok(vec![]),
        Err(e) => return Err(e),
    };
    let mut bodies = Vec::with_capacity(members.len());
    for m in members {
        if let Some(mo) = ctl.get_resource(&m)? {
            bodies.push(mo.body);
        }
    }
    Ok(bodies)
}

/// Hardware summary of the first system: the system itself plus processors,
/// memory, storage controllers, PCIe devices and power supplies.
pub fn inventory(ctl: &dyn Controller) -> Result<Value, ImcError> {
    let system = format!("Systems/{}", ctl.system_id());
    let summary = ctl.get_resource(&system)?.map(|mo| {
        let field = |name: &str| mo.body.get(name).cloned().unwrap_or(Value::Null);
        json!({
            "id": field("Id"),
            "model": field("Model"),
            "serial": field("SerialNumber"),
            "bios_version": field("BiosVersion"),
            "power_state": field("PowerState"),
        })
    });
    let manager = ctl.get_resource(&format!("Managers/{}", ctl.manager_id()))?;
    Ok(json!({
        "system": summary,
        "firmware": manager.and_then(|m| m.body.get("FirmwareVersion").cloned()),
        "cpu": member_bodies(ctl, &format!("{system}/Processors"))?,
        "memory": member_bodies(ctl, &format!("{system}/Memory"))?,
        "storage": member_bodies(ctl, &format!("{system}/Storage"))?,
        "pci": member_bodies(ctl, &format!("{system}/PCIeDevices"))?,
        "psu": member_bodies(ctl, &format!("Chassis/{}/PowerSubsystem/PowerSupplies", ctl.system_id()))?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryController, FIXTURE_SYSTEM_ID};

    #[test]
    fn test_by_path_marks_missing_as_null() {
        let imc = MemoryController::new();
        let r = by_path(&imc, &["AccountService/Accounts/1", "AccountService/Accounts/7"]).unwrap();
        assert_eq!(r["AccountService/Accounts/1"]["UserName"], "admin");
        assert_eq!(r["AccountService/Accounts/7"], Value::Null);
    }

    #[test]
    fn test_by_collection() {
        let imc = MemoryController::new();
        let r = by_collection(&imc, &["AccountService/Accounts", "Chassis"]).unwrap();
        assert_eq!(r["AccountService/Accounts"].len(), 1);
        assert!(r["Chassis"].is_empty());
    }

    #[test]
    fn test_inventory() {
        let imc = MemoryController::new();
        let inv = inventory(&imc).unwrap();
        assert_eq!(inv["system"]["id"], FIXTURE_SYSTEM_ID);
        assert_eq!(inv["firmware"], "4.1(3b)");
        assert_eq!(inv["cpu"][0]["TotalCores"], 16);
        assert_eq!(inv["memory"][0]["CapacityMiB"], 32768);
        assert_eq!(inv["psu"], json!([]));
        assert_eq!(imc.writes(), 0);
    }
}
