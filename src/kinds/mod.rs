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

//! The resource kinds, one desired-state type per kind.
//!
//! Everything is addressed relative to `redfish/v1`. Settings the DMTF
//! schema has no place for live under `Oem.Cisco` of the resource they
//! belong to:
//!
//! | resource | path |
//! |---|---|
//! | network services | `Managers/{m}/NetworkProtocol` |
//! | syslog | `Managers/{m}` |
//! | virtual media | `Managers/{m}/VirtualMedia/{volume}` |
//! | HTTPS certificate | `Managers/{m}/NetworkProtocol/HTTPS/Certificates/1` |
//! | users, LDAP, password policy | `AccountService` |
//! | power, boot order, serial over LAN | `Systems/{s}` |
//! | BIOS profiles | `Systems/{s}/Bios/Profiles` |
//! | virtual drives | `Systems/{s}/Storage/{slot}/Volumes` |

use serde::Serialize;
use serde_json::{Map, Value};

use crate::reconcile::Registry;
use crate::{jsonmap, Controller, Ensure, ImcError, ManagedObject, ValidationError};

pub mod bios;
pub mod boot_order;
pub mod certificate;
pub mod ldap;
pub mod managed_objects;
pub mod protocols;
pub mod remote_presence;
pub mod server;
pub mod snmp;
pub mod storage;
pub mod syslog;
pub mod user;


pub(crate) const ACCOUNT_SERVICE: &str = "AccountService";
pub(crate) const ACCOUNTS: &str = "AccountService/Accounts";
pub(crate) const CERTIFICATE_SERVICE: &str = "CertificateService";

pub fn register_builtin(registry: &mut Registry) {
    registry
        .register::<snmp::Snmp>()
        .register::<snmp::SnmpUser>()
        .register::<syslog::Syslog>()
        .register::<syslog::SyslogRemote>()
        .register::<protocols::Ntp>()
        .register::<ldap::Ldap>()
        .register::<protocols::Ipmi>()
        .register::<protocols::Redfish>()
        .register::<remote_presence::Sol>()
        .register::<remote_presence::Kvm>()
        .register::<remote_presence::Vmedia>()
        .register::<remote_presence::VmediaMount>()
        .register::<user::User>()
        .register::<user::PasswordPolicy>()
        .register::<bios::ProfileActivate>()
        .register::<bios::ProfileDelete>()
        .register::<bios::ProfileUpload>()
        .register::<boot_order::Precision>()
        .register::<boot_order::Legacy>()
        .register::<certificate::CertificateRequest>()
        .register::<certificate::CertificateUpload>()
        .register::<storage::VirtualDrive>()
        .register::<server::Server>()
        .register::<managed_objects::ManagedObjects>();
}

pub(crate) fn default_server_id() -> u32 {
    1
}

pub(crate) fn check_server_id(server_id: u32) -> Result<(), ValidationError> {
    if server_id == 0 {
        return Err(ValidationError::invalid("server_id", "servers are numbered from 1"));
    }
    Ok(())
}

pub(crate) fn manager_path(ctl: &dyn Controller) -> String {
    format!("Managers/{}", ctl.manager_id())
}

pub(crate) fn network_protocol_path(ctl: &dyn Controller) -> String {
    format!("Managers/{}/NetworkProtocol", ctl.manager_id())
}

/// Path of the `server_id`th computer system. Server 1 is the one the
/// session discovered; others are looked up in `Systems`.
pub(crate) fn system_path(ctl: &dyn Controller, server_id: u32) -> Result<String, ImcError> {
    if server_id <= 1 {
        return Ok(format!("Systems/{}", ctl.system_id()));
    }
    let mut systems = ctl.get_members("Systems")?;
    systems.sort();
    systems
        .into_iter()
        .nth(server_id as usize - 1)
        .ok_or_else(|| ImcError::NotFound(format!("server {server_id}")))
}

/// Reads a resource that every IMC has. Its absence is an error.
pub(crate) fn read_required(ctl: &dyn Controller, path: &str) -> Result<ManagedObject, ImcError> {
    ctl.get_resource(path)?
        .ok_or_else(|| ImcError::NotFound(path.to_string()))
}

/// First member of `collection` the predicate accepts.
pub(crate) fn find_member(
    ctl: &dyn Controller,
    collection: &str,
    pred: impl Fn(&ManagedObject) -> bool,
) -> Result<Option<ManagedObject>, ImcError> {
    for path in ctl.get_members(collection)? {
        if let Some(mo) = ctl.get_resource(&path)? {
            if pred(&mo) {
                return Ok(Some(mo));
            }
        }
    }
    Ok(None)
}

/// Serializes a request body, dropping unset optional fields.
pub(crate) fn to_body<T: Serialize + std::fmt::Debug>(url: &str, v: &T) -> Result<Value, ImcError> {
    serde_json::to_value(v)
        .map(jsonmap::without_nulls)
        .map_err(|e| ImcError::JsonSerializeError {
            url: url.to_string(),
            object_debug: format!("{v:?}"),
            source: e,
        })
}

/// Builds the object that sets the value at a JSON pointer, so
/// `nest("/SNMP/ProtocolEnabled", false)` is `{"SNMP": {"ProtocolEnabled": false}}`.
pub(crate) fn nest(pointer: &str, value: Value) -> Value {
    pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .rev()
        .fold(value, |inner, key| {
            let mut m = Map::new();
            m.insert(key.to_string(), inner);
            Value::Object(m)
        })
}

/// Matching rule for services that are switched on with settings or simply
/// switched off. Present needs the switch on and every desired setting in
/// place; absent only needs the switch off.
pub(crate) fn toggle_matches(
    current: &ManagedObject,
    enabled: &str,
    state: Ensure,
    desired: &Value,
) -> bool {
    let is_enabled = current.flag(enabled).unwrap_or(false);
    match state {
        Ensure::Present => is_enabled && current.contains(desired),
        Ensure::Absent => !is_enabled,
    }
}

/// Writes a toggle: the full desired body when present, only the switch
/// when absent.
pub(crate) fn toggle_write(
    ctl: &dyn Controller,
    current: &ManagedObject,
    enabled: &str,
    state: Ensure,
    desired: Value,
) -> Result<(), ImcError> {
    let body = match state {
        Ensure::Present => desired,
        Ensure::Absent => nest(enabled, Value::Bool(false)),
    };
    ctl.patch_resource(&current.path, body)
}

/// True when the last transfer recorded at `record` pulled `file` from
/// `server` over `protocol` and completed.
pub(crate) fn transfer_done(record: Option<&Value>, server: &str, file: &str, protocol: &str) -> bool {
    let Some(record) = record else {
        return false;
    };
    let field = |name: &str| record.get(name).and_then(Value::as_str).unwrap_or_default();
    field("RemoteServer") == server
        && field("RemoteFile") == file
        && field("Protocol").eq_ignore_ascii_case(protocol)
        && field("Status").to_ascii_lowercase().contains("complete")
}

/// Fails when the transfer record at `pointer` of `path` reports a failure.
pub(crate) fn check_transfer(
    ctl: &dyn Controller,
    path: &str,
    pointer: &str,
    what: &str,
) -> Result<(), ImcError> {
    let resource = read_required(ctl, path)?;
    let status = resource
        .str_at(&format!("{pointer}/Status"))
        .unwrap_or_default();
    if status.to_ascii_lowercase().contains("fail") {
        return Err(ImcError::OperationFailed(format!("{what} failed: {status}")));
    }
    Ok(())
}
