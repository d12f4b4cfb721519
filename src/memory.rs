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

//! An IMC held in memory.
//!
//! Resources live in a map keyed by path. PATCH merges, POST to a collection
//! creates a member, and actions run hooks that mimic what the firmware does
//! (power transitions, media mounts, profile activation, transfers). Every
//! clone shares the same state, so a test can keep one copy to inspect while
//! another is handed out as a `Connector` or a borrowed `Controller`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::jsonmap;
use crate::{Connector, Controller, Endpoint, ImcError, ManagedObject, SessionHandle};

pub const FIXTURE_SYSTEM_ID: &str = "WZP22330ABC";
pub const FIXTURE_MANAGER_ID: &str = "CIMC";

pub type Objects = BTreeMap<String, Value>;

/// Runs when an action is posted. Receives every object, the path of the
/// resource the action belongs to, and the request body.
pub type ActionHook =
    Box<dyn Fn(&mut Objects, &str, &Value) -> Result<Option<Value>, ImcError> + Send>;

#[derive(Default)]
struct Imc {
    objects: Objects,
    hooks: HashMap<String, ActionHook>,
    actions: Vec<(String, Value)>,
    user: String,
    password: String,
    sessions: BTreeSet<String>,
    next_session: u64,
    opened: usize,
    closed: usize,
    writes: usize,
    fail_writes: Option<String>,
}

#[derive(Clone)]
pub struct MemoryController {
    imc: Arc<Mutex<Imc>>,
    session: Option<SessionHandle>,
    system_id: String,
    manager_id: String,
}

impl Default for MemoryController {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryController {
    /// A rack server with one system, one manager and the settings a freshly
    /// installed IMC ships with. Accepts `admin` / `password`.
    pub fn new() -> Self {
        let imc = Self::bare(FIXTURE_SYSTEM_ID, FIXTURE_MANAGER_ID);
        for (path, body) in fixture(FIXTURE_SYSTEM_ID, FIXTURE_MANAGER_ID) {
            imc.insert(&path, body);
        }
        imc
    }

    /// No resources at all, only the standard action behaviour.
    pub fn bare(system_id: &str, manager_id: &str) -> Self {
        let mut imc = Imc {
            user: "admin".to_string(),
            password: "password".to_string(),
            ..Default::default()
        };
        install_standard_hooks(&mut imc.hooks);
        MemoryController {
            imc: Arc::new(Mutex::new(imc)),
            session: None,
            system_id: system_id.to_string(),
            manager_id: manager_id.to_string(),
        }
    }

    pub fn with_credentials(self, user: &str, password: &str) -> Self {
        {
            let mut imc = self.lock();
            imc.user = user.to_string();
            imc.password = password.to_string();
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, Imc> {
        self.imc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, path: &str, mut body: Value) {
        if let Value::Object(m) = &mut body {
            m.entry("@odata.id")
                .or_insert_with(|| json!(format!("/redfish/v1/{path}")));
        }
        self.lock().objects.insert(path.to_string(), body);
    }

    pub fn object(&self, path: &str) -> Option<Value> {
        self.lock().objects.get(path).cloned()
    }

    /// Copy of every resource, for before/after comparisons.
    pub fn snapshot(&self) -> Objects {
        self.lock().objects.clone()
    }

    /// Replaces the behaviour of an action, keyed by its name such as
    /// `ComputerSystem.Reset`.
    pub fn on_action(&self, name: &str, hook: ActionHook) {
        self.lock().hooks.insert(name.to_string(), hook);
    }

    /// Makes every following write fail with `msg`.
    pub fn fail_writes(&self, msg: &str) {
        self.lock().fail_writes = Some(msg.to_string());
    }

    /// Number of PATCH, POST, DELETE and action requests that succeeded.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Every action posted, in order.
    pub fn actions(&self) -> Vec<(String, Value)> {
        self.lock().actions.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.lock().opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.lock().closed
    }

    fn check_session(&self, imc: &Imc) -> Result<(), ImcError> {
        match &self.session {
            Some(s) if !imc.sessions.contains(&s.token) => Err(unauthorized(&s.session_uri)),
            _ => Ok(()),
        }
    }

    fn write<T>(&self, f: impl FnOnce(&mut Imc) -> Result<T, ImcError>) -> Result<T, ImcError> {
        let mut imc = self.lock();
        self.check_session(&imc)?;
        if let Some(msg) = &imc.fail_writes {
            return Err(ImcError::OperationFailed(msg.clone()));
        }
        let out = f(&mut imc)?;
        imc.writes += 1;
        Ok(out)
    }
}

fn not_found(path: &str) -> ImcError {
    ImcError::HTTPErrorCode {
        url: path.to_string(),
        status_code: StatusCode::NOT_FOUND,
        response_body: String::new(),
    }
}

fn unauthorized(path: &str) -> ImcError {
    ImcError::HTTPErrorCode {
        url: path.to_string(),
        status_code: StatusCode::UNAUTHORIZED,
        response_body: String::new(),
    }
}

fn members(objects: &Objects, collection: &str) -> Vec<String> {
    let prefix = format!("{collection}/");
    objects
        .keys()
        .filter(|k| k.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/')))
        .cloned()
        .collect()
}

fn split_action(path: &str) -> (&str, &str) {
    let resource = path.split("/Actions/").next().unwrap_or(path);
    let name = path.rsplit('/').next().unwrap_or(path);
    (resource, name)
}

impl Controller for MemoryController {
    fn system_id(&self) -> &str {
        &self.system_id
    }

    fn manager_id(&self) -> &str {
        &self.manager_id
    }

    fn get_resource(&self, path: &str) -> Result<Option<ManagedObject>, ImcError> {
        let imc = self.lock();
        self.check_session(&imc)?;
        let Some(mut body) = imc.objects.get(path).cloned() else {
            return Ok(None);
        };
        if let Some(m) = body.get_mut("Members") {
            *m = members(&imc.objects, path)
                .into_iter()
                .map(|p| json!({ "@odata.id": format!("/redfish/v1/{p}") }))
                .collect();
        }
        Ok(Some(ManagedObject::new(path, body)))
    }

    fn get_members(&self, collection: &str) -> Result<Vec<String>, ImcError> {
        let imc = self.lock();
        self.check_session(&imc)?;
        let found = members(&imc.objects, collection);
        if found.is_empty() && !imc.objects.contains_key(collection) {
            return Err(not_found(collection));
        }
        Ok(found)
    }

    fn patch_resource(&self, path: &str, body: Value) -> Result<(), ImcError> {
        self.write(|imc| {
            let current = imc.objects.get_mut(path).ok_or_else(|| not_found(path))?;
            jsonmap::merge(current, &body);
            Ok(())
        })
    }

    fn create_member(&self, collection: &str, body: Value) -> Result<String, ImcError> {
        self.write(|imc| {
            let id = match body.get("Id").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => (1..)
                    .map(|n: u64| n.to_string())
                    .find(|n| !imc.objects.contains_key(&format!("{collection}/{n}")))
                    .unwrap_or_default(),
            };
            let path = format!("{collection}/{id}");
            if imc.objects.contains_key(&path) {
                return Err(ImcError::HTTPErrorCode {
                    url: path,
                    status_code: StatusCode::CONFLICT,
                    response_body: String::new(),
                });
            }
            let mut member = json!({ "@odata.id": format!("/redfish/v1/{path}"), "Id": id });
            jsonmap::merge(&mut member, &body);
            imc.objects.insert(path.clone(), member);
            Ok(path)
        })
    }

    fn delete_resource(&self, path: &str) -> Result<(), ImcError> {
        self.write(|imc| {
            imc.objects.remove(path).ok_or_else(|| not_found(path))?;
            let prefix = format!("{path}/");
            imc.objects.retain(|k, _| !k.starts_with(&prefix));
            Ok(())
        })
    }

    fn post_action(&self, path: &str, body: Value) -> Result<Option<Value>, ImcError> {
        self.write(|imc| {
            imc.actions.push((path.to_string(), body.clone()));
            let (resource, name) = split_action(path);
            let Imc { objects, hooks, .. } = imc;
            match hooks.get(name) {
                Some(hook) => hook(objects, resource, &body),
                None => Ok(None),
            }
        })
    }

    fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    fn logout(&self) -> Result<(), ImcError> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let mut imc = self.lock();
        if !imc.sessions.remove(&session.token) {
            return Err(not_found(&session.session_uri));
        }
        imc.closed += 1;
        Ok(())
    }
}

impl Connector for MemoryController {
    fn authenticate(&self, endpoint: &Endpoint) -> Result<Box<dyn Controller>, ImcError> {
        let mut imc = self.lock();
        if endpoint.user != imc.user || endpoint.password != imc.password {
            return Err(unauthorized("SessionService/Sessions"));
        }
        imc.next_session += 1;
        let n = imc.next_session;
        let token = format!("memory-token-{n}");
        imc.sessions.insert(token.clone());
        imc.opened += 1;
        let mut controller = self.clone();
        controller.session = Some(SessionHandle {
            host: endpoint.host.clone(),
            port: endpoint.port,
            secure: endpoint.secure,
            proxy: endpoint.proxy.clone(),
            token,
            session_uri: format!("SessionService/Sessions/{n}"),
        });
        Ok(Box::new(controller))
    }

    fn resume(&self, session: &SessionHandle) -> Result<Box<dyn Controller>, ImcError> {
        if !self.lock().sessions.contains(&session.token) {
            return Err(unauthorized(&session.session_uri));
        }
        let mut controller = self.clone();
        controller.session = Some(session.clone());
        Ok(Box::new(controller))
    }
}

fn object_mut<'a>(objects: &'a mut Objects, path: &str) -> Result<&'a mut Value, ImcError> {
    objects.get_mut(path).ok_or_else(|| not_found(path))
}

fn transfer_record(body: &Value, server: &str, file: &str) -> Value {
    json!({
        "RemoteServer": body.get(server),
        "RemoteFile": body.get(file),
        "Protocol": body.get("Protocol"),
        "Status": "Completed",
    })
}

fn install_standard_hooks(hooks: &mut HashMap<String, ActionHook>) {
    hooks.insert(
        "ComputerSystem.Reset".to_string(),
        Box::new(|objects: &mut Objects, system: &str, body: &Value| {
            let power = match body.get("ResetType").and_then(Value::as_str) {
                Some("ForceOff" | "GracefulShutdown") => "Off",
                _ => "On",
            };
            jsonmap::merge(object_mut(objects, system)?, &json!({ "PowerState": power }));
            Ok(None)
        }),
    );
    hooks.insert(
        "VirtualMedia.InsertMedia".to_string(),
        Box::new(|objects: &mut Objects, volume: &str, body: &Value| {
            let mut media = body.clone();
            if let Value::Object(m) = &mut media {
                m.remove("UserName");
                m.remove("Password");
                m.insert("Inserted".to_string(), json!(true));
            }
            let id = volume.rsplit('/').next().unwrap_or(volume);
            let current = objects.entry(volume.to_string()).or_insert_with(|| {
                json!({ "@odata.id": format!("/redfish/v1/{volume}"), "Id": id })
            });
            jsonmap::merge(current, &media);
            Ok(None)
        }),
    );
    hooks.insert(
        "VirtualMedia.EjectMedia".to_string(),
        Box::new(|objects: &mut Objects, volume: &str, _body: &Value| {
            jsonmap::merge(
                object_mut(objects, volume)?,
                &json!({ "Inserted": false, "Image": null }),
            );
            Ok(None)
        }),
    );
    hooks.insert(
        "BiosProfile.Activate".to_string(),
        Box::new(|objects: &mut Objects, profile: &str, _body: &Value| {
            object_mut(objects, profile)?;
            let collection = profile.rsplit_once('/').map(|(c, _)| c).unwrap_or("");
            for sibling in members(objects, collection) {
                let active = sibling == profile;
                if let Some(p) = objects.get_mut(&sibling) {
                    jsonmap::merge(p, &json!({ "Active": active }));
                }
            }
            Ok(None)
        }),
    );
    hooks.insert(
        "BiosProfileCollection.Upload".to_string(),
        Box::new(|objects: &mut Objects, profiles: &str, body: &Value| {
            let record = transfer_record(body, "RemoteServer", "RemoteFile");
            jsonmap::merge(
                object_mut(objects, profiles)?,
                &json!({ "Oem": { "Cisco": { "UploadStatus": record } } }),
            );
            Ok(None)
        }),
    );
    hooks.insert(
        "CertificateService.GenerateCSR".to_string(),
        Box::new(|objects: &mut Objects, service: &str, body: &Value| {
            let subject = json!({
                "CommonName": body.get("CommonName"),
                "Organization": body.get("Organization"),
                "OrganizationalUnit": body.get("OrganizationalUnit"),
                "City": body.get("City"),
                "State": body.get("State"),
                "Country": body.get("Country"),
                "Email": body.get("Email"),
            });
            let subject = jsonmap::without_nulls(subject);
            jsonmap::merge(
                object_mut(objects, service)?,
                &json!({ "Oem": { "Cisco": { "LastCSR": subject } } }),
            );
            let self_signed = body
                .pointer("/Oem/Cisco/SelfSigned")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if self_signed {
                if let Some(cert) = body
                    .pointer("/CertificateCollection/@odata.id")
                    .and_then(Value::as_str)
                    .map(|c| format!("{}/1", crate::network::relative_path(c)))
                {
                    objects.insert(
                        cert.clone(),
                        json!({ "@odata.id": format!("/redfish/v1/{cert}"), "Id": "1", "Subject": subject }),
                    );
                }
            }
            Ok(Some(json!({ "CSRString": "-----BEGIN CERTIFICATE REQUEST-----" })))
        }),
    );
    hooks.insert(
        "CiscoCertificateService.Upload".to_string(),
        Box::new(|objects: &mut Objects, service: &str, body: &Value| {
            let record = transfer_record(body, "RemoteServer", "RemoteFile");
            jsonmap::merge(
                object_mut(objects, service)?,
                &json!({ "Oem": { "Cisco": { "UploadStatus": record } } }),
            );
            Ok(None)
        }),
    );
    hooks.insert(
        "CiscoVolume.SetBootDrive".to_string(),
        Box::new(|objects: &mut Objects, volume: &str, _body: &Value| {
            object_mut(objects, volume)?;
            let collection = volume.rsplit_once('/').map(|(c, _)| c).unwrap_or("");
            for sibling in members(objects, collection) {
                let boot = sibling == volume;
                if let Some(v) = objects.get_mut(&sibling) {
                    jsonmap::merge(v, &json!({ "Oem": { "Cisco": { "BootDrive": boot } } }));
                }
            }
            Ok(None)
        }),
    );
}

fn fixture(s: &str, m: &str) -> Vec<(String, Value)> {
    vec![
        ("Systems".to_string(), json!({ "Name": "Computer System Collection", "Members": [] })),
        (
            format!("Systems/{s}"),
            json!({
                "Id": s,
                "Model": "UCSC-C220-M5SX",
                "SerialNumber": s,
                "PowerState": "Off",
                "IndicatorLED": "Off",
                "Boot": {
                    "BootSourceOverrideMode": "Legacy",
                    "BootOrder": [],
                    "Oem": { "Cisco": { "ConfiguredBootMode": "Legacy", "BootDevices": [] } }
                },
                "SerialConsole": { "IPMI": { "ServiceEnabled": false } },
                "Oem": { "Cisco": { "SerialOverLan": { "BaudRate": 115200, "ComPort": "com0", "SshPort": 22 } } }
            }),
        ),
        (
            format!("Systems/{s}/SecureBoot"),
            json!({ "Id": "SecureBoot", "SecureBootEnable": false }),
        ),
        (
            format!("Systems/{s}/Bios/Profiles"),
            json!({ "Name": "BIOS Profiles", "Members": [] }),
        ),
        (
            format!("Systems/{s}/Processors"),
            json!({ "Name": "Processors Collection", "Members": [] }),
        ),
        (
            format!("Systems/{s}/Processors/CPU1"),
            json!({ "Id": "CPU1", "Model": "Intel(R) Xeon(R) Gold 6130 CPU @ 2.10GHz", "TotalCores": 16 }),
        ),
        (
            format!("Systems/{s}/Memory"),
            json!({ "Name": "Memory Collection", "Members": [] }),
        ),
        (
            format!("Systems/{s}/Memory/DIMM_A1"),
            json!({ "Id": "DIMM_A1", "CapacityMiB": 32768, "MemoryDeviceType": "DDR4" }),
        ),
        (
            format!("Systems/{s}/Storage"),
            json!({ "Name": "Storage Collection", "Members": [] }),
        ),
        (
            format!("Systems/{s}/Storage/MRAID"),
            json!({ "Id": "MRAID", "Name": "Cisco 12G Modular Raid Controller" }),
        ),
        (
            format!("Systems/{s}/Storage/MRAID/Volumes"),
            json!({ "Name": "Volumes", "Members": [] }),
        ),
        ("Managers".to_string(), json!({ "Name": "Manager Collection", "Members": [] })),
        (
            format!("Managers/{m}"),
            json!({
                "Id": m,
                "FirmwareVersion": "4.1(3b)",
                "Oem": { "Cisco": {
                    "Syslog": { "LocalSeverity": "informational", "RemoteSeverity": "informational" },
                    "RemoteSyslog": {
                        "Primary": { "Enabled": false, "Hostname": "0.0.0.0", "Port": 514 },
                        "Secondary": { "Enabled": false, "Hostname": "0.0.0.0", "Port": 514 },
                        "Tertiary": { "Enabled": false, "Hostname": "0.0.0.0", "Port": 514 }
                    }
                } }
            }),
        ),
        (
            format!("Managers/{m}/NetworkProtocol"),
            json!({
                "Id": "ManagerNetworkProtocol",
                "HostName": format!("C220-{s}"),
                "SNMP": { "ProtocolEnabled": false, "Port": 161 },
                "IPMI": { "ProtocolEnabled": false, "Port": 623 },
                "NTP": { "ProtocolEnabled": false, "NTPServers": [] },
                "KVMIP": { "ProtocolEnabled": true, "Port": 2068 },
                "VirtualMedia": { "ProtocolEnabled": true, "Port": 2068 },
                "SSH": { "ProtocolEnabled": true, "Port": 22 },
                "HTTPS": { "ProtocolEnabled": true, "Port": 443 },
                "Oem": { "Cisco": {
                    "SNMP": { "CommunityAccess": "Disabled" },
                    "IPMI": { "Privilege": "read-only" },
                    "KVMIP": { "MaxSessions": 4, "Encryption": false, "LocalVideo": true },
                    "VirtualMedia": { "Encryption": false, "LowPowerUsb": true },
                    "Redfish": { "Enabled": true }
                } }
            }),
        ),
        (
            format!("Managers/{m}/NetworkProtocol/HTTPS/Certificates"),
            json!({ "Name": "HTTPS Certificates", "Members": [] }),
        ),
        (
            format!("Managers/{m}/NetworkProtocol/HTTPS/Certificates/1"),
            json!({
                "Id": "1",
                "Subject": { "CommonName": format!("C220-{s}"), "Organization": "Cisco Self Signed" }
            }),
        ),
        (
            "CertificateService".to_string(),
            json!({ "Id": "CertificateService", "Oem": { "Cisco": {} } }),
        ),
        (
            "AccountService".to_string(),
            json!({
                "Id": "AccountService",
                "LDAP": { "ServiceEnabled": false },
                "Oem": { "Cisco": { "PasswordPolicy": {
                    "StrongPassword": true,
                    "ExpiryDuration": 0,
                    "History": 0,
                    "NotificationPeriod": 15,
                    "GracePeriod": 0
                } } }
            }),
        ),
        (
            "AccountService/Accounts".to_string(),
            json!({ "Name": "Accounts Collection", "Members": [] }),
        ),
        (
            "AccountService/Accounts/1".to_string(),
            json!({
                "Id": "1",
                "UserName": "admin",
                "RoleId": "Administrator",
                "Enabled": true,
                "Locked": false,
                "AccountTypes": ["Redfish"]
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_are_direct_children_only() {
        let imc = MemoryController::new();
        let members = imc.get_members("AccountService/Accounts").unwrap();
        assert_eq!(members, vec!["AccountService/Accounts/1".to_string()]);
        let systems = imc.get_members("Systems").unwrap();
        assert_eq!(systems, vec![format!("Systems/{FIXTURE_SYSTEM_ID}")]);
        assert!(imc.get_members("Chassis").unwrap_err().is_not_found());
    }

    #[test]
    fn test_collection_body_lists_current_members() {
        let imc = MemoryController::new();
        let path = imc
            .create_member("AccountService/Accounts", json!({ "UserName": "ops" }))
            .unwrap();
        assert_eq!(path, "AccountService/Accounts/2");
        let coll = imc.get_resource("AccountService/Accounts").unwrap().unwrap();
        assert_eq!(coll.body["Members"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_patch_merges_and_counts() {
        let imc = MemoryController::new();
        let path = format!("Managers/{FIXTURE_MANAGER_ID}/NetworkProtocol");
        imc.patch_resource(&path, json!({ "SNMP": { "ProtocolEnabled": true } }))
            .unwrap();
        let np = imc.object(&path).unwrap();
        assert_eq!(np["SNMP"], json!({ "ProtocolEnabled": true, "Port": 161 }));
        assert_eq!(imc.writes(), 1);
        assert!(imc.patch_resource("Nope", json!({})).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_removes_children() {
        let imc = MemoryController::new();
        let storage = format!("Systems/{FIXTURE_SYSTEM_ID}/Storage/MRAID");
        imc.delete_resource(&storage).unwrap();
        assert!(imc.object(&format!("{storage}/Volumes")).is_none());
    }

    #[test]
    fn test_reset_hook_changes_power() {
        let imc = MemoryController::new();
        let system = format!("Systems/{FIXTURE_SYSTEM_ID}");
        imc.post_action(
            &format!("{system}/Actions/ComputerSystem.Reset"),
            json!({ "ResetType": "On" }),
        )
        .unwrap();
        assert_eq!(imc.object(&system).unwrap()["PowerState"], "On");
        assert_eq!(imc.actions().len(), 1);
    }

    #[test]
    fn test_failed_writes_leave_state_alone() {
        let imc = MemoryController::new();
        let before = imc.snapshot();
        imc.fail_writes("controller busy");
        let err = imc
            .patch_resource("AccountService", json!({ "LDAP": { "ServiceEnabled": true } }))
            .unwrap_err();
        assert_eq!(err.to_string(), "Operation failed: controller busy");
        assert_eq!(imc.snapshot(), before);
        assert_eq!(imc.writes(), 0);
    }

    #[test]
    fn test_closed_session_is_unusable() {
        let imc = MemoryController::new();
        let endpoint = Endpoint {
            host: "10.0.0.5".to_string(),
            password: "password".to_string(),
            ..Default::default()
        };
        let ctl = imc.authenticate(&endpoint).unwrap();
        ctl.logout().unwrap();
        assert!(ctl.get_resource("AccountService").is_err());
        assert!(ctl.logout().is_err());
        assert_eq!(imc.sessions_closed(), 1);
    }
}
