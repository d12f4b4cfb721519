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

//! BIOS profiles: uploading a profile file to the controller, activating a
//! stored profile and deleting one.

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::{check_server_id, check_transfer, default_server_id, read_required, system_path, to_body};
use crate::model::{Flag, TransferProtocol};
use crate::reconcile::Resource;
use crate::{Controller, ImcError, ManagedObject, ValidationError};

const UPLOAD_STATUS: &str = "/Oem/Cisco/UploadStatus";

fn profiles_path(ctl: &dyn Controller, server_id: u32) -> Result<String, ImcError> {
    Ok(format!("{}/Bios/Profiles", system_path(ctl, server_id)?))
}

fn find_profile(
    ctl: &dyn Controller,
    server_id: u32,
    name: &str,
) -> Result<Option<ManagedObject>, ImcError> {
    let profiles = profiles_path(ctl, server_id)?;
    super::find_member(ctl, &profiles, |mo| {
        mo.str_at("/Name").or_else(|| mo.str_at("/Id")) == Some(name)
    })
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::Missing("name"));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ActivateRequest {
    backup_on_activate: bool,
    reboot_on_activate: bool,
}

/// Makes a stored profile the active one.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileActivate {
    pub name: String,
    #[serde_as(as = "Flag")]
    #[serde(default = "yes")]
    pub backup_on_activate: bool,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub reboot_on_activate: bool,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
}

fn yes() -> bool {
    true
}

impl Resource for ProfileActivate {
    const KIND: &'static str = "bios_profile_activate";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        check_name(&self.name)
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        find_profile(ctl, self.server_id, &self.name)?
            .ok_or_else(|| ImcError::NotFound(format!("BIOS profile {}", self.name)))
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        current.flag("/Active").unwrap_or(false)
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        let action = format!("{}/Actions/BiosProfile.Activate", current.path);
        let body = to_body(
            &action,
            &ActivateRequest {
                backup_on_activate: self.backup_on_activate,
                reboot_on_activate: self.reboot_on_activate,
            },
        )?;
        ctl.post_action(&action, body)?;
        Ok(())
    }
}

/// Removes a stored profile. A profile that is not there is already deleted.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileDelete {
    pub name: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
}

impl Resource for ProfileDelete {
    const KIND: &'static str = "bios_profile_delete";
    type State = Option<ManagedObject>;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        check_name(&self.name)
    }

    fn read(&self, ctl: &dyn Controller) -> Result<Option<ManagedObject>, ImcError> {
        find_profile(ctl, self.server_id, &self.name)
    }

    fn matches(&self, current: &Option<ManagedObject>) -> bool {
        current.is_none()
    }

    fn write(&self, ctl: &dyn Controller, current: &Option<ManagedObject>) -> Result<(), ImcError> {
        match current {
            Some(profile) => ctl.delete_resource(&profile.path),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UploadRequest<'a> {
    remote_server: &'a str,
    user: Option<&'a str>,
    password: Option<&'a str>,
    remote_file: &'a str,
    protocol: TransferProtocol,
}

/// Pulls a profile file from a remote server. The controller remembers the
/// last transfer, so uploading the same file again is skipped once it has
/// completed.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpload {
    pub remote_server: String,
    pub remote_file: String,
    pub protocol: TransferProtocol,
    pub user: Option<String>,
    pub pwd: Option<String>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
}

impl Resource for ProfileUpload {
    const KIND: &'static str = "bios_profile_upload";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        if self.remote_server.is_empty() {
            return Err(ValidationError::Missing("remote_server"));
        }
        if self.remote_file.is_empty() {
            return Err(ValidationError::Missing("remote_file"));
        }
        if self.protocol == TransferProtocol::None {
            return Err(ValidationError::invalid("protocol", "a transfer protocol is required"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, &profiles_path(ctl, self.server_id)?)
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        super::transfer_done(
            current.pointer(UPLOAD_STATUS),
            &self.remote_server,
            &self.remote_file,
            &self.protocol.to_string(),
        )
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        let action = format!("{}/Actions/BiosProfileCollection.Upload", current.path);
        let request = UploadRequest {
            remote_server: &self.remote_server,
            user: self.user.as_deref(),
            password: self.pwd.as_deref(),
            remote_file: &self.remote_file,
            protocol: self.protocol,
        };
        ctl.post_action(&action, to_body(&action, &request)?)?;
        check_transfer(ctl, &current.path, UPLOAD_STATUS, "BIOS profile upload")
    }
}
