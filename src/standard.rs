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

use reqwest::header::LOCATION;
use serde_json::Value;
use tracing::debug;

use crate::jsonmap;
use crate::network::{relative_path, ImcHttpClient};
use crate::{Controller, ImcError, ManagedObject, SessionHandle};

/// The calls that use the Redfish standard; Cisco specifics travel in the
/// `Oem.Cisco` sections of the bodies the resource kinds build.
pub struct ImcRedfish {
    pub client: ImcHttpClient,
    session: SessionHandle,
    manager_id: String,
    system_id: String,
}

impl ImcRedfish {
    pub fn new(client: ImcHttpClient, session: SessionHandle) -> Result<Self, ImcError> {
        let mut s = ImcRedfish {
            client,
            session,
            manager_id: String::new(),
            system_id: String::new(),
        };
        s.set_system_id()?;
        s.set_manager_id()?;
        Ok(s)
    }

    /// Fetch and set System number. Needed for all `Systems/{system_id}/...` calls
    fn set_system_id(&mut self) -> Result<(), ImcError> {
        self.system_id = first_member_id(&self.members("Systems")?);
        Ok(())
    }

    /// Fetch and set Manager number. Needed for all `Managers/{manager_id}/...` calls
    fn set_manager_id(&mut self) -> Result<(), ImcError> {
        self.manager_id = first_member_id(&self.members("Managers")?);
        Ok(())
    }

    fn members(&self, collection: &str) -> Result<Vec<String>, ImcError> {
        let (_status_code, body): (_, serde_json::Map<String, Value>) =
            self.client.get(collection)?;
        let members = jsonmap::get_array(&body, "Members", collection)?;
        let mut paths = Vec::with_capacity(members.len());
        for m in members {
            let Some(member) = m.as_object() else {
                continue;
            };
            let odata_id = jsonmap::get_str(member, "@odata.id", collection)?;
            paths.push(relative_path(odata_id));
        }
        Ok(paths)
    }
}

// Ids default to "1", the DMTF suggested value, when a collection is empty
fn first_member_id(members: &[String]) -> String {
    members
        .first()
        .and_then(|p| p.rsplit('/').next())
        .map(str::to_string)
        .unwrap_or_else(|| "1".to_string())
}

impl Controller for ImcRedfish {
    fn system_id(&self) -> &str {
        &self.system_id
    }

    fn manager_id(&self) -> &str {
        &self.manager_id
    }

    fn get_resource(&self, path: &str) -> Result<Option<ManagedObject>, ImcError> {
        match self.client.get::<Value>(path) {
            Ok((_status_code, body)) => Ok(Some(ManagedObject::new(path, body))),
            Err(e) if e.is_not_found() => {
                debug!("{path} does not exist");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn get_members(&self, collection: &str) -> Result<Vec<String>, ImcError> {
        self.members(collection)
    }

    fn patch_resource(&self, path: &str, body: Value) -> Result<(), ImcError> {
        self.client.patch(path, body).map(|_status_code| ())
    }

    fn create_member(&self, collection: &str, body: Value) -> Result<String, ImcError> {
        let (_status_code, resp, headers): (_, Option<Value>, _) =
            self.client.post(collection, body)?;
        if let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) {
            return Ok(relative_path(location));
        }
        // Some firmware only returns the new member in the body
        resp.as_ref()
            .and_then(|b| b.get("@odata.id"))
            .and_then(Value::as_str)
            .map(relative_path)
            .ok_or_else(|| ImcError::MissingHeader {
                header: LOCATION.to_string(),
                url: collection.to_string(),
            })
    }

    fn delete_resource(&self, path: &str) -> Result<(), ImcError> {
        self.client.delete(path).map(|_status_code| ())
    }

    fn post_action(&self, path: &str, body: Value) -> Result<Option<Value>, ImcError> {
        // The expected HTTP response code is often 204 No Content
        let (_status_code, resp, _headers) = self.client.post(path, body)?;
        Ok(resp)
    }

    fn session(&self) -> Option<&SessionHandle> {
        Some(&self.session)
    }

    fn logout(&self) -> Result<(), ImcError> {
        self.client
            .delete(&self.session.session_uri)
            .map(|_status_code| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_member_id() {
        assert_eq!(
            first_member_id(&["Systems/WZP2131045X".to_string()]),
            "WZP2131045X"
        );
        assert_eq!(first_member_id(&[]), "1");
    }
}
