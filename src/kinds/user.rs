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

use serde::Deserialize;
use serde_json::{json, Value};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::{find_member, read_required, to_body, ACCOUNTS, ACCOUNT_SERVICE};
use crate::model::account_service::{ManagerAccount, RoleId};
use crate::model::Flag;
use crate::reconcile::Resource;
use crate::{Controller, Ensure, ImcError, ManagedObject, ValidationError};

const MAX_NAME: usize = 16;

/// A local user account. Passwords cannot be read back, so the role is the
/// only thing compared: an existing user whose role already matches is left
/// alone even when `pwd` is given. Creating a user requires `pwd`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct User {
    pub name: String,
    pub pwd: Option<String>,
    #[serde(default, rename = "priv")]
    pub role: RoleId,
    #[serde(default)]
    pub state: Ensure,
}

impl User {
    fn account(&self, creating: bool) -> ManagerAccount {
        ManagerAccount {
            username: self.name.clone(),
            password: self.pwd.clone(),
            role_id: self.role.to_string(),
            enabled: creating.then_some(true),
            ..Default::default()
        }
    }
}

fn is_login_account(mo: &ManagedObject) -> bool {
    match mo.pointer("/AccountTypes").and_then(Value::as_array) {
        Some(types) => !types.iter().any(|t| t == "SNMP"),
        None => true,
    }
}

impl Resource for User {
    const KIND: &'static str = "user";
    type State = Option<ManagedObject>;

    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.name.is_empty() || self.name.len() > MAX_NAME {
            return Err(ValidationError::invalid("name", format!("1-{MAX_NAME} characters")));
        }
        if self.name == "admin" && !self.state.is_present() {
            return Err(ValidationError::invalid("name", "the admin account cannot be removed"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<Option<ManagedObject>, ImcError> {
        let found = find_member(ctl, ACCOUNTS, |mo| {
            is_login_account(mo) && mo.str_at("/UserName") == Some(self.name.as_str())
        })?;
        if found.is_none() && self.state.is_present() && self.pwd.is_none() {
            return Err(ImcError::OperationFailed(format!(
                "user {} does not exist and no pwd was given to create it",
                self.name
            )));
        }
        Ok(found)
    }

    fn matches(&self, current: &Option<ManagedObject>) -> bool {
        match (self.state, current) {
            (Ensure::Present, Some(user)) => {
                user.contains(&json!({ "RoleId": self.role.to_string() }))
            }
            (Ensure::Present, None) => false,
            (Ensure::Absent, user) => user.is_none(),
        }
    }

    fn write(&self, ctl: &dyn Controller, current: &Option<ManagedObject>) -> Result<(), ImcError> {
        match (self.state, current) {
            (Ensure::Present, Some(user)) => {
                let body = to_body(&user.path, &self.account(false))?;
                ctl.patch_resource(&user.path, body)
            }
            (Ensure::Present, None) => {
                let body = to_body(ACCOUNTS, &self.account(true))?;
                ctl.create_member(ACCOUNTS, body).map(|_| ())
            }
            (Ensure::Absent, Some(user)) => ctl.delete_resource(&user.path),
            (Ensure::Absent, None) => Ok(()),
        }
    }
}

/// Password rules for local users.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordPolicy {
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub strong_password: bool,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub password_expiry_duration: u32,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub password_history: u8,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub password_notification_period: u32,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub password_grace_period: u32,
}

impl PasswordPolicy {
    fn desired(&self) -> Value {
        json!({ "Oem": { "Cisco": { "PasswordPolicy": {
            "StrongPassword": self.strong_password,
            "ExpiryDuration": self.password_expiry_duration,
            "History": self.password_history,
            "NotificationPeriod": self.password_notification_period,
            "GracePeriod": self.password_grace_period,
        } } } })
    }
}

impl Resource for PasswordPolicy {
    const KIND: &'static str = "password_policy";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.password_history > 5 {
            return Err(ValidationError::invalid("password_history", "must be 0-5"));
        }
        if self.password_expiry_duration > 3650 {
            return Err(ValidationError::invalid("password_expiry_duration", "must be 0-3650 days"));
        }
        if self.password_expiry_duration > 0
            && self.password_notification_period >= self.password_expiry_duration
        {
            return Err(ValidationError::invalid(
                "password_notification_period",
                "must be shorter than the expiry duration",
            ));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, ACCOUNT_SERVICE)
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        current.contains(&self.desired())
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        ctl.patch_resource(&current.path, self.desired())
    }
}
