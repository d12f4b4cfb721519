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

//! The JSON task file: which kind to converge, against which IMC, with what
//! parameters.
//!
//! ```json
//! { "kind": "snmp", "check_mode": false,
//!   "connection": { "ip": "10.0.0.5", "username": "admin", "password": "..." },
//!   "params": { "community": "public" } }
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::model::Flag;
use crate::{Endpoint, Invocation, SessionHandle, Target, ValidationError};

/// How to reach the IMC when no session is supplied.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionParams {
    #[serde(alias = "hostname")]
    pub ip: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub port: Option<u16>,
    #[serde_as(as = "Option<Flag>")]
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_username() -> String {
    "admin".to_string()
}

impl ConnectionParams {
    /// The endpoint to log in to. A password missing here falls back to
    /// `fallback_password`, usually taken from the environment.
    pub fn endpoint(&self, fallback_password: Option<&str>) -> Result<Endpoint, ValidationError> {
        let password = self
            .password
            .as_deref()
            .or(fallback_password)
            .ok_or(ValidationError::Missing("connection.password"))?;
        Ok(Endpoint {
            host: self.ip.clone(),
            port: self.port,
            user: self.username.clone(),
            password: password.to_string(),
            secure: self.secure.unwrap_or(true),
            proxy: self.proxy.clone(),
        })
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskFile {
    pub kind: String,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub check_mode: bool,
    #[serde(default)]
    pub connection: Option<ConnectionParams>,
    #[serde(default)]
    pub session: Option<SessionHandle>,
    #[serde(default = "empty_params")]
    pub params: Value,
}

fn empty_params() -> Value {
    Value::Object(Default::default())
}

impl TaskFile {
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let text = std::fs::read_to_string(path).map_err(|e| ValidationError::File {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Where the handle comes from. Exactly one of `connection` and
    /// `session` must be given.
    pub fn target(&self, fallback_password: Option<&str>) -> Result<Target<'static>, ValidationError> {
        match (&self.connection, &self.session) {
            (Some(_), Some(_)) => Err(ValidationError::MutuallyExclusive("connection", "session")),
            (None, None) => Err(ValidationError::Missing("connection")),
            (Some(c), None) => Ok(Target::Credentials(c.endpoint(fallback_password)?)),
            (None, Some(s)) => Ok(Target::Session(s.clone())),
        }
    }

    pub fn into_invocation(
        self,
        fallback_password: Option<&str>,
    ) -> Result<Invocation<'static>, ValidationError> {
        let target = self.target(fallback_password)?;
        Ok(Invocation {
            kind: self.kind,
            check_mode: self.check_mode,
            target,
            params: self.params,
        })
    }
}
