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

//! Arbitrary resources given by path and properties, for settings no other
//! kind covers.
//!
//! Objects can nest: a child's path is relative to its parent's. Objects
//! are created parent first and deleted children first.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::network::relative_path;
use crate::reconcile::Resource;
use crate::{Controller, Ensure, ImcError, ManagedObject, ValidationError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectSpec {
    pub path: String,
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub children: Vec<ObjectSpec>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    objects: Vec<ObjectSpec>,
}

#[derive(Debug, Clone, PartialEq)]
struct Wanted {
    path: String,
    properties: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagedObjects {
    pub objects: Option<Vec<ObjectSpec>>,
    pub json_config_file: Option<PathBuf>,
    #[serde(default)]
    pub state: Ensure,
    #[serde(skip)]
    wanted: Vec<Wanted>,
}

fn flatten(parent: Option<&str>, specs: &[ObjectSpec], out: &mut Vec<Wanted>) -> Result<(), ValidationError> {
    for spec in specs {
        let own = relative_path(&spec.path);
        if own.is_empty() {
            return Err(ValidationError::invalid("objects", "every object needs a path"));
        }
        let path = match parent {
            Some(p) => format!("{p}/{own}"),
            None => own,
        };
        let properties = match &spec.properties {
            Value::Null => Value::Object(Default::default()),
            Value::Object(_) => spec.properties.clone(),
            _ => {
                return Err(ValidationError::invalid(
                    "objects",
                    format!("properties of {path} must be an object"),
                ))
            }
        };
        out.push(Wanted {
            path: path.clone(),
            properties,
        });
        flatten(Some(&path), &spec.children, out)?;
    }
    Ok(())
}

fn load(path: &Path) -> Result<Vec<ObjectSpec>, ValidationError> {
    let text = std::fs::read_to_string(path).map_err(|e| ValidationError::File {
        path: path.display().to_string(),
        source: e,
    })?;
    let file: ConfigFile = serde_json::from_str(&text)?;
    Ok(file.objects)
}

fn split_parent(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

impl Resource for ManagedObjects {
    const KIND: &'static str = "managed_objects";
    type State = Vec<Option<ManagedObject>>;

    fn validate(&mut self) -> Result<(), ValidationError> {
        let specs = match (&self.objects, &self.json_config_file) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::MutuallyExclusive("objects", "json_config_file"))
            }
            (None, None) => return Err(ValidationError::Missing("objects or json_config_file")),
            (Some(objects), None) => objects.clone(),
            (None, Some(file)) => load(file)?,
        };
        if specs.is_empty() {
            return Err(ValidationError::Missing("objects"));
        }
        let mut wanted = Vec::new();
        flatten(None, &specs, &mut wanted)?;
        self.wanted = wanted;
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<Vec<Option<ManagedObject>>, ImcError> {
        self.wanted.iter().map(|t| ctl.get_resource(&t.path)).collect()
    }

    fn matches(&self, current: &Vec<Option<ManagedObject>>) -> bool {
        self.wanted.iter().zip(current).all(|(t, mo)| match (self.state, mo) {
            (Ensure::Present, Some(mo)) => mo.contains(&t.properties),
            (Ensure::Present, None) => false,
            (Ensure::Absent, mo) => mo.is_none(),
        })
    }

    fn write(&self, ctl: &dyn Controller, current: &Vec<Option<ManagedObject>>) -> Result<(), ImcError> {
        let pairs: Vec<_> = self.wanted.iter().zip(current).collect();
        match self.state {
            Ensure::Present => {
                for (t, mo) in pairs {
                    match mo {
                        Some(mo) if mo.contains(&t.properties) => {}
                        Some(mo) => ctl.patch_resource(&mo.path, t.properties.clone())?,
                        None => {
                            let (parent, id) = split_parent(&t.path);
                            let mut body = t.properties.clone();
                            if let Value::Object(m) = &mut body {
                                m.entry("Id").or_insert_with(|| Value::String(id.to_string()));
                            }
                            let created = ctl.create_member(parent, body)?;
                            debug!("created {created}");
                        }
                    }
                }
            }
            Ensure::Absent => {
                for (t, mo) in pairs.into_iter().rev() {
                    if mo.is_some() {
                        match ctl.delete_resource(&t.path) {
                            Err(e) if e.is_not_found() => {}
                            other => other?,
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
