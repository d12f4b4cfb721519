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

//! One pass of convergence: validate, acquire, probe, decide, apply, release.

use std::collections::BTreeMap;
use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::session::{acquire, Target};
use crate::{Connector, Controller, ImcError, ReconcileError, ValidationError};

/// A kind of setting on the IMC that can be converged.
///
/// The implementing type is the desired state, deserialized from the
/// invocation parameters. `State` is whatever `read` needs to hand to
/// `matches` and `write`, usually the relevant `ManagedObject`.
pub trait Resource: DeserializeOwned + fmt::Debug + 'static {
    const KIND: &'static str;
    /// Other names the kind is registered under.
    const ALIASES: &'static [&'static str] = &[];

    type State: fmt::Debug;

    /// Checks constraints serde cannot express and fills in derived fields.
    /// Runs before any session is opened.
    fn validate(&mut self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<Self::State, ImcError>;

    /// True when `current` already satisfies this desired state.
    fn matches(&self, current: &Self::State) -> bool;

    /// Converges `current` to this desired state. Only called when `matches`
    /// was false.
    fn write(&self, ctl: &dyn Controller, current: &Self::State) -> Result<(), ImcError>;
}

/// A parsed desired state with its kind erased, so the registry can hold
/// every kind in one table.
pub trait Convergence {
    fn kind(&self) -> &'static str;

    /// Reads current state and reports whether it already matches.
    fn probe(&mut self, ctl: &dyn Controller) -> Result<bool, ImcError>;

    /// Writes desired state. Fails if `probe` has not run.
    fn apply(&self, ctl: &dyn Controller) -> Result<(), ImcError>;
}

struct Tracked<R: Resource> {
    desired: R,
    current: Option<R::State>,
}

impl<R: Resource> Convergence for Tracked<R> {
    fn kind(&self) -> &'static str {
        R::KIND
    }

    fn probe(&mut self, ctl: &dyn Controller) -> Result<bool, ImcError> {
        let current = self.desired.read(ctl)?;
        debug!("{} current state: {current:?}", R::KIND);
        let matches = self.desired.matches(&current);
        self.current = Some(current);
        Ok(matches)
    }

    fn apply(&self, ctl: &dyn Controller) -> Result<(), ImcError> {
        let current = self.current.as_ref().ok_or(ImcError::NotProbed(R::KIND))?;
        self.desired.write(ctl, current)
    }
}

type Parser = fn(Value) -> Result<Box<dyn Convergence>, ValidationError>;

fn parse<R: Resource>(params: Value) -> Result<Box<dyn Convergence>, ValidationError> {
    let mut desired: R = serde_json::from_value(params)?;
    desired.validate()?;
    Ok(Box::new(Tracked {
        desired,
        current: None,
    }))
}

/// Table from kind name to the parser for that kind's desired state.
#[derive(Default)]
pub struct Registry {
    parsers: BTreeMap<&'static str, Parser>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every kind this crate implements.
    pub fn builtin() -> Self {
        let mut registry = Registry::new();
        crate::kinds::register_builtin(&mut registry);
        registry
    }

    pub fn register<R: Resource>(&mut self) -> &mut Self {
        self.parsers.insert(R::KIND, parse::<R> as Parser);
        for &alias in R::ALIASES {
            self.parsers.insert(alias, parse::<R> as Parser);
        }
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parsers.keys().copied()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.parsers.contains_key(kind)
    }

    pub fn parse(&self, kind: &str, params: Value) -> Result<Box<dyn Convergence>, ValidationError> {
        let parser = self
            .parsers
            .get(kind)
            .ok_or_else(|| ValidationError::UnknownKind(kind.to_string()))?;
        parser(params)
    }
}

/// Everything one reconciliation needs.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub kind: String,
    /// Report what would change without changing it
    pub check_mode: bool,
    pub target: Target<'a>,
    pub params: Value,
}

/// The single result of an invocation.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub changed: bool,
    pub failed: bool,
    pub msg: Option<String>,
}

impl ReconciliationResult {
    pub fn success(changed: bool) -> Self {
        ReconciliationResult {
            changed,
            failed: false,
            msg: None,
        }
    }

    pub fn failure(err: &ReconcileError) -> Self {
        ReconciliationResult {
            changed: false,
            failed: true,
            msg: Some(err.to_string()),
        }
    }
}

impl From<Result<bool, ReconcileError>> for ReconciliationResult {
    fn from(r: Result<bool, ReconcileError>) -> Self {
        match r {
            Ok(changed) => ReconciliationResult::success(changed),
            Err(err) => ReconciliationResult::failure(&err),
        }
    }
}

pub struct Reconciler<'r> {
    registry: &'r Registry,
}

impl<'r> Reconciler<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Reconciler { registry }
    }

    /// Runs one invocation. Failures are folded into the result.
    pub fn run(&self, invocation: Invocation<'_>, connector: &dyn Connector) -> ReconciliationResult {
        self.try_run(invocation, connector).into()
    }

    /// Runs one invocation and returns whether anything changed.
    pub fn try_run(
        &self,
        invocation: Invocation<'_>,
        connector: &dyn Connector,
    ) -> Result<bool, ReconcileError> {
        let Invocation {
            kind,
            check_mode,
            target,
            params,
        } = invocation;
        let mut convergence = self.registry.parse(&kind, params)?;

        let conn = acquire(target, connector).map_err(ReconcileError::Authentication)?;
        let outcome = converge(convergence.as_mut(), conn.controller(), check_mode);
        if let Err(err) = conn.release() {
            warn!("Could not log out of IMC: {err}");
        }
        outcome.map_err(ReconcileError::RemoteOperation)
    }
}

fn converge(
    convergence: &mut dyn Convergence,
    ctl: &dyn Controller,
    check_mode: bool,
) -> Result<bool, ImcError> {
    let kind = convergence.kind();
    let matches = convergence.probe(ctl)?;
    if check_mode {
        info!("{kind}: check mode, would change: {}", !matches);
        return Ok(!matches);
    }
    if matches {
        info!("{kind}: already converged");
        return Ok(false);
    }
    info!("{kind}: applying");
    convergence.apply(ctl)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryController;
    use crate::{Endpoint, ManagedObject};

    // Sets the manager description; enough to exercise the protocol.
    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Description {
        text: String,
    }

    impl Resource for Description {
        const KIND: &'static str = "description";
        const ALIASES: &'static [&'static str] = &["desc"];
        type State = ManagedObject;

        fn validate(&mut self) -> Result<(), ValidationError> {
            if self.text.is_empty() {
                return Err(ValidationError::Missing("text"));
            }
            Ok(())
        }

        fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
            let path = format!("Managers/{}", ctl.manager_id());
            ctl.get_resource(&path)?.ok_or(ImcError::NotFound(path))
        }

        fn matches(&self, current: &ManagedObject) -> bool {
            current.str_at("/Description") == Some(self.text.as_str())
        }

        fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
            ctl.patch_resource(&current.path, json!({ "Description": self.text }))
        }
    }

    fn registry() -> Registry {
        let mut r = Registry::new();
        r.register::<Description>();
        r
    }

    fn invocation<'a>(params: Value, check_mode: bool, target: Target<'a>) -> Invocation<'a> {
        Invocation {
            kind: "description".to_string(),
            check_mode,
            target,
            params,
        }
    }

    fn credentials() -> Target<'static> {
        Target::Credentials(Endpoint {
            host: "10.0.0.5".to_string(),
            password: "password".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_apply_then_noop() {
        let imc = MemoryController::new();
        let registry = registry();
        let reconciler = Reconciler::new(&registry);

        let r = reconciler.run(invocation(json!({ "text": "rack 4" }), false, credentials()), &imc);
        assert_eq!(r, ReconciliationResult::success(true));
        let r = reconciler.run(invocation(json!({ "text": "rack 4" }), false, credentials()), &imc);
        assert_eq!(r, ReconciliationResult::success(false));
        assert_eq!(imc.writes(), 1);
        assert_eq!(imc.sessions_opened(), 2);
        assert_eq!(imc.sessions_closed(), 2);
    }

    #[test]
    fn test_check_mode_reports_without_writing() {
        let imc = MemoryController::new();
        let registry = registry();
        let r = Reconciler::new(&registry).run(
            invocation(json!({ "text": "rack 4" }), true, Target::Handle(&imc)),
            &imc,
        );
        assert!(r.changed);
        assert_eq!(imc.writes(), 0);
    }

    #[test]
    fn test_validation_happens_before_login() {
        let imc = MemoryController::new();
        let registry = registry();
        let reconciler = Reconciler::new(&registry);

        let err = reconciler
            .try_run(invocation(json!({ "text": "" }), false, credentials()), &imc)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(ValidationError::Missing("text"))));

        let err = reconciler
            .try_run(invocation(json!({ "text": "x", "colour": "red" }), false, credentials()), &imc)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(ValidationError::Params(_))));
        assert_eq!(imc.sessions_opened(), 0);
    }

    #[test]
    fn test_unknown_kind() {
        let imc = MemoryController::new();
        let registry = registry();
        let mut inv = invocation(json!({}), false, credentials());
        inv.kind = "nope".to_string();
        let r = Reconciler::new(&registry).run(inv, &imc);
        assert!(r.failed);
        assert_eq!(r.msg.as_deref(), Some("unknown resource kind nope"));
    }

    #[test]
    fn test_alias_is_registered() {
        let registry = registry();
        assert!(registry.contains("desc"));
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["desc", "description"]);
    }

    #[test]
    fn test_apply_before_probe_is_refused() {
        let imc = MemoryController::new();
        let c = registry()
            .parse("description", json!({ "text": "rack 4" }))
            .unwrap();
        assert!(matches!(c.apply(&imc), Err(ImcError::NotProbed("description"))));
        assert_eq!(imc.writes(), 0);
    }

    #[test]
    fn test_authentication_failure() {
        let imc = MemoryController::new();
        let registry = registry();
        let target = Target::Credentials(Endpoint {
            host: "10.0.0.5".to_string(),
            password: "wrong".to_string(),
            ..Default::default()
        });
        let err = Reconciler::new(&registry)
            .try_run(invocation(json!({ "text": "x" }), false, target), &imc)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Authentication(_)));
    }
}
