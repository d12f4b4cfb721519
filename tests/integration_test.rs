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

/// End to end runs through the public API against the in-memory IMC.
///
/// Every invocation goes through `Reconciler::run` exactly as the client
/// does, including session acquisition, so these cover the lifecycle rules
/// as well as convergence.
use anyhow::{anyhow, Context};
use imc_converge::memory::{MemoryController, FIXTURE_MANAGER_ID};
use imc_converge::{
    login, Connector, Endpoint, Invocation, Reconciler, ReconciliationResult, Registry, Target,
};
use serde_json::{json, Value};

fn endpoint() -> Endpoint {
    Endpoint {
        host: "10.0.0.5".to_string(),
        password: "password".to_string(),
        ..Default::default()
    }
}

fn run_with(
    imc: &MemoryController,
    target: Target<'_>,
    kind: &str,
    params: Value,
    check_mode: bool,
) -> ReconciliationResult {
    let registry = Registry::builtin();
    Reconciler::new(&registry).run(
        Invocation {
            kind: kind.to_string(),
            check_mode,
            target,
            params,
        },
        imc,
    )
}

fn run(imc: &MemoryController, kind: &str, params: Value) -> ReconciliationResult {
    run_with(imc, Target::Credentials(endpoint()), kind, params, false)
}

fn network_protocol(imc: &MemoryController) -> Result<Value, anyhow::Error> {
    imc.object(&format!("Managers/{FIXTURE_MANAGER_ID}/NetworkProtocol"))
        .ok_or_else(|| anyhow!("fixture has no NetworkProtocol"))
}

#[test]
fn test_second_run_changes_nothing() -> Result<(), anyhow::Error> {
    let imc = MemoryController::new();
    let tasks = [
        ("snmp", json!({ "community": "public", "sys_location": "Rack 4" })),
        ("ntp", json!({ "ntp_servers": ["10.0.0.1", "10.0.0.2"], "state": "present" })),
        ("syslog", json!({ "local_severity": "notice" })),
        ("user", json!({ "name": "ops", "pwd": "Passw0rd!", "priv": "read-only" })),
        ("server", json!({ "locator_led": "on" })),
    ];
    for (kind, params) in &tasks {
        let first = run(&imc, kind, params.clone());
        assert_eq!(first, ReconciliationResult::success(true), "first {kind} run");
    }
    let writes = imc.writes();
    for (kind, params) in &tasks {
        let second = run(&imc, kind, params.clone());
        assert_eq!(second, ReconciliationResult::success(false), "second {kind} run");
    }
    assert_eq!(imc.writes(), writes);
    assert_eq!(imc.sessions_opened(), 2 * tasks.len());
    assert_eq!(imc.sessions_closed(), imc.sessions_opened());
    Ok(())
}

#[test]
fn test_check_mode_writes_nothing() -> Result<(), anyhow::Error> {
    let imc = MemoryController::new();
    let before = imc.snapshot();
    let params = json!({ "community": "public", "privilege": "full" });
    let r = run_with(&imc, Target::Credentials(endpoint()), "snmp", params.clone(), true);
    assert_eq!(r, ReconciliationResult::success(true));
    assert_eq!(imc.snapshot(), before);
    assert_eq!(imc.writes(), 0);

    assert!(run(&imc, "snmp", params.clone()).changed);
    let r = run_with(&imc, Target::Credentials(endpoint()), "snmp", params, true);
    assert_eq!(r, ReconciliationResult::success(false));
    Ok(())
}

#[test]
fn test_snmp_enable_then_disable() -> Result<(), anyhow::Error> {
    let imc = MemoryController::new();
    let r = run(&imc, "snmp", json!({ "community": "public", "privilege": "full", "port": 1161 }));
    assert!(r.changed && !r.failed);
    let np = network_protocol(&imc)?;
    assert_eq!(np["SNMP"]["ProtocolEnabled"], true);
    assert_eq!(np["SNMP"]["Port"], 1161);
    assert_eq!(np["Oem"]["Cisco"]["SNMP"]["Community"], "public");

    let r = run(&imc, "snmp", json!({ "state": "absent" }));
    assert!(r.changed);
    let np = network_protocol(&imc)?;
    assert_eq!(np["SNMP"]["ProtocolEnabled"], false);
    // Disabling leaves the rest of the configuration alone
    assert_eq!(np["Oem"]["Cisco"]["SNMP"]["Community"], "public");
    Ok(())
}

#[test]
fn test_deleting_what_is_not_there() -> Result<(), anyhow::Error> {
    let imc = MemoryController::new();
    let r = run(&imc, "user", json!({ "name": "nobody", "state": "absent" }));
    assert_eq!(r, ReconciliationResult::success(false));
    assert_eq!(imc.writes(), 0);
    Ok(())
}

#[test]
fn test_borrowed_handle_stays_open() -> Result<(), anyhow::Error> {
    let imc = MemoryController::new();
    let r = run_with(&imc, Target::Handle(&imc), "redfish", json!({ "state": "absent" }), false);
    assert!(r.changed);
    assert_eq!(imc.sessions_opened(), 0);
    assert_eq!(imc.sessions_closed(), 0);

    let session = login(&endpoint(), &imc).context("login")?;
    let r = run_with(&imc, Target::Session(session.clone()), "redfish", json!({}), false);
    assert!(r.changed);
    assert_eq!(imc.sessions_closed(), 0);
    // The session is still usable afterwards
    let resumed = imc.resume(&session)?;
    assert!(resumed.get_resource("AccountService")?.is_some());
    Ok(())
}

#[test]
fn test_failed_write_still_logs_out() -> Result<(), anyhow::Error> {
    let imc = MemoryController::new();
    imc.fail_writes("controller busy");
    let r = run(&imc, "snmp", json!({ "community": "public" }));
    assert_eq!(
        r,
        ReconciliationResult {
            changed: false,
            failed: true,
            msg: Some("Operation failed: controller busy".to_string()),
        }
    );
    assert_eq!(imc.sessions_opened(), 1);
    assert_eq!(imc.sessions_closed(), 1);
    Ok(())
}

#[test]
fn test_bad_params_never_log_in() -> Result<(), anyhow::Error> {
    let imc = MemoryController::new();
    let r = run(&imc, "snmp", json!({ "community": "public", "colour": "blue" }));
    assert!(r.failed);
    let r = run(&imc, "no_such_kind", json!({}));
    assert_eq!(r.msg.as_deref(), Some("unknown resource kind no_such_kind"));
    assert_eq!(imc.sessions_opened(), 0);
    Ok(())
}

#[test]
fn test_wrong_password() -> Result<(), anyhow::Error> {
    let imc = MemoryController::new();
    let mut e = endpoint();
    e.password = "wrong".to_string();
    let r = run_with(&imc, Target::Credentials(e), "snmp", json!({}), false);
    assert!(r.failed);
    let msg = r.msg.ok_or_else(|| anyhow!("no message"))?;
    assert!(msg.starts_with("authentication failed"), "{msg}");
    Ok(())
}
