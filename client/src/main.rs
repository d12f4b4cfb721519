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

/* IMC desired-state client
 * Converges one resource kind per run and prints the outcome as JSON.
 * Also useful for poking at an IMC's Redfish tree.
 *
 * USAGE: imc-converge -H 10.0.0.5 -U admin -P password -k snmp -a '{"community": "public"}'
 *        imc-converge -f task.json --check
 *        imc-converge -H 10.0.0.5 -c login > session.json
 *        imc-converge --session session.json -c query Managers/CIMC/NetworkProtocol
 * Run with no params for help.
 * Run with `-v` for more output.
 */

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context};
use imc_converge::config::TaskFile;
use imc_converge::{
    query, Connector, Endpoint, ImcClientPool, Invocation, Reconciler, ReconciliationResult, Registry,
    SessionHandle, Target,
};
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;

const PASSWORD_ENV: &str = "IMC_PASSWORD";

fn main() -> Result<(), anyhow::Error> {
    let args: Vec<String> = std::env::args().collect();
    let opts = options();

    let args_given = opts.parse(&args[1..])?;
    let cmd = args_given.opt_str("c").unwrap_or_else(|| "apply".to_string());
    if args_given.opt_present("h") || args.len() == 1 {
        eprintln!(
            "{}",
            opts.usage("imc-converge -H imc_ip -U user -P pass -k kind -a json | -f task.json")
        );
        return Ok(());
    }

    let log_level = if args_given.opt_present("v") {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let env_filter = EnvFilter::from_default_env()
        .add_directive(log_level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);
    tracing_subscriber::registry()
        .with(Layer::default().compact().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let registry = Registry::builtin();
    if cmd == "kinds" {
        return print(&json!(registry.kinds().collect::<Vec<_>>()));
    }

    let mut pool = ImcClientPool::builder();
    if args_given.opt_present("strict-tls") {
        pool = pool.reject_invalid_certs();
    }
    if let Some(secs) = args_given.opt_str("timeout") {
        pool = pool.timeout(Duration::from_secs(secs.parse().context("--timeout")?));
    }
    let pool = pool.build()?;
    let env_password = std::env::var(PASSWORD_ENV).ok();

    match cmd.as_str() {
        "apply" => {
            let result = apply(&args_given, env_password.as_deref(), &registry, &pool);
            print(&serde_json::to_value(&result)?)?;
            if result.failed {
                std::process::exit(1);
            }
        }
        "login" => {
            let endpoint = endpoint(&args_given, env_password.as_deref())?;
            let session = imc_converge::login(&endpoint, &pool)?;
            print(&serde_json::to_value(&session)?)?;
        }
        "logout" => {
            let file = args_given
                .opt_str("session")
                .ok_or_else(|| anyhow!("--session FILE is required for logout"))?;
            imc_converge::logout(&read_session(&file)?, &pool)?;
            info!("session closed");
        }
        "query" | "inventory" => {
            let target = target(&args_given, env_password.as_deref())?;
            let connection = imc_converge::acquire(target, &pool)?;
            let out = match cmd.as_str() {
                "inventory" => query::inventory(connection.controller()),
                _ if args_given.opt_present("collection") => {
                    query::by_collection(connection.controller(), args_given.free.as_slice())
                        .map(|r| json!(r))
                }
                _ => query::by_path(connection.controller(), args_given.free.as_slice()).map(|r| json!(r)),
            };
            if let Err(e) = connection.release() {
                error!("closing session: {e}");
            }
            print(&out?)?;
        }
        other => {
            return Err(anyhow!("unknown command {other}"));
        }
    }
    Ok(())
}

fn options() -> getopts::Options {
    let mut opts = getopts::Options::new();

    opts.optflag("h", "help", "Print this help");
    opts.optflag("v", "verbose", "Log at DEBUG level. Default is INFO");
    opts.optopt("H", "hostname", "Hostname or IP address of the IMC", "HOST");
    opts.optopt("U", "username", "IMC username. Default is admin", "USER");
    opts.optopt(
        "P",
        "password",
        "IMC password. Falls back to the IMC_PASSWORD environment variable",
        "PASS",
    );
    opts.optopt("", "port", "IMC port, if not the scheme default", "PORT");
    opts.optflag("", "insecure-http", "Talk plain HTTP instead of HTTPS");
    opts.optflag("", "strict-tls", "Reject self-signed IMC certificates");
    opts.optopt("", "proxy", "HTTP(S) proxy URL", "URL");
    opts.optopt("", "timeout", "Per-request timeout in seconds. Default is 20", "SECS");
    opts.optopt("", "session", "Session file written by `-c login`", "FILE");
    opts.optopt("f", "file", "JSON task file with kind, connection and params", "FILE");
    opts.optopt("k", "kind", "Resource kind to converge", "KIND");
    opts.optopt("a", "args", "Desired state of the kind, as a JSON object", "JSON");
    opts.optflag("", "check", "Only report whether a change would be made");
    opts.optflag("", "collection", "With `-c query`, read every member of each path");
    opts.optopt(
        "c",
        "cmd",
        "Command to run:
                apply (default)
                login
                logout
                query PATH...
                inventory
                kinds",
        "CMD",
    );
    opts
}

/// Builds the invocation from `-f` or `-k`/`-a` and runs it. A bad task file
/// or argument is reported in the result like any other failure.
fn apply(
    args: &getopts::Matches,
    env_password: Option<&str>,
    registry: &Registry,
    connector: &dyn Connector,
) -> ReconciliationResult {
    match invocation(args, env_password) {
        Ok(invocation) => {
            info!("converging {}", invocation.kind);
            Reconciler::new(registry).run(invocation, connector)
        }
        Err(e) => ReconciliationResult {
            changed: false,
            failed: true,
            msg: Some(format!("{e:#}")),
        },
    }
}

fn invocation(args: &getopts::Matches, env_password: Option<&str>) -> Result<Invocation<'static>, anyhow::Error> {
    if let Some(file) = args.opt_str("f") {
        let mut invocation = TaskFile::from_path(Path::new(&file))?.into_invocation(env_password)?;
        invocation.check_mode |= args.opt_present("check");
        return Ok(invocation);
    }
    Ok(Invocation {
        kind: args
            .opt_str("k")
            .ok_or_else(|| anyhow!("-k KIND or -f FILE is required"))?,
        check_mode: args.opt_present("check"),
        target: target(args, env_password)?,
        params: match args.opt_str("a") {
            Some(a) => serde_json::from_str(&a).context("-a is not valid JSON")?,
            None => json!({}),
        },
    })
}

fn print(v: &Value) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

fn read_session(file: &str) -> Result<SessionHandle, anyhow::Error> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
    serde_json::from_str(&text).with_context(|| format!("{file} is not a session file"))
}

fn endpoint(args: &getopts::Matches, env_password: Option<&str>) -> Result<Endpoint, anyhow::Error> {
    let host = args
        .opt_str("H")
        .ok_or_else(|| anyhow!("-H HOST is required"))?;
    let password = args
        .opt_str("P")
        .or_else(|| env_password.map(str::to_string))
        .ok_or_else(|| anyhow!("-P PASS or {PASSWORD_ENV} is required"))?;
    let port = match args.opt_str("port") {
        Some(p) => Some(p.parse().context("--port")?),
        None => None,
    };
    Ok(Endpoint {
        host,
        port,
        user: args.opt_str("U").unwrap_or_else(|| "admin".to_string()),
        password,
        secure: !args.opt_present("insecure-http"),
        proxy: args.opt_str("proxy"),
    })
}

fn target(args: &getopts::Matches, env_password: Option<&str>) -> Result<Target<'static>, anyhow::Error> {
    match args.opt_str("session") {
        Some(file) => Ok(Target::Session(read_session(&file)?)),
        None => Ok(Target::Credentials(endpoint(args, env_password)?)),
    }
}

#[cfg(test)]
mod tests {
    use imc_converge::memory::MemoryController;
    use imc_converge::{ReconciliationResult, Registry};

    use super::{apply, options};

    fn apply_args(args: &[&str], imc: &MemoryController) -> ReconciliationResult {
        let matches = options().parse(args).unwrap();
        apply(&matches, None, &Registry::builtin(), imc)
    }

    #[test]
    fn test_bad_json_is_a_failed_result() {
        let imc = MemoryController::new();
        let r = apply_args(&["-H", "10.0.0.5", "-P", "password", "-k", "snmp", "-a", "{community"], &imc);
        assert!(r.failed);
        assert!(!r.changed);
        assert!(r.msg.unwrap().starts_with("-a is not valid JSON"));
        assert_eq!(imc.sessions_opened(), 0);
    }

    #[test]
    fn test_missing_arguments_are_a_failed_result() {
        let imc = MemoryController::new();
        let r = apply_args(&["-H", "10.0.0.5", "-a", "{}"], &imc);
        assert_eq!(r.msg.as_deref(), Some("-k KIND or -f FILE is required"));
        let r = apply_args(&["-k", "snmp", "-P", "password"], &imc);
        assert_eq!(r.msg.as_deref(), Some("-H HOST is required"));
        let r = apply_args(&["-f", "/nonexistent/task.json"], &imc);
        assert!(r.failed);
    }

    #[test]
    fn test_apply_from_arguments() {
        let imc = MemoryController::new();
        let args = ["-H", "10.0.0.5", "-P", "password", "-k", "redfish", "-a", r#"{"state": "absent"}"#];
        assert_eq!(apply_args(&args, &imc), ReconciliationResult::success(true));
        assert_eq!(apply_args(&args, &imc), ReconciliationResult::success(false));
        assert_eq!(imc.sessions_closed(), 2);
    }
}
