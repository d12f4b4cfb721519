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

use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::json;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use tracing::debug;

use super::{check_server_id, default_server_id, read_required, system_path};
use crate::model::system::{ComputerSystemPower, IndicatorLed, PowerState, SystemPowerControl};
use crate::reconcile::Resource;
use crate::{Controller, ImcError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    On,
    Shutdown,
    Off,
    Reset,
    Boot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorLed {
    On,
    Off,
}

impl LocatorLed {
    fn indicator(self) -> IndicatorLed {
        match self {
            LocatorLed::On => IndicatorLed::Lit,
            LocatorLed::Off => IndicatorLed::Off,
        }
    }
}

#[derive(Debug)]
pub struct ServerState {
    path: String,
    power: ComputerSystemPower,
}

/// Server power and the locator LED.
///
/// `boot` always power cycles (or powers on a server that is off), and
/// `reset` power cycles a server that is on. Power transitions wait for the
/// server to reach the new state, reading it every `interval` seconds for up
/// to `timeout` seconds.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Server {
    pub state: Option<PowerAction>,
    pub locator_led: Option<LocatorLed>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_server_id")]
    pub server_id: u32,
}

fn default_timeout() -> u64 {
    60
}

fn default_interval() -> u64 {
    5
}

impl Server {
    fn power_matches(&self, power: PowerState) -> bool {
        match self.state {
            None => true,
            Some(PowerAction::On) => power == PowerState::On,
            Some(PowerAction::Shutdown | PowerAction::Off | PowerAction::Reset) => {
                power == PowerState::Off
            }
            Some(PowerAction::Boot) => false,
        }
    }

    fn led_matches(&self, led: Option<IndicatorLed>) -> bool {
        match self.locator_led {
            None => true,
            Some(wanted) => led == Some(wanted.indicator()),
        }
    }

    /// The reset to send and the state it ends in.
    fn transition(action: PowerAction, power: PowerState) -> (SystemPowerControl, PowerState) {
        let is_on = matches!(power, PowerState::On | PowerState::PoweringOn);
        match action {
            PowerAction::On => (SystemPowerControl::On, PowerState::On),
            PowerAction::Shutdown => (SystemPowerControl::GracefulShutdown, PowerState::Off),
            PowerAction::Off => (SystemPowerControl::ForceOff, PowerState::Off),
            PowerAction::Boot | PowerAction::Reset if is_on => {
                (SystemPowerControl::PowerCycle, PowerState::On)
            }
            PowerAction::Boot | PowerAction::Reset => (SystemPowerControl::On, PowerState::On),
        }
    }

    fn wait_for(&self, ctl: &dyn Controller, path: &str, wanted: PowerState) -> Result<(), ImcError> {
        let started = Instant::now();
        loop {
            let power: ComputerSystemPower = read_required(ctl, path)?.to_typed()?;
            if power.power_state == wanted {
                return Ok(());
            }
            let waited = started.elapsed().as_secs();
            if waited >= self.timeout {
                return Err(ImcError::Timeout {
                    what: format!("{path} to reach power state {wanted}"),
                    waited_secs: waited,
                });
            }
            debug!("{path} is {}, waiting for {wanted}", power.power_state);
            thread::sleep(Duration::from_secs(self.interval));
        }
    }
}

impl Resource for Server {
    const KIND: &'static str = "server";
    type State = ServerState;

    fn validate(&mut self) -> Result<(), ValidationError> {
        check_server_id(self.server_id)?;
        if self.state.is_none() && self.locator_led.is_none() {
            return Err(ValidationError::Missing("state or locator_led"));
        }
        if self.interval == 0 {
            return Err(ValidationError::invalid("interval", "must be at least 1 second"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ServerState, ImcError> {
        let system = read_required(ctl, &system_path(ctl, self.server_id)?)?;
        Ok(ServerState {
            power: system.to_typed()?,
            path: system.path,
        })
    }

    fn matches(&self, current: &ServerState) -> bool {
        self.power_matches(current.power.power_state) && self.led_matches(current.power.indicator_led)
    }

    fn write(&self, ctl: &dyn Controller, current: &ServerState) -> Result<(), ImcError> {
        if let Some(action) = self.state {
            if !self.power_matches(current.power.power_state) {
                let (reset, wanted) = Self::transition(action, current.power.power_state);
                ctl.post_action(
                    &format!("{}/Actions/ComputerSystem.Reset", current.path),
                    json!({ "ResetType": reset }),
                )?;
                self.wait_for(ctl, &current.path, wanted)?;
            }
        }
        if let Some(led) = self.locator_led {
            if !self.led_matches(current.power.indicator_led) {
                ctl.patch_resource(&current.path, json!({ "IndicatorLED": led.indicator() }))?;
            }
        }
        Ok(())
    }
}
