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

use serde_json::Value;

pub mod config;
mod error;
pub mod jsonmap;
pub mod kinds;
pub mod memory;
pub mod model;
mod network;
pub mod query;
pub mod reconcile;
pub mod session;
pub mod standard;

pub use error::{ImcError, ReconcileError, ValidationError};
pub use model::{Ensure, Flag, ManagedObject};
pub use network::{
    Endpoint, ImcClientPool, ImcClientPoolBuilder, ImcHttpClient, SessionHandle, REDFISH_ENDPOINT,
};
pub use reconcile::{Invocation, Reconciler, ReconciliationResult, Registry, Resource};
pub use session::{acquire, login, logout, Connection, Target};

/// Interface to an IMC. Every call on the Redfish implementation is one or
/// more HTTP requests; paths are relative to `redfish/v1`.
pub trait Controller {
    /// Id of the first computer system, as discovered when the session opened.
    fn system_id(&self) -> &str;

    /// Id of the IMC itself under `Managers/`.
    fn manager_id(&self) -> &str;

    /// Reads one resource. A resource the controller does not have is `None`,
    /// not an error.
    fn get_resource(&self, path: &str) -> Result<Option<ManagedObject>, ImcError>;

    /// Paths of every member of a collection, such as `AccountService/Accounts`.
    fn get_members(&self, collection: &str) -> Result<Vec<String>, ImcError>;

    /// Updates the listed properties of a resource, leaving the rest alone.
    fn patch_resource(&self, path: &str, body: Value) -> Result<(), ImcError>;

    /// Adds a member to a collection and returns the new member's path.
    fn create_member(&self, collection: &str, body: Value) -> Result<String, ImcError>;

    fn delete_resource(&self, path: &str) -> Result<(), ImcError>;

    /// Invokes an action such as `Systems/1/Actions/ComputerSystem.Reset`.
    fn post_action(&self, path: &str, body: Value) -> Result<Option<Value>, ImcError>;

    /// The session this controller is authenticated with, if any.
    fn session(&self) -> Option<&SessionHandle>;

    /// Ends the session. Only whoever opened the session should call this.
    fn logout(&self) -> Result<(), ImcError>;
}

/// Opens controllers. Implemented by `ImcClientPool` for real IMCs and by
/// `memory::MemoryController` for tests.
pub trait Connector {
    /// Logs in with the endpoint's credentials.
    fn authenticate(&self, endpoint: &Endpoint) -> Result<Box<dyn Controller>, ImcError>;

    /// Picks up a session opened earlier, usually by `login`.
    fn resume(&self, session: &SessionHandle) -> Result<Box<dyn Controller>, ImcError>;
}
