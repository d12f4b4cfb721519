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

//! Acquiring and releasing the controller handle for one invocation.
//!
//! A handle the caller supplies, either live or as a `SessionHandle` from an
//! earlier `login`, is borrowed and never logged out. A handle opened here
//! from credentials is owned and is logged out exactly once, on every exit
//! path including unwinding.

use tracing::{debug, info, warn};

use crate::{Connector, Controller, Endpoint, ImcError, SessionHandle};

/// Where the controller handle for an invocation comes from.
pub enum Target<'a> {
    /// Log in with these credentials; the session is closed afterwards.
    Credentials(Endpoint),
    /// Reuse a session opened by `login`; it stays open.
    Session(SessionHandle),
    /// Reuse a live handle; it stays open.
    Handle(&'a dyn Controller),
}

impl std::fmt::Debug for Target<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the password or the token
        match self {
            Target::Credentials(e) => write!(f, "Credentials({}@{})", e.user, e.host),
            Target::Session(s) => write!(f, "Session({})", s.host),
            Target::Handle(_) => f.write_str("Handle"),
        }
    }
}

enum Handle<'a> {
    Opened(Box<dyn Controller>),
    Borrowed(&'a dyn Controller),
}

/// A controller handle scoped to one invocation.
pub struct Connection<'a> {
    handle: Handle<'a>,
    owned: bool,
    released: bool,
}

impl<'a> Connection<'a> {
    pub fn controller(&self) -> &dyn Controller {
        match &self.handle {
            Handle::Opened(c) => c.as_ref(),
            Handle::Borrowed(c) => *c,
        }
    }

    /// True when this connection opened the session and must close it.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Closes the session if this connection owns it. Dropping the connection
    /// does the same but can only log a failure.
    pub fn release(mut self) -> Result<(), ImcError> {
        self.close()
    }

    fn close(&mut self) -> Result<(), ImcError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if !self.owned {
            debug!("Leaving caller supplied session open");
            return Ok(());
        }
        debug!("Logging out");
        self.controller().logout()
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Could not log out of IMC: {err}");
        }
    }
}

/// Produces the handle for an invocation. Failures here are authentication
/// failures and are not retried.
pub fn acquire<'a>(target: Target<'a>, connector: &dyn Connector) -> Result<Connection<'a>, ImcError> {
    let (handle, owned) = match target {
        Target::Handle(c) => (Handle::Borrowed(c), false),
        Target::Session(s) => (Handle::Opened(connector.resume(&s)?), false),
        Target::Credentials(e) => {
            info!("Logging in to {} as {}", e.host, e.user);
            (Handle::Opened(connector.authenticate(&e)?), true)
        }
    };
    Ok(Connection {
        handle,
        owned,
        released: false,
    })
}

/// Opens a session and hands it to the caller, who becomes responsible for
/// `logout`.
pub fn login(endpoint: &Endpoint, connector: &dyn Connector) -> Result<SessionHandle, ImcError> {
    let controller = connector.authenticate(endpoint)?;
    controller
        .session()
        .cloned()
        .ok_or_else(|| ImcError::OperationFailed("controller returned no session".to_string()))
}

/// Ends a session previously returned by `login`.
pub fn logout(session: &SessionHandle, connector: &dyn Connector) -> Result<(), ImcError> {
    connector.resume(session)?.logout()
}
