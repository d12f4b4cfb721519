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

use std::{collections::HashMap, time::Duration};

use reqwest::{
    blocking::Client as HttpClient, blocking::ClientBuilder as HttpClientBuilder,
    header::HeaderMap, header::HeaderValue, header::ACCEPT, header::CONTENT_TYPE,
    header::LOCATION, Method, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::standard::ImcRedfish;
use crate::{Connector, Controller, ImcError};

pub const REDFISH_ENDPOINT: &str = "redfish/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug)]
pub struct ImcClientPoolBuilder {
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl ImcClientPoolBuilder {
    /// Prevents the client from accepting self signed certificates
    /// and other invalid certificates.
    ///
    /// By default self signed certificates will be accepted, since IMCs
    /// ship with those.
    pub fn reject_invalid_certs(mut self) -> ImcClientPoolBuilder {
        self.accept_invalid_certs = false;
        self
    }

    /// Overwrites the timeout that will be applied to every request
    pub fn timeout(mut self, timeout: Duration) -> ImcClientPoolBuilder {
        self.timeout = timeout;
        self
    }

    /// Builds the shared HTTP client configuration
    pub fn build(&self) -> Result<ImcClientPool, ImcError> {
        let http_client = self.http_client(None)?;
        Ok(ImcClientPool {
            http_client,
            timeout: self.timeout,
            accept_invalid_certs: self.accept_invalid_certs,
        })
    }

    fn http_client(&self, proxy: Option<&str>) -> Result<HttpClient, ImcError> {
        let mut builder = HttpClientBuilder::new()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .timeout(self.timeout);
        if let Some(p) = proxy {
            let proxy = reqwest::Proxy::all(p).map_err(ImcError::HttpClientError)?;
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(ImcError::HttpClientError)
    }
}

/// The controller endpoint and the credentials used to open a session on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname or IP address of the IMC
    pub host: String,
    /// IMC port. If absent the scheme default is used
    pub port: Option<u16>,
    /// IMC username
    pub user: String,
    /// IMC password
    pub password: String,
    /// Use HTTPS. Plain HTTP is only useful against test fixtures
    pub secure: bool,
    /// Optional HTTP(S) proxy URL
    pub proxy: Option<String>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint {
            host: "".to_string(),
            port: None,
            user: "admin".to_string(),
            password: "".to_string(),
            secure: true,
            proxy: None,
        }
    }
}

/// An authenticated session that outlives the process which opened it.
///
/// Produced by `login` and handed back on later invocations. Whoever holds
/// it is responsible for the eventual `logout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub host: String,
    pub port: Option<u16>,
    pub secure: bool,
    pub proxy: Option<String>,
    pub token: String,
    /// Session resource, relative to `redfish/v1`
    pub session_uri: String,
}

#[derive(Debug, Clone)]
pub struct ImcClientPool {
    http_client: HttpClient,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl ImcClientPool {
    /// Returns Builder for configuring an IMC HTTP connection pool
    pub fn builder() -> ImcClientPoolBuilder {
        ImcClientPoolBuilder {
            timeout: DEFAULT_TIMEOUT,
            // IMCs ship with a self-signed cert, so usually this has to be true
            accept_invalid_certs: true,
        }
    }

    fn client_for(&self, target: Target<'_>) -> Result<ImcHttpClient, ImcError> {
        let http_client = match target.proxy {
            Some(p) => ImcClientPoolBuilder {
                timeout: self.timeout,
                accept_invalid_certs: self.accept_invalid_certs,
            }
            .http_client(Some(p))?,
            None => self.http_client.clone(),
        };
        Ok(ImcHttpClient::new(
            http_client,
            base_url(target.secure, target.host, target.port),
        ))
    }
}

struct Target<'a> {
    host: &'a str,
    port: Option<u16>,
    secure: bool,
    proxy: Option<&'a str>,
}

impl Connector for ImcClientPool {
    /// Opens a new session. The first request is the login, followed by two
    /// GETs that discover the system and manager ids.
    fn authenticate(&self, endpoint: &Endpoint) -> Result<Box<dyn Controller>, ImcError> {
        let mut client = self.client_for(Target {
            host: &endpoint.host,
            port: endpoint.port,
            secure: endpoint.secure,
            proxy: endpoint.proxy.as_deref(),
        })?;
        let (token, session_uri) = client.login(&endpoint.user, &endpoint.password)?;
        client.token = Some(token.clone());
        let session = SessionHandle {
            host: endpoint.host.clone(),
            port: endpoint.port,
            secure: endpoint.secure,
            proxy: endpoint.proxy.clone(),
            token,
            session_uri,
        };
        Ok(Box::new(ImcRedfish::new(client, session)?))
    }

    fn resume(&self, session: &SessionHandle) -> Result<Box<dyn Controller>, ImcError> {
        let mut client = self.client_for(Target {
            host: &session.host,
            port: session.port,
            secure: session.secure,
            proxy: session.proxy.as_deref(),
        })?;
        client.token = Some(session.token.clone());
        Ok(Box::new(ImcRedfish::new(client, session.clone())?))
    }
}

fn base_url(secure: bool, host: &str, port: Option<u16>) -> String {
    let scheme = if secure { "https" } else { "http" };
    match port {
        Some(p) => format!("{scheme}://{host}:{p}/{REDFISH_ENDPOINT}"),
        None => format!("{scheme}://{host}/{REDFISH_ENDPOINT}"),
    }
}

/// Strips scheme, host and the `/redfish/v1/` prefix from a resource link.
pub(crate) fn relative_path(link: &str) -> String {
    let prefix = format!("/{REDFISH_ENDPOINT}/");
    match link.find(&prefix) {
        Some(i) => link[i + prefix.len()..].trim_end_matches('/').to_string(),
        None => link.trim_matches('/').to_string(),
    }
}

/// A HTTP client which targets a single IMC
pub struct ImcHttpClient {
    base_url: String,
    http_client: HttpClient,
    token: Option<String>,
}

impl ImcHttpClient {
    pub fn new(http_client: HttpClient, base_url: String) -> Self {
        Self {
            base_url,
            http_client,
            token: None,
        }
    }

    /// Creates a session and returns its token and resource path.
    pub fn login(&self, user: &str, password: &str) -> Result<(String, String), ImcError> {
        let api = "SessionService/Sessions";
        let mut body = HashMap::new();
        body.insert("UserName", user);
        body.insert("Password", password);
        let (_status_code, _resp_body, headers): (_, Option<serde_json::Value>, _) =
            self.send(Method::POST, api, Some(body))?;
        let url = self.url(api);
        let token = header_str(&headers, AUTH_TOKEN_HEADER).ok_or_else(|| {
            ImcError::MissingHeader {
                header: AUTH_TOKEN_HEADER.to_string(),
                url: url.clone(),
            }
        })?;
        let location =
            header_str(&headers, LOCATION.as_str()).ok_or_else(|| ImcError::MissingHeader {
                header: LOCATION.to_string(),
                url,
            })?;
        Ok((token, relative_path(&location)))
    }

    pub fn get<T>(&self, api: &str) -> Result<(StatusCode, T), ImcError>
    where
        T: DeserializeOwned + ::std::fmt::Debug,
    {
        let (status_code, resp_opt) = self.req::<T, String>(Method::GET, api, None)?;
        match resp_opt {
            Some(response_body) => Ok((status_code, response_body)),
            None => Err(ImcError::NoContent),
        }
    }

    pub fn post<B, T>(&self, api: &str, data: B) -> Result<(StatusCode, Option<T>, HeaderMap), ImcError>
    where
        B: Serialize + ::std::fmt::Debug,
        T: DeserializeOwned + ::std::fmt::Debug,
    {
        self.send(Method::POST, api, Some(data))
    }

    pub fn patch<T>(&self, api: &str, data: T) -> Result<StatusCode, ImcError>
    where
        T: Serialize + ::std::fmt::Debug,
    {
        let (status_code, _resp_body): (_, Option<HashMap<String, serde_json::Value>>) =
            self.req(Method::PATCH, api, Some(data))?;
        Ok(status_code)
    }

    pub fn delete(&self, api: &str) -> Result<StatusCode, ImcError> {
        let (status_code, _resp_body): (_, Option<HashMap<String, serde_json::Value>>) =
            self.req::<_, String>(Method::DELETE, api, None)?;
        Ok(status_code)
    }

    pub fn req<T, B>(
        &self,
        method: Method,
        api: &str,
        body: Option<B>,
    ) -> Result<(StatusCode, Option<T>), ImcError>
    where
        T: DeserializeOwned + ::std::fmt::Debug,
        B: Serialize + ::std::fmt::Debug,
    {
        let (status_code, res, _headers) = self.send(method, api, body)?;
        Ok((status_code, res))
    }

    fn url(&self, api: &str) -> String {
        if api.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, api)
        }
    }

    // All the HTTP requests happen from here.
    fn send<T, B>(
        &self,
        method: Method,
        api: &str,
        body: Option<B>,
    ) -> Result<(StatusCode, Option<T>, HeaderMap), ImcError>
    where
        T: DeserializeOwned + ::std::fmt::Debug,
        B: Serialize + ::std::fmt::Debug,
    {
        let url = self.url(api);
        let body_enc = match body {
            Some(b) => {
                let body_enc =
                    serde_json::to_string(&b).map_err(|e| ImcError::JsonSerializeError {
                        url: url.clone(),
                        object_debug: format!("{b:?}"),
                        source: e,
                    })?;
                Some(body_enc)
            }
            None => None,
        };
        // Never log credentials
        if api.starts_with("SessionService") && method == Method::POST {
            debug!("TX {} {}", method, url);
        } else {
            debug!(
                "TX {} {} {}",
                method,
                url,
                body_enc.as_deref().unwrap_or_default()
            );
        }

        let mut req_b = self
            .http_client
            .request(method, &url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            req_b = req_b.header(AUTH_TOKEN_HEADER, token);
        }
        if let Some(b) = body_enc {
            req_b = req_b.body(b);
        }
        let response = req_b.send().map_err(|e| ImcError::NetworkError {
            url: url.clone(),
            source: e,
        })?;
        let status_code = response.status();
        let headers = response.headers().clone();
        // read the body even if not status 2XX, because IMCs give useful error messages as JSON
        let response_body = response.text().map_err(|e| ImcError::NetworkError {
            url: url.clone(),
            source: e,
        })?;
        if !status_code.is_success() {
            debug!("RX {status_code} {response_body}");
            return Err(ImcError::HTTPErrorCode {
                url,
                status_code,
                response_body,
            });
        }
        let mut res = None;
        if !response_body.is_empty() {
            debug!("RX {status_code} {response_body}");
            match serde_json::from_str(&response_body) {
                Ok(v) => res = Some(v),
                Err(e) => {
                    return Err(ImcError::JsonDeserializeError {
                        url,
                        body: response_body,
                        source: e,
                    });
                }
            };
        } else {
            debug!("RX {status_code}");
        }
        Ok((status_code, res, headers))
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
