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

use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum ImcError {
    #[error("Network error talking to IMC at {url}. {source}")]
    NetworkError { url: String, source: reqwest::Error },

    #[error("Could not build HTTP client. {0}")]
    HttpClientError(reqwest::Error),

    #[error("HTTP {status_code} at {url}. {response_body}")]
    HTTPErrorCode {
        url: String,
        status_code: StatusCode,
        response_body: String,
    },

    #[error("Could not deserialize response from {url}. Body: {body}. {source}")]
    JsonDeserializeError {
        url: String,
        body: String,
        source: serde_json::Error,
    },

    #[error("Could not serialize request body for {url}. Obj: {object_debug}. {source}")]
    JsonSerializeError {
        url: String,
        object_debug: String,
        source: serde_json::Error,
    },

    #[error("Remote returned empty body")]
    NoContent,

    #[error("Missing header {header} in response from {url}")]
    MissingHeader { header: String, url: String },

    #[error("Missing key {key} in JSON at {url}")]
    MissingKey { key: String, url: String },

    #[error("Key {key} should be {expected_type} at {url}")]
    InvalidKeyType {
        key: String,
        expected_type: String,
        url: String,
    },

    #[error("{0} not found on controller")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Timed out after {waited_secs}s waiting for {what}")]
    Timeout { what: String, waited_secs: u64 },

    #[error("Write attempted for {0} before its current state was read")]
    NotProbed(&'static str),
}

impl ImcError {
    /// True when the controller answered 404 for the requested resource.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ImcError::HTTPErrorCode {
                status_code: StatusCode::NOT_FOUND,
                ..
            }
        )
    }
}

/// Desired state that cannot be acted on. Always raised before any remote call.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("invalid parameters: {0}")]
    Params(#[from] serde_json::Error),

    #[error("unknown resource kind {0}")]
    UnknownKind(String),

    #[error("parameters {0} and {1} are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),

    #[error("missing required parameter {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("could not read {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Terminal outcome of a failed reconciliation. None of these are retried.
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("authentication failed: {0}")]
    Authentication(#[source] ImcError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    RemoteOperation(#[source] ImcError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let e = ImcError::HTTPErrorCode {
            url: "https://bmc/redfish/v1/AccountService/Accounts/9".to_string(),
            status_code: StatusCode::NOT_FOUND,
            response_body: String::new(),
        };
        assert!(e.is_not_found());

        let e = ImcError::HTTPErrorCode {
            url: "https://bmc/redfish/v1/Systems".to_string(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            response_body: String::new(),
        };
        assert!(!e.is_not_found());
    }

    #[test]
    fn test_remote_operation_message_is_underlying_message() {
        let e = ReconcileError::RemoteOperation(ImcError::OperationFailed(
            "profile upload failed".to_string(),
        ));
        assert_eq!(e.to_string(), "Operation failed: profile upload failed");
    }
}
