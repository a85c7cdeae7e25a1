// Copyright 2021-Present Datadog, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::CaptureError;

/// Error body of the REST API. Kept as simple as possible: a message, the
/// responding node and, for host-affinity rejections, the host the caller
/// asked for.
#[derive(Serialize)]
pub(crate) struct RestApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    pub node: String,
}

/// Maps a [`CaptureError`] to its JSON error response.
pub(crate) fn rest_api_error(error: &CaptureError, node: &str) -> Response {
    let expected = match error {
        CaptureError::HostMismatch { requested, .. } => Some(requested.clone()),
        _ => None,
    };
    let body = RestApiError {
        error: error.to_string(),
        expected,
        node: node.to_string(),
    };
    (error.status_code(), Json(body)).into_response()
}

/// Makes a JSON API response from a result, publicly exposing a consistent
/// error format.
pub(crate) fn into_rest_api_response<T: Serialize>(
    result: Result<T, CaptureError>,
    success_status: StatusCode,
    node: &str,
) -> Response {
    match result {
        Ok(body) => (success_status, Json(body)).into_response(),
        Err(error) => rest_api_error(&error, node),
    }
}
