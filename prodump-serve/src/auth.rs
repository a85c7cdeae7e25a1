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

//! Default basic-auth layer for the standalone service.
//!
//! Embedders mounting [`crate::debug_routes`] into an existing server are
//! expected to supply their own authentication middleware instead.

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::prelude::{Engine as _, BASE64_STANDARD};

#[derive(Clone, Debug)]
pub struct BasicAuthCredentials {
    pub username: String,
    pub password: String,
}

pub async fn basic_auth_middleware(
    State(credentials): State<BasicAuthCredentials>,
    request: Request,
    next: Next,
) -> Response {
    if is_authorized(&credentials, request.headers()) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, "Basic realm=\"prodump\"")],
            "unauthorized",
        )
            .into_response()
    }
}

fn is_authorized(credentials: &BasicAuthCredentials, headers: &HeaderMap) -> bool {
    let Some(authorization) = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let Some(encoded) = authorization.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = BASE64_STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((username, password)) = decoded.split_once(':') else {
        return false;
    };
    username == credentials.username && password == credentials.password
}
