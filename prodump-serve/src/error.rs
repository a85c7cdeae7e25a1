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
use thiserror::Error;

use crate::artifact::ArtifactKind;

/// Errors surfaced by the capture controller and the artifact file manager.
///
/// None of these are fatal: every trigger adapter recovers them into a
/// response (HTTP) or a log line (signals).
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("a {0} capture is already in progress")]
    AlreadyInProgress(ArtifactKind),
    #[error("no {0} capture is in progress")]
    NotInProgress(ArtifactKind),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("capture write failed: {0}")]
    WriteFailure(String),
    #[error("artifact `{0}` not found")]
    NotFound(String),
    #[error("request targeted host `{requested}`, but this node is `{node}`")]
    HostMismatch { requested: String, node: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl CaptureError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyInProgress(_) => StatusCode::CONFLICT,
            Self::NotInProgress(_) => StatusCode::PRECONDITION_FAILED,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::WriteFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::HostMismatch { .. } => StatusCode::PRECONDITION_FAILED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
