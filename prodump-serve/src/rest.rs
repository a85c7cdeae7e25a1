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

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::ServerIdentity;
use crate::controller::{CaptureController, CaptureStatus};
use crate::error::CaptureError;
use crate::files;
use crate::rest_api_response::{into_rest_api_response, rest_api_error};

/// State shared by all debug handlers.
#[derive(Clone)]
pub struct DebugService {
    pub controller: CaptureController,
    pub identity: Arc<ServerIdentity>,
}

/// Builds the debug router. Authentication is left to the embedder: the
/// standalone server wraps this with basic auth, an embedding application
/// mounts it behind its own middleware.
pub fn debug_routes(service: DebugService) -> Router {
    Router::new()
        .route("/heapdump", get(heapdump_handler))
        .route("/profile/rate/{rate}", get(profile_rate_handler))
        .route("/profile/start", get(profile_start_handler))
        .route("/profile/stop", get(profile_stop_handler))
        .route("/status", get(status_handler))
        .route("/list", get(list_handler))
        .route("/targz", get(targz_handler))
        .route("/download/{filename}", get(download_handler))
        .route("/delete", get(delete_handler))
        .layer(Extension(service))
}

/// Rejects requests targeted at another instance before any capture state is
/// touched. The response echoes the host the caller asked for so a
/// load-balanced client can tell a routing miss from a capture error.
fn check_host_affinity(
    identity: &ServerIdentity,
    requested_host: Option<&str>,
) -> Result<(), CaptureError> {
    match requested_host {
        Some(requested) if !identity.matches(requested) => Err(CaptureError::HostMismatch {
            requested: requested.to_string(),
            node: identity.node(),
        }),
        _ => Ok(()),
    }
}

#[derive(Deserialize)]
struct HostParam {
    host: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileStartParams {
    host: Option<String>,
    stop_after_sec: Option<u64>,
    sample_rate_us: Option<u32>,
}

#[derive(Deserialize)]
struct DeleteParams {
    host: Option<String>,
    filename: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeapDumpResponse {
    completed: bool,
    filename: String,
    node: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SampleRateResponse {
    new_profile_sample_rate_us: u32,
    node: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileStartResponse {
    started: bool,
    filename: String,
    sample_rate_us: u32,
    #[serde(with = "time::serde::rfc3339")]
    completes: OffsetDateTime,
    node: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileStopResponse {
    stopped: bool,
    filename: String,
    node: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    #[serde(flatten)]
    status: CaptureStatus,
    node: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    profiles: Vec<String>,
    heapdumps: Vec<String>,
    node: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    deleted: Vec<String>,
    node: String,
}

/// Captures a heap dump and responds once its artifact is on disk.
#[utoipa::path(get, tag = "debug", path = "/heapdump")]
async fn heapdump_handler(
    Extension(service): Extension<DebugService>,
    Query(params): Query<HostParam>,
) -> Response {
    let node = service.identity.node();
    let result = async {
        check_host_affinity(&service.identity, params.host.as_deref())?;
        let start = service.controller.start_heap_dump()?;
        start
            .completion
            .await
            .map_err(|_| CaptureError::Internal("heap dump task dropped".to_string()))??;
        Ok(HeapDumpResponse {
            completed: true,
            filename: start.filename,
            node: node.clone(),
        })
    }
    .await;
    into_rest_api_response(result, StatusCode::OK, &node)
}

/// Updates the default profile sample rate, in microseconds.
#[utoipa::path(get, tag = "debug", path = "/profile/rate/{rate}")]
async fn profile_rate_handler(
    Extension(service): Extension<DebugService>,
    Path(rate): Path<u32>,
    Query(params): Query<HostParam>,
) -> Response {
    let node = service.identity.node();
    let result = check_host_affinity(&service.identity, params.host.as_deref())
        .and_then(|()| service.controller.set_sample_rate(rate))
        .map(|new_profile_sample_rate_us| SampleRateResponse {
            new_profile_sample_rate_us,
            node: node.clone(),
        });
    into_rest_api_response(result, StatusCode::OK, &node)
}

/// Starts a profiling session. Responds `202 Accepted` immediately: the
/// session keeps running until `/profile/stop` or the auto-stop deadline.
#[utoipa::path(get, tag = "debug", path = "/profile/start")]
async fn profile_start_handler(
    Extension(service): Extension<DebugService>,
    Query(params): Query<ProfileStartParams>,
) -> Response {
    let node = service.identity.node();
    let result = check_host_affinity(&service.identity, params.host.as_deref())
        .and_then(|()| {
            service
                .controller
                .start_profile(params.sample_rate_us, params.stop_after_sec)
        })
        .map(|start| ProfileStartResponse {
            started: true,
            filename: start.filename,
            sample_rate_us: start.sample_rate_us,
            completes: start.completes_at,
            node: node.clone(),
        });
    into_rest_api_response(result, StatusCode::ACCEPTED, &node)
}

/// Stops the active profiling session and responds once its artifact is on
/// disk.
#[utoipa::path(get, tag = "debug", path = "/profile/stop")]
async fn profile_stop_handler(
    Extension(service): Extension<DebugService>,
    Query(params): Query<HostParam>,
) -> Response {
    let node = service.identity.node();
    let result = async {
        check_host_affinity(&service.identity, params.host.as_deref())?;
        let filename = service.controller.stop_profile().await?;
        Ok(ProfileStopResponse {
            stopped: true,
            filename,
            node: node.clone(),
        })
    }
    .await;
    into_rest_api_response(result, StatusCode::OK, &node)
}

#[utoipa::path(get, tag = "debug", path = "/status")]
async fn status_handler(
    Extension(service): Extension<DebugService>,
    Query(params): Query<HostParam>,
) -> Response {
    let node = service.identity.node();
    let result = check_host_affinity(&service.identity, params.host.as_deref()).map(|()| {
        StatusResponse {
            status: service.controller.status(),
            node: node.clone(),
        }
    });
    into_rest_api_response(result, StatusCode::OK, &node)
}

#[utoipa::path(get, tag = "debug", path = "/list")]
async fn list_handler(
    Extension(service): Extension<DebugService>,
    Query(params): Query<HostParam>,
) -> Response {
    let node = service.identity.node();
    let result = async {
        check_host_affinity(&service.identity, params.host.as_deref())?;
        let listing = files::collect_artifacts(service.controller.artifact_dir())
            .await
            .map_err(|error| CaptureError::Internal(format!("failed to list artifacts: {error}")))?;
        Ok(ListResponse {
            profiles: listing.profiles,
            heapdumps: listing.heapdumps,
            node: node.clone(),
        })
    }
    .await;
    into_rest_api_response(result, StatusCode::OK, &node)
}

/// Downloads every artifact as a single gzip-compressed TAR archive.
#[utoipa::path(get, tag = "debug", path = "/targz")]
async fn targz_handler(
    Extension(service): Extension<DebugService>,
    Query(params): Query<HostParam>,
) -> Response {
    let node = service.identity.node();
    if let Err(error) = check_host_affinity(&service.identity, params.host.as_deref()) {
        return rest_api_error(&error, &node);
    }
    match files::targz_artifacts(service.controller.artifact_dir()).await {
        Ok(archive) => {
            let attachment = format!(
                "attachment; filename=\"{}-artifacts.tar.gz\"",
                service.identity.hostname()
            );
            (
                [
                    (CONTENT_TYPE, "application/gzip".to_string()),
                    (CONTENT_DISPOSITION, attachment),
                ],
                archive,
            )
                .into_response()
        }
        Err(error) => rest_api_error(&error, &node),
    }
}

#[utoipa::path(get, tag = "debug", path = "/download/{filename}")]
async fn download_handler(
    Extension(service): Extension<DebugService>,
    Path(filename): Path<String>,
    Query(params): Query<HostParam>,
) -> Response {
    let node = service.identity.node();
    if let Err(error) = check_host_affinity(&service.identity, params.host.as_deref()) {
        return rest_api_error(&error, &node);
    }
    match files::read_artifact(service.controller.artifact_dir(), &filename).await {
        Ok(bytes) => (
            [
                (CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(error) => rest_api_error(&error, &node),
    }
}

/// Deletes one artifact, or every artifact when `filename` is omitted.
#[utoipa::path(get, tag = "debug", path = "/delete")]
async fn delete_handler(
    Extension(service): Extension<DebugService>,
    Query(params): Query<DeleteParams>,
) -> Response {
    let node = service.identity.node();
    let result = async {
        check_host_affinity(&service.identity, params.host.as_deref())?;
        let deleted =
            files::delete_artifacts(service.controller.artifact_dir(), params.filename.as_deref())
                .await?;
        Ok(DeleteResponse {
            deleted,
            node: node.clone(),
        })
    }
    .await;
    into_rest_api_response(result, StatusCode::OK, &node)
}
