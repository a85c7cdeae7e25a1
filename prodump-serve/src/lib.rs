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

//! In-process diagnostics endpoint: remote heap dumps and CPU profiles.
//!
//! A small HTTP surface (plus optional Unix signal triggers) for capturing
//! heap snapshots and sampled CPU profiles from a running process, with
//! per-kind mutual exclusion, auto-stop for unattended profiling sessions and
//! artifact bookkeeping on local disk.
//!
//! Run it standalone through [`serve`], or mount [`debug_routes`] into an
//! existing axum server behind your own authentication.

pub mod artifact;
pub mod auth;
pub mod capture;
pub mod config;
pub mod controller;
mod error;
mod files;
mod rest;
mod rest_api_response;
#[cfg(unix)]
pub mod signals;

use std::sync::Arc;

use anyhow::Context;
use axum::middleware;
use axum::Router;
use tracing::info;

use crate::artifact::ArtifactNamer;
use crate::capture::{JemallocHeapDumper, PprofCpuProfiler};
pub use crate::config::{ProdumpConfig, ServerIdentity};
pub use crate::controller::CaptureController;
pub use crate::error::CaptureError;
pub use crate::rest::{debug_routes, DebugService};

/// Runs the standalone diagnostics server until the process exits.
///
/// Routes are nested under `/debug` and protected by basic auth.
pub async fn serve(config: ProdumpConfig) -> anyhow::Result<()> {
    if !config.enabled {
        info!("diagnostics endpoint is disabled, not starting");
        return Ok(());
    }
    tokio::fs::create_dir_all(&config.artifact_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create artifact directory `{}`",
                config.artifact_dir.display()
            )
        })?;
    let identity = Arc::new(ServerIdentity::from_local_hostname(config.port));
    let controller = CaptureController::new(
        Arc::new(JemallocHeapDumper),
        Arc::new(PprofCpuProfiler::new()),
        ArtifactNamer::new(identity.hostname()),
        config.artifact_dir.clone(),
        config.sampling,
    );
    #[cfg(unix)]
    signals::spawn_signal_triggers(
        controller.clone(),
        &config.profile_signal,
        &config.heapdump_signal,
    )?;

    let service = DebugService {
        controller,
        identity: identity.clone(),
    };
    let router = Router::new()
        .nest("/debug", debug_routes(service))
        .layer(middleware::from_fn_with_state(
            config.basic_auth.clone(),
            auth::basic_auth_middleware,
        ));

    let listen_addr = format!("{}:{}", config.listen_host, config.port);
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind `{listen_addr}`"))?;
    info!(
        listen_addr = %listen_addr,
        node = %identity.node(),
        artifact_dir = %config.artifact_dir.display(),
        "diagnostics endpoint ready"
    );
    axum::serve(listener, router)
        .await
        .context("diagnostics server error")
}
