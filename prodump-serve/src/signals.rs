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

//! Unix signal triggers.
//!
//! Signals go through the same [`CaptureController`] operations as HTTP, so
//! the exclusion and auto-stop invariants hold for both. A signal has no
//! reply channel: outcomes are only logged.

use anyhow::{bail, Context};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use crate::controller::CaptureController;

/// Parses a signal name (`SIGUSR1`, `USR1`) or raw number into a
/// [`SignalKind`].
pub fn parse_signal_kind(name: &str) -> anyhow::Result<SignalKind> {
    let trimmed = name.trim();
    match trimmed.strip_prefix("SIG").unwrap_or(trimmed) {
        "USR1" => Ok(SignalKind::user_defined1()),
        "USR2" => Ok(SignalKind::user_defined2()),
        "HUP" => Ok(SignalKind::hangup()),
        other => {
            if let Ok(signum) = other.parse::<i32>() {
                return Ok(SignalKind::from_raw(signum));
            }
            bail!("unsupported signal `{name}`");
        }
    }
}

/// Installs the signal handlers and spawns their dispatch loops.
pub fn spawn_signal_triggers(
    controller: CaptureController,
    profile_signal: &str,
    heapdump_signal: &str,
) -> anyhow::Result<()> {
    let profile_kind = parse_signal_kind(profile_signal)
        .with_context(|| format!("invalid profile trigger signal `{profile_signal}`"))?;
    let heapdump_kind = parse_signal_kind(heapdump_signal)
        .with_context(|| format!("invalid heap dump trigger signal `{heapdump_signal}`"))?;

    let mut profile_stream =
        signal(profile_kind).context("failed to install profile signal handler")?;
    let profile_controller = controller.clone();
    tokio::spawn(async move {
        while profile_stream.recv().await.is_some() {
            match profile_controller.start_profile(None, None) {
                Ok(start) => {
                    info!(filename = %start.filename, "cpu profile started by signal");
                }
                Err(error) => warn!(%error, "signal-triggered profile start rejected"),
            }
        }
    });

    let mut heapdump_stream =
        signal(heapdump_kind).context("failed to install heap dump signal handler")?;
    tokio::spawn(async move {
        while heapdump_stream.recv().await.is_some() {
            match controller.start_heap_dump() {
                Ok(start) => info!(filename = %start.filename, "heap dump triggered by signal"),
                Err(error) => warn!(%error, "signal-triggered heap dump rejected"),
            }
        }
    });
    info!(
        profile_signal,
        heapdump_signal, "signal triggers installed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signal_kind() {
        assert_eq!(
            parse_signal_kind("SIGUSR1").unwrap(),
            SignalKind::user_defined1()
        );
        assert_eq!(
            parse_signal_kind("USR2").unwrap(),
            SignalKind::user_defined2()
        );
        assert_eq!(parse_signal_kind("SIGHUP").unwrap(), SignalKind::hangup());
        assert_eq!(parse_signal_kind("10").unwrap(), SignalKind::from_raw(10));
        assert!(parse_signal_kind("SIGNOPE").is_err());
        assert!(parse_signal_kind("").is_err());
    }
}
