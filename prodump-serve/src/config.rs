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

use std::fmt;
use std::path::PathBuf;

use prodump_common::{get_bool_from_env, get_from_env};
use tracing::warn;

use crate::auth::BasicAuthCredentials;
use crate::controller::SamplingConfig;

pub const DEFAULT_PORT: u16 = 6660;

const DEFAULT_BASIC_AUTH_USER: &str = "change";
const DEFAULT_BASIC_AUTH_PASSWORD: &str = "me";

/// Immutable identity of this server instance, computed once at startup.
///
/// Stamped into the `node` field of every response and used for the
/// host-affinity filter: a load-balanced caller passes the node it targets
/// and retries until it is routed to it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerIdentity {
    hostname: String,
    port: u16,
}

impl ServerIdentity {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        ServerIdentity {
            hostname: hostname.into(),
            port,
        }
    }

    /// Identity of the local machine, falling back to `localhost` when the
    /// hostname cannot be determined.
    pub fn from_local_hostname(port: u16) -> Self {
        let hostname = match prodump_common::net::get_short_hostname() {
            Ok(hostname) => hostname,
            Err(error) => {
                warn!(%error, "failed to determine hostname, falling back to `localhost`");
                "localhost".to_string()
            }
        };
        Self::new(hostname, port)
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// `hostname:port`, the `node` value of every response.
    pub fn node(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    /// Whether a caller-requested host designates this instance. Both the
    /// bare hostname and `hostname:port` are accepted.
    pub fn matches(&self, requested_host: &str) -> bool {
        requested_host == self.hostname || requested_host == self.node()
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}:{}", self.hostname, self.port)
    }
}

/// Configuration of the standalone diagnostics endpoint, read from the
/// environment once at startup.
#[derive(Clone, Debug)]
pub struct ProdumpConfig {
    pub enabled: bool,
    pub listen_host: String,
    pub port: u16,
    pub artifact_dir: PathBuf,
    pub sampling: SamplingConfig,
    pub profile_signal: String,
    pub heapdump_signal: String,
    pub basic_auth: BasicAuthCredentials,
}

impl ProdumpConfig {
    pub fn from_env() -> Self {
        let basic_auth = BasicAuthCredentials {
            username: get_from_env(
                "PRODUMP_BASIC_AUTH_USER",
                DEFAULT_BASIC_AUTH_USER.to_string(),
            ),
            password: get_from_env(
                "PRODUMP_BASIC_AUTH_PASSWORD",
                DEFAULT_BASIC_AUTH_PASSWORD.to_string(),
            ),
        };
        if basic_auth.username == DEFAULT_BASIC_AUTH_USER
            && basic_auth.password == DEFAULT_BASIC_AUTH_PASSWORD
        {
            warn!(
                "default basic auth credentials are in place; set `PRODUMP_BASIC_AUTH_USER` and \
                 `PRODUMP_BASIC_AUTH_PASSWORD` in production"
            );
        }
        ProdumpConfig {
            enabled: get_bool_from_env("PRODUMP_ENABLED", false),
            listen_host: get_from_env("PRODUMP_HOST", "localhost".to_string()),
            port: get_from_env("PRODUMP_PORT", DEFAULT_PORT),
            artifact_dir: PathBuf::from(get_from_env("PRODUMP_DIR", ".".to_string())),
            sampling: SamplingConfig {
                sample_rate_us: get_from_env(
                    "PRODUMP_SAMPLE_RATE_US_DEFAULT",
                    SamplingConfig::default().sample_rate_us,
                ),
                stop_after_secs: get_from_env(
                    "PRODUMP_STOP_AFTER_SECS_DEFAULT",
                    SamplingConfig::default().stop_after_secs,
                ),
            },
            profile_signal: get_from_env("PRODUMP_PROFILE_SIGNAL", "SIGUSR1".to_string()),
            heapdump_signal: get_from_env("PRODUMP_HEAPDUMP_SIGNAL", "SIGUSR2".to_string()),
            basic_auth,
        }
    }
}
