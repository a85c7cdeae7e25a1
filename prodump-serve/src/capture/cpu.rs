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

use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use pprof::ProfilerGuard;
use tokio::task::spawn_blocking;

use super::CpuProfiler;

/// CPU profiler backed by the `pprof` crate.
///
/// The profiler guard samples all threads while it is alive; exporting takes
/// the guard, builds the report on a blocking thread and renders it as a
/// flamegraph.
#[derive(Default)]
pub struct PprofCpuProfiler {
    profiler_guard: Mutex<Option<ProfilerGuard<'static>>>,
}

impl PprofCpuProfiler {
    pub fn new() -> Self {
        Self::default()
    }
}

/// pprof takes a sampling frequency in Hz, the wire contract speaks in
/// microseconds between samples.
fn frequency_hz(sample_rate_us: u32) -> i32 {
    (1_000_000 / sample_rate_us.max(1)).max(1) as i32
}

#[async_trait]
impl CpuProfiler for PprofCpuProfiler {
    fn start(&self, sample_rate_us: u32) -> anyhow::Result<()> {
        let mut profiler_guard = self.profiler_guard.lock().unwrap();
        if profiler_guard.is_some() {
            anyhow::bail!("cpu profiler guard is already installed");
        }
        let guard = ProfilerGuard::new(frequency_hz(sample_rate_us))
            .context("failed to install cpu profiler")?;
        *profiler_guard = Some(guard);
        Ok(())
    }

    async fn export(&self) -> anyhow::Result<Vec<u8>> {
        let Some(guard) = self.profiler_guard.lock().unwrap().take() else {
            anyhow::bail!("cpu profiler guard is not installed");
        };
        let export_result = spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
            let report = guard
                .report()
                .build()
                .context("failed to build cpu profile report")?;
            let mut buffer = Vec::new();
            report
                .flamegraph(&mut buffer)
                .context("failed to render cpu profile flamegraph")?;
            // Dropping the guard uninstalls the sampler.
            drop(guard);
            Ok(buffer)
        })
        .await
        .context("cpu profile export task panicked")?;
        export_result
    }
}
