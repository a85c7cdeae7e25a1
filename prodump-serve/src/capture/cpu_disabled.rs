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

use async_trait::async_trait;

use super::CpuProfiler;

/// CPU profiling disabled at compile time.
#[derive(Default)]
pub struct PprofCpuProfiler;

impl PprofCpuProfiler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CpuProfiler for PprofCpuProfiler {
    fn start(&self, _sample_rate_us: u32) -> anyhow::Result<()> {
        anyhow::bail!("not compiled with the `pprof` feature")
    }

    async fn export(&self) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("not compiled with the `pprof` feature")
    }
}
