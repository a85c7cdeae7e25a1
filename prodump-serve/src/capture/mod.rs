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

#[cfg_attr(not(feature = "pprof"), path = "cpu_disabled.rs")]
mod cpu;
#[cfg_attr(not(feature = "heap-prof"), path = "heap_disabled.rs")]
mod heap;

use async_trait::async_trait;
pub use cpu::PprofCpuProfiler;
pub use heap::JemallocHeapDumper;

/// Underlying heap-capture primitive.
///
/// Heap capture is a single atomic operation: one call produces the full
/// snapshot bytes, there is no start/stop split.
#[async_trait]
pub trait HeapDumper: Send + Sync + 'static {
    async fn dump(&self) -> anyhow::Result<Vec<u8>>;
}

/// Underlying CPU-sampling primitive.
///
/// `start` installs the sampler at the given interval; `export` uninstalls it
/// and renders the collected samples. The capture controller guarantees the
/// two are called strictly alternately.
#[async_trait]
pub trait CpuProfiler: Send + Sync + 'static {
    fn start(&self, sample_rate_us: u32) -> anyhow::Result<()>;
    async fn export(&self) -> anyhow::Result<Vec<u8>>;
}
