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

use anyhow::Context;
use async_trait::async_trait;

use super::HeapDumper;

/// Heap snapshots via jemalloc's profiler, exported in pprof format.
///
/// Requires the process to run with the jemalloc allocator built with
/// profiling support (the `prodump` binary sets this up). Dumping activates
/// the profiler on first use.
pub struct JemallocHeapDumper;

#[async_trait]
impl HeapDumper for JemallocHeapDumper {
    async fn dump(&self) -> anyhow::Result<Vec<u8>> {
        let Some(prof_ctl_mutex) = jemalloc_pprof::PROF_CTL.as_ref() else {
            anyhow::bail!(
                "jemalloc profiling control is unavailable; run with the jemalloc allocator and \
                 `MALLOC_CONF=prof:true`"
            );
        };
        let mut prof_ctl = prof_ctl_mutex.lock().await;
        if !prof_ctl.activated() {
            prof_ctl
                .activate()
                .context("failed to activate jemalloc heap profiling")?;
        }
        prof_ctl
            .dump_pprof()
            .context("failed to dump jemalloc heap profile")
    }
}
