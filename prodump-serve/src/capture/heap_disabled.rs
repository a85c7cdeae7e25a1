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

use super::HeapDumper;

/// Heap profiling disabled at compile time.
pub struct JemallocHeapDumper;

#[async_trait]
impl HeapDumper for JemallocHeapDumper {
    async fn dump(&self) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("not compiled with the `heap-prof` feature")
    }
}
