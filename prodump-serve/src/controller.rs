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

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::artifact::{ArtifactKind, ArtifactNamer};
use crate::capture::{CpuProfiler, HeapDumper};
use crate::error::CaptureError;

/// Upper bound on unattended profiling sessions, in seconds.
pub const MAX_PROFILE_DURATION_SECS: u64 = 3_600;

/// Process-wide defaults applied when a profile start request omits a
/// parameter. Mutated only through [`CaptureController::set_sample_rate`]
/// while no profiling session is active.
#[derive(Clone, Copy, Debug)]
pub struct SamplingConfig {
    pub sample_rate_us: u32,
    pub stop_after_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            sample_rate_us: 1_000,
            stop_after_secs: 300,
        }
    }
}

/// One in-flight capture.
#[derive(Clone, Debug)]
pub struct CaptureSession {
    pub kind: ArtifactKind,
    pub filename: String,
    pub started_at: OffsetDateTime,
    pub sample_rate_us: Option<u32>,
    pub duration_secs: Option<u64>,
}

/// Per-kind exclusion slot. `Completed` and `Failed` are terminal outcomes
/// surfaced through the operation results; the slot itself returns to `Idle`
/// the moment the artifact write result is known.
enum SessionSlot {
    Idle,
    Running(CaptureSession),
    Stopping(CaptureSession),
}

impl SessionSlot {
    fn is_busy(&self) -> bool {
        !matches!(self, SessionSlot::Idle)
    }

    fn session(&self) -> Option<&CaptureSession> {
        match self {
            SessionSlot::Idle => None,
            SessionSlot::Running(session) | SessionSlot::Stopping(session) => Some(session),
        }
    }

    fn state_name(&self) -> &'static str {
        match self {
            SessionSlot::Idle => "idle",
            SessionSlot::Running(_) => "running",
            SessionSlot::Stopping(_) => "stopping",
        }
    }
}

struct MutableState {
    heap: SessionSlot,
    profile: SessionSlot,
    sampling: SamplingConfig,
    /// Disarm channel of the armed auto-stop timer, if any. Dropping the
    /// sender wakes the timer task without stopping anything.
    auto_stop_disarm: Option<oneshot::Sender<()>>,
}

/// A heap dump accepted by the controller. The capture may still be in
/// flight: await `completion` for the final write result.
pub struct HeapDumpStart {
    pub filename: String,
    pub completion: oneshot::Receiver<Result<(), CaptureError>>,
}

/// A profiling session accepted by the controller.
#[derive(Clone, Debug)]
pub struct ProfileStart {
    pub filename: String,
    pub sample_rate_us: u32,
    pub completes_at: OffsetDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatus {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatus {
    pub heapdump: SlotStatus,
    pub profile: SlotStatus,
    pub sample_rate_us_default: u32,
    pub stop_after_secs_default: u64,
}

/// Process-wide arbiter for capture sessions.
///
/// Enforces at most one heap-dump and one profiling session at a time (the
/// two kinds are independent), arms the auto-stop timer for profiling
/// sessions and owns all mutable capture state. Both trigger paths, HTTP and
/// signals, go through the same operations, so the invariants hold regardless
/// of trigger origin.
///
/// Slot checks and flips happen under one mutex that is never held across an
/// await point; disk I/O runs after release while the slot stays busy, so a
/// concurrent start observes `AlreadyInProgress` instead of racing the write.
#[derive(Clone)]
pub struct CaptureController {
    inner: Arc<InnerController>,
}

struct InnerController {
    state: Mutex<MutableState>,
    heap_dumper: Arc<dyn HeapDumper>,
    cpu_profiler: Arc<dyn CpuProfiler>,
    namer: ArtifactNamer,
    artifact_dir: PathBuf,
}

impl CaptureController {
    pub fn new(
        heap_dumper: Arc<dyn HeapDumper>,
        cpu_profiler: Arc<dyn CpuProfiler>,
        namer: ArtifactNamer,
        artifact_dir: PathBuf,
        sampling: SamplingConfig,
    ) -> Self {
        CaptureController {
            inner: Arc::new(InnerController {
                state: Mutex::new(MutableState {
                    heap: SessionSlot::Idle,
                    profile: SessionSlot::Idle,
                    sampling,
                    auto_stop_disarm: None,
                }),
                heap_dumper,
                cpu_profiler,
                namer,
                artifact_dir,
            }),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.inner.artifact_dir
    }

    /// Starts a heap dump, rejecting it if one is already in flight.
    ///
    /// Returns as soon as the session is accepted; the dump itself runs on a
    /// spawned task. The exclusion slot is released once the write result is
    /// known, success or failure.
    pub fn start_heap_dump(&self) -> Result<HeapDumpStart, CaptureError> {
        let filename = {
            let mut state = self.inner.state.lock().unwrap();
            if state.heap.is_busy() {
                return Err(CaptureError::AlreadyInProgress(ArtifactKind::HeapDump));
            }
            let session = CaptureSession {
                kind: ArtifactKind::HeapDump,
                filename: self.inner.namer.mint(ArtifactKind::HeapDump),
                started_at: OffsetDateTime::now_utc(),
                sample_rate_us: None,
                duration_secs: None,
            };
            let filename = session.filename.clone();
            state.heap = SessionSlot::Running(session);
            filename
        };
        info!(filename = %filename, "starting heap dump");

        let (completion_tx, completion_rx) = oneshot::channel();
        let controller = self.clone();
        let task_filename = filename.clone();
        tokio::spawn(async move {
            let result = controller.write_heap_dump(&task_filename).await;
            {
                let mut state = controller.inner.state.lock().unwrap();
                state.heap = SessionSlot::Idle;
            }
            match &result {
                Ok(()) => info!(filename = %task_filename, "heap dump completed"),
                Err(error) => error!(filename = %task_filename, %error, "heap dump failed"),
            }
            let _ = completion_tx.send(result);
        });
        Ok(HeapDumpStart {
            filename,
            completion: completion_rx,
        })
    }

    async fn write_heap_dump(&self, filename: &str) -> Result<(), CaptureError> {
        let bytes = self
            .inner
            .heap_dumper
            .dump()
            .await
            .map_err(|error| CaptureError::WriteFailure(format!("heap dump failed: {error:#}")))?;
        self.write_artifact(filename, &bytes).await
    }

    /// Updates the default profile sample rate. Rejected while a profiling
    /// session is active so an in-flight session never observes a rate
    /// change.
    pub fn set_sample_rate(&self, sample_rate_us: u32) -> Result<u32, CaptureError> {
        let mut state = self.inner.state.lock().unwrap();
        if state.profile.is_busy() {
            return Err(CaptureError::AlreadyInProgress(ArtifactKind::CpuProfile));
        }
        if sample_rate_us == 0 {
            return Err(CaptureError::InvalidArgument(
                "sample rate must be a positive number of microseconds".to_string(),
            ));
        }
        state.sampling.sample_rate_us = sample_rate_us;
        info!(sample_rate_us, "profile sample rate default updated");
        Ok(sample_rate_us)
    }

    /// Starts a profiling session, arming the auto-stop timer.
    ///
    /// Omitted parameters fall back to the [`SamplingConfig`] defaults.
    /// Validation happens before any state mutation.
    pub fn start_profile(
        &self,
        sample_rate_us: Option<u32>,
        duration_secs: Option<u64>,
    ) -> Result<ProfileStart, CaptureError> {
        let (session, sample_rate_us, duration_secs, disarm_rx) = {
            let mut state = self.inner.state.lock().unwrap();
            if state.profile.is_busy() {
                return Err(CaptureError::AlreadyInProgress(ArtifactKind::CpuProfile));
            }
            let sample_rate_us = sample_rate_us.unwrap_or(state.sampling.sample_rate_us);
            let duration_secs = duration_secs.unwrap_or(state.sampling.stop_after_secs);
            if sample_rate_us == 0 {
                return Err(CaptureError::InvalidArgument(
                    "sample rate must be a positive number of microseconds".to_string(),
                ));
            }
            if !(1..=MAX_PROFILE_DURATION_SECS).contains(&duration_secs) {
                return Err(CaptureError::InvalidArgument(format!(
                    "stop-after duration must be within 1..={MAX_PROFILE_DURATION_SECS} seconds, \
                     got {duration_secs}"
                )));
            }
            self.inner
                .cpu_profiler
                .start(sample_rate_us)
                .map_err(|error| {
                    CaptureError::Internal(format!("failed to start cpu profiler: {error:#}"))
                })?;
            let session = CaptureSession {
                kind: ArtifactKind::CpuProfile,
                filename: self.inner.namer.mint(ArtifactKind::CpuProfile),
                started_at: OffsetDateTime::now_utc(),
                sample_rate_us: Some(sample_rate_us),
                duration_secs: Some(duration_secs),
            };
            state.profile = SessionSlot::Running(session.clone());
            debug_assert!(
                state.auto_stop_disarm.is_none(),
                "auto-stop timer armed without an active profiling session"
            );
            let (disarm_tx, disarm_rx) = oneshot::channel();
            state.auto_stop_disarm = Some(disarm_tx);
            (session, sample_rate_us, duration_secs, disarm_rx)
        };
        self.arm_auto_stop(duration_secs, disarm_rx);
        info!(
            filename = %session.filename,
            sample_rate_us,
            duration_secs,
            "cpu profile started"
        );
        Ok(ProfileStart {
            filename: session.filename,
            sample_rate_us,
            completes_at: session.started_at + Duration::from_secs(duration_secs),
        })
    }

    fn arm_auto_stop(&self, duration_secs: u64, mut disarm_rx: oneshot::Receiver<()>) {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                // The session was finalized by another path; the timer is
                // stale and must not touch a future session of the same kind.
                _ = &mut disarm_rx => {}
                _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {
                    match controller.stop_profile().await {
                        Ok(filename) => info!(filename = %filename, "cpu profile auto-stopped"),
                        // Lost the race against a manual stop.
                        Err(CaptureError::NotInProgress(_)) => {}
                        Err(error) => {
                            error!(%error, "auto-stop failed to finalize cpu profile");
                        }
                    }
                }
            }
        });
    }

    /// Stops the active profiling session and writes its artifact.
    ///
    /// Whichever caller observes `Running` first performs the transition to
    /// `Stopping`; a concurrent caller gets `NotInProgress`. Exactly one
    /// export happens per session.
    pub async fn stop_profile(&self) -> Result<String, CaptureError> {
        let session = {
            let mut state = self.inner.state.lock().unwrap();
            let session = match &state.profile {
                SessionSlot::Running(session) => session.clone(),
                _ => return Err(CaptureError::NotInProgress(ArtifactKind::CpuProfile)),
            };
            state.profile = SessionSlot::Stopping(session.clone());
            state.auto_stop_disarm.take();
            session
        };
        // Finalize on a spawned task: a caller dropped mid-await must not
        // leave the slot stuck in `Stopping`.
        let controller = self.clone();
        let finalize_handle = tokio::spawn(async move {
            let result = controller.export_profile(&session.filename).await;
            {
                let mut state = controller.inner.state.lock().unwrap();
                state.profile = SessionSlot::Idle;
            }
            match result {
                Ok(()) => {
                    info!(filename = %session.filename, "cpu profile completed");
                    Ok(session.filename)
                }
                Err(error) => {
                    error!(filename = %session.filename, %error, "cpu profile export failed");
                    Err(error)
                }
            }
        });
        finalize_handle.await.map_err(|_| {
            CaptureError::Internal("cpu profile finalize task panicked".to_string())
        })?
    }

    async fn export_profile(&self, filename: &str) -> Result<(), CaptureError> {
        let bytes = self.inner.cpu_profiler.export().await.map_err(|error| {
            CaptureError::WriteFailure(format!("cpu profile export failed: {error:#}"))
        })?;
        self.write_artifact(filename, &bytes).await
    }

    async fn write_artifact(&self, filename: &str, bytes: &[u8]) -> Result<(), CaptureError> {
        let path = self.inner.artifact_dir.join(filename);
        tokio::fs::write(&path, bytes).await.map_err(|error| {
            CaptureError::WriteFailure(format!("failed to write `{}`: {error}", path.display()))
        })
    }

    /// Snapshot of both exclusion slots and the sampling defaults.
    pub fn status(&self) -> CaptureStatus {
        let state = self.inner.state.lock().unwrap();
        CaptureStatus {
            heapdump: slot_status(&state.heap),
            profile: slot_status(&state.profile),
            sample_rate_us_default: state.sampling.sample_rate_us,
            stop_after_secs_default: state.sampling.stop_after_secs,
        }
    }
}

fn slot_status(slot: &SessionSlot) -> SlotStatus {
    SlotStatus {
        state: slot.state_name(),
        filename: slot.session().map(|session| session.filename.clone()),
        started_at: slot
            .session()
            .and_then(|session| session.started_at.format(&Rfc3339).ok()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;

    #[derive(Clone, Default)]
    struct FakeHeapDumper {
        dumps: Arc<AtomicU32>,
        fail: Arc<AtomicBool>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl HeapDumper for FakeHeapDumper {
        async fn dump(&self) -> anyhow::Result<Vec<u8>> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.dumps.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("heap capture primitive exploded");
            }
            Ok(b"heap".to_vec())
        }
    }

    #[derive(Clone, Default)]
    struct FakeCpuProfiler {
        starts: Arc<AtomicU32>,
        exports: Arc<AtomicU32>,
        fail_export: Arc<AtomicBool>,
        last_sample_rate_us: Arc<AtomicU32>,
    }

    #[async_trait]
    impl CpuProfiler for FakeCpuProfiler {
        fn start(&self, sample_rate_us: u32) -> anyhow::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.last_sample_rate_us
                .store(sample_rate_us, Ordering::SeqCst);
            Ok(())
        }

        async fn export(&self) -> anyhow::Result<Vec<u8>> {
            self.exports.fetch_add(1, Ordering::SeqCst);
            if self.fail_export.load(Ordering::SeqCst) {
                anyhow::bail!("cpu capture primitive exploded");
            }
            Ok(b"profile".to_vec())
        }
    }

    fn test_controller(
        artifact_dir: &Path,
        heap_dumper: FakeHeapDumper,
        cpu_profiler: FakeCpuProfiler,
    ) -> CaptureController {
        CaptureController::new(
            Arc::new(heap_dumper),
            Arc::new(cpu_profiler),
            ArtifactNamer::new("test-node"),
            artifact_dir.to_path_buf(),
            SamplingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_heap_dump_writes_artifact_and_releases_slot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let heap_dumper = FakeHeapDumper::default();
        let controller = test_controller(
            temp_dir.path(),
            heap_dumper.clone(),
            FakeCpuProfiler::default(),
        );

        let start = controller.start_heap_dump().unwrap();
        start.completion.await.unwrap().unwrap();

        assert_eq!(heap_dumper.dumps.load(Ordering::SeqCst), 1);
        assert!(temp_dir.path().join(&start.filename).exists());
        assert_eq!(controller.status().heapdump.state, "idle");
    }

    #[tokio::test]
    async fn test_heap_dump_exclusion_while_in_flight() {
        let temp_dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let heap_dumper = FakeHeapDumper {
            gate: Some(gate.clone()),
            ..FakeHeapDumper::default()
        };
        let controller = test_controller(
            temp_dir.path(),
            heap_dumper,
            FakeCpuProfiler::default(),
        );

        let first = controller.start_heap_dump().unwrap();
        let second = controller.start_heap_dump();
        assert!(matches!(
            second,
            Err(CaptureError::AlreadyInProgress(ArtifactKind::HeapDump))
        ));

        gate.notify_one();
        first.completion.await.unwrap().unwrap();

        // The slot is free again once the write completed.
        let third = controller.start_heap_dump().unwrap();
        gate.notify_one();
        third.completion.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_heap_dump_failure_releases_slot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let heap_dumper = FakeHeapDumper::default();
        heap_dumper.fail.store(true, Ordering::SeqCst);
        let controller = test_controller(
            temp_dir.path(),
            heap_dumper.clone(),
            FakeCpuProfiler::default(),
        );

        let start = controller.start_heap_dump().unwrap();
        let result = start.completion.await.unwrap();
        assert!(matches!(result, Err(CaptureError::WriteFailure(_))));
        assert_eq!(controller.status().heapdump.state, "idle");

        heap_dumper.fail.store(false, Ordering::SeqCst);
        let retry = controller.start_heap_dump().unwrap();
        retry.completion.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_start_profile_validates_bounds() {
        let temp_dir = tempfile::tempdir().unwrap();
        let controller = test_controller(
            temp_dir.path(),
            FakeHeapDumper::default(),
            FakeCpuProfiler::default(),
        );

        for duration_secs in [0, MAX_PROFILE_DURATION_SECS + 1] {
            let result = controller.start_profile(Some(1_000), Some(duration_secs));
            assert!(
                matches!(result, Err(CaptureError::InvalidArgument(_))),
                "duration {duration_secs} should be rejected"
            );
        }
        let result = controller.start_profile(Some(0), Some(10));
        assert!(matches!(result, Err(CaptureError::InvalidArgument(_))));

        // Boundary values are accepted.
        for duration_secs in [1, MAX_PROFILE_DURATION_SECS] {
            controller
                .start_profile(Some(1), Some(duration_secs))
                .unwrap();
            controller.stop_profile().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_concurrent_profile_starts_admit_a_single_winner() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cpu_profiler = FakeCpuProfiler::default();
        let controller = test_controller(
            temp_dir.path(),
            FakeHeapDumper::default(),
            cpu_profiler.clone(),
        );

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let controller = controller.clone();
            tasks.push(tokio::spawn(async move {
                controller.start_profile(Some(1_000), Some(60))
            }));
        }
        let mut accepted = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(CaptureError::AlreadyInProgress(ArtifactKind::CpuProfile)) => rejected += 1,
                Err(error) => panic!("unexpected error: {error}"),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(rejected, 7);
        assert_eq!(cpu_profiler.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_stop_disarms_auto_stop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cpu_profiler = FakeCpuProfiler::default();
        let controller = test_controller(
            temp_dir.path(),
            FakeHeapDumper::default(),
            cpu_profiler.clone(),
        );

        let start = controller.start_profile(Some(1_000), Some(5)).unwrap();
        let filename = controller.stop_profile().await.unwrap();
        assert_eq!(filename, start.filename);
        assert!(temp_dir.path().join(&filename).exists());

        // Let the armed timer fire well past its deadline: the session is
        // finalized already, so there must be no second export.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(cpu_profiler.exports.load(Ordering::SeqCst), 1);
        assert!(matches!(
            controller.stop_profile().await,
            Err(CaptureError::NotInProgress(ArtifactKind::CpuProfile))
        ));
    }

    #[tokio::test]
    async fn test_auto_stop_finalizes_unattended_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cpu_profiler = FakeCpuProfiler::default();
        let controller = test_controller(
            temp_dir.path(),
            FakeHeapDumper::default(),
            cpu_profiler.clone(),
        );

        let start = controller.start_profile(Some(1_000), Some(1)).unwrap();
        assert_eq!(controller.status().profile.state, "running");

        // Wait for the timer to fire and the finalize to land on disk.
        let mut finalized = false;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if controller.status().profile.state == "idle"
                && temp_dir.path().join(&start.filename).exists()
            {
                finalized = true;
                break;
            }
        }
        assert!(finalized, "auto-stop did not finalize the session");
        assert_eq!(cpu_profiler.exports.load(Ordering::SeqCst), 1);
        assert!(matches!(
            controller.stop_profile().await,
            Err(CaptureError::NotInProgress(ArtifactKind::CpuProfile))
        ));
    }

    #[tokio::test]
    async fn test_stop_profile_without_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cpu_profiler = FakeCpuProfiler::default();
        let controller = test_controller(
            temp_dir.path(),
            FakeHeapDumper::default(),
            cpu_profiler.clone(),
        );

        assert!(matches!(
            controller.stop_profile().await,
            Err(CaptureError::NotInProgress(ArtifactKind::CpuProfile))
        ));
        assert_eq!(cpu_profiler.exports.load(Ordering::SeqCst), 0);
        assert_eq!(controller.status().profile.state, "idle");
    }

    #[tokio::test]
    async fn test_export_failure_releases_slot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cpu_profiler = FakeCpuProfiler::default();
        cpu_profiler.fail_export.store(true, Ordering::SeqCst);
        let controller = test_controller(
            temp_dir.path(),
            FakeHeapDumper::default(),
            cpu_profiler.clone(),
        );

        controller.start_profile(Some(1_000), Some(60)).unwrap();
        let result = controller.stop_profile().await;
        assert!(matches!(result, Err(CaptureError::WriteFailure(_))));
        assert_eq!(controller.status().profile.state, "idle");

        cpu_profiler.fail_export.store(false, Ordering::SeqCst);
        controller.start_profile(Some(1_000), Some(60)).unwrap();
        controller.stop_profile().await.unwrap();
    }

    #[tokio::test]
    async fn test_heap_and_profile_exclusion_are_independent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let controller = test_controller(
            temp_dir.path(),
            FakeHeapDumper::default(),
            FakeCpuProfiler::default(),
        );

        controller.start_profile(Some(1_000), Some(60)).unwrap();
        let heap_start = controller.start_heap_dump().unwrap();
        heap_start.completion.await.unwrap().unwrap();
        controller.stop_profile().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_sample_rate() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cpu_profiler = FakeCpuProfiler::default();
        let controller = test_controller(
            temp_dir.path(),
            FakeHeapDumper::default(),
            cpu_profiler.clone(),
        );

        assert!(matches!(
            controller.set_sample_rate(0),
            Err(CaptureError::InvalidArgument(_))
        ));
        assert_eq!(controller.set_sample_rate(250).unwrap(), 250);

        controller.start_profile(Some(1_000), Some(60)).unwrap();
        assert!(matches!(
            controller.set_sample_rate(500),
            Err(CaptureError::AlreadyInProgress(ArtifactKind::CpuProfile))
        ));
        controller.stop_profile().await.unwrap();

        // The next default-rate session picks up the new value.
        let start = controller.start_profile(None, None).unwrap();
        assert_eq!(start.sample_rate_us, 250);
        assert_eq!(cpu_profiler.last_sample_rate_us.load(Ordering::SeqCst), 250);
        controller.stop_profile().await.unwrap();
    }

    #[tokio::test]
    async fn test_profile_start_reports_completion_time() {
        let temp_dir = tempfile::tempdir().unwrap();
        let controller = test_controller(
            temp_dir.path(),
            FakeHeapDumper::default(),
            FakeCpuProfiler::default(),
        );

        let start = controller.start_profile(Some(1_000), Some(120)).unwrap();
        let session_started_at = start.completes_at - Duration::from_secs(120);
        assert!(session_started_at <= OffsetDateTime::now_utc());
        controller.stop_profile().await.unwrap();
    }
}
