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

//! Artifact file management: listing, packaging, download and deletion.
//!
//! Thin I/O wrappers around the capture core. Only bare filenames carrying
//! one of the two artifact extensions are ever accepted, so a caller cannot
//! reach outside the artifact directory.

use std::io;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::task::spawn_blocking;

use crate::artifact::ArtifactKind;
use crate::error::CaptureError;

#[derive(Debug, Default)]
pub(crate) struct ArtifactListing {
    pub profiles: Vec<String>,
    pub heapdumps: Vec<String>,
}

impl ArtifactListing {
    fn all(self) -> Vec<String> {
        let mut filenames = self.profiles;
        filenames.extend(self.heapdumps);
        filenames
    }
}

pub(crate) fn validate_artifact_filename(filename: &str) -> Result<(), CaptureError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(CaptureError::InvalidArgument(format!(
            "invalid artifact filename `{filename}`"
        )));
    }
    if ArtifactKind::of_filename(filename).is_none() {
        return Err(CaptureError::InvalidArgument(format!(
            "`{filename}` is not a profile or heap dump artifact"
        )));
    }
    Ok(())
}

/// Lists the artifact files present in `artifact_dir`, sorted by name.
pub(crate) async fn collect_artifacts(artifact_dir: &Path) -> io::Result<ArtifactListing> {
    let mut listing = ArtifactListing::default();
    let mut entries = tokio::fs::read_dir(artifact_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Ok(filename) = entry.file_name().into_string() else {
            continue;
        };
        match ArtifactKind::of_filename(&filename) {
            Some(ArtifactKind::CpuProfile) => listing.profiles.push(filename),
            Some(ArtifactKind::HeapDump) => listing.heapdumps.push(filename),
            None => {}
        }
    }
    listing.profiles.sort_unstable();
    listing.heapdumps.sort_unstable();
    Ok(listing)
}

pub(crate) async fn read_artifact(
    artifact_dir: &Path,
    filename: &str,
) -> Result<Vec<u8>, CaptureError> {
    validate_artifact_filename(filename)?;
    match tokio::fs::read(artifact_dir.join(filename)).await {
        Ok(bytes) => Ok(bytes),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            Err(CaptureError::NotFound(filename.to_string()))
        }
        Err(error) => Err(CaptureError::Internal(format!(
            "failed to read `{filename}`: {error}"
        ))),
    }
}

/// Deletes one artifact, or every artifact when no filename is given.
/// Returns the names of the deleted files.
pub(crate) async fn delete_artifacts(
    artifact_dir: &Path,
    filename_opt: Option<&str>,
) -> Result<Vec<String>, CaptureError> {
    let filenames = match filename_opt {
        Some(filename) => {
            validate_artifact_filename(filename)?;
            vec![filename.to_string()]
        }
        None => collect_artifacts(artifact_dir)
            .await
            .map_err(|error| {
                CaptureError::Internal(format!("failed to list artifacts: {error}"))
            })?
            .all(),
    };
    let mut deleted = Vec::with_capacity(filenames.len());
    for filename in filenames {
        match tokio::fs::remove_file(artifact_dir.join(&filename)).await {
            Ok(()) => deleted.push(filename),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                // An explicit target that is missing is an error; files that
                // disappeared between listing and deletion are not.
                if filename_opt.is_some() {
                    return Err(CaptureError::NotFound(filename));
                }
            }
            Err(error) => {
                return Err(CaptureError::Internal(format!(
                    "failed to delete `{filename}`: {error}"
                )));
            }
        }
    }
    Ok(deleted)
}

/// Packages every artifact into a gzip-compressed TAR archive.
pub(crate) async fn targz_artifacts(artifact_dir: &Path) -> Result<Vec<u8>, CaptureError> {
    let filenames = collect_artifacts(artifact_dir)
        .await
        .map_err(|error| CaptureError::Internal(format!("failed to list artifacts: {error}")))?
        .all();
    let artifact_dir = artifact_dir.to_path_buf();
    let archive_result = spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut archive_builder = tar::Builder::new(encoder);
        for filename in &filenames {
            let mut file = std::fs::File::open(artifact_dir.join(filename))?;
            archive_builder.append_file(filename, &mut file)?;
        }
        let encoder = archive_builder.into_inner()?;
        Ok(encoder.finish()?)
    })
    .await
    .map_err(|_| CaptureError::Internal("artifact packaging task panicked".to_string()))?;
    archive_result
        .map_err(|error| CaptureError::Internal(format!("failed to package artifacts: {error:#}")))
}
