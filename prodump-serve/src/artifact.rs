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
use std::sync::atomic::{AtomicU64, Ordering};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// Timestamp embedded in artifact filenames. ISO-8601 basic format, UTC,
/// millisecond resolution; `:` is avoided on purpose so the names stay valid
/// on every filesystem.
const FILENAME_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] = format_description!(
    "[year][month][day]T[hour][minute][second].[subsecond digits:3]Z"
);

/// The two kinds of capture artifacts this service produces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArtifactKind {
    HeapDump,
    CpuProfile,
}

impl ArtifactKind {
    /// Filename prefix for this kind.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::HeapDump => "heapdump",
            Self::CpuProfile => "profile",
        }
    }

    /// Fixed extension required by downstream inspection tooling.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::HeapDump => "heapsnapshot",
            Self::CpuProfile => "cpuprofile",
        }
    }

    /// Classifies a filename by its extension.
    pub fn of_filename(filename: &str) -> Option<ArtifactKind> {
        let (_, extension) = filename.rsplit_once('.')?;
        if extension == Self::HeapDump.extension() {
            Some(Self::HeapDump)
        } else if extension == Self::CpuProfile.extension() {
            Some(Self::CpuProfile)
        } else {
            None
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::HeapDump => write!(formatter, "heap dump"),
            Self::CpuProfile => write!(formatter, "cpu profile"),
        }
    }
}

/// Mints collision-free artifact filenames embedding the capture kind, the
/// node hostname and a UTC timestamp.
///
/// The timestamp alone is not collision-free under sequential calls, so a
/// process-wide monotonic sequence number is appended.
pub struct ArtifactNamer {
    hostname: String,
    sequence: AtomicU64,
}

impl ArtifactNamer {
    pub fn new(hostname: impl Into<String>) -> Self {
        ArtifactNamer {
            hostname: hostname.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn mint(&self, kind: ArtifactKind) -> String {
        self.name_for(kind, OffsetDateTime::now_utc())
    }

    fn name_for(&self, kind: ArtifactKind, timestamp: OffsetDateTime) -> String {
        let formatted_timestamp = timestamp
            .format(FILENAME_TIMESTAMP_FORMAT)
            .expect("formatting a UTC timestamp with a const format description should not fail");
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}-{}-{}-{:04}.{}",
            kind.label(),
            self.hostname,
            formatted_timestamp,
            sequence,
            kind.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn test_name_embeds_kind_hostname_and_extension() {
        let namer = ArtifactNamer::new("node-1");
        let filename = namer.name_for(ArtifactKind::HeapDump, datetime!(2024-02-03 04:05:06.789 UTC));
        assert_eq!(filename, "heapdump-node-1-20240203T040506.789Z-0000.heapsnapshot");
        let filename = namer.name_for(ArtifactKind::CpuProfile, datetime!(2024-02-03 04:05:06.789 UTC));
        assert_eq!(filename, "profile-node-1-20240203T040506.789Z-0001.cpuprofile");
    }

    #[test]
    fn test_names_never_collide_for_equal_timestamps() {
        let namer = ArtifactNamer::new("node-1");
        let timestamp = datetime!(2024-02-03 04:05:06.789 UTC);
        let first = namer.name_for(ArtifactKind::CpuProfile, timestamp);
        let second = namer.name_for(ArtifactKind::CpuProfile, timestamp);
        assert_ne!(first, second);
    }

    #[test]
    fn test_minted_names_are_unique() {
        let namer = ArtifactNamer::new("node-1");
        let first = namer.mint(ArtifactKind::HeapDump);
        let second = namer.mint(ArtifactKind::HeapDump);
        assert_ne!(first, second);
    }

    #[test]
    fn test_of_filename() {
        assert_eq!(
            ArtifactKind::of_filename("heapdump-node-20240203T040506.789Z-0000.heapsnapshot"),
            Some(ArtifactKind::HeapDump)
        );
        assert_eq!(
            ArtifactKind::of_filename("whatever.cpuprofile"),
            Some(ArtifactKind::CpuProfile)
        );
        assert_eq!(ArtifactKind::of_filename("notes.txt"), None);
        assert_eq!(ArtifactKind::of_filename("no-extension"), None);
    }
}
