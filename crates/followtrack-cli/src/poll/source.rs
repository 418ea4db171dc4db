use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use followtrack_core::{MemberType, Snapshot, SnapshotError, SnapshotSource};

/// Reads the JSON files an external collector drops at
/// `<root>/<target>/<followers|followings>.json`.
#[derive(Debug, Clone)]
pub(crate) struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn path_for(&self, target: &str, member_type: MemberType) -> PathBuf {
        self.root
            .join(target)
            .join(format!("{}.json", member_type.count_type().as_str()))
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }
}

impl SnapshotSource for JsonDirSource {
    async fn fetch_members(
        &self,
        target: &str,
        member_type: MemberType,
    ) -> Result<Snapshot, SnapshotError> {
        let path = self.path_for(target, member_type);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::Missing {
                    target: target.to_string(),
                    member_type,
                });
            }
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        Snapshot::from_json(&raw).map_err(|source| SnapshotError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
