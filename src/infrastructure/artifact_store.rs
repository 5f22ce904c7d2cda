//! Filesystem-backed artifact store.
//!
//! All inter-stage communication goes through the files registered in
//! `domain::artifacts`. Writes are staged to temp files and renamed into
//! place together, so a failing stage never leaves a half-written CSV.

use crate::domain::artifacts::{self, ArtifactId, ArtifactSpec, REGISTRY, Stage};
use crate::domain::errors::ArtifactError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Presence report for one registered artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStatus {
    pub id: ArtifactId,
    pub logical_name: &'static str,
    pub path: PathBuf,
    pub present: bool,
    pub bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path(&self, id: ArtifactId) -> PathBuf {
        self.base_dir.join(id.spec().relative_path)
    }

    /// Directory the artifact lives in.
    pub fn dir_of(&self, id: ArtifactId) -> PathBuf {
        self.path(id)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone())
    }

    /// Checks that the artifact exists, has the registered header and at
    /// least one data row.
    pub fn check(&self, id: ArtifactId) -> Result<(), ArtifactError> {
        check_file(&self.path(id), id.spec())
    }

    /// Precondition of `stage`: every declared input is present and non-empty.
    pub fn require_inputs(&self, stage: Stage) -> Result<(), ArtifactError> {
        for spec in artifacts::inputs_of(stage) {
            self.check(spec.id)?;
        }
        Ok(())
    }

    /// Postcondition of `stage`: every artifact it produces is present and non-empty.
    pub fn verify_outputs(&self, stage: Stage) -> Result<(), ArtifactError> {
        for spec in artifacts::outputs_of(stage) {
            self.check(spec.id)?;
        }
        Ok(())
    }

    pub fn read<T: DeserializeOwned>(&self, id: ArtifactId) -> Result<Vec<T>, ArtifactError> {
        read_csv(&self.path(id), id.spec())
    }

    /// Snapshot of every registered artifact.
    pub fn inventory(&self) -> Vec<ArtifactStatus> {
        REGISTRY
            .iter()
            .map(|spec| {
                let path = self.base_dir.join(spec.relative_path);
                let metadata = fs::metadata(&path).ok();
                ArtifactStatus {
                    id: spec.id,
                    logical_name: spec.logical_name,
                    present: metadata.is_some(),
                    bytes: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
                    modified: metadata
                        .and_then(|m| m.modified().ok())
                        .map(DateTime::<Utc>::from),
                    path,
                }
            })
            .collect()
    }
}

fn check_file(path: &Path, spec: &'static ArtifactSpec) -> Result<(), ArtifactError> {
    let metadata = fs::metadata(path).map_err(|_| ArtifactError::Missing {
        name: spec.logical_name,
        path: path.to_path_buf(),
    })?;
    if metadata.len() == 0 {
        return Err(ArtifactError::Empty {
            name: spec.logical_name,
            path: path.to_path_buf(),
        });
    }

    let mut reader = open_reader(path, spec)?;
    let mut record = csv::StringRecord::new();
    let has_row = reader
        .read_record(&mut record)
        .map_err(|source| ArtifactError::Csv {
            name: spec.logical_name,
            source,
        })?;
    if !has_row {
        return Err(ArtifactError::Empty {
            name: spec.logical_name,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Opens a CSV reader and verifies the header against the registered schema.
fn open_reader(
    path: &Path,
    spec: &'static ArtifactSpec,
) -> Result<csv::Reader<fs::File>, ArtifactError> {
    let file = fs::File::open(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ArtifactError::Missing {
            name: spec.logical_name,
            path: path.to_path_buf(),
        },
        _ => ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = reader
        .headers()
        .map_err(|source| ArtifactError::Csv {
            name: spec.logical_name,
            source,
        })?
        .clone();

    let found: Vec<&str> = headers.iter().map(str::trim).collect();
    if found != spec.schema {
        return Err(ArtifactError::SchemaMismatch {
            name: spec.logical_name,
            expected: spec.header(),
            found: found.join(","),
        });
    }
    Ok(reader)
}

/// Reads every row of a schema-checked artifact.
///
/// A file with a valid header but no rows is reported as empty.
pub fn read_csv<T: DeserializeOwned>(
    path: &Path,
    spec: &'static ArtifactSpec,
) -> Result<Vec<T>, ArtifactError> {
    let mut reader = open_reader(path, spec)?;
    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<T>().enumerate() {
        let row = record.map_err(|e| ArtifactError::Malformed {
            name: spec.logical_name,
            reason: format!("row {}: {}", index + 1, e),
        })?;
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(ArtifactError::Empty {
            name: spec.logical_name,
            path: path.to_path_buf(),
        });
    }

    debug!("Read {} rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Serializes rows under the registered header.
pub fn encode_csv<T: Serialize>(
    spec: &'static ArtifactSpec,
    rows: &[T],
) -> Result<Vec<u8>, ArtifactError> {
    let csv_err = |source: csv::Error| ArtifactError::Csv {
        name: spec.logical_name,
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(spec.schema).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.into_inner().map_err(|e| ArtifactError::Io {
        path: PathBuf::from(spec.relative_path),
        source: e.into_error(),
    })
}

/// A set of artifact writes committed together.
#[derive(Default)]
pub struct ArtifactBatch {
    entries: Vec<StagedArtifact>,
}

struct StagedArtifact {
    path: PathBuf,
    spec: &'static ArtifactSpec,
    bytes: Vec<u8>,
}

impl ArtifactBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `rows` for the artifact at `path`. Refuses empty row sets.
    pub fn add<T: Serialize>(
        &mut self,
        path: impl Into<PathBuf>,
        id: ArtifactId,
        rows: &[T],
    ) -> Result<(), ArtifactError> {
        let spec = id.spec();
        let path = path.into();
        if rows.is_empty() {
            return Err(ArtifactError::Empty {
                name: spec.logical_name,
                path,
            });
        }
        let bytes = encode_csv(spec, rows)?;
        self.entries.push(StagedArtifact { path, spec, bytes });
        Ok(())
    }

    /// Writes every staged artifact to a temp file, then renames them all
    /// into place. Temp files are removed if any write fails.
    pub fn commit(self) -> Result<Vec<PathBuf>, ArtifactError> {
        let mut written: Vec<(PathBuf, &StagedArtifact)> = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let temp_path = temp_path_for(&entry.path);
            let result = entry
                .path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::write(&temp_path, &entry.bytes));

            if let Err(source) = result {
                for (temp, _) in &written {
                    let _ = fs::remove_file(temp);
                }
                return Err(ArtifactError::Io {
                    path: entry.path.clone(),
                    source,
                });
            }
            written.push((temp_path, entry));
        }

        let mut committed = Vec::with_capacity(written.len());
        for (temp_path, entry) in written {
            fs::rename(&temp_path, &entry.path).map_err(|source| {
                warn!(
                    "Failed to move {} into place; artifact set may be mixed",
                    entry.spec.logical_name
                );
                ArtifactError::Io {
                    path: entry.path.clone(),
                    source,
                }
            })?;
            info!(
                "Wrote {} ({} bytes) to {:?}",
                entry.spec.logical_name,
                entry.bytes.len(),
                entry.path
            );
            committed.push(entry.path.clone());
        }
        Ok(committed)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
