//! Checkpoint trait and error handling for versioned artifact persistence.
//!
//! Every persisted artifact (fuzzy models, ensembles, preprocessing records)
//! goes through the [`Checkpointable`] trait. Snapshots start with a `u32`
//! format version; the header is decoded and checked before the payload so
//! that a file written by an incompatible release fails fast with
//! [`CheckpointError::VersionMismatch`] instead of a confusing decode error.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::{Deserialize, Serialize};

/// Errors that can occur while saving or loading checkpoints.
#[derive(Debug)]
pub enum CheckpointError {
    /// Underlying I/O failure while reading or writing checkpoint files.
    Io(io::Error),
    /// Serialization or deserialization error from the binary codec.
    Serialization(bincode::Error),
    /// The artifact file does not exist.
    ArtifactNotFound(PathBuf),
    /// The checkpoint file was well formed but carries an incompatible schema version.
    VersionMismatch { expected: u32, found: u32 },
    /// The checkpoint decoded but its contents are inconsistent.
    InvalidFormat(String),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::Io(err) => write!(f, "I/O error while accessing checkpoint: {err}"),
            CheckpointError::Serialization(err) => {
                write!(f, "Failed to (de)serialize checkpoint payload: {err}")
            }
            CheckpointError::ArtifactNotFound(path) => {
                write!(f, "Artifact not found: {}", path.display())
            }
            CheckpointError::VersionMismatch { expected, found } => write!(
                f,
                "Checkpoint version mismatch: expected {expected}, found {found}",
            ),
            CheckpointError::InvalidFormat(msg) => {
                write!(f, "Checkpoint file has invalid structure: {msg}")
            }
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(err) => Some(err),
            CheckpointError::Serialization(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(err: io::Error) -> Self {
        CheckpointError::Io(err)
    }
}

impl From<bincode::Error> for CheckpointError {
    fn from(err: bincode::Error) -> Self {
        CheckpointError::Serialization(err)
    }
}

/// Deterministic binary codec options shared by all checkpoint implementations.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_little_endian()
}

/// Leading field of every snapshot struct.
#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

/// Encode a snapshot into bytes with the shared codec.
pub fn encode_snapshot<T: Serialize>(snapshot: &T) -> Result<Vec<u8>, CheckpointError> {
    Ok(codec().serialize(snapshot)?)
}

/// Decode a snapshot whose first field is a `u32` version, checking the
/// version before touching the rest of the payload.
pub fn decode_snapshot<T>(bytes: &[u8], expected_version: u32) -> Result<T, CheckpointError>
where
    T: serde::de::DeserializeOwned,
{
    let header: VersionHeader = codec().deserialize(bytes)?;
    if header.version != expected_version {
        return Err(CheckpointError::VersionMismatch {
            expected: expected_version,
            found: header.version,
        });
    }
    Ok(codec().deserialize(bytes)?)
}

/// Components that support versioned persistence implement this trait.
pub trait Checkpointable: Sized {
    /// Save the current state to `path` using the deterministic codec.
    fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError>;

    /// Load a state from `path`.
    fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError>;

    /// Utility for writing a serializable snapshot with the shared codec.
    fn write_snapshot<P, T>(snapshot: &T, path: P) -> Result<(), CheckpointError>
    where
        P: AsRef<Path>,
        T: Serialize,
    {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        codec().serialize_into(&mut writer, snapshot)?;
        writer.flush()?;
        Ok(())
    }

    /// Utility for reading a versioned snapshot with the shared codec.
    ///
    /// A missing file maps to [`CheckpointError::ArtifactNotFound`].
    fn read_snapshot<P, T>(path: P, expected_version: u32) -> Result<T, CheckpointError>
    where
        P: AsRef<Path>,
        T: serde::de::DeserializeOwned,
    {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => CheckpointError::ArtifactNotFound(path.to_path_buf()),
            _ => CheckpointError::Io(err),
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        decode_snapshot(&bytes, expected_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        version: u32,
        payload: Vec<f64>,
    }

    #[test]
    fn decode_rejects_foreign_version() {
        let bytes = encode_snapshot(&Probe {
            version: 7,
            payload: vec![1.0, 2.0],
        })
        .unwrap();

        let err = decode_snapshot::<Probe>(&bytes, 3).expect_err("version mismatch");
        assert!(matches!(
            err,
            CheckpointError::VersionMismatch {
                expected: 3,
                found: 7
            }
        ));
    }

    #[test]
    fn decode_accepts_matching_version() {
        let probe = Probe {
            version: 3,
            payload: vec![0.25, -1.5],
        };
        let bytes = encode_snapshot(&probe).unwrap();
        let decoded: Probe = decode_snapshot(&bytes, 3).unwrap();
        assert_eq!(decoded, probe);
    }
}
