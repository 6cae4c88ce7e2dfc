//! The persisted model artifact.
//!
//! Parameters, identity mapping and training metadata are stored as
//! one bincode blob prefixed with a one-byte schema version. Saving
//! writes to a sibling temp file first and atomically renames it over
//! the destination, so an interrupted save never clobbers a previously
//! valid artifact.

use std::{
    convert::{TryFrom, TryInto},
    fs,
    io,
    path::{Path, PathBuf},
};

use bincode::Options;
use chrono::{DateTime, Utc};
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::TrainConfig,
    dataset::IdMappings,
    flattened::FlattenedArray,
    model::ModelParameters,
    trainer::TrainOutcome,
};

/// The schema version written by [`ModelArtifact::save()`].
pub const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Potential errors when saving or loading a model artifact.
#[derive(Debug, Display, Error)]
pub enum ArtifactError {
    /// No model artifact found at {path}
    NotFound { path: PathBuf },
    /// Failed to read or write the artifact: {0}
    Io(#[from] io::Error),
    /// The artifact bytes could not be reconstructed: {0}
    Corrupt(#[source] bincode::Error),
    /// Unsupported artifact schema version {version}, expected {expected}
    UnsupportedVersion { version: u8, expected: u8 },
    /// The artifact shapes are inconsistent: {0}
    Invalid(String),
}

/// Metadata describing how the artifact was trained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub factors: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub regularization: f32,
    pub rmse: f32,
    pub mae: f32,
    pub trained_at: DateTime<Utc>,
}

/// The persisted bundle of trained parameters, identity mapping and
/// training metadata.
///
/// Immutable once written, superseded only by a full re-train writing
/// a new artifact.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelArtifact {
    pub params: ModelParameters,
    pub mappings: IdMappings,
    pub metadata: TrainingMetadata,
}

impl ModelArtifact {
    /// Bundles a training outcome into an artifact, stamped with the
    /// current time.
    pub fn from_outcome(outcome: TrainOutcome, config: &TrainConfig) -> Self {
        let metadata = TrainingMetadata {
            factors: config.factors(),
            epochs: config.epochs(),
            learning_rate: config.learning_rate(),
            regularization: config.regularization(),
            rmse: outcome.metrics.rmse,
            mae: outcome.metrics.mae,
            trained_at: Utc::now(),
        };

        Self {
            params: outcome.params,
            mappings: outcome.mappings,
            metadata,
        }
    }

    /// Atomically saves the artifact at the given path.
    ///
    /// # Errors
    ///
    /// Fails if the bytes cannot be serialized or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let bytes = self.serialize()?;

        let mut temp_path = path.as_os_str().to_owned();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Loads and validates an artifact from the given path.
    ///
    /// # Errors
    ///
    /// - [`ArtifactError::NotFound`] if nothing is stored at `path`.
    /// - [`ArtifactError::Corrupt`], [`ArtifactError::UnsupportedVersion`]
    ///   or [`ArtifactError::Invalid`] if the stored bytes cannot be
    ///   reconstructed into a consistent artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                ArtifactError::NotFound {
                    path: path.to_owned(),
                }
            } else {
                ArtifactError::Io(error)
            }
        })?;
        Self::deserialize(&bytes)
    }

    /// Serializes the artifact with a leading schema version byte.
    pub(crate) fn serialize(&self) -> Result<Vec<u8>, ArtifactError> {
        let repr = ArtifactRepr::from(self);
        let size = bincode_options()
            .serialized_size(&repr)
            .map_err(ArtifactError::Corrupt)?;

        let mut bytes = Vec::with_capacity(1 + size as usize);
        bytes.push(CURRENT_SCHEMA_VERSION);
        bincode_options()
            .serialize_into(&mut bytes, &repr)
            .map_err(ArtifactError::Corrupt)?;
        Ok(bytes)
    }

    /// Deserializes and validates an artifact from versioned bytes.
    pub(crate) fn deserialize(bytes: &[u8]) -> Result<Self, ArtifactError> {
        // version is encoded in the first byte
        match bytes.first() {
            Some(&CURRENT_SCHEMA_VERSION) => {}
            Some(&version) => {
                return Err(ArtifactError::UnsupportedVersion {
                    version,
                    expected: CURRENT_SCHEMA_VERSION,
                });
            }
            None => {
                return Err(ArtifactError::Invalid("the artifact is empty".into()));
            }
        }

        let repr = bincode_options()
            .deserialize::<ArtifactRepr>(&bytes[1..])
            .map_err(ArtifactError::Corrupt)?;
        repr.try_into()
    }
}

fn bincode_options() -> impl bincode::Options {
    // we explicitly set some default options to
    // convey exactly which options we use.
    bincode::DefaultOptions::new()
        .with_little_endian()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Serialization representation of [`ModelParameters`].
#[derive(Serialize, Deserialize)]
struct ParametersRepr {
    global_bias: f32,
    user_biases: FlattenedArray,
    course_biases: FlattenedArray,
    user_factors: FlattenedArray,
    course_factors: FlattenedArray,
}

/// Serialization representation of [`ModelArtifact`].
#[derive(Serialize, Deserialize)]
struct ArtifactRepr {
    params: ParametersRepr,
    mappings: IdMappings,
    metadata: TrainingMetadata,
}

impl From<&ModelArtifact> for ArtifactRepr {
    fn from(artifact: &ModelArtifact) -> Self {
        let params = &artifact.params;
        Self {
            params: ParametersRepr {
                global_bias: params.global_bias,
                user_biases: params.user_biases.clone().into(),
                course_biases: params.course_biases.clone().into(),
                user_factors: params.user_factors.clone().into(),
                course_factors: params.course_factors.clone().into(),
            },
            mappings: artifact.mappings.clone(),
            metadata: artifact.metadata.clone(),
        }
    }
}

impl TryFrom<ArtifactRepr> for ModelArtifact {
    type Error = ArtifactError;

    fn try_from(repr: ArtifactRepr) -> Result<Self, Self::Error> {
        let invalid = |error: crate::flattened::UnexpectedArrayShape| {
            ArtifactError::Invalid(error.to_string())
        };
        let params = ModelParameters {
            global_bias: repr.params.global_bias,
            user_biases: repr.params.user_biases.try_into().map_err(invalid)?,
            course_biases: repr.params.course_biases.try_into().map_err(invalid)?,
            user_factors: repr.params.user_factors.try_into().map_err(invalid)?,
            course_factors: repr.params.course_factors.try_into().map_err(invalid)?,
        };

        if !params.has_shapes(repr.mappings.nr_users(), repr.mappings.nr_courses()) {
            return Err(ArtifactError::Invalid(format!(
                "parameter shapes do not match a mapping of {} users and {} courses",
                repr.mappings.nr_users(),
                repr.mappings.nr_courses(),
            )));
        }
        if params.nr_factors() != repr.metadata.factors {
            return Err(ArtifactError::Invalid(format!(
                "parameters have {} factors but the metadata claims {}",
                params.nr_factors(),
                repr.metadata.factors,
            )));
        }

        Ok(Self {
            params,
            mappings: repr.mappings,
            metadata: repr.metadata,
        })
    }
}
