//! Latent-factor course recommendations for the SmartLearn platform.
//!
//! The crate covers the offline and online halves of the
//! recommendation engine:
//!
//! - [`dataset`] maps raw (user, course, rating) interactions into a
//!   dense index space.
//! - [`trainer`] fits a biased matrix-factorization model on the
//!   mapped interactions via SGD and evaluates it on a held-out split.
//! - [`artifact`] persists the trained parameters together with the
//!   identity mapping as one versioned, atomically replaced blob.
//! - [`cache`] holds the loaded artifact process-wide with load-once
//!   semantics.
//! - [`service`] turns the cached model plus catalog and enrollment
//!   snapshots into ranked course lists, degrading to a popularity
//!   ranking when no model applies.

pub mod artifact;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod model;
pub mod service;
pub mod trainer;

mod flattened;
mod utils;

pub use crate::{
    artifact::{ArtifactError, ModelArtifact, TrainingMetadata},
    cache::ModelCache,
    config::TrainConfig,
    dataset::{CourseId, DatasetError, DatasetStats, IdMappings, Interaction, UserId},
    model::ModelParameters,
    service::{
        CatalogSource,
        CourseSummary,
        EnrollmentSource,
        RecommendError,
        RecommendationService,
    },
    trainer::{EvaluationMetrics, TrainError, TrainOutcome, Trainer, TrainingController},
};
