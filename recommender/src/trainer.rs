//! Biased matrix-factorization training via stochastic gradient descent.

use displaydoc::Display;
use log::debug;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use thiserror::Error;

use crate::{
    config::TrainConfig,
    dataset::{DatasetError, IdMappings, Interaction},
    model::ModelParameters,
};

/// Held-out evaluation metrics of a training run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvaluationMetrics {
    /// Root-mean-square error over the evaluation split.
    pub rmse: f32,
    /// Mean absolute error over the evaluation split.
    pub mae: f32,
}

/// The result of a successful training run.
///
/// Parameters and mappings belong to each other, indices in the
/// parameters are only meaningful through these mappings.
#[derive(Clone, Debug)]
pub struct TrainOutcome {
    pub params: ModelParameters,
    pub mappings: IdMappings,
    pub metrics: EvaluationMetrics,
}

/// An error which can occur during training.
#[derive(Debug, Display, Error, PartialEq)]
pub enum TrainError {
    /// The interaction dataset is empty
    EmptyDataset,
    /// Too few interactions to split, got {nr_training} training and {nr_evaluation} evaluation samples
    InsufficientData {
        nr_training: usize,
        nr_evaluation: usize,
    },
}

impl From<DatasetError> for TrainError {
    fn from(_: DatasetError) -> Self {
        // the mapping only fails on an empty dataset
        TrainError::EmptyDataset
    }
}

/// A trait providing progress callbacks used during training.
pub trait TrainingController {
    /// Called once before the first epoch.
    fn begin_of_training(&mut self, nr_epochs: usize);

    /// Called at the beginning of each epoch.
    fn begin_of_epoch(&mut self, nr_samples: usize);

    /// Called at the end of each epoch with the RMSE over the
    /// training split of that epoch (measured before each update).
    fn end_of_epoch(&mut self, train_rmse: f32);

    /// Called after training and evaluation finished.
    fn end_of_training(&mut self, metrics: &EvaluationMetrics);
}

impl<C> TrainingController for &mut C
where
    C: TrainingController,
{
    fn begin_of_training(&mut self, nr_epochs: usize) {
        (**self).begin_of_training(nr_epochs);
    }
    fn begin_of_epoch(&mut self, nr_samples: usize) {
        (**self).begin_of_epoch(nr_samples);
    }
    fn end_of_epoch(&mut self, train_rmse: f32) {
        (**self).end_of_epoch(train_rmse);
    }
    fn end_of_training(&mut self, metrics: &EvaluationMetrics) {
        (**self).end_of_training(metrics);
    }
}

/// A controller which ignores all progress.
pub struct NoopTrainingController;

impl TrainingController for NoopTrainingController {
    fn begin_of_training(&mut self, _nr_epochs: usize) {}
    fn begin_of_epoch(&mut self, _nr_samples: usize) {}
    fn end_of_epoch(&mut self, _train_rmse: f32) {}
    fn end_of_training(&mut self, _metrics: &EvaluationMetrics) {}
}

/// Trainer fitting a biased matrix-factorization model on interactions.
pub struct Trainer<C>
where
    C: TrainingController,
{
    config: TrainConfig,
    callbacks: C,
}

impl Trainer<NoopTrainingController> {
    /// Creates a trainer without progress reporting.
    pub fn new(config: TrainConfig) -> Self {
        Self::with_callbacks(config, NoopTrainingController)
    }
}

impl<C> Trainer<C>
where
    C: TrainingController,
{
    /// Creates a trainer reporting progress to the given callbacks.
    pub fn with_callbacks(config: TrainConfig, callbacks: C) -> Self {
        Self { config, callbacks }
    }

    /// Trains for the configured number of epochs and evaluates the
    /// result on the held-out split.
    ///
    /// The identity mapping is built from the full dataset so that
    /// evaluation-split ids stay in-vocabulary; only the gradient
    /// updates are restricted to the training split.
    ///
    /// # Errors
    ///
    /// - [`TrainError::EmptyDataset`] if no interactions are given.
    /// - [`TrainError::InsufficientData`] if the split leaves either
    ///   side empty.
    pub fn train(mut self, interactions: &[Interaction]) -> Result<TrainOutcome, TrainError> {
        let mappings = IdMappings::from_interactions(interactions)?;

        // The mapping was just built from these interactions, the
        // lookups cannot fail.
        let samples = interactions
            .iter()
            .map(|interaction| {
                let u = mappings
                    .user_index(interaction.user_id)
                    .unwrap_or_else(|| unreachable!());
                let i = mappings
                    .course_index(interaction.course_id)
                    .unwrap_or_else(|| unreachable!());
                (u, i, interaction.rating)
            })
            .collect::<Vec<_>>();

        let mut rng = StdRng::seed_from_u64(self.config.seed());
        let (mut training, evaluation) =
            partition(samples, self.config.evaluation_split(), &mut rng)?;
        debug!(
            "split {} interactions into {} training and {} evaluation samples",
            interactions.len(),
            training.len(),
            evaluation.len(),
        );

        let global_bias = mean_rating(&training);
        let mut params = ModelParameters::new_with_random_factors(
            mappings.nr_users(),
            mappings.nr_courses(),
            self.config.factors(),
            global_bias,
            &mut rng,
        );

        self.callbacks.begin_of_training(self.config.epochs());
        for _ in 0..self.config.epochs() {
            self.callbacks.begin_of_epoch(training.len());
            training.shuffle(&mut rng);
            let train_rmse = run_epoch(&mut params, &training, &self.config);
            self.callbacks.end_of_epoch(train_rmse);
        }

        let metrics = evaluate(&params, &evaluation);
        self.callbacks.end_of_training(&metrics);

        Ok(TrainOutcome {
            params,
            mappings,
            metrics,
        })
    }
}

/// Splits the samples into a training and an evaluation partition by
/// seeded random sampling.
pub(crate) fn partition(
    mut samples: Vec<(usize, usize, f32)>,
    evaluation_split: f32,
    rng: &mut impl Rng,
) -> Result<(Vec<(usize, usize, f32)>, Vec<(usize, usize, f32)>), TrainError> {
    samples.shuffle(rng);
    let nr_evaluation = (samples.len() as f32 * evaluation_split).round() as usize;
    let nr_training = samples.len().saturating_sub(nr_evaluation);
    if nr_training == 0 || nr_evaluation == 0 {
        return Err(TrainError::InsufficientData {
            nr_training,
            nr_evaluation,
        });
    }

    let evaluation = samples.split_off(nr_training);
    Ok((samples, evaluation))
}

fn mean_rating(samples: &[(usize, usize, f32)]) -> f32 {
    let sum = samples
        .iter()
        .map(|&(_, _, rating)| f64::from(rating))
        .sum::<f64>();
    (sum / samples.len() as f64) as f32
}

/// Runs one pass of per-sample SGD updates over the training split.
///
/// Returns the RMSE of the predictions as they were before each
/// sample's update.
fn run_epoch(
    params: &mut ModelParameters,
    training: &[(usize, usize, f32)],
    config: &TrainConfig,
) -> f32 {
    let lr = config.learning_rate();
    let reg = config.regularization();
    let mut sum_squared = 0f64;

    for &(u, i, rating) in training {
        let err = rating - params.predict(u, i);
        sum_squared += f64::from(err) * f64::from(err);

        let user_bias = params.user_biases[u];
        let course_bias = params.course_biases[i];
        params.user_biases[u] += lr * (err - reg * user_bias);
        params.course_biases[i] += lr * (err - reg * course_bias);

        // Snapshot the old rows so both factor updates see the
        // pre-update values of the other side.
        let user_row = params.user_factors.row(u).to_owned();
        let course_row = params.course_factors.row(i).to_owned();
        let mut user_factors = params.user_factors.row_mut(u);
        user_factors += &((&course_row * err - &user_row * reg) * lr);
        let mut course_factors = params.course_factors.row_mut(i);
        course_factors += &((&user_row * err - &course_row * reg) * lr);
    }

    (sum_squared / training.len() as f64).sqrt() as f32
}

/// Computes RMSE and MAE of unclamped predictions over the given samples.
pub(crate) fn evaluate(
    params: &ModelParameters,
    samples: &[(usize, usize, f32)],
) -> EvaluationMetrics {
    let mut sum_squared = 0f64;
    let mut sum_absolute = 0f64;
    for &(u, i, rating) in samples {
        let err = f64::from(rating - params.predict(u, i));
        sum_squared += err * err;
        sum_absolute += err.abs();
    }

    let nr_samples = samples.len() as f64;
    EvaluationMetrics {
        rmse: (sum_squared / nr_samples).sqrt() as f32,
        mae: (sum_absolute / nr_samples) as f32,
    }
}
