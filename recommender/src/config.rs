//! Configuration of the trainer.

use displaydoc::Display;
use thiserror::Error;

/// The configuration of a training run.
#[derive(Clone, Debug)]
pub struct TrainConfig {
    factors: usize,
    epochs: usize,
    learning_rate: f32,
    regularization: f32,
    evaluation_split: f32,
    seed: u64,
}

/// Potential errors of the training configuration.
#[derive(Copy, Clone, Debug, Display, Error)]
pub enum Error {
    /// Invalid number of factors, expected a positive value
    Factors,
    /// Invalid number of epochs, expected a positive value
    Epochs,
    /// Invalid learning rate, expected a finite positive value
    LearningRate,
    /// Invalid regularization, expected a finite non-negative value
    Regularization,
    /// Invalid evaluation split, expected a value strictly between 0 and 1
    EvaluationSplit,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            factors: 50,
            epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            evaluation_split: 0.2,
            seed: 42,
        }
    }
}

impl TrainConfig {
    /// The number of latent factors per user/course.
    pub fn factors(&self) -> usize {
        self.factors
    }

    /// Sets the number of factors.
    ///
    /// # Errors
    /// Fails if the number of factors is zero.
    pub fn with_factors(self, factors: usize) -> Result<Self, Error> {
        if factors > 0 {
            Ok(Self { factors, ..self })
        } else {
            Err(Error::Factors)
        }
    }

    /// The number of epochs to train for.
    ///
    /// Training always runs the full number of epochs, there is no
    /// early stopping.
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Sets the number of epochs.
    ///
    /// # Errors
    /// Fails if the number of epochs is zero.
    pub fn with_epochs(self, epochs: usize) -> Result<Self, Error> {
        if epochs > 0 {
            Ok(Self { epochs, ..self })
        } else {
            Err(Error::Epochs)
        }
    }

    /// The learning rate of the gradient updates.
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Sets the learning rate.
    ///
    /// # Errors
    /// Fails if the learning rate is not a finite positive value.
    pub fn with_learning_rate(self, learning_rate: f32) -> Result<Self, Error> {
        if learning_rate.is_finite() && learning_rate > 0. {
            Ok(Self {
                learning_rate,
                ..self
            })
        } else {
            Err(Error::LearningRate)
        }
    }

    /// The regularization applied to biases and factors.
    pub fn regularization(&self) -> f32 {
        self.regularization
    }

    /// Sets the regularization.
    ///
    /// # Errors
    /// Fails if the regularization is not a finite non-negative value.
    pub fn with_regularization(self, regularization: f32) -> Result<Self, Error> {
        if regularization.is_finite() && regularization >= 0. {
            Ok(Self {
                regularization,
                ..self
            })
        } else {
            Err(Error::Regularization)
        }
    }

    /// The fraction of interactions held out for evaluation.
    pub fn evaluation_split(&self) -> f32 {
        self.evaluation_split
    }

    /// Sets the evaluation split.
    ///
    /// # Errors
    /// Fails if the split is not strictly between 0 and 1.
    pub fn with_evaluation_split(self, evaluation_split: f32) -> Result<Self, Error> {
        if evaluation_split > 0. && evaluation_split < 1. {
            Ok(Self {
                evaluation_split,
                ..self
            })
        } else {
            Err(Error::EvaluationSplit)
        }
    }

    /// The seed of the split sampling, shuffling and factor initialization.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sets the seed.
    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }
}
