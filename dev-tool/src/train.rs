use std::{fs, path::PathBuf};

use anyhow::{Context, Error};
use log::info;
use structopt::StructOpt;

use recommender::{DatasetStats, ModelArtifact, TrainConfig, Trainer};

use crate::{
    cli_callbacks::CliTrainingController,
    exit_code::NO_ERROR,
    interactions::load_interactions,
    utils::progress_spin_until_done,
};

/// Trains a recommendation model from an interactions export.
#[derive(StructOpt, Debug)]
pub struct TrainCmd {
    /// A CSV file of interactions (user_id,item_id,rating[,timestamp]).
    #[structopt(long)]
    interactions: PathBuf,

    /// Where to write the model artifact.
    #[structopt(short, long, default_value = "models/recommender.bin")]
    out: PathBuf,

    /// The number of latent factors.
    #[structopt(long, default_value = "50")]
    factors: usize,

    /// The number of epochs to run.
    #[structopt(long, default_value = "20")]
    epochs: usize,

    /// The learning rate to use.
    #[structopt(long, default_value = "0.005")]
    learning_rate: f32,

    /// The regularization applied to biases and factors.
    #[structopt(long, default_value = "0.02")]
    regularization: f32,

    /// The fraction of interactions held out for evaluation.
    #[structopt(long, default_value = "0.2")]
    evaluation_split: f32,

    /// The seed of the split sampling and factor initialization.
    #[structopt(long, default_value = "42")]
    seed: u64,
}

impl TrainCmd {
    pub fn run(self) -> Result<i32, Error> {
        let TrainCmd {
            interactions,
            out,
            factors,
            epochs,
            learning_rate,
            regularization,
            evaluation_split,
            seed,
        } = self;

        let interactions = progress_spin_until_done("Loading interactions", || {
            load_interactions(&interactions)
        })?;
        let stats = DatasetStats::of(&interactions)
            .context("Computing dataset statistics failed.")?;
        info!(
            "loaded {} interactions from {} users over {} courses, ratings {:.1}-{:.1} (mean {:.2})",
            stats.nr_interactions,
            stats.nr_users,
            stats.nr_courses,
            stats.min_rating,
            stats.max_rating,
            stats.mean_rating,
        );

        let config = TrainConfig::default()
            .with_factors(factors)
            .and_then(|config| config.with_epochs(epochs))
            .and_then(|config| config.with_learning_rate(learning_rate))
            .and_then(|config| config.with_regularization(regularization))
            .and_then(|config| config.with_evaluation_split(evaluation_split))
            .map(|config| config.with_seed(seed))
            .context("Invalid training configuration.")?;

        let trainer = Trainer::with_callbacks(config.clone(), CliTrainingController::new());
        let outcome = trainer
            .train(&interactions)
            .context("Training the model failed.")?;
        info!(
            "training finished, evaluation rmse {:.4}, mae {:.4}",
            outcome.metrics.rmse, outcome.metrics.mae,
        );

        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}.", parent.display()))?;
            }
        }
        ModelArtifact::from_outcome(outcome, &config)
            .save(&out)
            .context("Writing the model artifact failed.")?;
        info!("model artifact written to {}", out.display());

        Ok(NO_ERROR)
    }
}
