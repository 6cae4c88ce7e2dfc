use std::path::PathBuf;

use anyhow::{Context, Error};
use log::warn;
use structopt::StructOpt;

use recommender::ModelArtifact;

use crate::{exit_code::NO_ERROR, interactions::load_interactions};

/// Inspects a model artifact and optionally re-scores interactions.
#[derive(StructOpt, Debug)]
pub struct EvaluateCmd {
    /// The model artifact to inspect.
    #[structopt(long)]
    artifact: PathBuf,

    /// Re-scores the given interactions CSV against the artifact.
    #[structopt(long)]
    interactions: Option<PathBuf>,
}

impl EvaluateCmd {
    pub fn run(self) -> Result<i32, Error> {
        let artifact = ModelArtifact::load(&self.artifact)
            .with_context(|| format!("Loading the artifact {} failed.", self.artifact.display()))?;

        let metadata = &artifact.metadata;
        println!("trained at:      {}", metadata.trained_at);
        println!("users:           {}", artifact.mappings.nr_users());
        println!("courses:         {}", artifact.mappings.nr_courses());
        println!("factors:         {}", metadata.factors);
        println!("epochs:          {}", metadata.epochs);
        println!("learning rate:   {}", metadata.learning_rate);
        println!("regularization:  {}", metadata.regularization);
        println!("held-out rmse:   {:.4}", metadata.rmse);
        println!("held-out mae:    {:.4}", metadata.mae);

        if let Some(path) = &self.interactions {
            let interactions = load_interactions(path)?;
            let mut nr_scored = 0usize;
            let mut nr_skipped = 0usize;
            let mut sum_squared = 0f64;
            let mut sum_absolute = 0f64;

            for interaction in &interactions {
                let indices = artifact
                    .mappings
                    .user_index(interaction.user_id)
                    .zip(artifact.mappings.course_index(interaction.course_id));
                match indices {
                    Some((u, i)) => {
                        let err =
                            f64::from(interaction.rating - artifact.params.predict(u, i));
                        sum_squared += err * err;
                        sum_absolute += err.abs();
                        nr_scored += 1;
                    }
                    None => nr_skipped += 1,
                }
            }

            if nr_skipped > 0 {
                warn!(
                    "{} interactions reference users or courses unknown to the model",
                    nr_skipped,
                );
            }
            if nr_scored == 0 {
                anyhow::bail!("No interaction could be scored against the artifact.");
            }
            println!("re-scored {} interactions:", nr_scored);
            println!("rmse:            {:.4}", (sum_squared / nr_scored as f64).sqrt());
            println!("mae:             {:.4}", sum_absolute / nr_scored as f64);
        }

        Ok(NO_ERROR)
    }
}
