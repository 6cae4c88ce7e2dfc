//! Progress reporting for training runs in a CLI setup.

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use recommender::{trainer::TrainingController, EvaluationMetrics};

/// Training controller rendering an epoch progress bar.
pub(crate) struct CliTrainingController {
    progress: Option<ProgressBar>,
    current_epoch: usize,
}

impl CliTrainingController {
    pub(crate) fn new() -> Self {
        Self {
            progress: None,
            current_epoch: 0,
        }
    }
}

impl TrainingController for CliTrainingController {
    fn begin_of_training(&mut self, nr_epochs: usize) {
        let progress = ProgressBar::new(nr_epochs as u64).with_style(
            ProgressStyle::default_bar()
                .template("Training: {bar:40.green} {pos}/{len} epochs {msg}"),
        );
        self.progress = Some(progress);
    }

    fn begin_of_epoch(&mut self, nr_samples: usize) {
        debug!(
            "start of epoch #{} over {} samples",
            self.current_epoch, nr_samples,
        );
    }

    fn end_of_epoch(&mut self, train_rmse: f32) {
        debug!(
            "end of epoch #{}, training rmse {:.4}",
            self.current_epoch, train_rmse,
        );
        if let Some(progress) = &self.progress {
            progress.set_message(format!("(rmse {:.4})", train_rmse));
            progress.inc(1);
        }
        self.current_epoch += 1;
    }

    fn end_of_training(&mut self, metrics: &EvaluationMetrics) {
        if let Some(progress) = self.progress.take() {
            progress.finish_with_message(format!(
                "(evaluation rmse {:.4}, mae {:.4})",
                metrics.rmse, metrics.mae,
            ));
        }
    }
}
