use indicatif::{ProgressBar, ProgressStyle};

/// Runs `func` while showing a spinner with the given message.
pub(crate) fn progress_spin_until_done<R>(msg: &'static str, func: impl FnOnce() -> R) -> R {
    let spinner = ProgressBar::new_spinner()
        .with_style(ProgressStyle::default_spinner().template("{msg} {spinner:.green} {elapsed}"));
    spinner.set_message(msg);
    spinner.enable_steady_tick(100);
    let res = func();
    spinner.finish_and_clear();
    res
}
