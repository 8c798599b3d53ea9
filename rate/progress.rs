use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;

/// Observer for reporting incremental progress while evaluating per-predictor KLDs.
///
/// Only sequential evaluation reports progress; observers never influence the
/// numerical results.
pub trait KldProgressObserver {
    fn on_start(&mut self, total_predictors: usize) {
        let _ = total_predictors;
    }
    fn on_advance(&mut self, processed_predictors: usize) {
        let _ = processed_predictors;
    }
    fn on_finish(&mut self) {}
}

#[derive(Default)]
pub struct NoopKldProgress;

impl KldProgressObserver for NoopKldProgress {}

/// Draws a progress bar on stderr when it is attached to a terminal.
#[derive(Default)]
pub struct ConsoleKldProgress {
    bar: Option<ProgressBar>,
}

impl ConsoleKldProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) = ProgressStyle::with_template(
        "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

impl KldProgressObserver for ConsoleKldProgress {
    fn on_start(&mut self, total_predictors: usize) {
        self.bar = Some(create_progress_bar(
            total_predictors as u64,
            "Calculating KLD",
        ));
    }

    fn on_advance(&mut self, processed_predictors: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(processed_predictors as u64);
        }
    }

    fn on_finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message("KLD calculation completed");
        }
    }
}
