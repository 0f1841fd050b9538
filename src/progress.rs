//! Phase progress reporting, shown on stderr so stdout stays script-friendly.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub struct ProgressTracker {
    bar: ProgressBar,
    total: u64,
    is_bar: bool,
    processed: u64,
}

impl ProgressTracker {
    pub fn new(message: &str, total: u64, use_bar: bool) -> Self {
        let bar = if use_bar && total > 0 {
            let bar = make_progress_bar(total);
            bar.set_message(message.to_string());
            bar
        } else {
            make_spinner(message)
        };
        Self {
            bar,
            total,
            is_bar: use_bar && total > 0,
            processed: 0,
        }
    }

    pub fn inc(&mut self, delta: u64) {
        self.processed = self.processed.saturating_add(delta);
        if self.is_bar {
            let cap = self.total.saturating_sub(1);
            self.bar.set_position(self.processed.min(cap));
        } else {
            self.bar.inc(delta);
        }
    }

    pub fn finish(self) {
        if self.is_bar {
            self.bar.set_position(self.total);
        }
        self.bar.finish_and_clear();
    }
}

fn make_progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr_with_hz(10));
    bar.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(200));
    bar
}

fn make_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} ({pos} tiles processed)")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

pub fn progress_for_phase(
    message: &str,
    total: u64,
    use_bar: bool,
    no_progress: bool,
) -> Option<ProgressTracker> {
    if no_progress {
        None
    } else {
        Some(ProgressTracker::new(message, total, use_bar))
    }
}
