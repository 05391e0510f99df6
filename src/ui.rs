use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// Plain-mode status lines are printed at most this often.
const PLAIN_STATUS_PERIOD: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    fn spinner(&self, message: String) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message);
        spinner
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = self.spinner(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// A single continuously updated line (live fused values).
    pub fn status_line(&self, title: &str) -> StatusLine {
        let spinner = self.use_pretty().then(|| self.spinner(title.to_string()));
        StatusLine {
            title: title.to_string(),
            spinner,
            last_plain: None,
            updates: 0,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct StatusLine {
    title: String,
    spinner: Option<ProgressBar>,
    last_plain: Option<Instant>,
    updates: u64,
}

impl StatusLine {
    pub fn update(&mut self, message: &str) {
        self.updates += 1;
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!("{}: {}", self.title, message));
            return;
        }
        let due = self
            .last_plain
            .map_or(true, |last| last.elapsed() >= PLAIN_STATUS_PERIOD);
        if due {
            eprintln!("{}: {}", self.title, message);
            self.last_plain = Some(Instant::now());
        }
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn finish(&mut self) {
        let message = format!("✔ {} ({} updates)", self.title, self.updates);
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(message);
        } else if self.last_plain.take().is_some() {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_uses_spinner() {
        let ui = Ui::from_args(Some("plain"), true, false);
        assert!(!ui.use_pretty());
        let mut status = ui.status_line("fusion");
        status.update("Sensor_1 = 1");
        status.update("Sensor_1 = 2");
        assert_eq!(status.updates(), 2);
        status.finish();
    }

    #[test]
    fn auto_mode_respects_tty_and_override() {
        assert!(Ui::from_args(None, true, false).use_pretty());
        assert!(!Ui::from_args(None, true, true).use_pretty());
        assert!(!Ui::from_args(Some("pretty"), false, false).use_pretty());
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
