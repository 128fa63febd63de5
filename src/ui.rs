//! Stage reporting for the command-line tools.
//!
//! Progress goes to stderr so stdout stays clean for scenario output.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag.map(|f| f.trim().to_ascii_lowercase()).as_deref() {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
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
        Self::new(UiMode::parse(ui_flag), is_tty, disable_pretty)
    }

    /// Spinners need a terminal; `Pretty` only forces them past `disable_pretty`.
    pub fn is_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.is_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(name.to_string());
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

/// Marks a stage finished, with its elapsed time, when dropped.
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

    /// Progress detail for the running stage.
    pub fn note(&self, detail: &str) {
        match &self.spinner {
            Some(spinner) => spinner.set_message(format!("{}: {}", self.name, detail)),
            None => eprintln!("    {}", detail),
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("done: {} ({})", self.name, format_duration(self.start.elapsed()));
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
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
    fn mode_parsing_defaults_to_auto() {
        assert_eq!(UiMode::parse(Some("plain")), UiMode::Plain);
        assert_eq!(UiMode::parse(Some(" Pretty ")), UiMode::Pretty);
        assert_eq!(UiMode::parse(Some("fancy")), UiMode::Auto);
        assert_eq!(UiMode::parse(None), UiMode::Auto);
    }

    #[test]
    fn pretty_requires_a_terminal() {
        assert!(!Ui::new(UiMode::Pretty, false, false).is_pretty());
        assert!(Ui::new(UiMode::Pretty, true, true).is_pretty());
        assert!(!Ui::new(UiMode::Auto, true, true).is_pretty());
        assert!(Ui::new(UiMode::Auto, true, false).is_pretty());
        assert!(!Ui::new(UiMode::Plain, true, false).is_pretty());
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
