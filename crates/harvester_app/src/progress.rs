use std::time::Duration;

use harvester_core::{format_duration, ProgressSnapshot};
use harvester_engine::{EngineEvent, ProgressSink};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner} {pos} batches {msg}";

/// Terminal progress: a bar when the unit count is known, a spinner otherwise.
pub struct BarProgressSink {
    bar: ProgressBar,
}

impl BarProgressSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(style(SPINNER_TEMPLATE));
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    fn set_total(&self, total: u64) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
            self.bar.set_style(style(BAR_TEMPLATE));
        }
    }
}

impl Default for BarProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::ScopeDiscovered { total_pages } => self.set_total(u64::from(total_pages)),
            EngineEvent::Enqueued(_) => {}
            EngineEvent::UnitFailed { unit, reason } => {
                self.bar.println(format!("{unit} failed: {reason}"));
            }
            EngineEvent::Progress(snapshot) => {
                if let Some(total) = snapshot.total {
                    self.set_total(total as u64);
                }
                self.bar.set_position(snapshot.completed as u64);
                self.bar.set_message(status_line(&snapshot));
            }
            EngineEvent::Finished(summary) => {
                self.bar
                    .finish_with_message(format!("{} records", summary.records));
            }
        }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn status_line(snapshot: &ProgressSnapshot) -> String {
    let eta = snapshot
        .eta
        .map_or_else(|| "--:--".to_string(), format_duration);
    format!(
        "{} records, {} failed, {} in flight, ETA {}",
        snapshot.records, snapshot.failed, snapshot.in_flight, eta
    )
}
