use std::sync::mpsc;

use engine_logging::{engine_info, engine_warn};
use harvester_core::format_duration;

use crate::EngineEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Writes every completion to the log, with the current ETA.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::ScopeDiscovered { total_pages } => {
                engine_info!("Harvesting {} page(s)", total_pages);
            }
            EngineEvent::Enqueued(_) => {}
            EngineEvent::UnitFailed { unit, reason } => {
                engine_warn!("{} failed: {}", unit, reason);
            }
            EngineEvent::Progress(progress) => {
                let total = progress
                    .total
                    .map_or_else(|| "?".to_string(), |total| total.to_string());
                let eta = progress
                    .eta
                    .map_or_else(|| "unknown".to_string(), format_duration);
                engine_info!(
                    "{}/{} units, {} records, {} failed, {} in flight, ETA {}",
                    progress.completed,
                    total,
                    progress.records,
                    progress.failed,
                    progress.in_flight,
                    eta
                );
            }
            EngineEvent::Finished(summary) => engine_info!("Run finished: {}", summary),
        }
    }
}
