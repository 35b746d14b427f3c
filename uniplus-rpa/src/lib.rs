//! Screen-driven report extraction from the Uniplus ERP, reconciled into a
//! relational store without duplicating previously loaded rows.
//!
//! The ERP exposes no programmatic API, so extraction is pure UI automation:
//! an element locator with cascading fallback strategies drives per-report
//! macros, the captured export is normalized into records, and a diff-based
//! sync engine commits only the rows the store has not seen. Everything is
//! idempotent under re-delivery; that is the crash-safety story.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod bots;
pub mod desktop;
pub mod errors;
pub mod ingest;
pub mod locator;
pub mod retry;
pub mod runner;
pub mod screen;
pub mod sequencer;
pub mod sync;
pub mod template;
#[cfg(test)]
mod tests;

pub use errors::BotError;
pub use ingest::{normalize, IngestRules, RawGrid, Record};
pub use locator::{ElementLocator, ElementSpec, Location, Strategy};
pub use retry::Retry;
pub use runner::{BotRunner, BotSpec, RunSummary};
pub use screen::{Frame, Key, ScreenDriver, ScreenPoint, TemplateHit};
pub use sequencer::{ActionSequencer, MacroState, ReportMacro};
pub use sync::{SyncEngine, SyncPolicy, TableSchema};

/// Cooperative stop signal, polled between macro states. Setting it never
/// preempts an in-flight action; the current action always completes first.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
