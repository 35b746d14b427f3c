use std::time::Duration;

use thiserror::Error;

use crate::sequencer::MacroState;

#[derive(Error, Debug)]
pub enum BotError {
    /// No locate strategy succeeded before the spec's timeout elapsed.
    #[error("element '{element}' not found within {timeout:?}")]
    LocateTimeout { element: String, timeout: Duration },

    /// A macro aborted; carries the exact state it failed in so the
    /// operator knows which screen changed.
    #[error("macro '{name}' failed at {state}: {reason}")]
    SequenceFailed {
        name: String,
        state: MacroState,
        reason: String,
    },

    /// A retried operation ran out of attempts; carries the last underlying
    /// failure so nothing is swallowed past the retry boundary.
    #[error("'{label}' failed after {attempts} attempts: {source}")]
    RetryExhausted {
        label: String,
        attempts: u32,
        #[source]
        source: Box<BotError>,
    },

    /// Header marker missing/duplicated, or a mapped column absent.
    #[error("report schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Database failure; the surrounding transaction is fully rolled back.
    #[error("sync transaction failed: {0}")]
    Sync(#[from] rusqlite::Error),

    #[error("screen capture failed: {0}")]
    Capture(String),

    #[error("synthetic input failed: {0}")]
    Input(String),

    #[error("invalid element spec '{0}': no locating method supplied")]
    InvalidSpec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
