//! Per-run composition: extract → normalize → reconcile → archive.
//!
//! The runner is parameterized by a per-bot configuration record instead of
//! a bot class hierarchy; every bot shares this exact pipeline and differs
//! only in its [`BotSpec`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use tracing::{info, warn};

use crate::errors::BotError;
use crate::ingest::{normalize, IngestRules, RawGrid};
use crate::retry::Retry;
use crate::screen::ScreenDriver;
use crate::sequencer::{ActionSequencer, ReportMacro};
use crate::sync::{SyncEngine, SyncPolicy, TableSchema};
use crate::CancelToken;

/// Everything that distinguishes one bot from another. Supplied as opaque
/// configuration; the core never parses configuration files itself.
#[derive(Debug, Clone)]
pub struct BotSpec {
    pub name: String,
    pub extract: ReportMacro,
    pub rules: IngestRules,
    pub schema: TableSchema,
    pub policy: SyncPolicy,
    /// Where the save-as dialog drops the export.
    pub input_dir: PathBuf,
    /// Where processed exports are moved after a successful commit.
    pub archive_dir: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub files: usize,
    pub inserted: usize,
}

pub struct BotRunner {
    driver: Arc<dyn ScreenDriver>,
    retry: Retry,
    cancel: CancelToken,
}

impl BotRunner {
    pub fn new(driver: Arc<dyn ScreenDriver>, cancel: CancelToken) -> Self {
        Self {
            driver,
            retry: Retry::default(),
            cancel,
        }
    }

    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// One full run. Extraction failure aborts before any database work; a
    /// source file is archived only after its rows are committed, so a
    /// failed run leaves it in place for the next invocation and the delta
    /// computation makes that reprocessing a no-op.
    pub fn run(&self, conn: &mut Connection, bot: &BotSpec) -> Result<RunSummary, BotError> {
        info!(bot = %bot.name, "run started");

        let sequencer = ActionSequencer::new(self.driver.clone(), self.cancel.clone());
        self.retry
            .run(&format!("extract '{}'", bot.name), || {
                sequencer.run(&bot.extract)
            })?;

        let exports = pending_exports(&bot.input_dir)?;
        if exports.is_empty() {
            warn!(bot = %bot.name, dir = %bot.input_dir.display(), "no exports to process");
            return Ok(RunSummary::default());
        }

        let engine = SyncEngine::new(bot.schema.clone());
        let mut summary = RunSummary::default();
        for path in exports {
            info!(bot = %bot.name, file = %path.display(), "processing export");
            let records = load_and_normalize(&path, &bot.rules)?;
            summary.inserted += engine.commit(conn, &records, bot.policy)?;
            summary.files += 1;
            archive(&path, &bot.archive_dir)?;
        }

        info!(bot = %bot.name, files = summary.files, inserted = summary.inserted, "run finished");
        Ok(summary)
    }
}

fn load_and_normalize(
    path: &Path,
    rules: &IngestRules,
) -> Result<Vec<crate::ingest::Record>, BotError> {
    let grid = RawGrid::from_csv_path(path)?;
    normalize(&grid, rules)
}

/// Exports waiting in the input directory, oldest name first so re-runs are
/// deterministic.
fn pending_exports(dir: &Path) -> Result<Vec<PathBuf>, BotError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Move the processed export out of the input directory. Never rewrites the
/// source in place; falls back to copy+remove across filesystems.
fn archive(path: &Path, archive_dir: &Path) -> Result<(), BotError> {
    fs::create_dir_all(archive_dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| BotError::Io(std::io::Error::other("export has no file name")))?;
    let target = archive_dir.join(file_name);
    if fs::rename(path, &target).is_err() {
        fs::copy(path, &target)?;
        fs::remove_file(path)?;
    }
    info!(to = %target.display(), "export archived");
    Ok(())
}
