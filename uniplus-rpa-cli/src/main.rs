//! Command-line dispatch: pick a bot by name, assemble its environment from
//! flags/env/an optional JSON file, and run it once.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uniplus_rpa::bots::{self, BotEnv, BOT_NAMES};
use uniplus_rpa::desktop::DesktopDriver;
use uniplus_rpa::{BotRunner, CancelToken, ScreenPoint};

#[derive(Parser, Debug)]
#[command(author, version, about = "Uniplus report bots")]
struct Args {
    /// Which bot to run.
    #[arg(long)]
    bot: String,

    /// SQLite database file receiving the synced rows.
    #[arg(long, env = "DB_PATH", default_value = "uniplus.db")]
    db: PathBuf,

    /// Uniplus application shortcut/executable.
    #[arg(long, env = "UNIPLUS_PATH", default_value = "uniplus")]
    uniplus_path: PathBuf,

    /// Directory holding the template image assets.
    #[arg(long, env = "ASSETS_DIR", default_value = "assets")]
    assets_dir: PathBuf,

    /// Where the ERP save dialog drops exports.
    #[arg(long, env = "INPUT_DIR", default_value = "input")]
    input_dir: PathBuf,

    /// Where processed exports are archived.
    #[arg(long, env = "ARCHIVE_DIR", default_value = "archive")]
    archive_dir: PathBuf,

    /// Optional JSON file overriding the path settings above.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Optional file-based overrides; flags/env win only when the file omits a
/// field.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    db: Option<PathBuf>,
    uniplus_path: Option<PathBuf>,
    assets_dir: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    archive_dir: Option<PathBuf>,
}

/// `MENU_<ITEM>_X` / `MENU_<ITEM>_Y` environment pairs become fixed
/// last-resort coordinates for menu items, as the operators configure them.
fn menu_fallbacks_from_env() -> HashMap<String, ScreenPoint> {
    let mut fallbacks = HashMap::new();
    for (key, value) in std::env::vars() {
        let Some(item) = key.strip_prefix("MENU_").and_then(|k| k.strip_suffix("_X")) else {
            continue;
        };
        let Ok(x) = value.parse::<i32>() else { continue };
        let Ok(y) = std::env::var(format!("MENU_{item}_Y"))
            .map_err(|_| ())
            .and_then(|v| v.parse::<i32>().map_err(|_| ()))
        else {
            continue;
        };
        fallbacks.insert(item.to_lowercase(), ScreenPoint::new(x, y));
    }
    fallbacks
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let overrides = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => FileConfig::default(),
    };

    let env = BotEnv {
        uniplus_shortcut: overrides.uniplus_path.unwrap_or(args.uniplus_path),
        assets_dir: overrides.assets_dir.unwrap_or(args.assets_dir),
        input_dir: overrides.input_dir.unwrap_or(args.input_dir),
        archive_dir: overrides.archive_dir.unwrap_or(args.archive_dir),
        menu_fallbacks: menu_fallbacks_from_env(),
    };

    let Some(bot) = bots::by_name(&args.bot, &env) else {
        bail!("unknown bot '{}'; available: {}", args.bot, BOT_NAMES.join(", "));
    };

    let db = overrides.db.unwrap_or(args.db);
    let mut conn = rusqlite::Connection::open(&db)
        .with_context(|| format!("opening database {}", db.display()))?;

    let driver = Arc::new(DesktopDriver::new().context("initializing screen driver")?);
    let cancel = CancelToken::new();
    let runner = BotRunner::new(driver, cancel);

    match runner.run(&mut conn, &bot) {
        Ok(summary) => {
            info!(
                bot = %bot.name,
                files = summary.files,
                inserted = summary.inserted,
                "bot completed"
            );
            Ok(())
        }
        Err(e) => {
            error!(bot = %bot.name, error = %e, "bot failed");
            std::process::exit(1);
        }
    }
}
