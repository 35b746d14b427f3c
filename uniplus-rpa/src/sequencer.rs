//! Per-macro state machine composing element lookups and synthetic input
//! into one multi-step UI procedure: open the application, walk a menu,
//! enter the report filter, trigger the export and drive the save dialog.
//!
//! A macro either reaches `Done` or fails at a named state; the state is the
//! one diagnostic that tells the operator which screen changed.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::BotError;
use crate::locator::{ElementLocator, ElementSpec};
use crate::screen::{Key, ScreenDriver};
use crate::CancelToken;

/// Inter-keystroke interval for literal text, matching the pace the target
/// application can ingest without dropping characters.
const TYPE_INTERVAL: Duration = Duration::from_millis(100);
/// Short pause between save-dialog keystrokes; the dialog repaints slowly.
const DIALOG_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroState {
    NotStarted,
    NavigatingMenu,
    ConfiguringFilter,
    Exporting,
    SavingFile,
    Done,
}

impl fmt::Display for MacroState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MacroState::NotStarted => "NotStarted",
            MacroState::NavigatingMenu => "NavigatingMenu",
            MacroState::ConfiguringFilter => "ConfiguringFilter",
            MacroState::Exporting => "Exporting",
            MacroState::SavingFile => "SavingFile",
            MacroState::Done => "Done",
        };
        f.write_str(s)
    }
}

/// One synthetic input step inside a macro phase.
#[derive(Debug, Clone)]
pub enum FilterAction {
    Press(Key),
    Chord(Vec<Key>),
    Type(String),
    Pause(Duration),
    /// Locate and click; for controls the keyboard cannot reach.
    Click(ElementSpec),
}

/// Save-as dialog parameters: F12 opens it, F4 focuses the folder box,
/// Alt+S confirms (the target application's fixed bindings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveDialog {
    pub filename: String,
    pub folder: String,
}

/// Complete description of one report-extraction macro.
#[derive(Debug, Clone)]
pub struct ReportMacro {
    pub name: String,
    /// Application shortcut to launch before navigating, if any.
    pub launch: Option<PathBuf>,
    /// Escape presses that clear startup popups after launch.
    pub popup_clears: u32,
    /// Ordered menu route; traversal is strictly sequential, one lookup per
    /// step.
    pub menu: Vec<ElementSpec>,
    pub filter: Vec<FilterAction>,
    /// Steps that open the export surface (e.g. a Ctrl+P chord), before the
    /// trigger itself is looked up.
    pub export_open: Vec<FilterAction>,
    /// The export trigger (button or print dialog entry).
    pub export: ElementSpec,
    /// Parameters entered in the export dialog after the trigger (date
    /// ranges and the like).
    pub export_params: Vec<FilterAction>,
    /// Key confirming the export parameters, if the report needs one.
    pub confirm: Option<Key>,
    pub save: SaveDialog,
    /// Settle delay after state-changing actions; required wait for UI
    /// redraw, not an optimization.
    pub settle: Duration,
}

pub struct ActionSequencer {
    driver: Arc<dyn ScreenDriver>,
    locator: ElementLocator,
    cancel: CancelToken,
}

impl ActionSequencer {
    pub fn new(driver: Arc<dyn ScreenDriver>, cancel: CancelToken) -> Self {
        let locator = ElementLocator::new(driver.clone());
        Self {
            driver,
            locator,
            cancel,
        }
    }

    /// Run the macro to completion or to the first failing state.
    pub fn run(&self, m: &ReportMacro) -> Result<(), BotError> {
        let mut state = MacroState::NotStarted;

        self.enter(m, &mut state, MacroState::NavigatingMenu)?;
        self.navigate(m, state)?;

        self.enter(m, &mut state, MacroState::ConfiguringFilter)?;
        self.configure_filter(m, state)?;

        self.enter(m, &mut state, MacroState::Exporting)?;
        self.export(m, state)?;

        self.enter(m, &mut state, MacroState::SavingFile)?;
        self.save_file(m, state)?;

        state = MacroState::Done;
        info!(macro_name = %m.name, %state, "macro finished");
        Ok(())
    }

    /// State transition point; the cooperative stop signal is polled here,
    /// never mid-action.
    fn enter(
        &self,
        m: &ReportMacro,
        state: &mut MacroState,
        next: MacroState,
    ) -> Result<(), BotError> {
        if self.cancel.is_cancelled() {
            return Err(self.fail(m, next, "cancelled before state entry"));
        }
        debug!(macro_name = %m.name, from = %state, to = %next, "state transition");
        *state = next;
        Ok(())
    }

    fn fail(&self, m: &ReportMacro, state: MacroState, reason: impl fmt::Display) -> BotError {
        BotError::SequenceFailed {
            name: m.name.clone(),
            state,
            reason: reason.to_string(),
        }
    }

    fn navigate(&self, m: &ReportMacro, state: MacroState) -> Result<(), BotError> {
        if let Some(path) = &m.launch {
            self.driver
                .launch(path)
                .map_err(|e| self.fail(m, state, e))?;
            std::thread::sleep(m.settle);
            for _ in 0..m.popup_clears {
                self.driver
                    .press(Key::Escape)
                    .map_err(|e| self.fail(m, state, e))?;
                std::thread::sleep(Duration::from_millis(100));
            }
        }
        for step in &m.menu {
            let location = self
                .locator
                .locate(step)
                .map_err(|e| self.fail(m, state, e))?;
            self.driver
                .click(location.point)
                .map_err(|e| self.fail(m, state, e))?;
            std::thread::sleep(m.settle);
        }
        Ok(())
    }

    fn apply(&self, m: &ReportMacro, state: MacroState, actions: &[FilterAction]) -> Result<(), BotError> {
        for action in actions {
            match action {
                FilterAction::Press(key) => self.driver.press(*key),
                FilterAction::Chord(keys) => self.driver.chord(keys),
                FilterAction::Type(text) => self.driver.type_text(text, TYPE_INTERVAL),
                FilterAction::Pause(delay) => {
                    std::thread::sleep(*delay);
                    Ok(())
                }
                FilterAction::Click(spec) => self
                    .locator
                    .locate(spec)
                    .and_then(|location| self.driver.click(location.point)),
            }
            .map_err(|e| self.fail(m, state, e))?;
        }
        Ok(())
    }

    fn configure_filter(&self, m: &ReportMacro, state: MacroState) -> Result<(), BotError> {
        self.apply(m, state, &m.filter)
    }

    fn export(&self, m: &ReportMacro, state: MacroState) -> Result<(), BotError> {
        self.apply(m, state, &m.export_open)?;
        let location = self
            .locator
            .locate(&m.export)
            .map_err(|e| self.fail(m, state, e))?;
        self.driver
            .click(location.point)
            .map_err(|e| self.fail(m, state, e))?;
        std::thread::sleep(m.settle);
        self.apply(m, state, &m.export_params)?;
        if let Some(key) = m.confirm {
            self.driver.press(key).map_err(|e| self.fail(m, state, e))?;
            std::thread::sleep(m.settle);
        }
        Ok(())
    }

    fn save_file(&self, m: &ReportMacro, state: MacroState) -> Result<(), BotError> {
        let d = &*self.driver;
        let step = |r: Result<(), BotError>| -> Result<(), BotError> {
            r.map_err(|e| self.fail(m, state, e))?;
            std::thread::sleep(DIALOG_PAUSE);
            Ok(())
        };
        step(d.press(Key::F12))?;
        step(d.type_text(&m.save.filename, TYPE_INTERVAL))?;
        step(d.press(Key::F4))?;
        step(d.chord(&[Key::Control, Key::Char('a')]))?;
        step(d.type_text(&m.save.folder, TYPE_INTERVAL))?;
        step(d.press(Key::Enter))?;
        step(d.chord(&[Key::Alt, Key::Char('s')]))?;
        Ok(())
    }
}
