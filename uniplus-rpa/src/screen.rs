//! The screen/input boundary: everything the automation layer needs from the
//! live desktop, behind one object-safe trait so macros can run against a
//! scripted driver in tests.

use std::path::Path;
use std::time::Duration;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::errors::BotError;

/// One captured screen frame, raw RGBA.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Absolute screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Result of a template search: center of the best match and its score.
#[derive(Debug, Clone, Copy)]
pub struct TemplateHit {
    pub point: ScreenPoint,
    pub score: f32,
}

/// The keys the report macros actually press. Kept driver-agnostic; the
/// production driver maps these onto enigo keycodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    F4,
    F10,
    F12,
    Control,
    Alt,
    Char(char),
}

/// Exclusive handle on the screen and input devices for the duration of a
/// run. All methods block; execution is strictly sequential and
/// single-threaded, so implementations need no thread safety.
pub trait ScreenDriver {
    /// Grab the current contents of the primary monitor.
    fn capture(&self) -> Result<Frame, BotError>;

    /// Search the current screen for a template image. Returns the best
    /// candidate regardless of score; thresholding is the locator's job.
    fn find_template(&self, template: &GrayImage) -> Result<Option<TemplateHit>, BotError>;

    /// Search the current screen for a text pattern. Drivers without an OCR
    /// backend report `None`.
    fn find_text(&self, pattern: &str) -> Result<Option<ScreenPoint>, BotError>;

    fn click(&self, point: ScreenPoint) -> Result<(), BotError>;

    fn press(&self, key: Key) -> Result<(), BotError>;

    /// Press a key combination: all keys held, released in reverse order.
    fn chord(&self, keys: &[Key]) -> Result<(), BotError>;

    /// Type literal text with a fixed inter-keystroke interval.
    fn type_text(&self, text: &str, interval: Duration) -> Result<(), BotError>;

    /// Launch the target application from its shortcut/executable path.
    fn launch(&self, path: &Path) -> Result<(), BotError>;
}
