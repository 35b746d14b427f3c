//! The production [`ScreenDriver`]: xcap screen capture plus enigo synthetic
//! input. Assumes exclusive control of the screen and input focus for the
//! duration of a run; concurrent interaction with the same desktop is
//! unsupported and not detected.

use std::cell::RefCell;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use image::GrayImage;
use tracing::debug;

use crate::errors::BotError;
use crate::screen::{Frame, Key, ScreenDriver, ScreenPoint, TemplateHit};
use crate::template;

pub struct DesktopDriver {
    enigo: RefCell<Enigo>,
}

impl DesktopDriver {
    pub fn new() -> Result<Self, BotError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| BotError::Input(e.to_string()))?;
        Ok(Self {
            enigo: RefCell::new(enigo),
        })
    }

    fn key_code(key: Key) -> enigo::Key {
        match key {
            Key::Escape => enigo::Key::Escape,
            Key::Enter => enigo::Key::Return,
            Key::Tab => enigo::Key::Tab,
            Key::F4 => enigo::Key::F4,
            Key::F10 => enigo::Key::F10,
            Key::F12 => enigo::Key::F12,
            Key::Control => enigo::Key::Control,
            Key::Alt => enigo::Key::Alt,
            Key::Char(c) => enigo::Key::Unicode(c),
        }
    }
}

impl ScreenDriver for DesktopDriver {
    fn capture(&self) -> Result<Frame, BotError> {
        let monitors = xcap::Monitor::all().map_err(|e| BotError::Capture(e.to_string()))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| monitors.first())
            .ok_or_else(|| BotError::Capture("no monitor available".into()))?;
        let image = monitor
            .capture_image()
            .map_err(|e| BotError::Capture(e.to_string()))?;
        Ok(Frame {
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
        })
    }

    fn find_template(&self, needle: &GrayImage) -> Result<Option<TemplateHit>, BotError> {
        let frame = self.capture()?;
        let haystack = template::frame_to_gray(&frame)
            .ok_or_else(|| BotError::Capture("malformed frame buffer".into()))?;
        Ok(template::best_match(&haystack, needle))
    }

    fn find_text(&self, pattern: &str) -> Result<Option<ScreenPoint>, BotError> {
        // No OCR backend is wired up; the text strategy only fires on
        // drivers that have one.
        debug!(pattern, "text lookup skipped: no OCR backend");
        Ok(None)
    }

    fn click(&self, point: ScreenPoint) -> Result<(), BotError> {
        let mut enigo = self.enigo.borrow_mut();
        enigo
            .move_mouse(point.x, point.y, Coordinate::Abs)
            .map_err(|e| BotError::Input(e.to_string()))?;
        enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| BotError::Input(e.to_string()))
    }

    fn press(&self, key: Key) -> Result<(), BotError> {
        self.enigo
            .borrow_mut()
            .key(Self::key_code(key), Direction::Click)
            .map_err(|e| BotError::Input(e.to_string()))
    }

    fn chord(&self, keys: &[Key]) -> Result<(), BotError> {
        let mut enigo = self.enigo.borrow_mut();
        for key in keys {
            enigo
                .key(Self::key_code(*key), Direction::Press)
                .map_err(|e| BotError::Input(e.to_string()))?;
        }
        for key in keys.iter().rev() {
            enigo
                .key(Self::key_code(*key), Direction::Release)
                .map_err(|e| BotError::Input(e.to_string()))?;
        }
        Ok(())
    }

    fn type_text(&self, text: &str, interval: Duration) -> Result<(), BotError> {
        let mut enigo = self.enigo.borrow_mut();
        for ch in text.chars() {
            enigo
                .key(enigo::Key::Unicode(ch), Direction::Click)
                .map_err(|e| BotError::Input(e.to_string()))?;
            std::thread::sleep(interval);
        }
        Ok(())
    }

    fn launch(&self, path: &Path) -> Result<(), BotError> {
        #[cfg(target_os = "windows")]
        let spawned = Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(path)
            .spawn();
        #[cfg(target_os = "macos")]
        let spawned = Command::new("open").arg(path).spawn();
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let spawned = Command::new(path).spawn();

        spawned.map(drop).map_err(BotError::Io)
    }
}
