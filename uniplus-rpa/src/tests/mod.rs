//! Unit tests that need a scripted screen driver.

mod locator_tests;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use image::GrayImage;

use crate::errors::BotError;
use crate::screen::{Frame, Key, ScreenDriver, ScreenPoint, TemplateHit};

/// Scripted driver: template hits are keyed by template dimensions, text
/// hits by pattern, and every call is recorded for order/count assertions.
#[derive(Default)]
pub struct MockDriver {
    pub template_hits: HashMap<(u32, u32), f32>,
    pub text_hits: HashMap<String, ScreenPoint>,
    pub fail_input: bool,
    pub calls: RefCell<Vec<String>>,
}

impl MockDriver {
    pub fn log(&self, entry: impl Into<String>) {
        self.calls.borrow_mut().push(entry.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn input(&self, entry: String) -> Result<(), BotError> {
        self.log(entry);
        if self.fail_input {
            Err(BotError::Input("scripted input failure".into()))
        } else {
            Ok(())
        }
    }
}

impl ScreenDriver for MockDriver {
    fn capture(&self) -> Result<Frame, BotError> {
        self.log("capture");
        Ok(Frame {
            data: vec![0; 16],
            width: 2,
            height: 2,
        })
    }

    fn find_template(&self, template: &GrayImage) -> Result<Option<TemplateHit>, BotError> {
        let dims = template.dimensions();
        self.log(format!("template {}x{}", dims.0, dims.1));
        Ok(self.template_hits.get(&dims).map(|score| TemplateHit {
            point: ScreenPoint::new(dims.0 as i32, dims.1 as i32),
            score: *score,
        }))
    }

    fn find_text(&self, pattern: &str) -> Result<Option<ScreenPoint>, BotError> {
        self.log(format!("text {pattern}"));
        Ok(self.text_hits.get(pattern).copied())
    }

    fn click(&self, point: ScreenPoint) -> Result<(), BotError> {
        self.input(format!("click {},{}", point.x, point.y))
    }

    fn press(&self, key: Key) -> Result<(), BotError> {
        self.input(format!("press {key:?}"))
    }

    fn chord(&self, keys: &[Key]) -> Result<(), BotError> {
        self.input(format!("chord {keys:?}"))
    }

    fn type_text(&self, text: &str, _interval: Duration) -> Result<(), BotError> {
        self.input(format!("type {text}"))
    }

    fn launch(&self, path: &Path) -> Result<(), BotError> {
        self.input(format!("launch {}", path.display()))
    }
}

/// Write a distinguishable grayscale checker as a PNG template asset.
pub fn write_template(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
    let image = GrayImage::from_fn(width, height, |x, y| {
        image::Luma([if (x + y) % 2 == 0 { 255 } else { 0 }])
    });
    let path = dir.join(name);
    image.save(&path).expect("template asset written");
    path
}
