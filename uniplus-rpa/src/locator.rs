//! Finds on-screen controls with a cascade of detection strategies.
//!
//! The target application has no stable addressing scheme, so every control
//! is described by an [`ElementSpec`] carrying up to four ways of finding
//! it. Strategies run cheapest/most specific first; the fixed coordinate is
//! the last resort because it breaks the moment the layout shifts.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::GrayImage;
use tracing::{debug, info};

use crate::errors::BotError;
use crate::screen::{ScreenDriver, ScreenPoint};

const DEFAULT_CONFIDENCE: f32 = 0.9;
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Describes one on-screen target. At least one locating method (template,
/// text or fixed point) must be present.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    pub name: String,
    pub primary_template: Option<PathBuf>,
    pub secondary_template: Option<PathBuf>,
    pub text: Option<String>,
    pub fixed: Option<ScreenPoint>,
    pub confidence: f32,
    pub timeout: Duration,
}

impl ElementSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_template: None,
            secondary_template: None,
            text: None,
            fixed: None,
            confidence: DEFAULT_CONFIDENCE,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.primary_template = Some(path.into());
        self
    }

    pub fn with_secondary_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.secondary_template = Some(path.into());
        self
    }

    pub fn with_text(mut self, pattern: impl Into<String>) -> Self {
        self.text = Some(pattern.into());
        self
    }

    pub fn with_fixed(mut self, point: ScreenPoint) -> Self {
        self.fixed = Some(point);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self) -> Result<(), BotError> {
        if self.primary_template.is_none()
            && self.secondary_template.is_none()
            && self.text.is_none()
            && self.fixed.is_none()
        {
            return Err(BotError::InvalidSpec(self.name.clone()));
        }
        Ok(())
    }
}

/// Which strategy produced a location, reported for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PrimaryTemplate,
    SecondaryTemplate,
    Text,
    FixedPoint,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::PrimaryTemplate => "primary template",
            Strategy::SecondaryTemplate => "secondary template",
            Strategy::Text => "text",
            Strategy::FixedPoint => "fixed point",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub point: ScreenPoint,
    pub strategy: Strategy,
}

/// Polling element lookup over a [`ScreenDriver`].
pub struct ElementLocator {
    driver: Arc<dyn ScreenDriver>,
    poll_interval: Duration,
    // Template assets are small and re-used every poll; decode them once.
    templates: RefCell<HashMap<PathBuf, GrayImage>>,
}

impl ElementLocator {
    pub fn new(driver: Arc<dyn ScreenDriver>) -> Self {
        Self {
            driver,
            poll_interval: DEFAULT_POLL_INTERVAL,
            templates: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll until the spec's timeout elapses. `Ok(None)` means not found;
    /// plain absence is not an error at this layer.
    pub fn try_locate(&self, spec: &ElementSpec) -> Result<Option<Location>, BotError> {
        spec.validate()?;
        let deadline = Instant::now() + spec.timeout;
        loop {
            if let Some(location) = self.attempt(spec)? {
                info!(
                    element = %spec.name,
                    strategy = %location.strategy,
                    x = location.point.x,
                    y = location.point.y,
                    "element located"
                );
                return Ok(Some(location));
            }
            if Instant::now() >= deadline {
                debug!(element = %spec.name, "lookup timed out");
                return Ok(None);
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// As [`try_locate`](Self::try_locate), but absence becomes a typed
    /// [`BotError::LocateTimeout`] for callers that propagate.
    pub fn locate(&self, spec: &ElementSpec) -> Result<Location, BotError> {
        self.try_locate(spec)?.ok_or_else(|| BotError::LocateTimeout {
            element: spec.name.clone(),
            timeout: spec.timeout,
        })
    }

    /// One pass through the strategy cascade, stopping at the first hit.
    fn attempt(&self, spec: &ElementSpec) -> Result<Option<Location>, BotError> {
        if let Some(path) = &spec.primary_template {
            if let Some(point) = self.match_template(path, spec.confidence)? {
                return Ok(Some(Location {
                    point,
                    strategy: Strategy::PrimaryTemplate,
                }));
            }
        }
        if let Some(path) = &spec.secondary_template {
            if let Some(point) = self.match_template(path, spec.confidence)? {
                return Ok(Some(Location {
                    point,
                    strategy: Strategy::SecondaryTemplate,
                }));
            }
        }
        if let Some(pattern) = &spec.text {
            if let Some(point) = self.driver.find_text(pattern)? {
                return Ok(Some(Location {
                    point,
                    strategy: Strategy::Text,
                }));
            }
        }
        if let Some(point) = spec.fixed {
            return Ok(Some(Location {
                point,
                strategy: Strategy::FixedPoint,
            }));
        }
        Ok(None)
    }

    fn match_template(
        &self,
        path: &PathBuf,
        confidence: f32,
    ) -> Result<Option<ScreenPoint>, BotError> {
        let template = self.load_template(path)?;
        let hit = self.driver.find_template(&template)?;
        match hit {
            Some(hit) if hit.score >= confidence => Ok(Some(hit.point)),
            Some(hit) => {
                debug!(template = %path.display(), score = hit.score, "below confidence");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn load_template(&self, path: &PathBuf) -> Result<GrayImage, BotError> {
        if let Some(cached) = self.templates.borrow().get(path) {
            return Ok(cached.clone());
        }
        let template = image::open(path)
            .map_err(|e| BotError::Capture(format!("template '{}': {e}", path.display())))?
            .into_luma8();
        self.templates
            .borrow_mut()
            .insert(path.clone(), template.clone());
        Ok(template)
    }
}
