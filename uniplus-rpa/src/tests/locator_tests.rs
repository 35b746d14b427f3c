use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{write_template, MockDriver};
use crate::errors::BotError;
use crate::locator::{ElementLocator, ElementSpec, Strategy};
use crate::screen::ScreenPoint;

fn fast_locator(driver: Arc<MockDriver>) -> ElementLocator {
    ElementLocator::new(driver).with_poll_interval(Duration::from_millis(5))
}

#[test]
fn primary_template_wins_and_secondary_is_never_attempted() {
    let dir = tempfile::tempdir().unwrap();
    let primary = write_template(dir.path(), "primary.png", 6, 4);
    let secondary = write_template(dir.path(), "secondary.png", 8, 8);

    // Both templates would match above confidence.
    let driver = Arc::new(MockDriver {
        template_hits: HashMap::from([((6, 4), 0.99), ((8, 8), 0.99)]),
        ..MockDriver::default()
    });
    let locator = fast_locator(driver.clone());
    let spec = ElementSpec::named("export")
        .with_template(&primary)
        .with_secondary_template(&secondary)
        .with_text("Exportar");

    let location = locator.locate(&spec).unwrap();
    assert_eq!(location.strategy, Strategy::PrimaryTemplate);

    let template_calls: Vec<_> = driver
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("template"))
        .collect();
    assert_eq!(template_calls, vec!["template 6x4"]);
    assert!(!driver.calls().iter().any(|c| c.starts_with("text")));
}

#[test]
fn cascade_falls_through_to_text() {
    let dir = tempfile::tempdir().unwrap();
    let primary = write_template(dir.path(), "primary.png", 6, 4);

    let driver = Arc::new(MockDriver {
        // Present but below the confidence threshold.
        template_hits: HashMap::from([((6, 4), 0.42)]),
        text_hits: HashMap::from([("Exportar".to_string(), ScreenPoint::new(30, 40))]),
        ..MockDriver::default()
    });
    let locator = fast_locator(driver);
    let spec = ElementSpec::named("export")
        .with_template(&primary)
        .with_text("Exportar");

    let location = locator.locate(&spec).unwrap();
    assert_eq!(location.strategy, Strategy::Text);
    assert_eq!(location.point, ScreenPoint::new(30, 40));
}

#[test]
fn fixed_point_is_the_last_resort() {
    let driver = Arc::new(MockDriver::default());
    let locator = fast_locator(driver.clone());
    let spec = ElementSpec::named("grade")
        .with_text("Grade")
        .with_fixed(ScreenPoint::new(1901, 134));

    let location = locator.locate(&spec).unwrap();
    assert_eq!(location.strategy, Strategy::FixedPoint);
    assert_eq!(location.point, ScreenPoint::new(1901, 134));
    // Text ran (and missed) before the coordinate fallback.
    assert!(driver.calls().iter().any(|c| c == "text Grade"));
}

#[test]
fn timeout_reports_not_found_without_erroring() {
    let driver = Arc::new(MockDriver::default());
    let locator = fast_locator(driver.clone());
    let spec = ElementSpec::named("ghost")
        .with_text("Ghost")
        .with_timeout(Duration::from_millis(30));

    assert!(locator.try_locate(&spec).unwrap().is_none());
    // Polled more than once before giving up.
    assert!(driver.calls().iter().filter(|c| c.starts_with("text")).count() >= 2);

    match locator.locate(&spec) {
        Err(BotError::LocateTimeout { element, .. }) => assert_eq!(element, "ghost"),
        other => panic!("expected LocateTimeout, got {other:?}"),
    }
}

#[test]
fn spec_without_any_method_is_rejected() {
    let locator = fast_locator(Arc::new(MockDriver::default()));
    let spec = ElementSpec::named("empty");
    assert!(matches!(
        locator.try_locate(&spec),
        Err(BotError::InvalidSpec(name)) if name == "empty"
    ));
}
