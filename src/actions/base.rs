use crate::browser::navigation::NavigationOptions;
use crate::core::config::Config;
use crate::core::gateway::{MouseButton, SignalKind};
use crate::selectors::spec::Selector;
use crate::types::Point;
use crate::wait::RetryPolicy;
use std::time::Duration;

/// Per-call overrides. Anything left unset falls back to the session config.
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    pub wait_for_navigation: Option<bool>,
    pub navigation_timeout: Option<u64>,
    pub wait_for_start: Option<u64>,
    /// Await exactly these page events instead of the default set.
    pub wait_for_events: Vec<SignalKind>,
    pub retry_interval: Option<u64>,
    pub retry_timeout: Option<u64>,
    pub button: MouseButton,
    /// Click repetitions; unset means one.
    pub click_count: Option<u32>,
    /// Keep typed text out of descriptions and logs.
    pub hide_text: bool,
}

impl ActionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wait_for_navigation(mut self, wait: bool) -> Self {
        self.wait_for_navigation = Some(wait);
        self
    }

    pub fn with_navigation_timeout(mut self, timeout_ms: u64) -> Self {
        self.navigation_timeout = Some(timeout_ms);
        self
    }

    pub fn with_wait_for_start(mut self, grace_ms: u64) -> Self {
        self.wait_for_start = Some(grace_ms);
        self
    }

    pub fn with_wait_for_events(mut self, events: impl IntoIterator<Item = SignalKind>) -> Self {
        self.wait_for_events = events.into_iter().collect();
        self
    }

    pub fn with_retry(mut self, interval_ms: u64, timeout_ms: u64) -> Self {
        self.retry_interval = Some(interval_ms);
        self.retry_timeout = Some(timeout_ms);
        self
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_click_count(mut self, count: u32) -> Self {
        self.click_count = Some(count);
        self
    }

    pub fn hiding_text(mut self) -> Self {
        self.hide_text = true;
        self
    }

    pub fn click_count(&self) -> u32 {
        self.click_count.unwrap_or(1).max(1)
    }

    pub fn retry_policy(&self, config: &Config) -> RetryPolicy {
        let defaults = RetryPolicy::from_config(config);
        RetryPolicy {
            interval: self
                .retry_interval
                .map_or(defaults.interval, |ms| Duration::from_millis(ms.max(1))),
            timeout: self.retry_timeout.map_or(defaults.timeout, Duration::from_millis),
        }
    }

    pub fn navigation(&self, config: &Config) -> NavigationOptions {
        NavigationOptions {
            wait_for_navigation: self
                .wait_for_navigation
                .unwrap_or(config.wait_for_navigation()),
            navigation_timeout: self
                .navigation_timeout
                .map_or(config.navigation_timeout(), Duration::from_millis),
            wait_for_start: self
                .wait_for_start
                .map_or(config.wait_for_start(), Duration::from_millis),
            wait_for_events: self.wait_for_events.clone(),
            ..NavigationOptions::default()
        }
    }
}

/// What a pointer action aims at.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Selector(Selector),
    Point(Point),
}

impl From<Selector> for Target {
    fn from(selector: Selector) -> Self {
        Target::Selector(selector)
    }
}

impl From<Point> for Target {
    fn from(point: Point) -> Self {
        Target::Point(point)
    }
}

impl From<&str> for Target {
    fn from(label: &str) -> Self {
        Target::Selector(Selector::text(label))
    }
}

/// Where a dragged element is released.
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    Selector(Selector),
    Offset { dx: f64, dy: f64 },
}

impl From<Selector> for DropTarget {
    fn from(selector: Selector) -> Self {
        DropTarget::Selector(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_options_fall_back_to_config() {
        let config = Config::default();
        let options = ActionOptions::new().with_retry(5, 0);
        assert!(options.retry_policy(&config).is_single_attempt());
        assert_eq!(ActionOptions::new().retry_policy(&config), RetryPolicy::from_config(&config));

        let navigation = ActionOptions::new()
            .with_wait_for_navigation(false)
            .navigation(&config);
        assert!(!navigation.wait_for_navigation);
        assert_eq!(navigation.navigation_timeout, Duration::from_millis(30000));
        assert_eq!(navigation.wait_for_start, Duration::from_millis(100));
    }

    #[test]
    fn click_count_is_at_least_one() {
        assert_eq!(ActionOptions::new().click_count(), 1);
        assert_eq!(ActionOptions::new().with_click_count(0).click_count(), 1);
        assert_eq!(ActionOptions::new().with_click_count(3).click_count(), 3);
    }
}
