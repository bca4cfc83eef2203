use crate::errors::{PilotError, Result};
use crate::types::Viewport;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Session-wide settings. Read anywhere, changed only through [`Config::set`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Upper bound for an action's navigation to settle, in ms.
    navigation_timeout: u64,
    /// Pause between two attempts of the retry engine, in ms.
    retry_interval: u64,
    /// Budget of the retry engine, in ms. `0` means a single attempt.
    retry_timeout: u64,
    /// Slow every action down by `observe_time` so a human can follow along.
    observe: bool,
    observe_time: u64,
    wait_for_navigation: bool,
    highlight_on_action: bool,
    /// Cap on how many candidates an action inspects.
    #[serde(rename = "noOfElementToMatch")]
    elements_to_match: usize,
    /// Grace window for the first navigation signal after an action, in ms.
    wait_for_start: u64,
    headless: bool,
    viewport: Viewport,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            navigation_timeout: 30000,
            retry_interval: 100,
            retry_timeout: 10000,
            observe: false,
            observe_time: 3000,
            wait_for_navigation: true,
            highlight_on_action: true,
            elements_to_match: 10,
            wait_for_start: 100,
            headless: true,
            viewport: Viewport::default(),
        }
    }
}

/// The enumerated option names accepted by [`Config::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOption {
    NavigationTimeout,
    RetryInterval,
    RetryTimeout,
    Observe,
    ObserveTime,
    WaitForNavigation,
    HighlightOnAction,
    ElementsToMatch,
    WaitForStart,
    Headless,
    Viewport,
}

impl ConfigOption {
    pub const ALL: [ConfigOption; 11] = [
        ConfigOption::NavigationTimeout,
        ConfigOption::RetryInterval,
        ConfigOption::RetryTimeout,
        ConfigOption::Observe,
        ConfigOption::ObserveTime,
        ConfigOption::WaitForNavigation,
        ConfigOption::HighlightOnAction,
        ConfigOption::ElementsToMatch,
        ConfigOption::WaitForStart,
        ConfigOption::Headless,
        ConfigOption::Viewport,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            ConfigOption::NavigationTimeout => "navigationTimeout",
            ConfigOption::RetryInterval => "retryInterval",
            ConfigOption::RetryTimeout => "retryTimeout",
            ConfigOption::Observe => "observe",
            ConfigOption::ObserveTime => "observeTime",
            ConfigOption::WaitForNavigation => "waitForNavigation",
            ConfigOption::HighlightOnAction => "highlightOnAction",
            ConfigOption::ElementsToMatch => "noOfElementToMatch",
            ConfigOption::WaitForStart => "waitForStart",
            ConfigOption::Headless => "headless",
            ConfigOption::Viewport => "viewport",
        }
    }
}

impl FromStr for ConfigOption {
    type Err = PilotError;

    fn from_str(key: &str) -> Result<Self> {
        if key == "elementsToMatch" {
            return Ok(ConfigOption::ElementsToMatch);
        }
        ConfigOption::ALL
            .iter()
            .copied()
            .find(|option| option.name() == key)
            .ok_or_else(|| {
                let allowed: Vec<&str> = ConfigOption::ALL.iter().map(|o| o.name()).collect();
                PilotError::InvalidConfig(format!(
                    "unknown option '{}', allowed options are {}",
                    key,
                    allowed.join(", ")
                ))
            })
    }
}

fn expect_u64(key: &str, value: &Value) -> Result<u64> {
    value.as_u64().ok_or_else(|| {
        PilotError::InvalidConfig(format!(
            "'{}' expects a non-negative number, got {}",
            key, value
        ))
    })
}

fn expect_bool(key: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        PilotError::InvalidConfig(format!("'{}' expects a boolean, got {}", key, value))
    })
}

impl Config {
    /// Changes one option after checking its name and the type of `value`.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let option: ConfigOption = key.parse()?;
        match option {
            ConfigOption::NavigationTimeout => self.navigation_timeout = expect_u64(key, &value)?,
            ConfigOption::RetryInterval => {
                let interval = expect_u64(key, &value)?;
                if interval == 0 {
                    return Err(PilotError::InvalidConfig(
                        "'retryInterval' must be greater than 0".to_string(),
                    ));
                }
                self.retry_interval = interval;
            }
            ConfigOption::RetryTimeout => self.retry_timeout = expect_u64(key, &value)?,
            ConfigOption::Observe => self.observe = expect_bool(key, &value)?,
            ConfigOption::ObserveTime => self.observe_time = expect_u64(key, &value)?,
            ConfigOption::WaitForNavigation => self.wait_for_navigation = expect_bool(key, &value)?,
            ConfigOption::HighlightOnAction => {
                self.highlight_on_action = match &value {
                    Value::Bool(flag) => *flag,
                    Value::String(text) => text.parse::<bool>().map_err(|_| {
                        PilotError::InvalidConfig(format!(
                            "'{}' expects true or false, got '{}'",
                            key, text
                        ))
                    })?,
                    other => {
                        return Err(PilotError::InvalidConfig(format!(
                            "'{}' expects a boolean, got {}",
                            key, other
                        )))
                    }
                }
            }
            ConfigOption::ElementsToMatch => {
                self.elements_to_match = expect_u64(key, &value)? as usize
            }
            ConfigOption::WaitForStart => self.wait_for_start = expect_u64(key, &value)?,
            ConfigOption::Headless => self.headless = expect_bool(key, &value)?,
            ConfigOption::Viewport => {
                self.viewport = serde_json::from_value(value).map_err(|e| {
                    PilotError::InvalidConfig(format!("'{}' expects {{width, height}}: {}", key, e))
                })?
            }
        }
        Ok(())
    }

    /// [`Config::set`] in builder form.
    pub fn with(mut self, key: &str, value: Value) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Reads a JSON object of options on top of the defaults.
    pub fn from_json_str(source: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(source)?;
        let Value::Object(options) = document else {
            return Err(PilotError::InvalidConfig(
                "configuration must be a JSON object".to_string(),
            ));
        };
        let mut config = Config::default();
        for (key, value) in options {
            config.set(&key, value)?;
        }
        Ok(config)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout)
    }

    pub fn wait_for_start(&self) -> Duration {
        Duration::from_millis(self.wait_for_start)
    }

    pub fn observe(&self) -> bool {
        self.observe
    }

    pub fn observe_time(&self) -> Duration {
        Duration::from_millis(self.observe_time)
    }

    pub fn wait_for_navigation(&self) -> bool {
        self.wait_for_navigation
    }

    pub fn highlight_on_action(&self) -> bool {
        self.highlight_on_action
    }

    pub fn elements_to_match(&self) -> usize {
        self.elements_to_match
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }
}
